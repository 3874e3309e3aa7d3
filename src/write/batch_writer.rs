use crate::{Error, Result, common, store};

use std::time;

/// Most records DynamoDB accepts in one batch write.
pub const BATCH_WRITE_CEILING: usize = 25;

/// Default delay between consecutive chunks.
pub const DEFAULT_PACING: time::Duration = time::Duration::from_millis(100);

/// How records are persisted.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum WriteMode {
    /// One bulk unconditional put per chunk; existing items are replaced.
    #[default]
    Overwrite,
    /// One conditional put per record; records whose key already exists are skipped.
    InsertOnly,
}

impl WriteMode {
    /// `Overwrite` when `overwrite` is set, `InsertOnly` otherwise.
    pub fn from_overwrite(overwrite: bool) -> Self {
        if overwrite {
            Self::Overwrite
        } else {
            Self::InsertOnly
        }
    }
}

/// A record that could not be written, with the reason.
#[derive(Clone, Debug, PartialEq)]
pub struct FailedRecord {
    /// The record as it was handed to the writer.
    pub record: common::Record,
    /// Why the write failed.
    pub error: String,
}

/// What happened to one chunk.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchOutcome {
    /// Records written.
    pub succeeded: usize,
    /// Records left alone because their key already existed (insert-only mode).
    pub skipped: usize,
    /// Records that failed.
    pub failed: Vec<FailedRecord>,
}

impl BatchOutcome {
    /// Records accounted for.
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed.len()
    }
}

/// Persists chunks of records into one table.
///
/// Chunks must not exceed the ceiling; splitting a record stream into chunks
/// is up to the caller, which also calls [`BatchWriter::pace`] between chunks.
#[derive(Debug)]
pub struct BatchWriter<'a, S: ?Sized> {
    ceiling: usize,
    key_schema: common::key::KeySchema,
    pacing: time::Duration,
    store: &'a S,
    table_name: String,
}

impl<'a, S: store::StoreClient + ?Sized> BatchWriter<'a, S> {
    /// Writer for `table_name`, whose primary key is `key_schema`.
    pub fn new(
        store: &'a S,
        table_name: impl Into<String>,
        key_schema: common::key::KeySchema,
    ) -> Self {
        Self {
            ceiling: BATCH_WRITE_CEILING,
            key_schema,
            pacing: DEFAULT_PACING,
            store,
            table_name: table_name.into(),
        }
    }

    /// Lowers the per-chunk ceiling; values are clamped to `1..=BATCH_WRITE_CEILING`.
    pub fn with_ceiling(mut self, ceiling: usize) -> Self {
        self.ceiling = ceiling.clamp(1, BATCH_WRITE_CEILING);
        self
    }

    /// Sets the delay inserted by [`BatchWriter::pace`].
    pub fn with_pacing(mut self, pacing: time::Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// The largest chunk accepted.
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Writes one chunk.
    ///
    /// Store failures never surface as `Err`: they are reported per record in
    /// the outcome. In overwrite mode a failed call, or one that leaves
    /// records unprocessed, fails the whole chunk. In insert-only mode each
    /// record succeeds, is skipped or fails on its own.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the chunk exceeds the ceiling; nothing is sent.
    pub async fn write_batch(
        &self,
        records: Vec<common::Record>,
        mode: WriteMode,
    ) -> Result<BatchOutcome> {
        if records.len() > self.ceiling {
            return Err(Error::InvalidArgument(format!(
                "chunk of {} records exceeds the batch ceiling of {}",
                records.len(),
                self.ceiling
            )));
        }
        if records.is_empty() {
            return Ok(BatchOutcome::default());
        }
        let outcome = match mode {
            WriteMode::Overwrite => self.overwrite(records).await,
            WriteMode::InsertOnly => self.insert_only(records).await,
        };
        tracing::debug!(
            table_name = %self.table_name,
            ?mode,
            succeeded = outcome.succeeded,
            skipped = outcome.skipped,
            failed = outcome.failed.len(),
            "wrote chunk"
        );
        Ok(outcome)
    }

    async fn overwrite(&self, records: Vec<common::Record>) -> BatchOutcome {
        let total = records.len();
        let error = match self.store.batch_put(&self.table_name, records.clone()).await {
            Ok(outcome) if outcome.unprocessed == 0 => {
                return BatchOutcome {
                    succeeded: total,
                    ..Default::default()
                };
            }
            Ok(outcome) => format!(
                "{} of {total} records left unprocessed by the store",
                outcome.unprocessed
            ),
            Err(error) => error.to_string(),
        };
        tracing::warn!(
            table_name = %self.table_name,
            records = total,
            %error,
            "chunk failed"
        );
        BatchOutcome {
            failed: records
                .into_iter()
                .map(|record| FailedRecord {
                    record,
                    error: error.clone(),
                })
                .collect(),
            ..Default::default()
        }
    }

    async fn insert_only(&self, records: Vec<common::Record>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for record in records {
            match self
                .store
                .conditional_put(&self.table_name, record.clone(), &self.key_schema)
                .await
            {
                Ok(store::PutOutcome::Written) => outcome.succeeded += 1,
                Ok(store::PutOutcome::ConditionFailed) => outcome.skipped += 1,
                Err(error) => {
                    tracing::warn!(
                        table_name = %self.table_name,
                        key = %serde_json::Value::Object(self.key_schema.key_of(&record)),
                        %error,
                        "record failed"
                    );
                    outcome.failed.push(FailedRecord {
                        record,
                        error: error.to_string(),
                    });
                }
            }
        }
        outcome
    }

    /// Waits the fixed pacing delay; call between consecutive chunks.
    pub async fn pace(&self) {
        if !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }
    }
}
