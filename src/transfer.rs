//! Export, import and count, driven against one store client.
//!
//! Export is fail-fast: any scan error aborts the operation and nothing is
//! written. Import is best-effort: a failed chunk or record is recorded in the
//! [`ImportResult`] and the next chunk is attempted.

use crate::{
    Error, Result, cache, classify, clock, common, config,
    document::{export, import},
    fs, read, store,
    write::batch_writer,
};

use chrono::TimeDelta;
use indexmap::IndexMap;
use std::{fmt, path, sync};

/// Options of [`Transfer::export`] and [`Transfer::export_grouped`].
#[derive(Clone, Debug, PartialEq)]
pub struct ExportOptions {
    /// Filter, consistency and page size of the scan.
    pub scan: read::pager::ScanOptions,
    /// Exact destination; when `None` a name is derived from the table and time.
    pub output_file: Option<path::PathBuf>,
    /// Directory for derived names; the configured one when `None`.
    pub output_dir: Option<path::PathBuf>,
    /// Whether the document carries a `metadata` section.
    pub include_metadata: bool,
    /// Output layout.
    pub style: export::Style,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            scan: read::pager::ScanOptions::default(),
            output_file: None,
            output_dir: None,
            include_metadata: true,
            style: export::Style::default(),
        }
    }
}

/// What an export produced.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportSummary {
    /// The written document.
    pub path: path::PathBuf,
    /// Records exported.
    pub item_count: usize,
    /// Items evaluated by the scan.
    pub scanned_count: usize,
    /// Scan round-trips.
    pub pages: usize,
    /// Records per entity type; empty for flat exports.
    pub type_counts: IndexMap<String, usize>,
}

/// Options of [`Transfer::import`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImportOptions {
    /// Plan the import without writing anything.
    pub dry_run: bool,
    /// Records per chunk, lowered to the configured ceiling.
    pub batch_size: usize,
    /// Replace existing items (`true`) or skip records whose key exists (`false`).
    pub overwrite: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            batch_size: batch_writer::BATCH_WRITE_CEILING,
            overwrite: true,
        }
    }
}

/// A record that was not imported.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportFailure {
    /// Primary key attributes of the record.
    pub key: common::Record,
    /// Why it failed.
    pub reason: String,
}

/// What a dry run would have done.
#[derive(Clone, Debug, PartialEq)]
pub struct DryRunPlan {
    /// Chunks that would be written.
    pub chunks: usize,
    /// Records per chunk.
    pub chunk_size: usize,
    /// The first record of the document.
    pub sample: Option<common::Record>,
}

/// Counts of an import.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportResult {
    /// Records in the document.
    pub total: usize,
    /// Records written.
    pub imported: usize,
    /// Records that failed.
    pub failed: usize,
    /// Records not written: already present in insert-only mode, or all of them in a dry run.
    pub skipped: usize,
    /// Every failed record, in document order.
    pub failures: Vec<ImportFailure>,
    /// Set for dry runs only.
    pub plan: Option<DryRunPlan>,
}

/// Runs transfers against one store client.
///
/// The transfer owns its client until [`Transfer::close`] (or drop); after
/// that every operation fails with [`Error::Closed`].
///
/// ```rust
/// use dynamodb_transfer::common::key::KeySchema;
/// use dynamodb_transfer::config::TransferConfig;
/// use dynamodb_transfer::fs::MemoryFs;
/// use dynamodb_transfer::store::memory::MemoryStore;
/// use dynamodb_transfer::transfer::{ExportOptions, Transfer};
/// use std::sync::Arc;
///
/// # async fn example() -> dynamodb_transfer::Result<()> {
/// let store = MemoryStore::new();
/// store.create_table("users", KeySchema::new("PK"));
/// let mut transfer = Transfer::new(store, TransferConfig::default())
///     .with_fs(Arc::new(MemoryFs::new()));
/// let summary = transfer.export("users", &ExportOptions::default()).await?;
/// assert_eq!(summary.item_count, 0);
/// transfer.close();
/// # Ok(())
/// # }
/// ```
pub struct Transfer<S> {
    clock: sync::Arc<dyn clock::Clock>,
    config: config::TransferConfig,
    fs: sync::Arc<dyn fs::FileSystem>,
    key_schemas: cache::TtlCache<String, common::key::KeySchema>,
    store: Option<S>,
}

impl<S> fmt::Debug for Transfer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transfer")
            .field("config", &self.config)
            .field("key_schemas", &self.key_schemas)
            .field("closed", &self.store.is_none())
            .finish()
    }
}

fn key_schema_cache(
    clock: &sync::Arc<dyn clock::Clock>,
    config: &config::TransferConfig,
) -> cache::TtlCache<String, common::key::KeySchema> {
    let ttl = TimeDelta::from_std(config.key_schema_ttl).unwrap_or(TimeDelta::MAX);
    cache::TtlCache::new(clock.clone(), ttl)
}

impl<S: store::StoreClient> Transfer<S> {
    /// Transfer over `store`, using the local filesystem and the system clock.
    pub fn new(store: S, config: config::TransferConfig) -> Self {
        let clock: sync::Arc<dyn clock::Clock> = sync::Arc::new(clock::SystemClock);
        Self {
            key_schemas: key_schema_cache(&clock, &config),
            clock,
            config,
            fs: sync::Arc::new(fs::LocalFs),
            store: Some(store),
        }
    }

    /// Replaces the filesystem documents are read from and written to.
    pub fn with_fs(mut self, fs: sync::Arc<dyn fs::FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    /// Replaces the clock used for timestamps and key-schema expiry.
    pub fn with_clock(mut self, clock: sync::Arc<dyn clock::Clock>) -> Self {
        self.key_schemas = key_schema_cache(&clock, &self.config);
        self.clock = clock;
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &config::TransferConfig {
        &self.config
    }

    /// Whether [`Transfer::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.store.is_none()
    }

    /// Releases the store client; later calls are no-ops.
    pub fn close(&mut self) {
        if self.store.take().is_some() {
            tracing::debug!("released store client");
        }
    }

    fn store(&self) -> Result<&S> {
        self.store.as_ref().ok_or(Error::Closed)
    }

    /// The key schema of `table_name`, described at most once per TTL.
    pub async fn key_schema(&self, table_name: &str) -> Result<common::key::KeySchema> {
        let store = self.store()?;
        let key = table_name.to_string();
        if let Some(key_schema) = self.key_schemas.get(&key) {
            return Ok(key_schema);
        }
        let key_schema = store.key_schema(table_name).await?;
        self.key_schemas.insert(key, key_schema.clone());
        Ok(key_schema)
    }

    /// Scans the whole table into a flat document.
    ///
    /// # Errors
    ///
    /// Any scan or write error; no file is written when the scan fails.
    #[tracing::instrument(name = "dynamodb_transfer.export", skip(self, options), err)]
    pub async fn export(&self, table_name: &str, options: &ExportOptions) -> Result<ExportSummary> {
        self.run_export(table_name, options, false).await
    }

    /// Scans the whole table into a document grouped by entity type.
    ///
    /// # Errors
    ///
    /// Any scan or write error; no file is written when the scan fails.
    #[tracing::instrument(name = "dynamodb_transfer.export_grouped", skip(self, options), err)]
    pub async fn export_grouped(
        &self,
        table_name: &str,
        options: &ExportOptions,
    ) -> Result<ExportSummary> {
        self.run_export(table_name, options, true).await
    }

    async fn classifier(&self, table_name: &str) -> classify::EntityClassifier {
        match self.key_schema(table_name).await {
            Ok(key_schema) => classify::EntityClassifier::new(&key_schema),
            Err(error) => {
                tracing::warn!(
                    table_name,
                    %error,
                    "key schema unavailable, classifying by PK and SK"
                );
                classify::EntityClassifier::default()
            }
        }
    }

    async fn run_export(
        &self,
        table_name: &str,
        options: &ExportOptions,
        grouped: bool,
    ) -> Result<ExportSummary> {
        let store = self.store()?;
        tracing::info!(table_name, grouped, "export started");
        let classifier = if grouped {
            Some(self.classifier(table_name).await)
        } else {
            None
        };

        let mut items = Vec::new();
        let mut items_by_type: IndexMap<String, Vec<common::Record>> = IndexMap::new();
        let mut pager = read::pager::ScanPager::open(store, table_name, options.scan.clone());
        while let Some(page) = pager.next_page().await? {
            for record in page.records {
                match &classifier {
                    Some(classifier) => items_by_type
                        .entry(classifier.classify(&record))
                        .or_default()
                        .push(record),
                    None => items.push(record),
                }
            }
        }
        let items = if grouped {
            export::ExportItems::Grouped(items_by_type)
        } else {
            export::ExportItems::Flat(items)
        };

        let exported_at = self.clock.now();
        let source = export::SourceInfo {
            source_name: table_name.to_string(),
            exported_at,
            scanned_count: pager.scanned_count(),
            source_region: store.region(),
            filter_expression: options.scan.filter.expression.clone(),
        };
        let writer = export::ExportWriter::default()
            .with_metadata(options.include_metadata)
            .with_style(options.style);
        let document = writer.build(items, source);
        let bytes = writer.serialize(&document)?;
        let path = match &options.output_file {
            Some(output_file) => output_file.clone(),
            None => options
                .output_dir
                .as_ref()
                .unwrap_or(&self.config.output_dir)
                .join(export::ExportWriter::default_file_name(
                    table_name,
                    grouped,
                    exported_at,
                )),
        };
        self.fs.write(&path, &bytes).await?;

        let summary = ExportSummary {
            path,
            item_count: document.item_count(),
            scanned_count: pager.scanned_count(),
            pages: pager.pages(),
            type_counts: document.type_counts(),
        };
        tracing::info!(
            table_name,
            path = %summary.path.display(),
            items = summary.item_count,
            scanned = summary.scanned_count,
            pages = summary.pages,
            "export finished"
        );
        Ok(summary)
    }

    /// Counts the records matching `options` without fetching them.
    #[tracing::instrument(name = "dynamodb_transfer.count", skip(self, options), err)]
    pub async fn count(
        &self,
        table_name: &str,
        options: &read::pager::ScanOptions,
    ) -> Result<read::pager::CountSummary> {
        let store = self.store()?;
        read::pager::ScanPager::open(store, table_name, options.clone())
            .count_only()
            .await
    }

    /// Loads the document at `path` into `table_name`.
    ///
    /// # Errors
    ///
    /// Fatal conditions only: the transfer is closed, `batch_size` is zero,
    /// the file cannot be read, the document has an unknown shape, or the
    /// table cannot be described. Failed chunks and records are reported in
    /// the result.
    #[tracing::instrument(name = "dynamodb_transfer.import", skip(self, options), err)]
    pub async fn import(
        &self,
        table_name: &str,
        path: &path::Path,
        options: &ImportOptions,
    ) -> Result<ImportResult> {
        let store = self.store()?;
        if options.batch_size == 0 {
            return Err(Error::InvalidArgument(
                "batch size must be at least 1".to_string(),
            ));
        }
        let bytes = self.fs.read(path).await?;
        let records = import::ImportReader::parse(&bytes)?;
        let total = records.len();
        let chunk_size = options
            .batch_size
            .min(self.config.batch_ceiling.clamp(1, batch_writer::BATCH_WRITE_CEILING));
        tracing::info!(
            table_name,
            records = total,
            chunk_size,
            dry_run = options.dry_run,
            overwrite = options.overwrite,
            "import started"
        );

        if options.dry_run {
            let plan = DryRunPlan {
                chunks: total.div_ceil(chunk_size),
                chunk_size,
                sample: records.into_iter().next(),
            };
            tracing::info!(table_name, chunks = plan.chunks, "dry run, nothing written");
            return Ok(ImportResult {
                total,
                skipped: total,
                plan: Some(plan),
                ..Default::default()
            });
        }

        let key_schema = self.key_schema(table_name).await?;
        let writer = batch_writer::BatchWriter::new(store, table_name, key_schema.clone())
            .with_ceiling(chunk_size)
            .with_pacing(self.config.pacing);
        let mode = batch_writer::WriteMode::from_overwrite(options.overwrite);

        let mut result = ImportResult {
            total,
            ..Default::default()
        };
        let mut remaining = records.into_iter().peekable();
        let mut chunk_index = 0;
        while remaining.peek().is_some() {
            if chunk_index > 0 {
                writer.pace().await;
            }
            let chunk: Vec<common::Record> = remaining.by_ref().take(chunk_size).collect();
            let outcome = writer.write_batch(chunk, mode).await?;
            result.imported += outcome.succeeded;
            result.skipped += outcome.skipped;
            result.failed += outcome.failed.len();
            result
                .failures
                .extend(outcome.failed.into_iter().map(|failed| ImportFailure {
                    key: key_schema.key_of(&failed.record),
                    reason: failed.error,
                }));
            chunk_index += 1;
        }

        tracing::info!(
            table_name,
            chunks = chunk_index,
            imported = result.imported,
            skipped = result.skipped,
            failed = result.failed,
            "import finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory;

    use chrono::DateTime;
    use serde_json::{Value, json};
    use std::time;

    struct Harness {
        clock: sync::Arc<clock::FixedClock>,
        fs: sync::Arc<fs::MemoryFs>,
        store: sync::Arc<memory::MemoryStore>,
        transfer: Transfer<sync::Arc<memory::MemoryStore>>,
    }

    fn harness(store: memory::MemoryStore) -> Harness {
        let clock = sync::Arc::new(clock::FixedClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        let fs = sync::Arc::new(fs::MemoryFs::new());
        let store = sync::Arc::new(store);
        let config = config::TransferConfig {
            pacing: time::Duration::ZERO,
            ..Default::default()
        };
        let transfer = Transfer::new(store.clone(), config)
            .with_fs(fs.clone())
            .with_clock(clock.clone());
        Harness {
            clock,
            fs,
            store,
            transfer,
        }
    }

    fn record(value: Value) -> common::Record {
        value.as_object().unwrap().clone()
    }

    fn records(count: usize) -> Vec<Value> {
        (0..count)
            .map(|index| json!({"PK": format!("USER#{index:03}"), "n": index}))
            .collect()
    }

    fn source_store(items: &[Value]) -> memory::MemoryStore {
        let store = memory::MemoryStore::new()
            .with_page_size(2)
            .with_region("eu-west-1");
        store.create_table("source", common::key::KeySchema::new("PK"));
        store.create_table("target", common::key::KeySchema::new("PK"));
        for item in items {
            store.insert("source", record(item.clone())).unwrap();
        }
        store
    }

    fn document(harness: &Harness, path: &str) -> Value {
        serde_json::from_slice(&harness.fs.get(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_export_writes_flat_document() {
        let harness = harness(source_store(&records(5)));
        let summary = harness
            .transfer
            .export("source", &ExportOptions::default())
            .await
            .unwrap();
        assert_eq!(
            summary.path,
            path::PathBuf::from("exports/source-export-2023-11-14T22-13-20.json")
        );
        assert_eq!(summary.item_count, 5);
        assert_eq!(summary.scanned_count, 5);
        assert_eq!(summary.pages, 3);
        let document = document(&harness, "exports/source-export-2023-11-14T22-13-20.json");
        assert_eq!(document["items"], Value::Array(records(5)));
        assert_eq!(
            document["metadata"],
            json!({
                "sourceName": "source",
                "exportedAt": "2023-11-14T22:13:20Z",
                "scannedCount": 5,
                "sourceRegion": "eu-west-1",
                "itemCount": 5,
            })
        );
    }

    #[tokio::test]
    async fn test_export_to_explicit_file_without_metadata() {
        let harness = harness(source_store(&records(1)));
        let options = ExportOptions {
            output_file: Some(path::PathBuf::from("out/users.json")),
            include_metadata: false,
            style: export::Style::Compact,
            ..Default::default()
        };
        harness.transfer.export("source", &options).await.unwrap();
        assert_eq!(
            harness.fs.get("out/users.json").unwrap(),
            br#"{"items":[{"PK":"USER#000","n":0}]}"#
        );
    }

    #[tokio::test]
    async fn test_export_applies_structured_filter() {
        let harness = harness(source_store(&[
            json!({"PK": "USER#1", "status": "active"}),
            json!({"PK": "USER#2", "status": "inactive"}),
            json!({"PK": "USER#3", "status": "active"}),
        ]));
        let options = ExportOptions {
            scan: read::pager::ScanOptions {
                filter: read::scan::ScanFilter {
                    condition: Some(common::condition::ConditionMap::Leaves(
                        common::condition::LogicalOperator::And,
                        vec![common::condition::KeyCondition {
                            condition: common::condition::Condition::Compare(
                                common::condition::Comparator::Equal,
                                json!("active"),
                            ),
                            name: "status".to_string(),
                        }],
                    )),
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        };
        let summary = harness.transfer.export("source", &options).await.unwrap();
        assert_eq!(summary.item_count, 2);
        assert_eq!(summary.scanned_count, 3);
    }

    #[tokio::test]
    async fn test_export_fails_fast_without_writing() {
        let store = source_store(&records(5));
        store.fail_scans_after(1);
        let harness = harness(store);
        let error = harness
            .transfer
            .export("source", &ExportOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::StoreUnavailable(_)));
        assert!(harness.fs.paths().is_empty());
        assert_eq!(harness.store.call_counts().scans, 2);
    }

    #[tokio::test]
    async fn test_export_grouped_by_entity_type() {
        let harness = harness(source_store(&[
            json!({"PK": "USER#1"}),
            json!({"PK": "USER#2"}),
            json!({"PK": "ORDER#9"}),
        ]));
        let summary = harness
            .transfer
            .export_grouped("source", &ExportOptions::default())
            .await
            .unwrap();
        assert_eq!(
            summary.path,
            path::PathBuf::from("exports/source-grouped-export-2023-11-14T22-13-20.json")
        );
        assert_eq!(summary.item_count, 3);
        let document = document(&harness, summary.path.to_str().unwrap());
        assert_eq!(document["metadata"]["entityTypes"], json!(2));
        assert_eq!(document["metadata"]["totalItems"], json!(3));
        assert_eq!(
            document["itemsByType"],
            json!({
                "USER": [{"PK": "USER#1"}, {"PK": "USER#2"}],
                "ORDER": [{"PK": "ORDER#9"}],
            })
        );
        assert_eq!(summary.type_counts.get("USER"), Some(&2));
        assert_eq!(summary.type_counts.get("ORDER"), Some(&1));
    }

    #[tokio::test]
    async fn test_count_matches_scanned_items() {
        let harness = harness(source_store(&records(5)));
        let summary = harness
            .transfer
            .count("source", &read::pager::ScanOptions::default())
            .await
            .unwrap();
        assert_eq!(
            summary,
            read::pager::CountSummary {
                count: 5,
                scanned_count: 5,
                pages: 3,
            }
        );
        let export = harness
            .transfer
            .export("source", &ExportOptions::default())
            .await
            .unwrap();
        assert_eq!(export.scanned_count, summary.scanned_count);
    }

    async fn import_records(
        harness: &Harness,
        items: Vec<Value>,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        harness
            .fs
            .insert("import.json", serde_json::to_vec(&items).unwrap());
        harness
            .transfer
            .import("target", path::Path::new("import.json"), &options)
            .await
    }

    #[tokio::test]
    async fn test_import_splits_at_ceiling() {
        for (count, expected) in [(26, vec![25, 1]), (30, vec![25, 5]), (25, vec![25])] {
            let harness = harness(source_store(&[]));
            let result = import_records(&harness, records(count), ImportOptions::default())
                .await
                .unwrap();
            assert_eq!(harness.store.batch_sizes(), expected);
            assert_eq!(
                (result.imported, result.failed, result.skipped),
                (count, 0, 0)
            );
            assert_eq!(harness.store.len("target"), count);
        }
    }

    #[tokio::test]
    async fn test_import_honours_smaller_batch_size() {
        let harness = harness(source_store(&[]));
        let options = ImportOptions {
            batch_size: 10,
            ..Default::default()
        };
        import_records(&harness, records(25), options).await.unwrap();
        assert_eq!(harness.store.batch_sizes(), vec![10, 10, 5]);
    }

    #[tokio::test]
    async fn test_import_zero_batch_size_is_rejected() {
        let harness = harness(source_store(&[]));
        let options = ImportOptions {
            batch_size: 0,
            ..Default::default()
        };
        let error = import_records(&harness, records(3), options).await.unwrap_err();
        assert!(matches!(error, Error::InvalidArgument(_)));
        assert_eq!(harness.store.call_counts().writes(), 0);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let harness = harness(source_store(&[]));
        let options = ImportOptions {
            dry_run: true,
            ..Default::default()
        };
        let result = import_records(&harness, records(30), options).await.unwrap();
        assert_eq!(result.imported, 0);
        assert_eq!(result.skipped, 30);
        assert_eq!(
            result.plan,
            Some(DryRunPlan {
                chunks: 2,
                chunk_size: 25,
                sample: Some(record(records(1).remove(0))),
            })
        );
        assert_eq!(harness.store.call_counts().writes(), 0);
        assert_eq!(harness.store.call_counts().key_schemas, 0);
        assert_eq!(harness.store.len("target"), 0);
    }

    #[tokio::test]
    async fn test_insert_only_import_is_idempotent() {
        let harness = harness(source_store(&[]));
        let options = ImportOptions {
            overwrite: false,
            ..Default::default()
        };
        let first = import_records(&harness, records(7), options).await.unwrap();
        assert_eq!((first.imported, first.skipped, first.failed), (7, 0, 0));
        let second = import_records(&harness, records(7), options).await.unwrap();
        assert_eq!((second.imported, second.skipped, second.failed), (0, 7, 0));
        assert_eq!(harness.store.call_counts().batch_puts, 0);
        assert_eq!(harness.store.len("target"), 7);
    }

    #[tokio::test]
    async fn test_malformed_document_makes_no_writes() {
        let harness = harness(source_store(&[]));
        harness.fs.insert("bad.json", br#"{"records": []}"#.to_vec());
        let error = harness
            .transfer
            .import("target", path::Path::new("bad.json"), &ImportOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Format(_)));
        assert_eq!(harness.store.call_counts().writes(), 0);
    }

    #[tokio::test]
    async fn test_missing_file_is_fatal() {
        let harness = harness(source_store(&[]));
        let error = harness
            .transfer
            .import("target", path::Path::new("missing.json"), &ImportOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Io { .. }));
    }

    #[tokio::test]
    async fn test_import_continues_after_failed_chunk() {
        let store = source_store(&[]);
        store.throttle_batch_put(0);
        let harness = harness(store);
        let result = import_records(&harness, records(30), ImportOptions::default())
            .await
            .unwrap();
        assert_eq!((result.imported, result.failed, result.skipped), (5, 25, 0));
        assert_eq!(result.failures.len(), 25);
        assert_eq!(result.failures[0].key, record(json!({"PK": "USER#000"})));
        assert!(result.failures[0].reason.starts_with("request throttled"));
        assert_eq!(harness.store.batch_sizes(), vec![25, 5]);
    }

    #[tokio::test]
    async fn test_insert_only_isolates_record_failures() {
        let store = source_store(&[]);
        store.reject_partition_key("USER#001");
        let harness = harness(store);
        let options = ImportOptions {
            overwrite: false,
            ..Default::default()
        };
        let result = import_records(&harness, records(3), options).await.unwrap();
        assert_eq!((result.imported, result.failed), (2, 1));
        assert_eq!(result.failures[0].key, record(json!({"PK": "USER#001"})));
    }

    #[tokio::test]
    async fn test_unknown_table_is_fatal() {
        let harness = harness(source_store(&[]));
        harness
            .fs
            .insert("import.json", serde_json::to_vec(&records(1)).unwrap());
        let error = harness
            .transfer
            .import("missing", path::Path::new("import.json"), &ImportOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Store(_)));
        assert_eq!(harness.store.call_counts().writes(), 0);
    }

    #[tokio::test]
    async fn test_key_schema_is_cached_until_ttl() {
        let harness = harness(source_store(&[]));
        import_records(&harness, records(1), ImportOptions::default())
            .await
            .unwrap();
        import_records(&harness, records(1), ImportOptions::default())
            .await
            .unwrap();
        assert_eq!(harness.store.call_counts().key_schemas, 1);
        harness.clock.advance(TimeDelta::seconds(301));
        import_records(&harness, records(1), ImportOptions::default())
            .await
            .unwrap();
        assert_eq!(harness.store.call_counts().key_schemas, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_import_paces_between_chunks() {
        let store = sync::Arc::new(source_store(&[]));
        let fs = sync::Arc::new(fs::MemoryFs::new());
        fs.insert("import.json", serde_json::to_vec(&records(60)).unwrap());
        let transfer = Transfer::new(store.clone(), config::TransferConfig::default())
            .with_fs(fs);
        let start = tokio::time::Instant::now();
        transfer
            .import("target", path::Path::new("import.json"), &ImportOptions::default())
            .await
            .unwrap();
        assert_eq!(store.batch_sizes(), vec![25, 25, 10]);
        assert!(start.elapsed() >= time::Duration::from_millis(200));
        assert!(start.elapsed() < time::Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_round_trip() {
        let items = vec![
            json!({"PK": "USER#1", "name": "Ada", "tags": ["a", "b"], "age": 36}),
            json!({"PK": "ORDER#2", "total": 9.5, "paid": true, "meta": {"lines": 3}}),
            json!({"PK": "legacy", "id": "customer-7", "note": null}),
        ];
        let harness = harness(source_store(&items));
        for grouped in [false, true] {
            let options = ExportOptions::default();
            let summary = if grouped {
                harness.transfer.export_grouped("source", &options).await
            } else {
                harness.transfer.export("source", &options).await
            }
            .unwrap();
            harness.store.create_table("target", common::key::KeySchema::new("PK"));
            let result = harness
                .transfer
                .import("target", &summary.path, &ImportOptions::default())
                .await
                .unwrap();
            assert_eq!(result.imported, 3);
            assert_eq!(harness.store.items("target"), harness.store.items("source"));
        }
    }

    #[tokio::test]
    async fn test_closed_transfer_rejects_operations() {
        let mut harness = harness(source_store(&records(1)));
        harness.transfer.close();
        harness.transfer.close();
        assert!(harness.transfer.is_closed());
        let error = harness
            .transfer
            .export("source", &ExportOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Closed));
        let error = harness
            .transfer
            .count("source", &read::pager::ScanOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Closed));
        let error = import_records(&harness, records(1), ImportOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Closed));
        assert_eq!(harness.store.call_counts(), memory::CallCounts::default());
    }
}
