use crate::{Error, Result, common, read, store};

use async_trait::async_trait;
use aws_sdk_dynamodb::types;
use serde_dynamo::{from_item, to_item};
use serde_json::Value;
use std::{collections, ops, sync};

const DEFAULT_PAGE_SIZE: usize = 100;
const BATCH_WRITE_LIMIT: usize = 25;

/// Calls received by a [`MemoryStore`], per operation.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CallCounts {
    /// `scan_page` calls.
    pub scans: usize,
    /// `count_page` calls.
    pub counts: usize,
    /// `batch_put` calls.
    pub batch_puts: usize,
    /// `conditional_put` calls.
    pub conditional_puts: usize,
    /// `key_schema` calls.
    pub key_schemas: usize,
}

impl CallCounts {
    /// Calls that reach the write path.
    pub fn writes(&self) -> usize {
        self.batch_puts + self.conditional_puts
    }
}

#[derive(Debug)]
struct Table {
    items: collections::BTreeMap<String, common::Record>,
    key_schema: common::key::KeySchema,
}

impl Table {
    /// Items are ordered by the JSON text of their key values.
    fn position(&self, record: &common::Record) -> Result<String> {
        let mut key = Vec::with_capacity(2);
        for name in self.key_schema.names() {
            match record.get(name) {
                Some(value) => key.push(value.clone()),
                None => {
                    return Err(Error::Store(format!(
                        "ValidationException: missing key attribute {name}"
                    )));
                }
            }
        }
        Ok(Value::Array(key).to_string())
    }
}

#[derive(Debug, Default)]
struct Faults {
    rejected_partition_keys: Vec<Value>,
    scans_after: Option<usize>,
    throttled_batch_puts: collections::HashSet<usize>,
    unprocessed_batch_puts: collections::HashMap<usize, usize>,
}

#[derive(Debug, Default)]
struct State {
    batch_sizes: Vec<usize>,
    calls: CallCounts,
    faults: Faults,
    tables: collections::HashMap<String, Table>,
}

impl State {
    fn table(&self, table_name: &str) -> Result<&Table> {
        self.tables
            .get(table_name)
            .ok_or_else(|| not_found(table_name))
    }

    fn table_mut(&mut self, table_name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(table_name)
            .ok_or_else(|| not_found(table_name))
    }

    fn is_rejected(&self, table: &Table, record: &common::Record) -> bool {
        record
            .get(&table.key_schema.partition_key)
            .is_some_and(|value| self.faults.rejected_partition_keys.contains(value))
    }

    fn evaluate(
        &self,
        scan: read::scan::Scan<Value>,
        page_size: usize,
    ) -> Result<(Vec<common::Record>, usize, Option<store::Cursor>)> {
        if scan.filter.expression.is_some() {
            return Err(Error::InvalidArgument(
                "raw filter expressions are not evaluated by the in-memory store".to_string(),
            ));
        }
        let table = self.table(&scan.table_name)?;
        let start = match scan.exclusive_start_key {
            Some(cursor) => {
                let key: common::Record = from_item(cursor.into_inner())?;
                ops::Bound::Excluded(table.position(&key)?)
            }
            None => ops::Bound::Unbounded,
        };
        let page_len = scan
            .limit
            .and_then(|limit| usize::try_from(limit).ok())
            .map_or(page_size, |limit| limit.clamp(1, page_size));
        let mut remaining = table.items.range((start, ops::Bound::Unbounded));
        let evaluated: Vec<&common::Record> = remaining
            .by_ref()
            .take(page_len)
            .map(|(_, record)| record)
            .collect();
        let cursor = match (evaluated.last(), remaining.next()) {
            (Some(last), Some(_)) => {
                let key: collections::HashMap<String, types::AttributeValue> =
                    to_item(table.key_schema.key_of(last))?;
                store::Cursor::new(key)
            }
            _ => None,
        };
        let scanned_count = evaluated.len();
        let records = evaluated
            .into_iter()
            .filter(|record| {
                scan.filter
                    .condition
                    .as_ref()
                    .is_none_or(|condition| condition.matches(record))
            })
            .cloned()
            .collect();
        Ok((records, scanned_count, cursor))
    }
}

fn not_found(table_name: &str) -> Error {
    Error::Store(format!(
        "ResourceNotFoundException: table {table_name} does not exist"
    ))
}

/// Tables kept in process, ordered by primary key.
///
/// Useful for tests and local experiments. Every call is counted, and faults
/// can be injected to exercise the engine's failure paths. Raw filter
/// expressions are rejected; structured conditions are evaluated.
///
/// ```rust
/// use dynamodb_transfer::common::key::KeySchema;
/// use dynamodb_transfer::store::memory::MemoryStore;
///
/// let store = MemoryStore::new().with_page_size(10);
/// store.create_table("users", KeySchema::new("PK"));
/// let record = serde_json::json!({"PK": "USER#1"}).as_object().unwrap().clone();
/// store.insert("users", record).unwrap();
/// assert_eq!(store.len("users"), 1);
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    page_size: usize,
    region: Option<String>,
    state: sync::Mutex<State>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            region: None,
            state: sync::Mutex::new(State::default()),
        }
    }

    /// Sets how many items a scan page evaluates at most.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Sets the region reported by [`store::StoreClient::region`].
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    fn state(&self) -> sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(sync::PoisonError::into_inner)
    }

    /// Creates (or empties) a table.
    pub fn create_table(&self, table_name: impl Into<String>, key_schema: common::key::KeySchema) {
        self.state().tables.insert(
            table_name.into(),
            Table {
                items: collections::BTreeMap::new(),
                key_schema,
            },
        );
    }

    /// Writes a record directly, bypassing call counting and faults.
    pub fn insert(&self, table_name: &str, record: common::Record) -> Result<()> {
        let mut state = self.state();
        let table = state.table_mut(table_name)?;
        let position = table.position(&record)?;
        table.items.insert(position, record);
        Ok(())
    }

    /// All records of a table in key order; empty if the table does not exist.
    pub fn items(&self, table_name: &str) -> Vec<common::Record> {
        self.state()
            .tables
            .get(table_name)
            .map(|table| table.items.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of records in a table.
    pub fn len(&self, table_name: &str) -> usize {
        self.state()
            .tables
            .get(table_name)
            .map_or(0, |table| table.items.len())
    }

    /// Calls received so far.
    pub fn call_counts(&self) -> CallCounts {
        self.state().calls
    }

    /// Number of records handed to each `batch_put` call, in call order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.state().batch_sizes.clone()
    }

    /// Makes every scan or count page after the first `pages` fail as unavailable.
    pub fn fail_scans_after(&self, pages: usize) {
        self.state().faults.scans_after = Some(pages);
    }

    /// Makes the `batch_put` call with this zero-based index fail as throttled.
    pub fn throttle_batch_put(&self, call_index: usize) {
        self.state().faults.throttled_batch_puts.insert(call_index);
    }

    /// Makes the `batch_put` call with this zero-based index leave its last
    /// `unprocessed` records unwritten.
    pub fn leave_unprocessed(&self, call_index: usize, unprocessed: usize) {
        self.state()
            .faults
            .unprocessed_batch_puts
            .insert(call_index, unprocessed);
    }

    /// Makes every write of a record with this partition key value fail.
    pub fn reject_partition_key(&self, value: impl Into<Value>) {
        self.state()
            .faults
            .rejected_partition_keys
            .push(value.into());
    }

    fn check_scan_fault(state: &State) -> Result<()> {
        let pages = state.calls.scans + state.calls.counts;
        match state.faults.scans_after {
            Some(limit) if pages > limit => Err(Error::StoreUnavailable(
                "injected fault: connection reset".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl store::StoreClient for MemoryStore {
    async fn scan_page(&self, scan: read::scan::Scan<Value>) -> Result<store::Page> {
        let mut state = self.state();
        state.calls.scans += 1;
        Self::check_scan_fault(&state)?;
        let (records, scanned_count, cursor) = state.evaluate(scan, self.page_size)?;
        Ok(store::Page {
            count: records.len(),
            records,
            cursor,
            scanned_count,
        })
    }

    async fn count_page(&self, scan: read::scan::Scan<Value>) -> Result<store::CountPage> {
        let mut state = self.state();
        state.calls.counts += 1;
        Self::check_scan_fault(&state)?;
        let (records, scanned_count, cursor) = state.evaluate(scan, self.page_size)?;
        Ok(store::CountPage {
            count: records.len(),
            scanned_count,
            cursor,
        })
    }

    async fn batch_put(
        &self,
        table_name: &str,
        records: Vec<common::Record>,
    ) -> Result<store::BatchPutOutcome> {
        let mut state = self.state();
        let call_index = state.calls.batch_puts;
        state.calls.batch_puts += 1;
        state.batch_sizes.push(records.len());
        if records.len() > BATCH_WRITE_LIMIT {
            return Err(Error::Store(format!(
                "ValidationException: {} items exceed the batch limit of {BATCH_WRITE_LIMIT}",
                records.len()
            )));
        }
        if state.faults.throttled_batch_puts.contains(&call_index) {
            return Err(Error::Throttled(
                "injected fault: ProvisionedThroughputExceededException".to_string(),
            ));
        }
        let unprocessed = state
            .faults
            .unprocessed_batch_puts
            .get(&call_index)
            .copied()
            .unwrap_or(0)
            .min(records.len());
        let table = state.table(table_name)?;
        let mut positioned = Vec::with_capacity(records.len());
        for record in records {
            if state.is_rejected(table, &record) {
                return Err(Error::Store(
                    "injected fault: record rejected".to_string(),
                ));
            }
            positioned.push((table.position(&record)?, record));
        }
        positioned.truncate(positioned.len() - unprocessed);
        state.table_mut(table_name)?.items.extend(positioned);
        Ok(store::BatchPutOutcome { unprocessed })
    }

    async fn conditional_put(
        &self,
        table_name: &str,
        record: common::Record,
        key_schema: &common::key::KeySchema,
    ) -> Result<store::PutOutcome> {
        let mut state = self.state();
        state.calls.conditional_puts += 1;
        let table = state.table(table_name)?;
        if table.key_schema.partition_key != key_schema.partition_key {
            return Err(Error::Store(format!(
                "ValidationException: {} is not the partition key of {table_name}",
                key_schema.partition_key
            )));
        }
        if state.is_rejected(table, &record) {
            return Err(Error::Store("injected fault: record rejected".to_string()));
        }
        let position = table.position(&record)?;
        let table = state.table_mut(table_name)?;
        if table.items.contains_key(&position) {
            return Ok(store::PutOutcome::ConditionFailed);
        }
        table.items.insert(position, record);
        Ok(store::PutOutcome::Written)
    }

    async fn key_schema(&self, table_name: &str) -> Result<common::key::KeySchema> {
        let mut state = self.state();
        state.calls.key_schemas += 1;
        Ok(state.table(table_name)?.key_schema.clone())
    }

    fn region(&self) -> Option<String> {
        self.region.clone()
    }
}
