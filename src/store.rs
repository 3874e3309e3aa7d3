//! The store client the engine drives.
//!
//! [`StoreClient`] is the seam between the transfer engine and the table
//! backend. [`dynamo::DynamoStore`] talks to Amazon DynamoDB;
//! [`memory::MemoryStore`] keeps tables in process for tests and local runs.

/// DynamoDB implementation of [`StoreClient`].
pub mod dynamo;

/// In-memory implementation of [`StoreClient`].
pub mod memory;

use crate::{Result, common, read};

use async_trait::async_trait;
use aws_sdk_dynamodb::types;
use serde_json::Value;
use std::{collections, sync};

/// Opaque continuation token for a scan.
///
/// The cursor returned with one page must be passed back verbatim to obtain
/// the next one. An absent cursor means the scan is complete.
#[derive(Clone, Debug, PartialEq)]
pub struct Cursor(collections::HashMap<String, types::AttributeValue>);

impl Cursor {
    /// Wraps a last-evaluated key; an empty key yields no cursor.
    pub fn new(key: collections::HashMap<String, types::AttributeValue>) -> Option<Self> {
        (!key.is_empty()).then_some(Self(key))
    }

    /// The wrapped key, for handing back to the store.
    pub fn into_inner(self) -> collections::HashMap<String, types::AttributeValue> {
        self.0
    }
}

/// One round-trip of a scan.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
    /// Records returned by this page, in scan order.
    pub records: Vec<common::Record>,
    /// Continuation for the next page, `None` once the scan is exhausted.
    pub cursor: Option<Cursor>,
    /// Number of records matched by this page (after filtering).
    pub count: usize,
    /// Number of items evaluated by this page (before filtering).
    pub scanned_count: usize,
}

/// One round-trip of a count-only scan.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CountPage {
    /// Number of records matched by this page.
    pub count: usize,
    /// Number of items evaluated by this page.
    pub scanned_count: usize,
    /// Continuation for the next page, `None` once the scan is exhausted.
    pub cursor: Option<Cursor>,
}

/// Outcome of one bulk unconditional put.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BatchPutOutcome {
    /// Records the store accepted the call for but did not write.
    pub unprocessed: usize,
}

/// Outcome of one conditional put.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PutOutcome {
    /// The record was written.
    Written,
    /// An item with the same key already exists; nothing was written.
    ConditionFailed,
}

/// Operations the transfer engine needs from a table backend.
///
/// Implementations map their native failures onto [`crate::Error`]:
/// unreachable backends to `StoreUnavailable`, throughput rejections to
/// `Throttled`, everything else to `Store`.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Fetches one page of a scan, starting at `scan.exclusive_start_key`.
    async fn scan_page(&self, scan: read::scan::Scan<Value>) -> Result<Page>;

    /// Fetches one page of a count-only scan.
    async fn count_page(&self, scan: read::scan::Scan<Value>) -> Result<CountPage>;

    /// Unconditionally writes up to one batch ceiling of records.
    async fn batch_put(
        &self,
        table_name: &str,
        records: Vec<common::Record>,
    ) -> Result<BatchPutOutcome>;

    /// Writes `record` only if no item with its partition key exists.
    async fn conditional_put(
        &self,
        table_name: &str,
        record: common::Record,
        key_schema: &common::key::KeySchema,
    ) -> Result<PutOutcome>;

    /// The primary key layout of `table_name`.
    async fn key_schema(&self, table_name: &str) -> Result<common::key::KeySchema>;

    /// The region the client talks to, when it has one.
    fn region(&self) -> Option<String>;
}

#[async_trait]
impl<S: StoreClient + ?Sized> StoreClient for sync::Arc<S> {
    async fn scan_page(&self, scan: read::scan::Scan<Value>) -> Result<Page> {
        (**self).scan_page(scan).await
    }

    async fn count_page(&self, scan: read::scan::Scan<Value>) -> Result<CountPage> {
        (**self).count_page(scan).await
    }

    async fn batch_put(
        &self,
        table_name: &str,
        records: Vec<common::Record>,
    ) -> Result<BatchPutOutcome> {
        (**self).batch_put(table_name, records).await
    }

    async fn conditional_put(
        &self,
        table_name: &str,
        record: common::Record,
        key_schema: &common::key::KeySchema,
    ) -> Result<PutOutcome> {
        (**self).conditional_put(table_name, record, key_schema).await
    }

    async fn key_schema(&self, table_name: &str) -> Result<common::key::KeySchema> {
        (**self).key_schema(table_name).await
    }

    fn region(&self) -> Option<String> {
        (**self).region()
    }
}
