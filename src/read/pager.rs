use crate::{Result, read, store};

use aws_sdk_dynamodb::types;
use serde_json::Value;

/// Options for a paginated scan.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanOptions {
    /// Whether to use strongly consistent reads.
    pub consistent_read: Option<bool>,
    /// Filter applied to scanned items.
    pub filter: read::scan::ScanFilter<Value>,
    /// Maximum number of items evaluated per page.
    pub limit: Option<i32>,
}

/// Totals of a count-only scan.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CountSummary {
    /// Records matching the filter.
    pub count: usize,
    /// Items evaluated.
    pub scanned_count: usize,
    /// Round-trips made.
    pub pages: usize,
}

/// Drives a table scan page by page, hiding the cursor protocol.
///
/// The sequence of pages is finite and cannot be restarted: once the store
/// reports no further cursor, or a page fetch fails, [`ScanPager::next_page`]
/// returns `Ok(None)`.
///
/// ```rust,no_run
/// use dynamodb_transfer::read::pager::{ScanOptions, ScanPager};
/// use dynamodb_transfer::store::StoreClient;
///
/// # async fn example(store: &impl StoreClient) -> dynamodb_transfer::Result<()> {
/// let mut pager = ScanPager::open(store, "users", ScanOptions::default());
/// while let Some(page) = pager.next_page().await? {
///     println!("{} records", page.records.len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ScanPager<'a, S: ?Sized> {
    cursor: Option<store::Cursor>,
    exhausted: bool,
    options: ScanOptions,
    pages: usize,
    scanned_count: usize,
    store: &'a S,
    table_name: String,
}

impl<'a, S: store::StoreClient + ?Sized> ScanPager<'a, S> {
    /// Prepares a scan of `table_name`; nothing is fetched until the first page is requested.
    pub fn open(store: &'a S, table_name: impl Into<String>, options: ScanOptions) -> Self {
        Self {
            cursor: None,
            exhausted: false,
            options,
            pages: 0,
            scanned_count: 0,
            store,
            table_name: table_name.into(),
        }
    }

    fn request(&mut self, select: Option<types::Select>) -> read::scan::Scan<Value> {
        read::scan::Scan {
            consistent_read: self.options.consistent_read,
            exclusive_start_key: self.cursor.take(),
            filter: self.options.filter.clone(),
            limit: self.options.limit,
            select,
            table_name: self.table_name.clone(),
        }
    }

    /// Fetches the next page, or `None` once the scan is complete.
    pub async fn next_page(&mut self) -> Result<Option<store::Page>> {
        if self.exhausted {
            return Ok(None);
        }
        let request = self.request(None);
        let page = match self.store.scan_page(request).await {
            Ok(page) => page,
            Err(error) => {
                self.exhausted = true;
                return Err(error);
            }
        };
        self.pages += 1;
        self.scanned_count += page.scanned_count;
        self.cursor = page.cursor.clone();
        self.exhausted = self.cursor.is_none();
        tracing::debug!(
            table_name = %self.table_name,
            page = self.pages,
            records = page.records.len(),
            scanned = page.scanned_count,
            more = !self.exhausted,
            "fetched scan page"
        );
        Ok(Some(page))
    }

    /// Runs the same pagination loop requesting counts only.
    ///
    /// Cost still scales with the table size: every item is evaluated.
    pub async fn count_only(mut self) -> Result<CountSummary> {
        let mut summary = CountSummary::default();
        while !self.exhausted {
            let request = self.request(Some(types::Select::Count));
            let page = match self.store.count_page(request).await {
                Ok(page) => page,
                Err(error) => {
                    self.exhausted = true;
                    return Err(error);
                }
            };
            summary.pages += 1;
            summary.count += page.count;
            summary.scanned_count += page.scanned_count;
            self.cursor = page.cursor;
            self.exhausted = self.cursor.is_none();
        }
        tracing::debug!(
            table_name = %self.table_name,
            pages = summary.pages,
            count = summary.count,
            scanned = summary.scanned_count,
            "counted table"
        );
        Ok(summary)
    }

    /// Pages fetched so far.
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Items evaluated so far.
    pub fn scanned_count(&self) -> usize {
        self.scanned_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, common, store::memory};

    use serde_json::json;

    fn seeded(records: usize, page_size: usize) -> memory::MemoryStore {
        let store = memory::MemoryStore::new().with_page_size(page_size);
        store.create_table("t", common::key::KeySchema::new("PK"));
        for index in 0..records {
            store
                .insert(
                    "t",
                    json!({"PK": format!("ITEM#{index:03}"), "n": index})
                        .as_object()
                        .unwrap()
                        .clone(),
                )
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_pages_cover_table_once() {
        let store = seeded(25, 10);
        let mut pager = ScanPager::open(&store, "t", ScanOptions::default());
        let mut sizes = Vec::new();
        let mut keys = Vec::new();
        while let Some(page) = pager.next_page().await.unwrap() {
            sizes.push(page.records.len());
            keys.extend(page.records.iter().map(|record| record["PK"].clone()));
        }
        assert_eq!(sizes, vec![10, 10, 5]);
        assert_eq!(keys.len(), 25);
        assert_eq!(keys.first(), Some(&json!("ITEM#000")));
        assert_eq!(keys.last(), Some(&json!("ITEM#024")));
        assert_eq!(pager.pages(), 3);
        assert_eq!(pager.scanned_count(), 25);
        assert_eq!(pager.next_page().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_limit_caps_page_size() {
        let store = seeded(7, 100);
        let options = ScanOptions {
            limit: Some(3),
            ..Default::default()
        };
        let mut pager = ScanPager::open(&store, "t", options);
        let mut sizes = Vec::new();
        while let Some(page) = pager.next_page().await.unwrap() {
            sizes.push(page.records.len());
        }
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn test_empty_table_yields_one_empty_page() {
        let store = seeded(0, 10);
        let mut pager = ScanPager::open(&store, "t", ScanOptions::default());
        let page = pager.next_page().await.unwrap().unwrap();
        assert!(page.records.is_empty());
        assert_eq!(page.cursor, None);
        assert_eq!(pager.next_page().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_count_matches_scanned_total() {
        let store = seeded(23, 5);
        let mut pager = ScanPager::open(&store, "t", ScanOptions::default());
        while pager.next_page().await.unwrap().is_some() {}
        let scanned = pager.scanned_count();
        let summary = ScanPager::open(&store, "t", ScanOptions::default())
            .count_only()
            .await
            .unwrap();
        assert_eq!(
            summary,
            CountSummary {
                count: 23,
                scanned_count: scanned,
                pages: 5,
            }
        );
        assert_eq!(store.call_counts().scans, 5);
        assert_eq!(store.call_counts().counts, 5);
    }

    #[tokio::test]
    async fn test_failure_ends_the_scan() {
        let store = seeded(30, 10);
        store.fail_scans_after(1);
        let mut pager = ScanPager::open(&store, "t", ScanOptions::default());
        assert!(pager.next_page().await.unwrap().is_some());
        let error = pager.next_page().await.unwrap_err();
        assert!(matches!(error, Error::StoreUnavailable(_)));
        assert_eq!(pager.next_page().await.unwrap(), None);
    }
}
