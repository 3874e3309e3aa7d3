//! Read operations for retrieving data from DynamoDB tables.
//!
//! This module provides:
//! - Single-page scans with raw or structured filters
//! - Pagination over a whole table, with a count-only variant

/// Pagination over a whole table.
pub mod pager;

/// Scan operation for retrieving one page of a table.
pub mod scan;
