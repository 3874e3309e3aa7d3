//! Write operations for loading data into DynamoDB tables.
//!
//! This module provides:
//! - Putting single items, optionally only when the key is new
//! - Batch putting up to the store's ceiling in one call
//! - Writing chunks of records in overwrite or insert-only mode

/// Batch write item operation for putting many items in one call.
pub mod batch_write_item;

/// Chunk writer with overwrite and insert-only modes.
pub mod batch_writer;

/// Common utilities and types for write operations.
pub mod common;

/// Put item operation for creating or replacing items.
pub mod put_item;
