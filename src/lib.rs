#![deny(missing_docs)]

//! # DynamoDB Transfer
//!
//! Bulk export and import of Amazon DynamoDB tables to and from portable JSON
//! documents.
//!
//! ## Overview
//!
//! - **Export** scans a whole table page by page and writes one document,
//!   either flat (`{metadata, items}`) or grouped by entity type
//!   (`{metadata, itemsByType}`). Any scan failure aborts the export before a
//!   file is written.
//! - **Import** reads a document in any of the accepted shapes and writes it
//!   back in chunks no larger than the store's batch ceiling, either
//!   overwriting existing items or inserting only missing ones. Failed chunks
//!   and records are reported and the import carries on.
//! - **Count** runs the same pagination loop requesting counts only.
//!
//! ## Quick Example
//!
//! ```no_run
//! use dynamodb_transfer::config::TransferConfig;
//! use dynamodb_transfer::store::dynamo::DynamoStore;
//! use dynamodb_transfer::transfer::{ExportOptions, ImportOptions, Transfer};
//!
//! # async fn example() -> dynamodb_transfer::Result<()> {
//! let config = TransferConfig::from_env();
//! let store = DynamoStore::connect(config.region.clone(), config.endpoint_url.clone()).await;
//! let mut transfer = Transfer::new(store, config);
//!
//! let summary = transfer.export_grouped("users", &ExportOptions::default()).await?;
//! let result = transfer
//!     .import(
//!         "users-copy",
//!         &summary.path,
//!         &ImportOptions {
//!             overwrite: false,
//!             ..Default::default()
//!         },
//!     )
//!     .await?;
//! println!("imported {}, skipped {}", result.imported, result.skipped);
//! transfer.close();
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`mod@transfer`] - The export, import and count operations
//! - [`mod@store`] - The store client seam, with DynamoDB and in-memory implementations
//! - [`mod@read`] - Scan requests and pagination
//! - [`mod@write`] - Put requests and chunk writing
//! - [`mod@document`] - The export and import document formats
//! - [`mod@classify`] - Entity classification for grouped exports

/// Expiring cache with an injected clock.
pub mod cache;

/// Entity classification for grouped exports.
pub mod classify;

/// Time sources.
pub mod clock;

/// Common utilities for records, keys and conditions.
pub mod common;

/// Runtime configuration.
pub mod config;

/// Export and import documents.
pub mod document;

/// Error types.
pub mod error;

/// Document storage.
pub mod fs;

/// Scan requests and pagination.
///
/// This module provides:
/// - A single-page scan request with raw or structured filters
/// - A pager that walks a table page by page, or counts it
pub mod read;

/// Table backends.
pub mod store;

/// Export, import and count orchestration.
pub mod transfer;

/// Write requests and chunk writing.
///
/// This module provides:
/// - Conditional and unconditional single-item puts
/// - Single-table batch puts
/// - A writer that persists chunks in overwrite or insert-only mode
pub mod write;

pub use error::{Error, Result};
