//! The portable JSON document a table is exported to and imported from.
//!
//! Two shapes are written: a flat `{metadata, items}` document and a grouped
//! `{metadata, itemsByType}` document. Import additionally accepts a bare
//! array of records.

/// Building and serializing export documents.
pub mod export;

/// Decoding import documents.
pub mod import;
