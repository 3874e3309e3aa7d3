use crate::{Error, Result, common};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::error::Category;

const SHAPES: &str =
    "expected an array of records, an object with `items` or an object with `itemsByType`";

/// The accepted import shapes, tried in declaration order.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ImportDocument {
    /// `[record, ...]`
    Bare(Vec<common::Record>),
    /// `{"items": [record, ...]}`, metadata ignored.
    Flat {
        /// Records in document order.
        items: Vec<common::Record>,
    },
    /// `{"itemsByType": {"<TYPE>": [record, ...]}}`, metadata ignored.
    Grouped {
        /// Records per entity type.
        #[serde(rename = "itemsByType")]
        items_by_type: IndexMap<String, Vec<common::Record>>,
    },
}

impl ImportDocument {
    /// Name of the shape, for logs.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Bare(_) => "bare",
            Self::Flat { .. } => "flat",
            Self::Grouped { .. } => "grouped",
        }
    }

    /// The records as one sequence; grouped documents are flattened type by type.
    pub fn into_records(self) -> Vec<common::Record> {
        match self {
            Self::Bare(items) | Self::Flat { items } => items,
            Self::Grouped { items_by_type } => items_by_type.into_values().flatten().collect(),
        }
    }
}

/// Decodes import documents.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImportReader;

impl ImportReader {
    /// Decodes `bytes` into one of the accepted shapes.
    ///
    /// # Errors
    ///
    /// `Format` when the bytes are not JSON or match none of the shapes.
    pub fn decode(bytes: &[u8]) -> Result<ImportDocument> {
        serde_json::from_slice(bytes).map_err(|error| match error.classify() {
            Category::Data => Error::Format(SHAPES.to_string()),
            Category::Io | Category::Syntax | Category::Eof => {
                Error::Format(format!("not a JSON document: {error}"))
            }
        })
    }

    /// Decodes `bytes` into the ordered sequence of records to import.
    pub fn parse(bytes: &[u8]) -> Result<Vec<common::Record>> {
        let document = Self::decode(bytes)?;
        tracing::debug!(shape = document.shape(), "decoded import document");
        Ok(document.into_records())
    }
}
