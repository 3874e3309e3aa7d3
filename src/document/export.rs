use crate::{Result, common};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

/// Where and when an export was taken.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    /// The exported table.
    pub source_name: String,
    /// When the scan finished.
    pub exported_at: DateTime<Utc>,
    /// Items evaluated by the scan, before filtering.
    pub scanned_count: usize,
    /// Region of the store client, if known.
    pub source_region: Option<String>,
    /// The raw filter expression the scan was restricted by.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<String>,
}

/// Metadata of a flat export.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatMetadata {
    /// Shared source information.
    #[serde(flatten)]
    pub source: SourceInfo,
    /// Number of exported records.
    pub item_count: usize,
}

/// Metadata of a grouped export.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedMetadata {
    /// Shared source information.
    #[serde(flatten)]
    pub source: SourceInfo,
    /// Number of exported records across all types.
    pub total_items: usize,
    /// Number of distinct entity types.
    pub entity_types: usize,
    /// Records per entity type, in order of first appearance.
    pub type_counts: IndexMap<String, usize>,
}

/// `{metadata?, items}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FlatDocument {
    /// Omitted when metadata is disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FlatMetadata>,
    /// Records in scan order.
    pub items: Vec<common::Record>,
}

/// `{metadata?, itemsByType}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupedDocument {
    /// Omitted when metadata is disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<GroupedMetadata>,
    /// Records per entity type; types in order of first appearance, records in scan order.
    #[serde(rename = "itemsByType")]
    pub items_by_type: IndexMap<String, Vec<common::Record>>,
}

/// A complete export, ready to be serialized.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExportDocument {
    /// Records as one list.
    Flat(FlatDocument),
    /// Records grouped by entity type.
    Grouped(GroupedDocument),
}

impl ExportDocument {
    /// Number of records in the document.
    pub fn item_count(&self) -> usize {
        match self {
            Self::Flat(document) => document.items.len(),
            Self::Grouped(document) => document.items_by_type.values().map(Vec::len).sum(),
        }
    }

    /// Records per entity type; empty for flat documents.
    pub fn type_counts(&self) -> IndexMap<String, usize> {
        match self {
            Self::Flat(_) => IndexMap::new(),
            Self::Grouped(document) => document
                .items_by_type
                .iter()
                .map(|(entity_type, items)| (entity_type.clone(), items.len()))
                .collect(),
        }
    }
}

/// Records collected by a scan.
#[derive(Clone, Debug, PartialEq)]
pub enum ExportItems {
    /// In scan order.
    Flat(Vec<common::Record>),
    /// Grouped by entity type.
    Grouped(IndexMap<String, Vec<common::Record>>),
}

/// Output layout.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Style {
    /// Indented, one attribute per line.
    #[default]
    Pretty,
    /// Single line.
    Compact,
}

/// Turns scanned records into a serialized export document.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExportWriter {
    include_metadata: bool,
    style: Style,
}

impl Default for ExportWriter {
    fn default() -> Self {
        Self {
            include_metadata: true,
            style: Style::default(),
        }
    }
}

impl ExportWriter {
    /// Whether documents carry a `metadata` section.
    pub fn with_metadata(mut self, include_metadata: bool) -> Self {
        self.include_metadata = include_metadata;
        self
    }

    /// Sets the output layout.
    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    /// Assembles the document; counts are derived from `items`.
    pub fn build(&self, items: ExportItems, source: SourceInfo) -> ExportDocument {
        match items {
            ExportItems::Flat(items) => ExportDocument::Flat(FlatDocument {
                metadata: self.include_metadata.then(|| FlatMetadata {
                    source,
                    item_count: items.len(),
                }),
                items,
            }),
            ExportItems::Grouped(items_by_type) => {
                let metadata = self.include_metadata.then(|| {
                    let type_counts: IndexMap<String, usize> = items_by_type
                        .iter()
                        .map(|(entity_type, items)| (entity_type.clone(), items.len()))
                        .collect();
                    GroupedMetadata {
                        source,
                        total_items: type_counts.values().sum(),
                        entity_types: type_counts.len(),
                        type_counts,
                    }
                });
                ExportDocument::Grouped(GroupedDocument {
                    metadata,
                    items_by_type,
                })
            }
        }
    }

    /// Encodes the document as JSON.
    pub fn serialize(&self, document: &ExportDocument) -> Result<Vec<u8>> {
        let bytes = match self.style {
            Style::Pretty => serde_json::to_vec_pretty(document)?,
            Style::Compact => serde_json::to_vec(document)?,
        };
        Ok(bytes)
    }

    /// `<table>-export-<timestamp>.json`, or `<table>-grouped-export-<timestamp>.json`.
    pub fn default_file_name(table_name: &str, grouped: bool, at: DateTime<Utc>) -> String {
        let kind = if grouped { "grouped-export" } else { "export" };
        format!("{table_name}-{kind}-{}.json", at.format("%Y-%m-%dT%H-%M-%S"))
    }
}
