//! Entity classification for grouped exports.
//!
//! A record's entity type is derived by an ordered list of [`Rule`]s; the
//! first rule that recognises the record wins and records no rule recognises
//! are tagged [`UNKNOWN`]. Types are only used to group export output and are
//! never written back to the store.

use crate::common;

use regex::Regex;
use serde_json::Value;
use std::{fmt, sync};

/// Type given to records no rule recognises.
pub const UNKNOWN: &str = "UNKNOWN";

/// Attribute holding an explicit entity type.
pub const ENTITY_TYPE_ATTRIBUTE: &str = "entityType";

/// Attribute holding a legacy dash-delimited identifier.
pub const LEGACY_ID_ATTRIBUTE: &str = "id";

/// Upper-case tag followed by `#` at the start of a key value.
#[allow(clippy::expect_used)]
static TAG_PATTERN: sync::LazyLock<Regex> =
    sync::LazyLock::new(|| Regex::new(r"^([A-Z]+)#").expect("static regex: key tag"));

/// One classification heuristic.
pub trait Rule: fmt::Debug + Send + Sync {
    /// The entity type of `record`, or `None` when the rule does not apply.
    fn classify(&self, record: &common::Record) -> Option<String>;
}

/// `<TAG>#<rest>` in the partition key value, else in the sort key value.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyTagRule {
    key_names: Vec<String>,
}

impl KeyTagRule {
    /// Reads the key attributes of `key_schema`, partition key first.
    pub fn new(key_schema: &common::key::KeySchema) -> Self {
        Self {
            key_names: key_schema.names().map(ToString::to_string).collect(),
        }
    }

    fn tag(value: &str) -> Option<String> {
        let captures = TAG_PATTERN.captures(value)?;
        captures.get(1).map(|tag| tag.as_str().to_string())
    }
}

impl Rule for KeyTagRule {
    fn classify(&self, record: &common::Record) -> Option<String> {
        self.key_names
            .iter()
            .filter_map(|name| record.get(name).and_then(Value::as_str))
            .find_map(Self::tag)
    }
}

/// A non-empty `entityType` attribute.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EntityTypeRule;

impl Rule for EntityTypeRule {
    fn classify(&self, record: &common::Record) -> Option<String> {
        match record.get(ENTITY_TYPE_ATTRIBUTE)? {
            Value::String(entity_type) if !entity_type.is_empty() => Some(entity_type.clone()),
            Value::Number(entity_type) => Some(entity_type.to_string()),
            _ => None,
        }
    }
}

/// The first segment of a dash-delimited `id`, upper-cased.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LegacyIdRule;

impl Rule for LegacyIdRule {
    fn classify(&self, record: &common::Record) -> Option<String> {
        let id = record.get(LEGACY_ID_ATTRIBUTE)?.as_str()?;
        let (segment, _) = id.split_once('-')?;
        (!segment.is_empty()).then(|| segment.to_uppercase())
    }
}

/// Derives entity types from records.
///
/// ```rust
/// use dynamodb_transfer::classify::EntityClassifier;
/// use serde_json::json;
///
/// let classifier = EntityClassifier::default();
/// let record = json!({"PK": "USER#1"}).as_object().unwrap().clone();
/// assert_eq!(classifier.classify(&record), "USER");
/// ```
#[derive(Debug)]
pub struct EntityClassifier {
    rules: Vec<Box<dyn Rule>>,
}

impl Default for EntityClassifier {
    fn default() -> Self {
        Self::new(&common::key::KeySchema::default())
    }
}

impl EntityClassifier {
    /// The standard rule chain for a table keyed by `key_schema`.
    pub fn new(key_schema: &common::key::KeySchema) -> Self {
        Self::with_rules(vec![
            Box::new(KeyTagRule::new(key_schema)),
            Box::new(EntityTypeRule),
            Box::new(LegacyIdRule),
        ])
    }

    /// A custom rule chain, tried in order.
    pub fn with_rules(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    /// The entity type of `record`; never empty.
    pub fn classify(&self, record: &common::Record) -> String {
        self.rules
            .iter()
            .find_map(|rule| rule.classify(record))
            .unwrap_or_else(|| UNKNOWN.to_string())
    }
}
