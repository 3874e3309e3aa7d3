use crate::{Error, Result, common};

use aws_sdk_dynamodb::types;

/// Primary key layout of a table (partition key and optional sort key).
///
/// ```rust
/// use dynamodb_transfer::common::key;
///
/// let schema = key::KeySchema::new("PK").with_sort_key("SK");
/// assert_eq!(schema.names().collect::<Vec<_>>(), vec!["PK", "SK"]);
/// ```
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct KeySchema {
    /// The partition key attribute name.
    pub partition_key: String,
    /// The sort key attribute name, only for tables with composite primary keys.
    pub sort_key: Option<String>,
}

impl Default for KeySchema {
    /// The single-table design convention: `PK` and `SK`.
    fn default() -> Self {
        Self::new("PK").with_sort_key("SK")
    }
}

impl KeySchema {
    /// Schema with a partition key only.
    pub fn new(partition_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: None,
        }
    }

    /// Adds a sort key.
    pub fn with_sort_key(mut self, sort_key: impl Into<String>) -> Self {
        self.sort_key = Some(sort_key.into());
        self
    }

    /// Key attribute names, partition key first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.partition_key.as_str()).chain(self.sort_key.as_deref())
    }

    /// The key attributes present in `record`, used to identify it in reports.
    pub fn key_of(&self, record: &common::Record) -> common::Record {
        self.names()
            .filter_map(|name| {
                record
                    .get(name)
                    .map(|value| (name.to_string(), value.clone()))
            })
            .collect()
    }
}

impl TryFrom<&[types::KeySchemaElement]> for KeySchema {
    type Error = Error;

    fn try_from(elements: &[types::KeySchemaElement]) -> Result<Self> {
        let mut partition_key = None;
        let mut sort_key = None;
        for element in elements {
            match element.key_type() {
                types::KeyType::Hash => partition_key = Some(element.attribute_name().to_string()),
                types::KeyType::Range => sort_key = Some(element.attribute_name().to_string()),
                other => {
                    return Err(Error::Store(format!(
                        "unexpected key type {other:?} for attribute {}",
                        element.attribute_name()
                    )));
                }
            }
        }
        let partition_key = partition_key
            .ok_or_else(|| Error::Store("key schema has no partition key".to_string()))?;
        Ok(Self {
            partition_key,
            sort_key,
        })
    }
}
