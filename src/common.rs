//! Common utilities shared by read and write operations.
//!
//! This module provides the record representation used across the engine,
//! primary key handling and condition expressions.

/// Condition expression building for scan filters and conditional writes.
pub mod condition;

/// Primary key schema and key extraction from records.
pub mod key;

use aws_sdk_dynamodb::types;
use std::collections;

/// One item of a table as plain JSON: attribute name to value.
///
/// Records are converted to and from DynamoDB attribute values with
/// `serde_dynamo` at the store boundary and are otherwise treated as opaque.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// `#name`, with characters placeholders cannot hold replaced by `_`.
pub(crate) fn name_placeholder(name: &str) -> String {
    let identifier: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("#{identifier}")
}

fn join_expression(left: String, operator: &str, right: String) -> String {
    if left.is_empty() {
        right
    } else if right.is_empty() {
        left
    } else {
        format!("{left}{operator}{right}")
    }
}

/// expression operation
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ExpressionInput {
    pub(crate) expression: String,
    pub(crate) expression_attribute_names: collections::HashMap<String, String>,
    pub(crate) expression_attribute_values: collections::HashMap<String, types::AttributeValue>,
}

impl ExpressionInput {
    pub(crate) fn merge(operator: &str, items: Vec<Self>) -> Self {
        let mut operation = Self::default();
        for item in items {
            operation
                .expression_attribute_names
                .extend(item.expression_attribute_names);
            operation
                .expression_attribute_values
                .extend(item.expression_attribute_values);
            operation.expression =
                join_expression(operation.expression, operator, item.expression);
        }
        operation
    }

    pub(crate) fn parenthesized(mut self) -> Self {
        if !self.expression.is_empty() {
            self.expression = format!("({})", self.expression);
        }
        self
    }

    pub(crate) fn names(&self) -> Option<collections::HashMap<String, String>> {
        (!self.expression_attribute_names.is_empty())
            .then(|| self.expression_attribute_names.clone())
    }

    pub(crate) fn values(&self) -> Option<collections::HashMap<String, types::AttributeValue>> {
        (!self.expression_attribute_values.is_empty())
            .then(|| self.expression_attribute_values.clone())
    }
}
