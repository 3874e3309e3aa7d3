use crate::common;

use aws_sdk_dynamodb::types;
use serde::Serialize;
use serde_dynamo::{Error, Result};
use std::collections;

/// Internal representation of write operation parameters.
///
/// Holds the resolved condition expression and attribute mappings ready for
/// the DynamoDB API call.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct WriteInput {
    pub(crate) condition_expression: Option<String>,
    pub(crate) expression_attribute_names: Option<collections::HashMap<String, String>>,
    pub(crate) expression_attribute_values:
        Option<collections::HashMap<String, types::AttributeValue>>,
    pub(crate) return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    pub(crate) table_name: String,
}

/// Arguments common to single-item write operations.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteArgs<T> {
    /// Condition that must hold for the write to happen.
    ///
    /// If the condition is false the store rejects the write with a
    /// conditional check failure.
    pub condition: Option<common::condition::ConditionMap<T>>,
    /// Whether to return the consumed capacity information.
    pub return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    /// The name of the table to write to.
    pub table_name: String,
}

impl<T: Serialize> TryFrom<WriteArgs<T>> for WriteInput {
    type Error = Error;

    fn try_from(write_args: WriteArgs<T>) -> Result<Self> {
        let condition: Option<common::ExpressionInput> =
            write_args.condition.map(TryInto::try_into).transpose()?;
        let operation = Self {
            expression_attribute_names: condition.as_ref().and_then(common::ExpressionInput::names),
            expression_attribute_values: condition
                .as_ref()
                .and_then(common::ExpressionInput::values),
            condition_expression: condition.map(|condition| condition.expression),
            return_consumed_capacity: write_args.return_consumed_capacity,
            table_name: write_args.table_name,
        };
        Ok(operation)
    }
}

/// apply common write operation settings to a builder
#[macro_export]
macro_rules! apply_write_operation {
    ($builder:expr, $write_operation:expr) => {
        $builder
            .set_condition_expression($write_operation.condition_expression)
            .set_expression_attribute_names($write_operation.expression_attribute_names)
            .set_expression_attribute_values($write_operation.expression_attribute_values)
            .set_return_consumed_capacity($write_operation.return_consumed_capacity)
            .table_name($write_operation.table_name)
    };
}
