use crate::common;

use aws_sdk_dynamodb::types;
use serde::Serialize;
use serde_dynamo::{Result, to_attribute_value};
use serde_json::Value;
use std::{cmp, collections, ops};

/// Logical operator for combining conditions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LogicalOperator {
    /// Logical AND - all conditions must be true.
    And,
    /// Logical OR - at least one condition must be true.
    Or,
}

impl ops::Deref for LogicalOperator {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::And => " AND ",
            Self::Or => " OR ",
        }
    }
}

/// Comparison operators supported by DynamoDB condition expressions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Comparator {
    /// `=`
    Equal,
    /// `<>`
    NotEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
}

impl Comparator {
    fn symbol(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::Equal => "eq",
            Self::NotEqual => "ne",
            Self::LessThan => "lt",
            Self::LessThanOrEqual => "lte",
            Self::GreaterThan => "gt",
            Self::GreaterThanOrEqual => "gte",
        }
    }

    fn holds(self, ordering: Option<cmp::Ordering>) -> bool {
        match (self, ordering) {
            (Self::NotEqual, ordering) => ordering != Some(cmp::Ordering::Equal),
            (_, None) => false,
            (Self::Equal, Some(ordering)) => ordering.is_eq(),
            (Self::LessThan, Some(ordering)) => ordering.is_lt(),
            (Self::LessThanOrEqual, Some(ordering)) => ordering.is_le(),
            (Self::GreaterThan, Some(ordering)) => ordering.is_gt(),
            (Self::GreaterThanOrEqual, Some(ordering)) => ordering.is_ge(),
        }
    }
}

/// Condition applied to a single attribute.
///
/// ```rust
/// use dynamodb_transfer::common::condition;
///
/// let active = condition::Condition::Compare(condition::Comparator::Equal, "active".to_string());
/// let absent: condition::Condition<String> = condition::Condition::NotExists;
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Condition<T> {
    /// The attribute is a string starting with the prefix.
    BeginsWith(String),
    /// The attribute lies between two values (inclusive).
    Between(T, T),
    /// The attribute compares to the value with the operator.
    Compare(Comparator, T),
    /// The attribute (string or list) contains the value.
    Contains(T),
    /// The attribute exists.
    Exists,
    /// The attribute does not exist.
    NotExists,
}

impl<T: Serialize> Condition<T> {
    fn render(
        self,
        placeholder: &str,
        index: &mut usize,
    ) -> Result<(String, collections::HashMap<String, types::AttributeValue>)> {
        let mut values = collections::HashMap::new();
        let mut bind = |tag: &str, value: types::AttributeValue| {
            let name = placeholder.trim_start_matches('#');
            let value_placeholder = format!(":{name}_{tag}{index}");
            *index += 1;
            values.insert(value_placeholder.clone(), value);
            value_placeholder
        };
        let expression = match self {
            Self::BeginsWith(prefix) => {
                let value = bind("begins_with", types::AttributeValue::S(prefix));
                format!("begins_with({placeholder}, {value})")
            }
            Self::Between(low, high) => {
                let low = bind("between", to_attribute_value(low)?);
                let high = bind("between", to_attribute_value(high)?);
                format!("{placeholder} BETWEEN {low} AND {high}")
            }
            Self::Compare(comparator, value) => {
                let value = bind(comparator.tag(), to_attribute_value(value)?);
                format!("{placeholder} {} {value}", comparator.symbol())
            }
            Self::Contains(value) => {
                let value = bind("contains", to_attribute_value(value)?);
                format!("contains({placeholder}, {value})")
            }
            Self::Exists => format!("attribute_exists({placeholder})"),
            Self::NotExists => format!("attribute_not_exists({placeholder})"),
        };
        Ok((expression, values))
    }
}

impl Condition<Value> {
    fn matches(&self, attribute: Option<&Value>) -> bool {
        match (self, attribute) {
            (Self::Exists, attribute) => attribute.is_some(),
            (Self::NotExists, attribute) => attribute.is_none(),
            (_, None) => false,
            (Self::BeginsWith(prefix), Some(Value::String(value))) => value.starts_with(prefix),
            (Self::BeginsWith(_), Some(_)) => false,
            (Self::Between(low, high), Some(value)) => {
                Comparator::GreaterThanOrEqual.holds(compare(value, low))
                    && Comparator::LessThanOrEqual.holds(compare(value, high))
            }
            (Self::Compare(comparator, expected), Some(value)) => {
                comparator.holds(compare(value, expected))
            }
            (Self::Contains(needle), Some(Value::String(value))) => needle
                .as_str()
                .is_some_and(|needle| value.contains(needle)),
            (Self::Contains(needle), Some(Value::Array(values))) => values.contains(needle),
            (Self::Contains(_), Some(_)) => false,
        }
    }
}

fn compare(left: &Value, right: &Value) -> Option<cmp::Ordering> {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => left.as_f64()?.partial_cmp(&right.as_f64()?),
        (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
        (left, right) if left == right => Some(cmp::Ordering::Equal),
        _ => None,
    }
}

/// Condition applied to an attribute.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyCondition<T> {
    /// The condition to apply to the attribute.
    pub condition: Condition<T>,
    /// The name of the attribute to apply the condition to.
    pub name: String,
}

/// Tree of conditions combined with logical operators.
///
/// ```rust
/// use dynamodb_transfer::common::condition;
///
/// let map = condition::ConditionMap::Leaves(
///     condition::LogicalOperator::And,
///     vec![condition::KeyCondition {
///         name: "status".to_string(),
///         condition: condition::Condition::Compare(
///             condition::Comparator::Equal,
///             "active".to_string(),
///         ),
///     }],
/// );
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum ConditionMap<T> {
    /// Attribute conditions combined with the operator.
    Leaves(LogicalOperator, Vec<KeyCondition<T>>),
    /// Nested condition maps combined with the operator; each multi-term child is parenthesized.
    Group(LogicalOperator, Vec<ConditionMap<T>>),
}

impl<T: Serialize> TryFrom<ConditionMap<T>> for common::ExpressionInput {
    type Error = serde_dynamo::Error;

    fn try_from(condition_map: ConditionMap<T>) -> Result<Self> {
        condition_map.render(&mut 0, false)
    }
}

impl<T: Serialize> ConditionMap<T> {
    /// Condition requiring that no item with this partition key exists yet.
    pub fn not_exists(attribute: impl Into<String>) -> Self {
        Self::Leaves(
            LogicalOperator::And,
            vec![KeyCondition {
                condition: Condition::NotExists,
                name: attribute.into(),
            }],
        )
    }

    fn len(&self) -> usize {
        match self {
            Self::Leaves(_, leaves) => leaves.len(),
            Self::Group(_, children) => children.len(),
        }
    }

    fn render(self, index: &mut usize, is_nested: bool) -> Result<common::ExpressionInput> {
        let is_composite = is_nested && self.len() > 1;
        let (operator, operations) = match self {
            Self::Leaves(operator, key_conditions) => {
                let mut operations = Vec::with_capacity(key_conditions.len());
                for key_condition in key_conditions {
                    let placeholder = common::name_placeholder(&key_condition.name);
                    let (expression, expression_attribute_values) =
                        key_condition.condition.render(&placeholder, index)?;
                    operations.push(common::ExpressionInput {
                        expression,
                        expression_attribute_names: collections::HashMap::from([(
                            placeholder,
                            key_condition.name,
                        )]),
                        expression_attribute_values,
                    });
                }
                (operator, operations)
            }
            Self::Group(operator, children) => {
                let mut operations = Vec::with_capacity(children.len());
                for child in children {
                    operations.push(child.render(index, true)?);
                }
                (operator, operations)
            }
        };
        let operation = common::ExpressionInput::merge(&operator, operations);
        Ok(if is_composite {
            operation.parenthesized()
        } else {
            operation
        })
    }
}

impl ConditionMap<Value> {
    /// Evaluates the condition against a record, as DynamoDB would.
    pub fn matches(&self, record: &common::Record) -> bool {
        match self {
            Self::Leaves(operator, leaves) => {
                let mut results = leaves
                    .iter()
                    .map(|leaf| leaf.condition.matches(record.get(&leaf.name)));
                match operator {
                    LogicalOperator::And => results.all(|result| result),
                    LogicalOperator::Or => results.any(|result| result),
                }
            }
            Self::Group(operator, children) => match operator {
                LogicalOperator::And => children.iter().all(|child| child.matches(record)),
                LogicalOperator::Or => children.iter().any(|child| child.matches(record)),
            },
        }
    }
}
