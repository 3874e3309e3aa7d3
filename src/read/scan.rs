use crate::{common, store};

use aws_sdk_dynamodb::{Client, error, operation, types};
use operation::scan::{ScanError, ScanOutput};
use serde::Serialize;
use serde_dynamo::{Error, Result, to_attribute_value};
use std::collections;

/// Filter applied to scanned items before they are returned.
///
/// A raw `expression` is sent verbatim together with its placeholder maps.
/// A structured `condition` is rendered into an expression. When both are set
/// they must both hold.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanFilter<T> {
    /// Raw DynamoDB filter expression, e.g. `#s = :active`.
    pub expression: Option<String>,
    /// Placeholder names used by `expression`.
    pub attribute_names: Option<collections::HashMap<String, String>>,
    /// Placeholder values used by `expression`.
    pub attribute_values: Option<collections::HashMap<String, T>>,
    /// Structured condition.
    pub condition: Option<common::condition::ConditionMap<T>>,
}

impl<T> ScanFilter<T> {
    /// Filter from a raw expression.
    pub fn expression(expression: impl Into<String>) -> Self {
        Self {
            expression: Some(expression.into()),
            attribute_names: None,
            attribute_values: None,
            condition: None,
        }
    }

    /// Whether the filter restricts nothing.
    pub fn is_empty(&self) -> bool {
        self.expression.is_none() && self.condition.is_none()
    }
}

impl<T: Serialize> ScanFilter<T> {
    pub(crate) fn into_expression(self) -> Result<Option<common::ExpressionInput>> {
        let raw = match self.expression {
            Some(expression) => {
                let mut expression_attribute_values = collections::HashMap::new();
                for (placeholder, value) in self.attribute_values.unwrap_or_default() {
                    expression_attribute_values.insert(placeholder, to_attribute_value(value)?);
                }
                Some(common::ExpressionInput {
                    expression,
                    expression_attribute_names: self.attribute_names.unwrap_or_default(),
                    expression_attribute_values,
                })
            }
            None => None,
        };
        let structured: Option<common::ExpressionInput> =
            self.condition.map(TryInto::try_into).transpose()?;
        let operation = match (raw, structured) {
            (Some(raw), Some(structured)) => Some(common::ExpressionInput::merge(
                &common::condition::LogicalOperator::And,
                vec![raw.parenthesized(), structured.parenthesized()],
            )),
            (raw, structured) => raw.or(structured),
        };
        Ok(operation)
    }
}

/// scan operation
#[derive(Clone, Debug, Default, PartialEq)]
struct ScanInput {
    consistent_read: Option<bool>,
    exclusive_start_key: Option<collections::HashMap<String, types::AttributeValue>>,
    expression_attribute_names: Option<collections::HashMap<String, String>>,
    expression_attribute_values: Option<collections::HashMap<String, types::AttributeValue>>,
    filter_expression: Option<String>,
    limit: Option<i32>,
    select: Option<types::Select>,
    table_name: String,
}

/// Single-page scan request.
///
/// ```rust,no_run
/// use aws_sdk_dynamodb::Client;
/// use dynamodb_transfer::read;
/// use serde_json::Value;
///
/// # async fn example(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
/// let scan: read::scan::Scan<Value> = read::scan::Scan {
///     table_name: "users".to_string(),
///     filter: read::scan::ScanFilter::expression("attribute_exists(email)"),
///     ..Default::default()
/// };
/// let page = scan.send(client).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scan<T> {
    /// Whether to use a strongly consistent read.
    pub consistent_read: Option<bool>,
    /// Cursor returned by the previous page, `None` for the first page.
    pub exclusive_start_key: Option<store::Cursor>,
    /// Filter applied to scanned items.
    pub filter: ScanFilter<T>,
    /// The maximum number of items to evaluate in this page.
    pub limit: Option<i32>,
    /// `Select::Count` to return counts without item payloads.
    pub select: Option<types::Select>,
    /// The name of the table to scan.
    pub table_name: String,
}

impl<T: Serialize> TryFrom<Scan<T>> for ScanInput {
    type Error = Error;

    fn try_from(scan: Scan<T>) -> Result<Self> {
        let filter = scan.filter.into_expression()?;
        let operation = Self {
            consistent_read: scan.consistent_read,
            exclusive_start_key: scan.exclusive_start_key.map(store::Cursor::into_inner),
            expression_attribute_names: filter.as_ref().and_then(common::ExpressionInput::names),
            expression_attribute_values: filter
                .as_ref()
                .and_then(common::ExpressionInput::values),
            filter_expression: filter.map(|filter| filter.expression),
            limit: scan.limit,
            select: scan.select,
            table_name: scan.table_name,
        };
        Ok(operation)
    }
}

impl<T: Serialize> Scan<T> {
    /// Execute one page of the scan.
    #[tracing::instrument(
        name = "dynamodb_transfer.scan",
        skip_all,
        fields(table_name = %self.table_name),
        err
    )]
    pub async fn send(
        self,
        client: &Client,
    ) -> std::result::Result<ScanOutput, error::SdkError<ScanError>> {
        let scan: ScanInput = self.try_into().map_err(error::BuildError::other)?;
        client
            .scan()
            .set_consistent_read(scan.consistent_read)
            .set_exclusive_start_key(scan.exclusive_start_key)
            .set_expression_attribute_names(scan.expression_attribute_names)
            .set_expression_attribute_values(scan.expression_attribute_values)
            .set_filter_expression(scan.filter_expression)
            .set_limit(scan.limit)
            .set_select(scan.select)
            .table_name(scan.table_name)
            .send()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::condition;

    use rstest::rstest;
    use serde_json::{Value, json};

    #[rstest]
    #[case::empty(
        Scan {
            table_name: "a".to_string(),
            ..Default::default()
        },
        ScanInput {
            table_name: "a".to_string(),
            ..Default::default()
        }
    )]
    #[case::raw_expression(
        Scan {
            consistent_read: Some(true),
            exclusive_start_key: store::Cursor::new(
                collections::HashMap::from(
                    [("b".to_string(), types::AttributeValue::S("c".to_string()))]
                )
            ),
            filter: ScanFilter {
                expression: Some("#d = :d".to_string()),
                attribute_names: Some(
                    collections::HashMap::from([("#d".to_string(), "d".to_string())])
                ),
                attribute_values: Some(
                    collections::HashMap::from([(":d".to_string(), json!(5))])
                ),
                condition: None,
            },
            limit: Some(10),
            select: Some(types::Select::Count),
            table_name: "a".to_string(),
        },
        ScanInput {
            consistent_read: Some(true),
            exclusive_start_key: Some(
                collections::HashMap::from(
                    [("b".to_string(), types::AttributeValue::S("c".to_string()))]
                )
            ),
            expression_attribute_names: Some(
                collections::HashMap::from([("#d".to_string(), "d".to_string())])
            ),
            expression_attribute_values: Some(
                collections::HashMap::from(
                    [(":d".to_string(), types::AttributeValue::N("5".to_string()))]
                )
            ),
            filter_expression: Some("#d = :d".to_string()),
            limit: Some(10),
            select: Some(types::Select::Count),
            table_name: "a".to_string(),
        }
    )]
    #[case::raw_expression_without_placeholders(
        Scan {
            filter: ScanFilter::expression("attribute_exists(e)"),
            table_name: "a".to_string(),
            ..Default::default()
        },
        ScanInput {
            filter_expression: Some("attribute_exists(e)".to_string()),
            table_name: "a".to_string(),
            ..Default::default()
        }
    )]
    #[case::raw_and_structured(
        Scan {
            filter: ScanFilter {
                expression: Some("#d = :d OR #d = :e".to_string()),
                attribute_names: Some(
                    collections::HashMap::from([("#d".to_string(), "d".to_string())])
                ),
                attribute_values: Some(
                    collections::HashMap::from(
                        [
                            (":d".to_string(), json!("x")),
                            (":e".to_string(), json!("y")),
                        ]
                    )
                ),
                condition: Some(
                    condition::ConditionMap::Leaves(
                        condition::LogicalOperator::And,
                        vec![
                            condition::KeyCondition {
                                condition: condition::Condition::BeginsWith("USER#".to_string()),
                                name: "f".to_string(),
                            },
                        ]
                    )
                ),
            },
            table_name: "a".to_string(),
            ..Default::default()
        },
        ScanInput {
            expression_attribute_names: Some(
                collections::HashMap::from(
                    [
                        ("#d".to_string(), "d".to_string()),
                        ("#f".to_string(), "f".to_string()),
                    ]
                )
            ),
            expression_attribute_values: Some(
                collections::HashMap::from(
                    [
                        (":d".to_string(), types::AttributeValue::S("x".to_string())),
                        (":e".to_string(), types::AttributeValue::S("y".to_string())),
                        (
                            ":f_begins_with0".to_string(),
                            types::AttributeValue::S("USER#".to_string()),
                        ),
                    ]
                )
            ),
            filter_expression: Some(
                "(#d = :d OR #d = :e) AND (begins_with(#f, :f_begins_with0))".to_string()
            ),
            table_name: "a".to_string(),
            ..Default::default()
        }
    )]
    fn test_scan(#[case] args: Scan<Value>, #[case] expected: ScanInput) {
        let actual: ScanInput = args.try_into().unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_placeholders_without_expression_are_dropped() {
        let filter: ScanFilter<Value> = ScanFilter {
            attribute_names: Some(collections::HashMap::from([(
                "#a".to_string(),
                "a".to_string(),
            )])),
            ..Default::default()
        };
        assert!(filter.is_empty());
        assert_eq!(filter.into_expression().unwrap(), None);
    }
}
