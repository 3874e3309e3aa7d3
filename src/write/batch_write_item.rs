use crate::{Error, Result};

use aws_sdk_dynamodb::{Client, error, operation, types};
use serde::Serialize;
use serde_dynamo::to_item;

/// Unconditional bulk put into a single table.
///
/// DynamoDB accepts at most 25 requests per call; splitting larger inputs is
/// the caller's job.
///
/// ```rust,no_run
/// use aws_sdk_dynamodb::Client;
/// use dynamodb_transfer::write;
///
/// # async fn example(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
/// let batch_put = write::batch_write_item::BatchPut {
///     items: vec![serde_json::json!({"PK": "USER#1", "name": "John"})],
///     table_name: "users".to_string(),
///     ..Default::default()
/// };
/// let output = batch_put.send(client).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchPut<T> {
    /// Items to put, replacing any existing item with the same key.
    pub items: Vec<T>,
    /// Whether to return the consumed capacity information.
    pub return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    /// The name of the table to write to.
    pub table_name: String,
}

impl<T: Serialize> TryFrom<BatchPut<T>> for operation::batch_write_item::BatchWriteItemInput {
    type Error = Error;

    fn try_from(batch_put: BatchPut<T>) -> Result<Self> {
        let mut write_requests = Vec::with_capacity(batch_put.items.len());
        for item in batch_put.items {
            let put_request = types::PutRequest::builder()
                .set_item(Some(to_item(item)?))
                .build()?;
            let write_request = types::WriteRequest::builder()
                .put_request(put_request)
                .build();
            write_requests.push(write_request);
        }
        let operation = Self::builder()
            .request_items(batch_put.table_name, write_requests)
            .set_return_consumed_capacity(batch_put.return_consumed_capacity)
            .build()?;
        Ok(operation)
    }
}

impl<T: Serialize> BatchPut<T> {
    /// Execute the batch write item operation.
    #[tracing::instrument(
        name = "dynamodb_transfer.batch_write_item",
        skip_all,
        fields(table_name = %self.table_name, items = self.items.len()),
        err
    )]
    pub async fn send(
        self,
        client: &Client,
    ) -> std::result::Result<
        operation::batch_write_item::BatchWriteItemOutput,
        error::SdkError<operation::batch_write_item::BatchWriteItemError>,
    > {
        let batch_write_item: operation::batch_write_item::BatchWriteItemInput =
            self.try_into().map_err(error::BuildError::other)?;
        client
            .batch_write_item()
            .set_request_items(batch_write_item.request_items)
            .set_return_consumed_capacity(batch_write_item.return_consumed_capacity)
            .send()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;
    use serde_json::{Value, json};
    use std::collections;

    fn put(item: collections::HashMap<String, types::AttributeValue>) -> types::WriteRequest {
        types::WriteRequest::builder()
            .put_request(
                types::PutRequest::builder()
                    .set_item(Some(item))
                    .build()
                    .unwrap(),
            )
            .build()
    }

    #[rstest]
    #[case::single(
        BatchPut {
            items: vec![json!({"a": "b"})],
            table_name: "c".to_string(),
            ..Default::default()
        },
        operation::batch_write_item::BatchWriteItemInput::builder()
            .request_items(
                "c",
                vec![
                    put(
                        collections::HashMap::from(
                            [("a".to_string(), types::AttributeValue::S("b".to_string()))]
                        )
                    ),
                ]
            )
            .build()
            .unwrap()
    )]
    #[case::multiple_with_capacity(
        BatchPut {
            items: vec![
                json!({"a": "b"}),
                json!({"a": "c", "d": 1}),
            ],
            return_consumed_capacity: Some(types::ReturnConsumedCapacity::Total),
            table_name: "e".to_string(),
        },
        operation::batch_write_item::BatchWriteItemInput::builder()
            .request_items(
                "e",
                vec![
                    put(
                        collections::HashMap::from(
                            [("a".to_string(), types::AttributeValue::S("b".to_string()))]
                        )
                    ),
                    put(
                        collections::HashMap::from(
                            [
                                ("a".to_string(), types::AttributeValue::S("c".to_string())),
                                ("d".to_string(), types::AttributeValue::N("1".to_string())),
                            ]
                        )
                    ),
                ]
            )
            .return_consumed_capacity(types::ReturnConsumedCapacity::Total)
            .build()
            .unwrap()
    )]
    fn test_batch_put(
        #[case] args: BatchPut<Value>,
        #[case] expected: operation::batch_write_item::BatchWriteItemInput,
    ) {
        let actual: operation::batch_write_item::BatchWriteItemInput =
            args.try_into().unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_non_object_item_is_rejected() {
        let args = BatchPut {
            items: vec![json!("scalar")],
            table_name: "a".to_string(),
            ..Default::default()
        };
        let actual: Result<operation::batch_write_item::BatchWriteItemInput> = args.try_into();
        assert!(matches!(actual, Err(Error::Serialization(_))));
    }
}
