use crate::{Error, Result, common, read, store, write};

use async_trait::async_trait;
use aws_sdk_dynamodb::{Client, config, error, operation, types};
use serde_dynamo::from_item;
use serde_json::Value;
use std::fmt;

use error::ProvideErrorMetadata;

const THROTTLING_CODES: [&str; 3] = [
    "ProvisionedThroughputExceededException",
    "ThrottlingException",
    "RequestLimitExceeded",
];

const CREDENTIAL_CODES: [&str; 4] = [
    "UnrecognizedClientException",
    "InvalidSignatureException",
    "ExpiredTokenException",
    "MissingAuthenticationToken",
];

/// Maps an SDK failure onto the crate taxonomy.
fn store_error<E, R>(operation: &str, error: error::SdkError<E, R>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: fmt::Debug,
{
    let message = format!("{operation}: {}", error::DisplayErrorContext(&error));
    match &error {
        error::SdkError::DispatchFailure(_) | error::SdkError::TimeoutError(_) => {
            Error::StoreUnavailable(message)
        }
        _ => match error.code() {
            Some(code) if THROTTLING_CODES.contains(&code) => Error::Throttled(message),
            Some(code) if CREDENTIAL_CODES.contains(&code) => Error::StoreUnavailable(message),
            _ => Error::Store(message),
        },
    }
}

fn unrepresentable(message: String) -> Error {
    Error::Serialization(<serde_dynamo::Error as serde::de::Error>::custom(message))
}

/// Integers that fit 64 bits, or decimals with at most 15 significant digits.
fn is_lossless_number(number: &str) -> bool {
    if number.parse::<i64>().is_ok() || number.parse::<u64>().is_ok() {
        return true;
    }
    let mantissa = number.split(['e', 'E']).next().unwrap_or_default();
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let significant = digits.trim_start_matches('0').trim_end_matches('0');
    significant.len() <= f64::DIGITS as usize && number.parse::<f64>().is_ok_and(f64::is_finite)
}

/// Rejects values the JSON form cannot hold without changing them.
///
/// String and number sets are exported as arrays and come back as lists.
fn check_representable(name: &str, value: &types::AttributeValue) -> Result<()> {
    let check_number = |number: &String| {
        if is_lossless_number(number) {
            Ok(())
        } else {
            Err(unrepresentable(format!(
                "attribute {name}: number {number} exceeds the precision of a JSON number"
            )))
        }
    };
    match value {
        types::AttributeValue::N(number) => check_number(number),
        types::AttributeValue::Ns(numbers) => numbers.iter().try_for_each(check_number),
        types::AttributeValue::B(_) | types::AttributeValue::Bs(_) => Err(unrepresentable(
            format!("attribute {name}: binary values have no JSON form"),
        )),
        types::AttributeValue::L(values) => values
            .iter()
            .try_for_each(|value| check_representable(name, value)),
        types::AttributeValue::M(map) => map
            .iter()
            .try_for_each(|(key, value)| check_representable(&format!("{name}.{key}"), value)),
        _ => Ok(()),
    }
}

fn records(
    items: Option<Vec<std::collections::HashMap<String, types::AttributeValue>>>,
) -> Result<Vec<common::Record>> {
    let items = items.unwrap_or_default();
    for item in &items {
        item.iter()
            .try_for_each(|(name, value)| check_representable(name, value))?;
    }
    let records = items
        .into_iter()
        .map(from_item)
        .collect::<serde_dynamo::Result<Vec<common::Record>>>()?;
    Ok(records)
}

fn count(value: i32) -> usize {
    usize::try_from(value).unwrap_or_default()
}

/// [`store::StoreClient`] backed by Amazon DynamoDB.
///
/// ```rust,no_run
/// use dynamodb_transfer::store::dynamo::DynamoStore;
///
/// # async fn example() {
/// let store = DynamoStore::connect(
///     Some("eu-west-1".to_string()),
///     Some("http://localhost:8000".to_string()),
/// )
/// .await;
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct DynamoStore {
    client: Client,
    region: Option<String>,
}

impl DynamoStore {
    /// Wraps an existing client.
    pub fn new(client: Client) -> Self {
        let region = client.config().region().map(ToString::to_string);
        Self { client, region }
    }

    /// Builds a client from the shared AWS configuration.
    ///
    /// `region` and `endpoint_url` override what the environment provides;
    /// credentials are resolved by the SDK's default provider chain.
    pub async fn connect(region: Option<String>, endpoint_url: Option<String>) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        let mut builder = config::Builder::from(&sdk_config);
        if let Some(region) = region {
            builder = builder.region(config::Region::new(region));
        }
        if let Some(endpoint_url) = endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }
        Self::new(Client::from_conf(builder.build()))
    }

    /// The underlying SDK client.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl store::StoreClient for DynamoStore {
    async fn scan_page(&self, scan: read::scan::Scan<Value>) -> Result<store::Page> {
        let output = scan
            .send(&self.client)
            .await
            .map_err(|error| store_error("Scan", error))?;
        Ok(store::Page {
            records: records(output.items)?,
            cursor: output.last_evaluated_key.and_then(store::Cursor::new),
            count: count(output.count),
            scanned_count: count(output.scanned_count),
        })
    }

    async fn count_page(&self, mut scan: read::scan::Scan<Value>) -> Result<store::CountPage> {
        scan.select = Some(types::Select::Count);
        let output = scan
            .send(&self.client)
            .await
            .map_err(|error| store_error("Scan", error))?;
        Ok(store::CountPage {
            count: count(output.count),
            scanned_count: count(output.scanned_count),
            cursor: output.last_evaluated_key.and_then(store::Cursor::new),
        })
    }

    async fn batch_put(
        &self,
        table_name: &str,
        records: Vec<common::Record>,
    ) -> Result<store::BatchPutOutcome> {
        let batch_put = write::batch_write_item::BatchPut {
            items: records.into_iter().map(Value::Object).collect(),
            table_name: table_name.to_string(),
            ..Default::default()
        };
        let output = batch_put
            .send(&self.client)
            .await
            .map_err(|error| store_error("BatchWriteItem", error))?;
        let unprocessed = output
            .unprocessed_items
            .unwrap_or_default()
            .values()
            .map(Vec::len)
            .sum();
        Ok(store::BatchPutOutcome { unprocessed })
    }

    async fn conditional_put(
        &self,
        table_name: &str,
        record: common::Record,
        key_schema: &common::key::KeySchema,
    ) -> Result<store::PutOutcome> {
        let put_item = write::put_item::PutItem {
            item: Value::Object(record),
            write_args: write::common::WriteArgs {
                condition: Some(common::condition::ConditionMap::not_exists(
                    key_schema.partition_key.as_str(),
                )),
                table_name: table_name.to_string(),
                ..Default::default()
            },
        };
        match put_item.send(&self.client).await {
            Ok(_) => Ok(store::PutOutcome::Written),
            Err(error)
                if matches!(
                    error.as_service_error(),
                    Some(operation::put_item::PutItemError::ConditionalCheckFailedException(_))
                ) =>
            {
                Ok(store::PutOutcome::ConditionFailed)
            }
            Err(error) => Err(store_error("PutItem", error)),
        }
    }

    #[tracing::instrument(name = "dynamodb_transfer.describe_table", skip(self), err)]
    async fn key_schema(&self, table_name: &str) -> Result<common::key::KeySchema> {
        let output = self
            .client
            .describe_table()
            .table_name(table_name)
            .send()
            .await
            .map_err(|error| store_error("DescribeTable", error))?;
        let elements = output
            .table
            .and_then(|table| table.key_schema)
            .ok_or_else(|| Error::Store(format!("table {table_name} has no key schema")))?;
        common::key::KeySchema::try_from(elements.as_slice())
    }

    fn region(&self) -> Option<String> {
        self.region.clone()
    }
}
