//! Runtime configuration.
//!
//! Defaults are overridden from the environment by [`TransferConfig::from_env`]:
//!
//! | Variable | Field |
//! |---|---|
//! | `AWS_REGION` | `region` |
//! | `AWS_ENDPOINT_URL` | `endpoint_url` |
//! | `DYNAMODB_TRANSFER_BATCH_CEILING` | `batch_ceiling` (clamped to `1..=25`) |
//! | `DYNAMODB_TRANSFER_PACING_MS` | `pacing` |
//! | `DYNAMODB_TRANSFER_SCHEMA_TTL_SECS` | `key_schema_ttl` |
//! | `DYNAMODB_TRANSFER_OUTPUT_DIR` | `output_dir` |
//!
//! Values that do not parse are ignored.

use crate::write::batch_writer;

use std::{path, time};

/// Seconds a table's key schema is cached for.
pub const DEFAULT_KEY_SCHEMA_TTL: time::Duration = time::Duration::from_secs(300);

/// Directory exports are written to when no file is named.
pub const DEFAULT_OUTPUT_DIR: &str = "exports";

/// Settings shared by every transfer operation.
#[derive(Clone, Debug, PartialEq)]
pub struct TransferConfig {
    /// Region override; the SDK's own resolution applies when `None`.
    pub region: Option<String>,
    /// Endpoint override, e.g. a local DynamoDB.
    pub endpoint_url: Option<String>,
    /// Most records written per chunk.
    pub batch_ceiling: usize,
    /// Delay between consecutive import chunks.
    pub pacing: time::Duration,
    /// How long a table's key schema is trusted before it is described again.
    pub key_schema_ttl: time::Duration,
    /// Directory for exports written under their default name.
    pub output_dir: path::PathBuf,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            region: None,
            endpoint_url: None,
            batch_ceiling: batch_writer::BATCH_WRITE_CEILING,
            pacing: batch_writer::DEFAULT_PACING,
            key_schema_ttl: DEFAULT_KEY_SCHEMA_TTL,
            output_dir: path::PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl TransferConfig {
    /// Defaults overridden by the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let number = |name: &str| lookup(name).and_then(|value| value.trim().parse::<u64>().ok());
        Self {
            region: lookup("AWS_REGION").filter(|value| !value.is_empty()),
            endpoint_url: lookup("AWS_ENDPOINT_URL").filter(|value| !value.is_empty()),
            batch_ceiling: number("DYNAMODB_TRANSFER_BATCH_CEILING")
                .and_then(|value| usize::try_from(value).ok())
                .map_or(defaults.batch_ceiling, |value| {
                    value.clamp(1, batch_writer::BATCH_WRITE_CEILING)
                }),
            pacing: number("DYNAMODB_TRANSFER_PACING_MS")
                .map_or(defaults.pacing, time::Duration::from_millis),
            key_schema_ttl: number("DYNAMODB_TRANSFER_SCHEMA_TTL_SECS")
                .map_or(defaults.key_schema_ttl, time::Duration::from_secs),
            output_dir: lookup("DYNAMODB_TRANSFER_OUTPUT_DIR")
                .filter(|value| !value.is_empty())
                .map_or(defaults.output_dir, path::PathBuf::from),
        }
    }
}
