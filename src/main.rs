//! Binary entry point for dynamodb-transfer.
//!
//! Exports DynamoDB tables to JSON documents, imports them back and counts
//! their items.

use clap::{Args, Parser, Subcommand, error::ErrorKind};
use dynamodb_transfer::{
    config::TransferConfig,
    document::export::Style,
    read::{pager::ScanOptions, scan::ScanFilter},
    store::dynamo::DynamoStore,
    transfer::{ExportOptions, ImportOptions, Transfer},
    write::batch_writer::BATCH_WRITE_CEILING,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Failures listed after an import; the rest are only counted.
const LISTED_FAILURES: usize = 20;

/// Bulk export and import of DynamoDB tables.
#[derive(Debug, Parser)]
#[command(name = "dynamodb-transfer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// AWS region, overriding the environment.
    #[arg(long, global = true)]
    region: Option<String>,

    /// Endpoint URL, e.g. a local DynamoDB.
    #[arg(long, global = true)]
    endpoint_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Export a table to a JSON document.
    Export {
        /// Table to scan.
        #[arg(short, long)]
        table: String,

        /// Write to this file instead of a generated name.
        #[arg(long)]
        output_file: Option<PathBuf>,

        /// Directory for generated file names.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Group records by entity type.
        #[arg(long)]
        grouped: bool,

        #[command(flatten)]
        filter: FilterArgs,

        /// Write single-line JSON.
        #[arg(long)]
        compact: bool,

        /// Leave out the metadata section.
        #[arg(long)]
        no_metadata: bool,
    },

    /// Import a JSON document into a table.
    Import {
        /// Table to write to.
        #[arg(short, long)]
        table: String,

        /// Document to read.
        #[arg(short, long)]
        file: PathBuf,

        /// Show what would be written without writing.
        #[arg(long)]
        dry_run: bool,

        /// Skip records whose key already exists instead of replacing them.
        #[arg(long)]
        no_overwrite: bool,

        /// Records per chunk.
        #[arg(long, default_value_t = BATCH_WRITE_CEILING)]
        batch_size: usize,
    },

    /// Count the items of a table.
    Count {
        /// Table to count.
        #[arg(short, long)]
        table: String,

        #[command(flatten)]
        filter: FilterArgs,
    },
}

/// Scan filter flags.
#[derive(Debug, Args)]
struct FilterArgs {
    /// Filter expression, e.g. `#s = :active`.
    #[arg(long)]
    filter_expression: Option<String>,

    /// Placeholder names as a JSON object, e.g. `{"#s": "status"}`.
    #[arg(long, value_parser = parse_json::<HashMap<String, String>>)]
    attribute_names: Option<HashMap<String, String>>,

    /// Placeholder values as a JSON object, e.g. `{":active": "ACTIVE"}`.
    #[arg(long, value_parser = parse_json::<HashMap<String, Value>>)]
    attribute_values: Option<HashMap<String, Value>>,
}

impl From<FilterArgs> for ScanOptions {
    fn from(args: FilterArgs) -> Self {
        Self {
            filter: ScanFilter {
                expression: args.filter_expression,
                attribute_names: args.attribute_names,
                attribute_values: args.attribute_values,
                condition: None,
            },
            ..Default::default()
        }
    }
}

fn parse_json<T: DeserializeOwned>(value: &str) -> Result<T, String> {
    serde_json::from_str(value).map_err(|e| format!("invalid JSON: {e}"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(parse_exit_code(e.kind()));
        }
    };
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Help and version requests succeed; every other parse error exits with 1.
fn parse_exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

/// `RUST_LOG` wins; otherwise this crate logs at info, or debug with `--verbose`.
fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,dynamodb_transfer={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Runs the selected command, releasing the store client on every path.
async fn run(cli: Cli) -> dynamodb_transfer::Result<()> {
    let mut config = TransferConfig::from_env();
    if let Some(region) = cli.region {
        config.region = Some(region);
    }
    if let Some(endpoint_url) = cli.endpoint_url {
        config.endpoint_url = Some(endpoint_url);
    }
    let store = DynamoStore::connect(config.region.clone(), config.endpoint_url.clone()).await;
    let mut transfer = Transfer::new(store, config);
    let result = run_command(&transfer, cli.command).await;
    transfer.close();
    result
}

async fn run_command(
    transfer: &Transfer<DynamoStore>,
    command: Commands,
) -> dynamodb_transfer::Result<()> {
    let started = Instant::now();
    match command {
        Commands::Export {
            table,
            output_file,
            output_dir,
            grouped,
            filter,
            compact,
            no_metadata,
        } => {
            let options = ExportOptions {
                scan: filter.into(),
                output_file,
                output_dir,
                include_metadata: !no_metadata,
                style: if compact { Style::Compact } else { Style::Pretty },
            };
            let summary = if grouped {
                transfer.export_grouped(&table, &options).await?
            } else {
                transfer.export(&table, &options).await?
            };
            println!(
                "Exported {} items from {table} to {}",
                summary.item_count,
                summary.path.display()
            );
            println!(
                "Scanned {} items in {} pages",
                summary.scanned_count, summary.pages
            );
            for (entity_type, count) in &summary.type_counts {
                println!("  {entity_type}: {count}");
            }
            print_timing(summary.item_count, started.elapsed());
        }

        Commands::Import {
            table,
            file,
            dry_run,
            no_overwrite,
            batch_size,
        } => {
            let options = ImportOptions {
                dry_run,
                batch_size,
                overwrite: !no_overwrite,
            };
            let result = transfer.import(&table, &file, &options).await?;
            if let Some(plan) = &result.plan {
                println!(
                    "Dry run: {} records would be written to {table} in {} chunks of up to {}",
                    result.total, plan.chunks, plan.chunk_size
                );
                if let Some(sample) = &plan.sample {
                    println!("Sample record: {}", Value::Object(sample.clone()));
                }
            } else {
                println!(
                    "Imported {} of {} records into {table} ({} skipped, {} failed)",
                    result.imported, result.total, result.skipped, result.failed
                );
                for failure in result.failures.iter().take(LISTED_FAILURES) {
                    println!(
                        "  {}: {}",
                        Value::Object(failure.key.clone()),
                        failure.reason
                    );
                }
                if result.failures.len() > LISTED_FAILURES {
                    println!(
                        "  ... and {} more",
                        result.failures.len() - LISTED_FAILURES
                    );
                }
            }
            print_timing(result.total, started.elapsed());
        }

        Commands::Count { table, filter } => {
            let summary = transfer.count(&table, &filter.into()).await?;
            println!(
                "{table}: {} items ({} scanned in {} pages)",
                summary.count, summary.scanned_count, summary.pages
            );
            print_timing(summary.scanned_count, started.elapsed());
        }
    }
    Ok(())
}

fn print_timing(records: usize, elapsed: Duration) {
    let seconds = elapsed.as_secs_f64();
    if seconds > 0.0 {
        #[allow(clippy::cast_precision_loss)]
        let throughput = records as f64 / seconds;
        println!("Finished in {seconds:.2}s ({throughput:.1} records/s)");
    } else {
        println!("Finished in {seconds:.2}s");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_export_filter_flags() {
        let cli = Cli::try_parse_from([
            "dynamodb-transfer",
            "export",
            "--table",
            "users",
            "--filter-expression",
            "#s = :active",
            "--attribute-names",
            r##"{"#s": "status"}"##,
            "--attribute-values",
            r#"{":active": "ACTIVE"}"#,
        ])
        .unwrap();
        let Commands::Export { filter, .. } = cli.command else {
            panic!("expected export");
        };
        let options = ScanOptions::from(filter);
        assert_eq!(options.filter.expression.as_deref(), Some("#s = :active"));
        assert_eq!(
            options.filter.attribute_values,
            Some(HashMap::from([(":active".to_string(), json!("ACTIVE"))]))
        );
    }

    #[test]
    fn test_import_defaults() {
        let cli =
            Cli::try_parse_from(["dynamodb-transfer", "import", "-t", "users", "-f", "a.json"])
                .unwrap();
        let Commands::Import {
            batch_size,
            dry_run,
            no_overwrite,
            ..
        } = cli.command
        else {
            panic!("expected import");
        };
        assert_eq!(batch_size, 25);
        assert!(!dry_run);
        assert!(!no_overwrite);
    }

    #[rstest]
    #[case::missing_table(&["dynamodb-transfer", "count"])]
    #[case::missing_file(&["dynamodb-transfer", "import", "--table", "users"])]
    #[case::invalid_json(&["dynamodb-transfer", "count", "-t", "a", "--attribute-names", "{"])]
    #[case::unknown_command(&["dynamodb-transfer", "restore"])]
    fn test_rejected_arguments(#[case] args: &[&str]) {
        let error = Cli::try_parse_from(args).unwrap_err();
        assert_eq!(parse_exit_code(error.kind()), 1);
    }

    #[rstest]
    #[case::help(&["dynamodb-transfer", "--help"])]
    #[case::subcommand_help(&["dynamodb-transfer", "export", "--help"])]
    #[case::version(&["dynamodb-transfer", "--version"])]
    fn test_informational_flags_succeed(#[case] args: &[&str]) {
        let error = Cli::try_parse_from(args).unwrap_err();
        assert_eq!(parse_exit_code(error.kind()), 0);
    }
}
