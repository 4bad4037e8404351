//! Fluent DB - command line entry point.
//!
//! Runs one SQL command against a resolved connection and prints the result
//! as JSON on stdout.

use clap::Parser;
use fluent_db::config::{Config, Mode};
use fluent_db::models::TableJson;
use serde_json::json;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn run(config: &Config) -> fluent_db::Result<serde_json::Value> {
    let context = config.build_context()?;
    let provider = config.effective_provider(&context);
    let params = config.parse_params()?;

    let mut command = context
        .get_command(config.database.as_deref(), provider.as_deref())
        .await?
        .set_command_text(config.sql.as_str());
    for param in params {
        command = command.add_parameter(param.name, param.value, param.db_type);
    }

    context.hooks().add_pre_execute(|cmd| {
        debug!(
            sql = %cmd.command_text(),
            params = cmd.parameters().len(),
            "Executing"
        );
    });

    let output = match config.mode {
        Mode::Scalar => command.execute_scalar(false).await?.to_json(),
        Mode::NonQuery => json!({ "rows_affected": command.execute_non_query(false).await? }),
        Mode::Query => {
            let table = command.execute_to_data_table(false).await?;
            serde_json::to_value(TableJson::from(&table))?
        }
        Mode::DataSet => {
            let set = command.execute_to_data_set(false).await?;
            let tables: Vec<TableJson> = set.tables.iter().map(TableJson::from).collect();
            serde_json::to_value(tables)?
        }
    };
    Ok(output)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    info!(mode = %config.mode, "Starting fluent-db v{}", env!("CARGO_PKG_VERSION"));

    match run(&config).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Command failed");
            Err(e.into())
        }
    }
}
