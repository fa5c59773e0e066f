//! confdb CLI Entry Point
//!
//! Subcommands:
//! - `settings` - Read and modify a settings file
//! - `query` - Open a connection, run one query, disconnect
//! - `feature` - Check a feature flag
//!
//! All output to stdout is JSON-only. Logs go to stderr.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing::Level;

use confdb::engine::DEFAULT_TIMEOUT_SECS;
use confdb::settings::default_settings_path;
use confdb::{
    create_db_connection, is_feature_enabled, ConfdbError, ConfigParams, ConfigStore,
    ErrorEnvelope, Metadata, SettingsManager, SuccessEnvelope, APP_VERSION,
};

/// confdb - settings store and managed database connections
#[derive(Parser)]
#[command(name = "confdb")]
#[command(about = "Bounded settings store and managed database connection handles")]
#[command(version)]
struct Cli {
    /// Log debug output to stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read and modify application settings
    Settings(SettingsArgs),

    /// Run a single query (SQLite: host is the database path)
    Query(QueryArgs),

    /// Check whether a feature flag is enabled
    Feature {
        /// Feature name
        name: String,
    },
}

#[derive(Args)]
struct SettingsArgs {
    /// Application name (selects the default settings file)
    #[arg(long)]
    app: String,

    /// Settings file to use instead of the default location
    #[arg(long)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    action: SettingsAction,
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the value of a key
    Get { key: String },
    /// Set a key and save the file
    Set { key: String, value: String },
    /// Check whether a key exists
    Has { key: String },
    /// Remove a key and save the file
    Remove { key: String },
    /// Print all settings
    List,
}

#[derive(Args)]
struct QueryArgs {
    /// Database host (SQLite: file path or :memory:)
    #[arg(long)]
    host: String,

    /// Database port
    #[arg(long, default_value_t = 1)]
    port: u16,

    /// Username
    #[arg(long)]
    user: Option<String>,

    /// Timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// SQL to execute
    sql: String,
}

/// Command output: data plus the row count for query results
type Outcome = confdb::Result<(Value, Option<usize>)>;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    tracing::debug!(version = APP_VERSION, "starting");

    let start = Instant::now();
    let (command, outcome) = match cli.command {
        Commands::Settings(args) => ("settings", run_settings(args)),
        Commands::Query(args) => ("query", run_query(args)),
        Commands::Feature { name } => ("feature", Ok(run_feature(&name))),
    };
    let execution_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    let ok = outcome.is_ok();
    let rendered = match outcome {
        Ok((data, rows)) => {
            let meta = rows.map_or_else(
                || Metadata::new(execution_ms),
                |n| Metadata::with_rows(execution_ms, n),
            );
            serde_json::to_string(&SuccessEnvelope::new(command, data, meta))
        }
        Err(err) => serde_json::to_string(&ErrorEnvelope::from_error(command, &err)),
    }
    .context("Failed to serialize output")?;

    writeln!(io::stdout().lock(), "{rendered}").context("Failed to write output")?;

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn init_logging(debug: bool) {
    tracing_subscriber::fmt().with_max_level(log_level(debug)).with_writer(io::stderr).init();
}

/// Maximum level written to stderr
fn log_level(debug: bool) -> Level {
    if debug {
        Level::DEBUG
    } else {
        Level::WARN
    }
}

fn run_settings(args: SettingsArgs) -> Outcome {
    let path = match args.file {
        Some(path) => path,
        None => default_settings_path(&args.app)?,
    };
    let mut settings = open_settings(&args.app, &path)?;

    let data = match args.action {
        SettingsAction::Get { key } => {
            json!({ "key": key, "value": settings.setting(&key), "found": settings.has_setting(&key) })
        }
        SettingsAction::Has { key } => json!({ "key": key, "found": settings.has_setting(&key) }),
        SettingsAction::Set { key, value } => {
            settings.set_setting(key.clone(), value.clone())?;
            settings.save_config_to(&path)?;
            // lossy: paths need not be UTF-8
            json!({ "key": key, "value": value, "saved_to": path.display().to_string() })
        }
        SettingsAction::Remove { key } => {
            let removed = settings.remove_setting(&key);
            if removed.is_some() {
                settings.save_config_to(&path)?;
            }
            json!({ "key": key, "removed": removed.is_some() })
        }
        SettingsAction::List => {
            let entries: serde_json::Map<String, Value> =
                settings.iter().map(|(k, v)| (k.to_string(), Value::from(v))).collect();
            json!({ "app": settings.app_name(), "count": settings.len(), "settings": entries })
        }
    };

    Ok((data, None))
}

/// Load `path` if it exists, otherwise start empty
fn open_settings(app: &str, path: &Path) -> confdb::Result<SettingsManager> {
    let mut settings = SettingsManager::new(app);
    if path.exists() {
        settings.load_config(path)?;
    }
    Ok(settings)
}

fn run_query(args: QueryArgs) -> Outcome {
    let params = ConfigParams::new(args.host, args.port)
        .with_credentials(args.user.unwrap_or_default(), String::new())
        .with_timeout(args.timeout);

    let conn = create_db_connection(params);
    conn.connect_with_params()?;

    let connection = conn.connection_string();
    let result = conn.execute_query(&args.sql);
    conn.disconnect();

    let result = result?;
    let rows = result.rows.len();
    let data = serde_json::to_value(&result)
        .map_err(|e| ConfdbError::query_failed(format!("Could not encode result: {e}")))?;

    Ok((json!({ "connection": connection, "result": data }), Some(rows)))
}

fn run_feature(name: &str) -> (Value, Option<usize>) {
    (json!({ "feature": name, "enabled": is_feature_enabled(name) }), None)
}
