//! Inspect and maintain the fae alerts database.

use clap::{Parser, Subcommand};
use fae_alerts::alert::AlertRecord;
use fae_alerts::clock::{Clock, SystemClock, format_iso8601};
use fae_alerts::config::{AlertsConfig, SchedulerConfig};
use fae_alerts::storage::{AlertStorage, RetryPolicy, SqliteAlertStorage};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Inspect the fae alerts database.
#[derive(Parser)]
#[command(name = "fae-alerts-inspect", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, env = "FAE_ALERTS_CONFIG")]
    config: Option<PathBuf>,

    /// Override the database path from the configuration.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// List stored alerts.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// List alerts stopped while offline.
    Offline,

    /// Remove every stored alert.
    Clear,

    /// Write the default configuration file.
    InitConfig,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("fae_alerts=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(AlertsConfig::default_config_path);
    let config = AlertsConfig::load_or_default(&config_path)?;

    let command = cli.command.unwrap_or(Command::List { json: false });
    if let Command::InitConfig = command {
        config.save_to_file(&config_path)?;
        info!(path = %config_path.display(), "configuration written");
        return Ok(());
    }

    let db_path = cli.db.unwrap_or_else(|| config.storage.database_path.clone());
    let mut storage = SqliteAlertStorage::new(&db_path).with_retry_policy(
        RetryPolicy::default().with_max_attempts(config.storage.open_retry_attempts),
    );
    storage.open()?;
    info!(path = %db_path.display(), "opened alerts database");

    match command {
        Command::List { json } => list_alerts(&mut storage, &config.scheduler, json),
        Command::Offline => list_offline(&mut storage),
        Command::Clear => {
            storage.clear_database()?;
            println!("cleared {}", db_path.display());
            Ok(())
        }
        Command::InitConfig => Ok(()),
    }
}

/// One stored alert as printed by `list --json`.
#[derive(Serialize)]
struct ListedAlert<'a> {
    #[serde(flatten)]
    record: &'a AlertRecord,
    past_due: bool,
}

fn list_alerts(
    storage: &mut SqliteAlertStorage,
    scheduler: &SchedulerConfig,
    json: bool,
) -> anyhow::Result<()> {
    let records = storage.load()?;
    let now = SystemClock.now()?;
    let limit = i64::try_from(scheduler.past_due_limit_secs).unwrap_or(i64::MAX);
    if json {
        println!("{}", to_json(&records, now, limit)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("no alerts");
        return Ok(());
    }

    for record in &records {
        println!("{}", describe(record, now, limit));
    }
    Ok(())
}

fn is_past_due(record: &AlertRecord, now: i64, past_due_limit: i64) -> bool {
    record.scheduled_time.saturating_add(past_due_limit) < now
}

fn to_json(records: &[AlertRecord], now: i64, past_due_limit: i64) -> serde_json::Result<String> {
    let listed: Vec<ListedAlert<'_>> = records
        .iter()
        .map(|record| ListedAlert {
            record,
            past_due: is_past_due(record, now, past_due_limit),
        })
        .collect();
    serde_json::to_string_pretty(&listed)
}

fn describe(record: &AlertRecord, now: i64, past_due_limit: i64) -> String {
    let when = format_iso8601(record.scheduled_time)
        .unwrap_or_else(|_| record.scheduled_time.to_string());
    let overdue = if is_past_due(record, now, past_due_limit) {
        " (past due)"
    } else {
        ""
    };
    let label = record.label.as_deref().unwrap_or("-");
    format!(
        "{:<36} {:<9} {:<10} {when}{overdue}  {label}",
        record.token,
        record.alert_type.as_str(),
        record.state.as_str()
    )
}

fn list_offline(storage: &mut SqliteAlertStorage) -> anyhow::Result<()> {
    let offline = storage.load_offline_alerts()?;
    if offline.is_empty() {
        println!("no offline-stopped alerts");
    }
    for alert in &offline {
        let scheduled = format_iso8601(alert.scheduled_time)?;
        let stopped = format_iso8601(alert.event_time)?;
        println!("{:<36} scheduled {scheduled} stopped {stopped}", alert.token);
    }
    Ok(())
}
