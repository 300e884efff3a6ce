mod config;
mod logging;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use pgseed_core::{
    Error as CoreError, LoadReport, MemorySession, ResetReport, TierSummary, load, plan_load,
    plan_reset, redact_connection_string, reset, reset_and_load,
};
use pgseed_datasets::DatasetName;
use pgseed_postgres::{ConnectOptions, connect};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use config::{ConfigError, Manifest, load_manifests};
use logging::{LogFormat, init_logging};

#[derive(Debug, Error)]
enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("logging error: {0}")]
    Logging(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Parser, Debug)]
#[command(name = "pgseed", version, about = "Reset and seed Postgres datasets")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Base connection string; its database is replaced by each manifest target.
    #[arg(long, env = "DATABASE_URL", global = true, value_name = "CONNECTION_STRING")]
    url: Option<String>,
    #[arg(long, global = true, default_value_t = 10)]
    acquire_timeout_secs: u64,
    /// Server-side statement timeout.
    #[arg(long, global = true)]
    statement_timeout_secs: Option<u64>,
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drop and recreate the dataset's tables in every configured database.
    Setup(SetupArgs),
    /// Insert the dataset's fixture rows into the first configured database.
    Seed(SeedArgs),
    /// Print the reset orders and load tiers without touching a database.
    Plan(PlanArgs),
}

#[derive(Args, Debug)]
struct SetupArgs {
    #[arg(long)]
    dataset: DatasetName,
    /// Schema config with one manifest or a list of them.
    #[arg(short, long, env = "SCHEMA")]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SeedArgs {
    #[arg(long)]
    dataset: DatasetName,
    #[arg(short, long, env = "SCHEMA")]
    config: Option<PathBuf>,
    /// Reset the tables first, in the same transaction as the load.
    #[arg(long, default_value_t = false)]
    reset: bool,
    /// Load into an in-memory destination and report what would happen.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct PlanArgs {
    #[arg(long)]
    dataset: DatasetName,
}

#[derive(Debug, Serialize)]
struct PlanOutput {
    dataset: DatasetName,
    drop_order: Vec<String>,
    create_order: Vec<String>,
    tiers: Vec<TierSummary>,
}

#[derive(Debug, Serialize)]
struct SeedOutput {
    dataset: DatasetName,
    database: String,
    dry_run: bool,
    reset: Option<ResetReport>,
    load: LoadReport,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_logging(cli.global.log_format, &cli.global.log_level).map_err(CliError::Logging)?;

    let run_id = Uuid::new_v4().to_string();
    let started_at = chrono::Utc::now();
    let command = match &cli.command {
        Command::Setup(_) => "setup",
        Command::Seed(_) => "seed",
        Command::Plan(_) => "plan",
    };
    tracing::info!(
        event = "run_started",
        run_id = %run_id,
        command,
        started_at = %started_at.to_rfc3339()
    );

    let timer = Instant::now();
    let result = match cli.command {
        Command::Setup(args) => run_setup(&cli.global, args).await,
        Command::Seed(args) => run_seed(&cli.global, args).await,
        Command::Plan(args) => run_plan(args),
    };

    let duration_ms = timer.elapsed().as_millis();
    match &result {
        Ok(()) => {
            tracing::info!(event = "run_finished", run_id = %run_id, status = "success", duration_ms)
        }
        Err(err) => tracing::error!(
            event = "run_finished",
            run_id = %run_id,
            status = "failed",
            duration_ms,
            error = %err
        ),
    }
    result
}

async fn run_setup(global: &GlobalArgs, args: SetupArgs) -> Result<(), CliError> {
    let dataset = args.dataset.dataset();
    let manifests = load_manifests(args.config.as_deref())?;
    let base_url = base_url(global)?;

    for manifest in &manifests {
        let mut session = open_target(global, base_url, manifest)?;
        let report = reset(&mut session, &dataset.definitions).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

async fn run_seed(global: &GlobalArgs, args: SeedArgs) -> Result<(), CliError> {
    let dataset = args.dataset.dataset();
    let fixtures = args.dataset.fixtures();

    let output = if args.dry_run {
        // The in-memory destination starts empty, so it always needs a reset.
        let mut session = MemorySession::new();
        let (reset_report, load_report) =
            reset_and_load(&mut session, &dataset.definitions, fixtures).await?;
        SeedOutput {
            dataset: args.dataset,
            database: "memory".to_string(),
            dry_run: true,
            reset: args.reset.then_some(reset_report),
            load: load_report,
        }
    } else {
        let manifests = load_manifests(args.config.as_deref())?;
        // Only the first manifest is seeded; the rest are reset by `setup`.
        let manifest = manifests.first().ok_or(ConfigError::Empty)?;
        let mut session = open_target(global, base_url(global)?, manifest)?;

        let (reset_report, load_report) = if args.reset {
            let (reset_report, load_report) =
                reset_and_load(&mut session, &dataset.definitions, fixtures).await?;
            (Some(reset_report), load_report)
        } else {
            (None, load(&mut session, &dataset.definitions, fixtures).await?)
        };

        SeedOutput {
            dataset: args.dataset,
            database: manifest.target_database().to_string(),
            dry_run: false,
            reset: reset_report,
            load: load_report,
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_plan(args: PlanArgs) -> Result<(), CliError> {
    let dataset = args.dataset.dataset();
    let reset_plan = plan_reset(&dataset.definitions)?;
    let load_plan = plan_load(&dataset.definitions, args.dataset.fixtures())?;

    let output = PlanOutput {
        dataset: args.dataset,
        drop_order: reset_plan.drop_order,
        create_order: reset_plan.create_order,
        tiers: load_plan.summary(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn base_url(global: &GlobalArgs) -> Result<&str, CliError> {
    global
        .url
        .as_deref()
        .ok_or_else(|| CliError::InvalidConfig("set --url or DATABASE_URL".to_string()))
}

fn open_target(
    global: &GlobalArgs,
    base_url: &str,
    manifest: &Manifest,
) -> Result<pgseed_postgres::PgSession, CliError> {
    let database = manifest.target_database();
    let connection = redact_connection_string(base_url);
    tracing::info!(
        event = "target_resolved",
        index = %manifest.index,
        database,
        url = %connection.redacted
    );

    let options = ConnectOptions {
        acquire_timeout: Duration::from_secs(global.acquire_timeout_secs),
        statement_timeout: global.statement_timeout_secs.map(Duration::from_secs),
        ..ConnectOptions::default()
    };
    Ok(connect(base_url, database, &options)?)
}
