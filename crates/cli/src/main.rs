// Plugin Check CLI - composition root
// Wires the checks, the SQLite host and the subprocess loader into the orchestrator

mod config;
mod report;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tabled::{Table, Tabled};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use plugin_check_checks::default_registry;
use plugin_check_core::application::constants::DEFAULT_MAX_PARALLEL_STATIC;
use plugin_check_core::application::{
    cancel_channel, CheckCategory, CheckOrchestrator, CheckSelection,
};
use plugin_check_core::port::id_provider::UuidProvider;
use plugin_check_core::port::time_provider::SystemTimeProvider;
use plugin_check_core::port::HostConnector;
use plugin_check_infra_sqlite::{create_pool, run_migrations, SqliteHost};
use plugin_check_infra_system::{discover_plugin, SubprocessPluginLoader};

use crate::config::{VersionSource, DEFAULT_BASE_PREFIX, DEFAULT_HOST_DB, DEFAULT_LOG_FILTER};
use crate::report::{OutputFormat, Report, ReportFilter};

#[derive(Parser)]
#[command(name = "plugin-check")]
#[command(about = "Check a WordPress plugin for common problems", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run checks against a plugin directory or single-file plugin
    Check(CheckArgs),

    /// List the available checks
    ListChecks,
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Plugin directory or main PHP file
    path: PathBuf,

    /// Only run these checks (comma separated slugs)
    #[arg(long, value_delimiter = ',')]
    checks: Vec<String>,

    /// Never run these checks
    #[arg(long, value_delimiter = ',')]
    exclude_checks: Vec<String>,

    /// Only run checks in these categories
    #[arg(long, value_delimiter = ',')]
    categories: Vec<CheckCategory>,

    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Leave warnings out of the report
    #[arg(long)]
    ignore_warnings: bool,

    /// Leave errors out of the report
    #[arg(long)]
    ignore_errors: bool,

    /// Readme parser warning to suppress (replaces the default list)
    #[arg(long = "ignore-readme-warning", value_name = "CODE")]
    ignore_readme_warnings: Vec<String>,

    /// Report every readme parser warning
    #[arg(long, conflicts_with = "ignore_readme_warnings")]
    show_all_readme_warnings: bool,

    /// Host database holding the site options
    #[arg(long, env = "PLUGIN_CHECK_HOST_DB", default_value = DEFAULT_HOST_DB)]
    host_db: String,

    /// Host runner command; runtime checks are skipped without one
    #[arg(long, env = "PLUGIN_CHECK_RUNNER")]
    runner: Option<String>,

    /// Limit for the check phase in seconds
    #[arg(long, env = "PLUGIN_CHECK_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Static checks running at the same time
    #[arg(long, env = "PLUGIN_CHECK_MAX_PARALLEL", default_value_t = DEFAULT_MAX_PARALLEL_STATIC)]
    max_parallel: usize,

    /// Latest WordPress release
    #[arg(long, env = "PLUGIN_CHECK_WP_VERSION")]
    wp_version: Option<String>,

    /// Saved version-check API response (takes precedence over --wp-version)
    #[arg(long, env = "PLUGIN_CHECK_VERSION_CHECK_FILE")]
    version_check_file: Option<PathBuf>,

    /// Recommended PHP version quoted in readme advice (default 7.4)
    #[arg(long, env = "PLUGIN_CHECK_RECOMMENDED_PHP")]
    recommended_php: Option<String>,
}

#[derive(Tabled)]
struct CheckRow {
    slug: String,
    kind: String,
    categories: String,
}

fn init_logging() {
    let log_format =
        std::env::var("PLUGIN_CHECK_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // stdout carries the report
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }
}

async fn connect_host(args: &CheckArgs, runner: &str) -> Result<Arc<dyn HostConnector>> {
    let loader = SubprocessPluginLoader::from_command_line(Arc::new(SystemTimeProvider), runner)
        .context("Invalid runner command")?;

    let url = config::host_database_url(&args.host_db)?;
    info!(host_db = %args.host_db, "Opening host database");
    let pool = create_pool(&url)
        .await
        .context("Host database connection failed")?;
    run_migrations(&pool, DEFAULT_BASE_PREFIX)
        .await
        .context("Host database migration failed")?;

    Ok(Arc::new(SqliteHost::new(
        pool,
        DEFAULT_BASE_PREFIX,
        Arc::new(loader),
    )))
}

async fn run_check(args: CheckArgs) -> Result<ExitCode> {
    let version = VersionSource {
        version_check_file: args.version_check_file.clone(),
        wp_version: args.wp_version.clone(),
        recommended_php: args.recommended_php.clone(),
    };
    let checks_config = config::checks_config(
        &version,
        &args.ignore_readme_warnings,
        args.show_all_readme_warnings,
    )?;
    let registry = default_registry(&checks_config)?;

    let context = discover_plugin(&args.path)
        .with_context(|| format!("Cannot inspect {}", args.path.display()))?;

    let mut selected = registry.select(&CheckSelection {
        include: args.checks.clone(),
        exclude: args.exclude_checks.clone(),
        categories: args.categories.clone(),
    })?;

    let host = match args.runner.as_deref() {
        Some(runner) => Some(connect_host(&args, runner).await?),
        None => {
            // Explicitly requested runtime checks still reach the orchestrator and fail there
            if args.checks.is_empty() {
                let skipped: Vec<String> = selected
                    .iter()
                    .filter(|c| c.is_runtime())
                    .map(|c| c.slug().to_string())
                    .collect();
                if !skipped.is_empty() {
                    warn!(checks = ?skipped, "No runner configured, skipping runtime checks");
                    selected.retain(|c| !c.is_runtime());
                }
            }
            None
        }
    };

    let orchestrator = CheckOrchestrator::new(
        config::orchestrator_config(args.max_parallel, args.timeout_secs),
        host,
        Arc::new(UuidProvider),
    );

    let (cancel_sender, cancel_token) = cancel_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling checks...");
            cancel_sender.cancel();
        }
    });

    let plugin = context.slug().to_string();
    let result = orchestrator
        .run_with_cancel(Arc::new(context), selected, cancel_token)
        .await?;

    let report = Report::new(
        plugin,
        &result,
        ReportFilter {
            ignore_errors: args.ignore_errors,
            ignore_warnings: args.ignore_warnings,
        },
    );
    println!("{}", report.render(args.format)?);
    Ok(ExitCode::from(report.exit_status()))
}

fn list_checks() -> Result<ExitCode> {
    let registry = default_registry(&Default::default())?;
    let rows: Vec<CheckRow> = registry
        .all()
        .iter()
        .map(|c| CheckRow {
            slug: c.slug().to_string(),
            kind: c.kind().label().to_string(),
            categories: c
                .categories()
                .iter()
                .map(|cat| cat.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect();

    println!("{}", "Available checks".cyan().bold());
    println!();
    println!("{}", Table::new(rows));
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Commands::Check(args) => run_check(args).await,
        Commands::ListChecks => list_checks(),
    }
}
