use chrono::Utc;
use clap::Parser;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use listing_watch::db::{self, store::DbListingStore};
use listing_watch::monitoring::{CycleOrchestrator, HttpProber};
use listing_watch::notifications::NotificationService;
use listing_watch::server::config::MonitorConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Run a single check cycle and exit
    #[arg(long)]
    once: bool,
}

fn init_logging(log_dir: &str) {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "listing-watch.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sea_orm=warn,sqlx::query=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

/// SQLite will not create missing parent directories on its own.
fn ensure_sqlite_dir(database_url: &str) -> std::io::Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let file = rest.split('?').next().unwrap_or_default();
    if file.is_empty() || file.starts_with(":memory:") {
        return Ok(());
    }
    match Path::new(file).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let config = MonitorConfig::load(args.config.as_deref())?;
    init_logging(&config.log_dir);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        interval_seconds = config.check_interval_seconds,
        worker_pool_size = config.worker_pool_size,
        batch_size = config.batch_size,
        strong_failure_threshold = config.strong_failure_threshold,
        weak_failure_threshold = config.weak_failure_threshold,
        systemic_failure_ratio = config.systemic_failure_ratio,
        "Starting listing-watch."
    );
    if config.telegram_bot_token.is_empty() {
        warn!("TELEGRAM_BOT_TOKEN is not set. Telegram notifications will fail until it is configured.");
    }

    ensure_sqlite_dir(&config.database_url)?;
    let mut opt = ConnectOptions::new(config.database_url.clone());
    opt.max_connections(5).sqlx_logging(false);
    let db_conn: DatabaseConnection = Database::connect(opt).await?;
    db::ensure_schema(&db_conn).await?;

    let prober = Arc::new(HttpProber::new(&config.user_agent)?);
    let store = Arc::new(DbListingStore::new(db_conn));
    let notifications = Arc::new(NotificationService::new(
        &config.telegram_api_base,
        config.telegram_bot_token.clone(),
    ));
    let orchestrator = Arc::new(CycleOrchestrator::new(
        &config,
        prober,
        store,
        notifications,
    ));

    if args.once {
        let report = orchestrator.run_cycle(Utc::now()).await?;
        info!(
            aborted = report.aborted,
            total_probed = report.total_probed,
            total_failed = report.total_failed,
            quarantine_active = report.quarantine.active,
            "Single check cycle complete."
        );
        return Ok(());
    }

    let periodic = tokio::spawn(
        orchestrator
            .clone()
            .start_periodic_cycles(config.check_interval()),
    );

    tokio::select! {
        result = periodic => {
            if let Err(e) = result {
                error!(error = %e, "Periodic check task stopped unexpectedly.");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Stopping listing-watch.");
        }
    }

    Ok(())
}
