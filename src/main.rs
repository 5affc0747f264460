use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use stevedore_sync::application::events::SyncEvent;
use stevedore_sync::application::ports::local_store::{LocalStore, ResponseCacheStore};
use stevedore_sync::application::ports::server_api::ServerApi;
use stevedore_sync::application::services::{Maintenance, SyncOrchestrator, SyncRun};
use stevedore_sync::domain::entities::SyncTrigger;
use stevedore_sync::infrastructure::http::RestClient;
use stevedore_sync::infrastructure::store::{ConnectionPool, SqliteLocalStore};
use stevedore_sync::infrastructure::worker::connectivity::spawn_probe;
use stevedore_sync::infrastructure::worker::{Connectivity, EventBus, SyncScheduler};
use stevedore_sync::shared::clock::SystemClock;
use stevedore_sync::shared::{AppConfig, logging};
use tracing::info;

#[derive(Parser)]
#[command(name = "stevedore-sync")]
#[command(about = "Offline sync worker for the stevedoring operations dashboard", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "stevedore_sync=debug,info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,

    /// Override the local store location
    #[arg(long, env = "STEVEDORE_DATABASE_URL")]
    database_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the background sync worker until interrupted
    Run {
        /// Seconds between connectivity probes
        #[arg(long, default_value_t = 15)]
        probe_interval: u64,
    },
    /// Run one manual sync cycle
    Sync,
    /// Print queue and cache counts
    Status,
    /// Move failed changes back to pending
    RetryFailed {
        #[arg(long)]
        id: Option<i64>,
    },
    /// Drop failed changes
    ClearFailed {
        #[arg(long)]
        id: Option<i64>,
    },
}

struct Runtime {
    config: AppConfig,
    store: Arc<SqliteLocalStore>,
    server: Arc<RestClient>,
    orchestrator: Arc<SyncOrchestrator>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.json_logs);
    info!("Starting stevedore-sync v{}", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::from_env();
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }
    config
        .validate()
        .map_err(|reason| anyhow!("invalid configuration: {reason}"))?;

    let runtime = build_runtime(config).await?;
    match cli.command {
        Commands::Run { probe_interval } => run_worker(runtime, probe_interval).await?,
        Commands::Sync => {
            match runtime.orchestrator.run_cycle(SyncTrigger::Manual).await? {
                SyncRun::Completed(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                SyncRun::AlreadyRunning => println!("sync already running"),
            }
        }
        Commands::Status => {
            if !runtime.store.health_check().await? {
                return Err(anyhow!("local store is not responding"));
            }
            let status = runtime.orchestrator.status().await?;
            let cached = runtime.store.cached_count().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            println!("cached responses: {cached}");
        }
        Commands::RetryFailed { id } => {
            let count = runtime.orchestrator.retry_failed(id).await?;
            println!("requeued {count} change(s)");
        }
        Commands::ClearFailed { id } => {
            let count = runtime.orchestrator.clear_failed(id).await?;
            println!("cleared {count} change(s)");
        }
    }

    Ok(())
}

async fn build_runtime(config: AppConfig) -> Result<Runtime> {
    let pool = ConnectionPool::open(&config.database.url, config.database.max_connections)
        .await
        .context("failed to open local store")?;
    let store = Arc::new(SqliteLocalStore::new(pool));
    let server = Arc::new(RestClient::new(&config.server)?);

    let orchestrator = SyncOrchestrator::new(
        Arc::clone(&store) as Arc<dyn LocalStore>,
        Arc::clone(&server) as Arc<dyn ServerApi>,
        Connectivity::default(),
        EventBus::<SyncEvent>::default(),
        config.sync.clone(),
    );

    Ok(Runtime {
        config,
        store,
        server,
        orchestrator,
    })
}

async fn run_worker(runtime: Runtime, probe_interval: u64) -> Result<()> {
    let Runtime {
        config,
        store,
        server,
        orchestrator,
    } = runtime;

    let probe = spawn_probe(
        orchestrator.connectivity().clone(),
        server as Arc<dyn ServerApi>,
        Duration::from_secs(probe_interval.max(1)),
    );

    let maintenance = Arc::new(Maintenance::new(
        Arc::clone(&store) as Arc<dyn LocalStore>,
        Arc::new(SystemClock),
        config.cache.clone(),
        config.retention.clone(),
    ));

    let mut events = orchestrator.events().subscribe();
    let reporter = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let SyncEvent::ChangeFailed {
                change_id,
                error,
                frozen: true,
            } = event
            {
                tracing::warn!(change_id, error = %error, "change moved to failed");
            }
        }
    });

    let scheduler = SyncScheduler::new(Arc::clone(&orchestrator))
        .with_maintenance(
            maintenance,
            Duration::from_secs(config.retention.maintenance_interval),
        )
        .spawn();

    info!("Worker running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    scheduler.shutdown().await;
    probe.abort();
    reporter.abort();
    store.close().await;
    Ok(())
}
