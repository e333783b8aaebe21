use anyhow::{Context, Result, bail};
use clap::{Parser, builder::styling};
use dotenvy::dotenv;
use qsub::config::{ConfigPaths, QsubAppConfig};
use qsub::pbs::snapshot::{FileSnapshotProvider, SnapshotProvider, SnapshotStore};
use qsub::qsub::QsubService;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{error, info, warn};

mod logging;
mod routes;

use routes::AppState;

const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::Green.on_default().bold())
    .usage(styling::AnsiColor::Green.on_default().bold())
    .literal(styling::AnsiColor::Cyan.on_default().bold())
    .placeholder(styling::AnsiColor::Cyan.on_default());

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_THREADS: u32 = 1;
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;

#[derive(Parser, Clone)]
#[command(name = "qsub-server")]
#[command(about = "PBS qsub assembler service")]
#[command(styles = STYLES)]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, default_value = DEFAULT_LOG_LEVEL, env = "RUST_LOG")]
    log_level: String,

    /// Hostname or IP address to bind the server to
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    host: String,

    /// Defines the port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Defines the number of threads to use
    #[arg(short, long, default_value_t = DEFAULT_THREADS)]
    threads: u32,

    /// Path to the JSON cluster snapshot written by the collector
    #[arg(short, long, env = "QSUB_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    /// Seconds between snapshot reloads (0 disables reloading)
    #[arg(
        long,
        default_value_t = DEFAULT_REFRESH_INTERVAL_SECS,
        env = "QSUB_REFRESH_INTERVAL_SECS"
    )]
    refresh_interval_secs: u64,

    /// Directory for log files (enables daily rotated file logging)
    #[arg(long, env = "QSUB_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Use JSON format for log files
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    /// Additional config file, applied after the standard locations
    #[arg(short, long, env = "QSUB_CONFIG")]
    config: Option<PathBuf>,

    /// Print the default configuration and exit
    #[arg(long, default_value_t = false)]
    generate_config: bool,
}

fn main() -> Result<()> {
    dotenv().ok();

    let cli = Cli::parse();
    if cli.generate_config {
        print!("{}", QsubAppConfig::generate_default_config());
        return Ok(());
    }

    let file_config = load_file_config(cli.config.as_ref())?;
    let config = merge_cli(&cli, file_config);
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("Invalid configuration: {}", e);
        }
        bail!("Configuration has {} error(s)", errors.len());
    }

    logging::init_logging(
        config.server.logging.log_dir.as_deref(),
        &config.server.log_level,
        config.server.logging.json_logs,
    )?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.threads as usize)
        .enable_all()
        .build()?;

    runtime.block_on(serve(config))
}

fn load_file_config(extra: Option<&PathBuf>) -> Result<QsubAppConfig> {
    let paths = ConfigPaths::new();
    let mut files: Vec<PathBuf> = paths.existing_paths().into_iter().cloned().collect();
    if let Some(extra) = extra {
        if !extra.exists() {
            bail!("Config file {} does not exist", extra.display());
        }
        files.push(extra.clone());
    }
    QsubAppConfig::load_from_files(&files)
}

/// CLI values take precedence over file values when they differ from the defaults
fn merge_cli(cli: &Cli, file_config: QsubAppConfig) -> QsubAppConfig {
    let mut config = file_config;
    let server = &mut config.server;

    if cli.log_level != DEFAULT_LOG_LEVEL {
        server.log_level = cli.log_level.clone();
    }
    if cli.host != DEFAULT_HOST {
        server.host = cli.host.clone();
    }
    if cli.port != DEFAULT_PORT {
        server.port = cli.port;
    }
    if cli.threads != DEFAULT_THREADS {
        server.threads = cli.threads;
    }
    if cli.refresh_interval_secs != DEFAULT_REFRESH_INTERVAL_SECS {
        server.refresh_interval_secs = cli.refresh_interval_secs;
    }
    if let Some(snapshot) = &cli.snapshot {
        server.snapshot_path = Some(snapshot.clone());
    }
    if let Some(log_dir) = &cli.log_dir {
        server.logging.log_dir = Some(log_dir.clone());
    }
    server.logging.json_logs = cli.json_logs || server.logging.json_logs;
    config
}

async fn serve(config: QsubAppConfig) -> Result<()> {
    info!("Starting qsub-server version={}", env!("CARGO_PKG_VERSION"));

    let provider: Option<Arc<dyn SnapshotProvider>> = config
        .server
        .snapshot_path
        .as_ref()
        .map(|path| Arc::new(FileSnapshotProvider::new(path)) as Arc<dyn SnapshotProvider>);

    let store = SnapshotStore::default();
    let ready = match &provider {
        Some(provider) => store.refresh(provider.as_ref()).is_ok(),
        None => {
            warn!("No snapshot configured, serving an empty cluster");
            true
        }
    };

    let state = Arc::new(AppState::new(
        QsubService::standard(config.qsub.clone()),
        store,
        ready,
    ));

    if let Some(provider) = provider
        && config.server.refresh_interval_secs > 0
    {
        let interval = Duration::from_secs(config.server.refresh_interval_secs);
        info!(
            "Reloading snapshot from {} every {}s",
            provider.describe(),
            interval.as_secs()
        );
        tokio::spawn(refresh_task(Arc::clone(&state), provider, interval));
    }

    let app = routes::router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Reload the snapshot periodically; failures keep the previous snapshot
async fn refresh_task(
    state: Arc<AppState>,
    provider: Arc<dyn SnapshotProvider>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately and the initial load already happened
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let state = Arc::clone(&state);
        let provider = Arc::clone(&provider);
        let result = tokio::task::spawn_blocking(move || {
            let loaded = state.store.refresh(provider.as_ref()).is_ok();
            if loaded {
                state.snapshot_ready.store(true, Ordering::Release);
            }
        })
        .await;
        if let Err(e) = result {
            error!("Snapshot refresh task failed: {}", e);
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
