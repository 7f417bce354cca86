//! # gatelog server
//!
//! Records RFID badge taps as attendance sessions. Each tap either opens a
//! session (time in), closes the open one for the same badge and scanner
//! (time out), or is ignored as a duplicate read. Sessions left open are
//! force-closed shortly after local midnight.
//!
//! Storage is PostgreSQL when `DATABASE_URL` is set, otherwise an
//! in-process store seeded with demo records.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use gatelog_core::{
    Clock, DailyResetScheduler, DualRecordStore, HEALTH_CHECK_INTERVAL,
    PostgresRecordStore, RecordStore, SystemClock, VolatileRecordStore,
};
use gatelog_server::{
    AppState, create_app,
    infra::config::{ConfigLoad, ConfigLoader},
};
use tokio::signal::ctrl_c;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Time allowed for in-flight requests after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "gatelog-server")]
#[command(about = "RFID badge access-log server")]
struct Cli {
    /// Path to a gatelog.toml configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a .env file (defaults to ./.env when present)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = cli.config {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = cli.env_file {
        loader = loader.with_env_file(path);
    }
    let ConfigLoad {
        mut config,
        warnings,
    } = loader.load().context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "loaded configuration file");
    }
    for warning in warnings.iter() {
        match &warning.hint {
            Some(hint) => warn!(hint = %hint, "{}", warning.message),
            None => warn!("{}", warning.message),
        }
    }

    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(DualRecordStore::new(Arc::new(
        VolatileRecordStore::with_fixtures(clock.now()),
    )));

    let postgres = match &config.database.url {
        Some(url) => {
            let postgres = PostgresRecordStore::connect(url)
                .await
                .context("failed to connect to PostgreSQL")?;
            postgres
                .migrate()
                .await
                .context("failed to apply database migrations")?;
            let postgres = Arc::new(postgres);
            store.attach_durable(postgres.clone());
            info!("using PostgreSQL record store");
            Some(postgres)
        }
        None => {
            warn!("DATABASE_URL not set; using the in-memory record store");
            None
        }
    };

    let bind_address = config.server.bind_address();
    let environment = config.environment;
    let reset_enabled = config.reset.enabled;
    let state = AppState::new(Arc::new(config), store.clone(), clock.clone())
        .context("failed to initialise application state")?;

    let shutdown = CancellationToken::new();
    let health_monitor = postgres.clone().map(|postgres| {
        postgres.spawn_health_monitor(HEALTH_CHECK_INTERVAL, shutdown.clone())
    });
    let scheduler = if reset_enabled {
        let scheduler =
            Arc::new(DailyResetScheduler::new(store.clone(), clock));
        Some(scheduler.spawn(shutdown.clone()))
    } else {
        info!("daily reset disabled");
        None
    };

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    info!(
        address = %bind_address,
        environment = %environment,
        backend = %store.backend(),
        "server listening"
    );

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("server error")?;
    info!("HTTP server closed");

    shutdown.cancel();
    if let Some(handle) = scheduler
        && let Err(err) = handle.await
    {
        warn!(error = %err, "daily reset task ended abnormally");
    }
    if let Some(handle) = health_monitor
        && let Err(err) = handle.await
    {
        warn!(error = %err, "database health monitor ended abnormally");
    }
    if let Some(postgres) = postgres {
        postgres.close().await;
        info!("database connection closed");
    }

    Ok(())
}

/// Resolves on SIGINT or SIGTERM, then arms a hard exit in case draining
/// in-flight requests stalls.
async fn shutdown_signal(shutdown: CancellationToken) {
    let interrupt = async {
        if let Err(err) = ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("SIGINT received, shutting down gracefully");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("SIGTERM received, shutting down gracefully");
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {},
        _ = terminate => {},
    }

    shutdown.cancel();
    tokio::spawn(async {
        tokio::time::sleep(SHUTDOWN_GRACE).await;
        error!("graceful shutdown timed out; exiting");
        std::process::exit(1);
    });
}
