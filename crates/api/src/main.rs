use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio::{net::TcpListener, sync::watch};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use ongil_api::{
    config::Config,
    ephemeral,
    reconcile::{CycleOutcome, Reconciler},
    repos::{PgStatusRepo, PgViewCountRepo, Repos},
    routes,
    services::{JwtVerifier, SessionService},
    state::AppState,
    stores::Stores,
};

#[derive(Parser)]
#[command(name = "ongil-api")]
#[command(about = "ongil view counter, session and presence API")]
struct Args {
    /// Run one reconciliation cycle and exit
    #[arg(long)]
    reconcile_once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = envy::prefixed("ONGIL_").from_env::<Config>()?;

    // Initialize Sentry for error tracking (must be done early, guard must stay alive)
    let _sentry_guard = config.sentry_dsn.as_ref().map(|dsn| {
        sentry::init((
            dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                environment: Some(config.env.clone().into()),
                ..Default::default()
            },
        ))
    });

    // Set up tracing: JSON in production, human-readable otherwise
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.is_production() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init();
    }

    let database = PgPoolOptions::new()
        .max_connections(25)
        .acquire_timeout(config.durable_timeout())
        .connect(&config.database_url)
        .await?;

    let store = ephemeral::open(&config.redis_url, config.store_timeout())?;
    let stores = Stores::new(store.clone());

    let repos = Repos {
        views: Arc::new(PgViewCountRepo::new(database.clone())),
        status: Arc::new(PgStatusRepo::new(database)),
    };

    let reconciler = Arc::new(Reconciler::new(
        stores.views.clone(),
        repos.views.clone(),
        config.durable_timeout(),
    ));

    if args.reconcile_once {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        match reconciler.run_cycle(&shutdown_rx).await? {
            CycleOutcome::Completed(report) => tracing::info!(?report, "reconciliation complete"),
            CycleOutcome::Skipped => tracing::info!("reconciliation already running"),
        }
        return Ok(());
    }

    let session = SessionService::new(stores.revocation.clone(), stores.presence.clone());

    let state = AppState {
        config: config.clone(),
        ephemeral: store,
        repos,
        stores,
        tokens: Arc::new(JwtVerifier::new(&config.jwt_secret)),
        session,
    };

    let reconciler = reconciler.spawn(config.reconcile_interval());

    let app = routes::app(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let an in-flight flush finish its current entity before exiting
    reconciler.shutdown().await;

    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
