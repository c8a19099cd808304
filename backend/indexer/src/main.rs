//! ChainCred backend entry point.
//!
//! Starts a background indexer task that polls Soroban `getEvents` RPC for
//! ChainCred registry events and persists them to SQLite. Alongside it, an
//! Axum REST API serves credential views to verifiers, pins credential
//! metadata, and relays signed transactions in two phases (submit, then
//! await finalization).

mod api;
mod config;
mod db;
mod errors;
mod events;
mod indexer;
mod ledger;
mod metadata;
mod rpc;
mod view;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use indexer::IndexerState;
use ledger::Relay;
use metadata::{MemoryStore, PinataStore, Store};
use view::Links;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG controls verbosity.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Optional .env file.
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    let pool = db::init_pool(&config.database_url).await?;

    // Shared by the indexer, the relay and the metadata gateway.
    let client = Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let store = match &config.pinata_jwt {
        Some(jwt) => Store::Pinata(PinataStore::new(
            client.clone(),
            config.pinata_api_url.clone(),
            jwt.clone(),
            config.gateway_url.clone(),
        )),
        None => {
            warn!("PINATA_JWT not set; credential metadata is kept in memory only");
            Store::Memory(MemoryStore::new())
        }
    };

    let relay = Relay::new(
        client.clone(),
        config.rpc_url.clone(),
        Duration::from_secs(config.tx_poll_interval_secs),
        Duration::from_secs(config.tx_timeout_secs),
    );

    let shutdown = CancellationToken::new();

    // ─── Background indexer ───────────────────────────────
    let indexer_state = Arc::new(IndexerState {
        pool: pool.clone(),
        config: config.clone(),
        client,
    });
    let indexer_task = tokio::spawn(indexer::run(indexer_state, shutdown.clone()));

    // ─── REST API ─────────────────────────────────────────
    let api_state = Arc::new(api::ApiState {
        pool,
        store,
        relay,
        links: Links {
            app_url: config.app_url.clone(),
            explorer_url: config.explorer_url.clone(),
        },
        gateway_url: config.gateway_url.clone(),
        network: config.network.clone(),
        tx_timeout: Duration::from_secs(config.tx_timeout_secs),
    });

    let app = api::router(api_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
            info!("Shutdown requested");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    indexer_task.await?;
    Ok(())
}
