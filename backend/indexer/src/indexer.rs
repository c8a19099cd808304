//! Long-running background task that polls the Soroban RPC and writes
//! decoded ChainCred events to the database.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::db;
use crate::errors::Result;
use crate::rpc;

pub struct IndexerState {
    pub pool: SqlitePool,
    pub config: Config,
    pub client: Client,
}

/// Run the indexer loop until `shutdown` is cancelled.
pub async fn run(state: Arc<IndexerState>, shutdown: CancellationToken) {
    info!("Indexer starting for contract {}", state.config.contract_id);

    let (mut current_ledger, mut cursor) = match resume_point(&state).await {
        Ok(point) => point,
        Err(e) => {
            error!("Could not read indexer cursor, starting from config: {e}");
            (state.config.start_ledger, None)
        }
    };
    info!("Resuming from ledger {current_ledger}");

    let interval = Duration::from_secs(state.config.poll_interval_secs);
    loop {
        let polled = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            polled = poll_once(&state, current_ledger, cursor.as_deref()) => polled,
        };

        match polled {
            Ok((next_ledger, next_cursor)) => {
                current_ledger = next_ledger;
                cursor = next_cursor;
            }
            Err(e) => error!("Indexer poll error: {e}"),
        }

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!("Indexer stopped at ledger {current_ledger}");
}

/// The saved cursor wins over `START_LEDGER` once anything has been indexed.
async fn resume_point(state: &IndexerState) -> Result<(u32, Option<String>)> {
    let last_ledger = db::get_last_ledger(&state.pool).await?;
    let cursor = db::get_cursor_string(&state.pool).await?;
    let ledger = if last_ledger > 0 {
        last_ledger as u32
    } else {
        state.config.start_ledger
    };
    Ok((ledger, cursor))
}

/// Perform a single poll iteration.
///
/// Returns `(next_start_ledger, next_cursor)`.
async fn poll_once(
    state: &IndexerState,
    start_ledger: u32,
    cursor: Option<&str>,
) -> Result<(u32, Option<String>)> {
    let config = &state.config;
    let (raw_events, next_cursor, latest_ledger) = rpc::fetch_events(
        &state.client,
        &config.rpc_url,
        &config.contract_id,
        start_ledger,
        cursor,
        config.events_per_page,
    )
    .await?;

    if !raw_events.is_empty() {
        let decoded = rpc::decode_events(&raw_events, &config.contract_id);
        let inserted = db::insert_events(&state.pool, &decoded).await?;
        info!(
            "Polled {} raw events → {} new records stored",
            raw_events.len(),
            inserted
        );
    }

    let next_ledger = scanned_through(
        start_ledger,
        raw_events.len(),
        config.events_per_page,
        raw_events.last().and_then(|e| e.ledger),
        latest_ledger,
    );

    db::save_cursor(&state.pool, next_ledger as i64, next_cursor.as_deref()).await?;

    Ok((next_ledger, next_cursor))
}

/// Last ledger a poll has fully covered; this is the watermark reported to
/// verifiers and the restart point when no cursor is saved.
///
/// A short page reached the head, so everything up to `latest_ledger` is in.
/// A full page may have stopped part-way through its last event's ledger, so
/// only the ledger before it counts. The value never moves backwards.
fn scanned_through(
    start_ledger: u32,
    page_len: usize,
    limit: u32,
    last_event_ledger: Option<u64>,
    latest_ledger: Option<u64>,
) -> u32 {
    let reached = if page_len < limit as usize {
        latest_ledger
    } else {
        last_event_ledger.map(|l| l.saturating_sub(1))
    };
    reached
        .map(|l| u32::try_from(l).unwrap_or(u32::MAX).max(start_ledger))
        .unwrap_or(start_ledger)
}
