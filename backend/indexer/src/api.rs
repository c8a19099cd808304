//! Axum REST API handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::warn;

use crate::db;
use crate::errors::{IndexerError, Result};
use crate::events::EventRecord;
use crate::ledger::{Receipt, Relay};
use crate::metadata::{ContentPointer, CredentialMetadata, MetadataStore, Store};
use crate::view::{self, CredentialView, Links};

pub struct ApiState {
    pub pool: SqlitePool,
    pub store: Store,
    pub relay: Relay,
    pub links: Links,
    pub gateway_url: String,
    pub network: String,
    /// Upper bound on one `GET /transactions/:hash` wait.
    pub tx_timeout: Duration,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/events", get(get_all_events))
        .route("/credentials/:id", get(get_credential))
        .route("/credentials/:id/events", get(get_credential_events))
        .route("/universities/:address/events", get(get_university_events))
        .route("/students/:address/credentials", get(get_student_credentials))
        .route("/metadata", post(upload_metadata))
        .route("/metadata/:cid", get(get_metadata))
        .route("/transactions", post(submit_transaction))
        .route("/transactions/:hash", get(get_transaction))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct EventsResponse {
    pub subject: String,
    pub count: usize,
    pub events: Vec<EventRecord>,
}

#[derive(Serialize)]
pub struct AllEventsResponse {
    pub count: usize,
    pub events: Vec<EventRecord>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub network: String,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub cid: String,
    pub uri: String,
    pub url: String,
}

#[derive(Deserialize)]
pub struct SubmitRequest {
    pub envelope_xdr: String,
}

#[derive(Deserialize, Default)]
pub struct SubmitParams {
    /// Also run phase 2 before answering.
    #[serde(default)]
    pub wait: bool,
}

#[derive(Serialize)]
pub struct PendingResponse {
    pub hash: String,
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for IndexerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!("Request failed: {self}");
        }
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

fn events_response(subject: String, events: Vec<EventRecord>) -> Json<EventsResponse> {
    Json(EventsResponse {
        subject,
        count: events.len(),
        events,
    })
}

fn credential_id(raw: &str) -> Result<String> {
    raw.parse::<u64>()
        .map(|id| id.to_string())
        .map_err(|_| IndexerError::InvalidInput(format!("credential id must be an integer: {raw:?}")))
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        network: state.network.clone(),
    })
}

/// `GET /events`
pub async fn get_all_events(State(state): State<Arc<ApiState>>) -> Result<impl IntoResponse> {
    let events = db::get_all_events(&state.pool).await?;
    Ok(Json(AllEventsResponse {
        count: events.len(),
        events,
    }))
}

/// `GET /credentials/:id`
///
/// Verifier view of one credential. An unknown id is a normal answer
/// (`status: "not_found"`), not an error; `indexed_through` says how far
/// the ledger has been scanned, so a client can tell "not issued" from
/// "not indexed yet".
pub async fn get_credential(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<CredentialView>> {
    let id = credential_id(&id)?;
    // Watermark first: every event up to it is already in the table.
    let indexed_through = db::get_last_ledger(&state.pool).await?;
    let history = db::get_events_for_credential(&state.pool, &id).await?;
    let view =
        view::credential_view(&state.store, &id, &history, indexed_through, &state.links).await;
    Ok(Json(view))
}

/// `GET /credentials/:id/events`
pub async fn get_credential_events(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = credential_id(&id)?;
    let events = db::get_events_for_credential(&state.pool, &id).await?;
    Ok(events_response(id, events))
}

/// `GET /universities/:address/events`
pub async fn get_university_events(
    State(state): State<Arc<ApiState>>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse> {
    let events = db::get_events_for_university(&state.pool, &address).await?;
    Ok(events_response(address, events))
}

/// `GET /students/:address/credentials`
///
/// Issuance events for the student; fetch each id's view for current status.
pub async fn get_student_credentials(
    State(state): State<Arc<ApiState>>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse> {
    let events = db::get_issued_for_student(&state.pool, &address).await?;
    Ok(events_response(address, events))
}

/// `POST /metadata`
pub async fn upload_metadata(
    State(state): State<Arc<ApiState>>,
    Json(doc): Json<CredentialMetadata>,
) -> Result<impl IntoResponse> {
    let pointer = state.store.put(&doc).await?;
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            cid: pointer.cid().to_string(),
            uri: pointer.uri(),
            url: pointer.gateway_url(&state.gateway_url),
        }),
    ))
}

/// `GET /metadata/:cid`
pub async fn get_metadata(
    State(state): State<Arc<ApiState>>,
    Path(cid): Path<String>,
) -> Result<Json<CredentialMetadata>> {
    let pointer = ContentPointer::parse(&cid)?;
    state
        .store
        .get(&pointer)
        .await?
        .map(Json)
        .ok_or_else(|| IndexerError::MetadataUnavailable(pointer.cid().to_string()))
}

/// `POST /transactions[?wait=true]`
///
/// Phase 1: `202 Accepted` means "queued for ordering", not "applied".
/// With `wait=true` the handler also awaits finalization and answers like
/// `GET /transactions/:hash`.
pub async fn submit_transaction(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<SubmitParams>,
    Json(req): Json<SubmitRequest>,
) -> Response {
    let handle = match state.relay.submit(&req.envelope_xdr).await {
        Ok(handle) => handle,
        Err(e) => return e.into_response(),
    };
    if !params.wait {
        return (StatusCode::ACCEPTED, Json(handle)).into_response();
    }
    finalization_response(state.relay.await_finalization(&handle).await)
}

/// `GET /transactions/:hash`
///
/// Phase 2: waits up to the configured timeout. A still-pending
/// transaction answers `202` so the client can ask again.
pub async fn get_transaction(
    State(state): State<Arc<ApiState>>,
    Path(hash): Path<String>,
) -> Response {
    finalization_response(
        state
            .relay
            .await_finalization_within(&hash, state.tx_timeout)
            .await,
    )
}

fn finalization_response(outcome: Result<Receipt>) -> Response {
    match outcome {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(IndexerError::StillPending(hash)) => (
            StatusCode::ACCEPTED,
            Json(PendingResponse {
                hash,
                status: "pending",
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use reqwest::Client;
    use serde_json::Value;
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;
    use crate::events::{CredentialEvent, EventKind};
    use crate::metadata::MemoryStore;

    async fn state() -> Arc<ApiState> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        db::migrate(&pool).await.unwrap();

        let client = Client::builder()
            .timeout(Duration::from_secs(1))
            .build()
            .unwrap();
        Arc::new(ApiState {
            pool,
            store: Store::Memory(MemoryStore::new()),
            relay: Relay::new(
                client,
                "http://127.0.0.1:9",
                Duration::from_millis(10),
                Duration::from_millis(100),
            ),
            links: Links {
                app_url: "https://chaincred.example".into(),
                explorer_url: "https://stellar.expert/explorer/testnet".into(),
            },
            gateway_url: "https://gateway.pinata.cloud".into(),
            network: "testnet".into(),
            tx_timeout: Duration::from_millis(100),
        })
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn metadata() -> CredentialMetadata {
        CredentialMetadata {
            student_name: "Ada Lovelace".into(),
            student_id: "S-001".into(),
            university: "State U".into(),
            degree: "BSc".into(),
            major: "Mathematics".into(),
            issue_date: "2024-06-01".into(),
            graduation_date: "2024-05-20".into(),
        }
    }

    #[tokio::test]
    async fn unknown_credential_is_not_found_status_not_error() {
        let state = state().await;
        let resp = get_credential(State(state), Path("9".into()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["status"], "not_found");
    }

    #[tokio::test]
    async fn not_found_reports_how_far_the_ledger_was_scanned() {
        let state = state().await;
        let body = body_json(
            get_credential(State(state.clone()), Path("3".into()))
                .await
                .into_response(),
        )
        .await;
        assert_eq!(body["status"], "not_found");
        assert_eq!(body["indexed_through"], 0);

        db::save_cursor(&state.pool, 812, None).await.unwrap();
        let body = body_json(
            get_credential(State(state), Path("3".into()))
                .await
                .into_response(),
        )
        .await;
        assert_eq!(body["status"], "not_found");
        assert_eq!(body["indexed_through"], 812);
    }

    #[tokio::test]
    async fn non_numeric_credential_id_is_bad_request() {
        let state = state().await;
        let resp = get_credential(State(state), Path("abc".into()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn uploaded_metadata_backs_the_credential_view() {
        let state = state().await;

        let resp = upload_metadata(State(state.clone()), Json(metadata()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let uploaded = body_json(resp).await;
        let uri = uploaded["uri"].as_str().unwrap().to_string();

        db::insert_events(
            &state.pool,
            &[CredentialEvent {
                event_type: EventKind::CredentialIssued.as_str().into(),
                credential_id: Some("0".into()),
                university: Some("GUNI".into()),
                student: Some("GSTU".into()),
                actor: None,
                detail: Some("BSc".into()),
                metadata_uri: Some(uri),
                payload: None,
                ledger: 10,
                timestamp: 1_700_000_000,
                contract_id: "CCRED".into(),
                tx_hash: Some("ab".repeat(32)),
            }],
        )
        .await
        .unwrap();

        let view = body_json(
            get_credential(State(state.clone()), Path("0".into()))
                .await
                .into_response(),
        )
        .await;
        assert_eq!(view["status"], "valid");
        assert_eq!(view["metadata_available"], true);
        assert_eq!(view["metadata"]["major"], "Mathematics");
        assert_eq!(view["share_url"], "https://chaincred.example/verify/0");

        let held = body_json(
            get_student_credentials(State(state), Path("GSTU".into()))
                .await
                .into_response(),
        )
        .await;
        assert_eq!(held["count"], 1);
    }

    #[tokio::test]
    async fn missing_metadata_is_404() {
        let state = state().await;
        let resp = get_metadata(State(state), Path("bafkreimissing".into()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn oversized_upload_is_413() {
        let state = state().await;
        let mut doc = metadata();
        doc.major = "x".repeat(20 * 1024);
        let resp = upload_metadata(State(state), Json(doc)).await.into_response();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn transaction_endpoints_map_relay_outcomes() {
        let state = state().await;

        let bad = submit_transaction(
            State(state.clone()),
            Query(SubmitParams::default()),
            Json(SubmitRequest {
                envelope_xdr: "not base64!".into(),
            }),
        )
        .await;
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let down = submit_transaction(
            State(state.clone()),
            Query(SubmitParams { wait: true }),
            Json(SubmitRequest {
                envelope_xdr: "AAAAAgAAAAA=".into(),
            }),
        )
        .await;
        assert_eq!(down.status(), StatusCode::SERVICE_UNAVAILABLE);

        let pending = get_transaction(State(state.clone()), Path("cd".repeat(32))).await;
        assert_eq!(pending.status(), StatusCode::ACCEPTED);
        assert_eq!(body_json(pending).await["status"], "pending");

        let malformed = get_transaction(State(state), Path("xyz".into())).await;
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    }
}
