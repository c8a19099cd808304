//! Soroban RPC client: JSON-RPC plumbing, `getEvents` polling, and ChainCred
//! event decoding.
//!
//! ## Resilience
//!
//! * `getEvents` is a read, so exponential back-off is applied when the RPC
//!   returns an error or rate-limit response, up to [`MAX_BACKOFF_SECS`] seconds.
//! * [`call`] makes exactly one attempt and classifies the failure; callers
//!   that submit transactions must not loop on it blindly.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::errors::{IndexerError, Result};
use crate::events::{CredentialEvent, EventKind};

const MAX_BACKOFF_SECS: u64 = 60;
const INITIAL_BACKOFF_SECS: u64 = 2;

// ─────────────────────────────────────────────────────────
// JSON-RPC response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    /// -32600 (invalid request) and -32601 (method not found) will never
    /// succeed on retry.
    fn is_hard(&self) -> bool {
        self.code == -32600 || self.code == -32601
    }
}

#[derive(Debug, Deserialize)]
pub struct EventsResult {
    pub events: Vec<RawEvent>,
    pub cursor: Option<String>,
    #[serde(rename = "latestLedger")]
    pub latest_ledger: Option<u64>,
}

/// One entry of a `getEvents` page.
///
/// Requests ask for `xdrFormat: "json"`, so topics and data arrive decoded in
/// `topicJson`/`valueJson`. The `topic`/`value` fields carry the older
/// string form when a server answers without them.
#[derive(Debug, Deserialize, Clone)]
#[allow(dead_code)]
pub struct RawEvent {
    #[serde(default)]
    pub topic: Vec<String>,
    #[serde(default)]
    pub value: Value,
    #[serde(rename = "topicJson")]
    pub topic_json: Option<Vec<Value>>,
    #[serde(rename = "valueJson")]
    pub value_json: Option<Value>,
    #[serde(rename = "contractId")]
    pub contract_id: Option<String>,
    #[serde(rename = "txHash")]
    pub tx_hash: Option<String>,
    pub id: Option<String>,
    pub ledger: Option<u64>,
    #[serde(rename = "ledgerClosedAt")]
    pub ledger_closed_at: Option<String>,
    #[serde(rename = "inSuccessfulContractCall")]
    pub in_successful_contract_call: Option<bool>,
    #[serde(rename = "pagingToken")]
    pub paging_token: Option<String>,
}

// ─────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────

/// Make a single JSON-RPC call and deserialize its `result`.
///
/// Transport failures, HTTP 429 and soft RPC errors come back as
/// [`IndexerError::TransientRpc`]; hard RPC errors and empty results as
/// [`IndexerError::Protocol`].
pub async fn call<T: DeserializeOwned>(
    client: &Client,
    rpc_url: &str,
    method: &str,
    params: Value,
) -> Result<T> {
    let resp = client
        .post(rpc_url)
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        }))
        .send()
        .await
        .map_err(|e| IndexerError::TransientRpc(format!("{method}: {e}")))?;

    if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(IndexerError::TransientRpc(format!("{method}: rate-limited")));
    }

    let body: RpcResponse<T> = resp.json().await?;

    if let Some(err) = body.error {
        let message = format!("{method} error {}: {}", err.code, err.message);
        return Err(if err.is_hard() {
            IndexerError::Protocol(message)
        } else {
            IndexerError::TransientRpc(message)
        });
    }

    body.result
        .ok_or_else(|| IndexerError::Protocol(format!("Empty result from {method}")))
}

/// Fetch a page of events from the RPC.
///
/// * `start_ledger` — the ledger sequence to scan from (inclusive).
/// * `cursor`       — optional opaque pagination cursor from a previous response.
/// * `limit`        — maximum number of events to return.
///
/// Returns `(events, next_cursor, latest_ledger)`.
pub async fn fetch_events(
    client: &Client,
    rpc_url: &str,
    contract_id: &str,
    start_ledger: u32,
    cursor: Option<&str>,
    limit: u32,
) -> Result<(Vec<RawEvent>, Option<String>, Option<u64>)> {
    let mut backoff = INITIAL_BACKOFF_SECS;

    loop {
        let params = build_params(contract_id, start_ledger, cursor, limit);

        match call::<EventsResult>(client, rpc_url, "getEvents", params).await {
            Ok(result) => {
                debug!(
                    "Fetched {} events (latest_ledger={:?})",
                    result.events.len(),
                    result.latest_ledger
                );
                return Ok((result.events, result.cursor, result.latest_ledger));
            }
            Err(e) if e.is_transient() => {
                warn!("getEvents failed (will retry in {backoff}s): {e}");
                tokio::time::sleep(Duration::from_secs(backoff)).await;
                backoff = (backoff * 2).min(MAX_BACKOFF_SECS);
            }
            Err(e) => return Err(e),
        }
    }
}

fn build_params(contract_id: &str, start_ledger: u32, cursor: Option<&str>, limit: u32) -> Value {
    let mut params = json!({
        "filters": [
            {
                "type": "contract",
                "contractIds": [contract_id]
            }
        ],
        "pagination": {
            "limit": limit
        },
        "xdrFormat": "json"
    });

    if let Some(cur) = cursor {
        params["pagination"]["cursor"] = json!(cur);
    } else {
        params["startLedger"] = json!(start_ledger);
    }

    params
}

// ─────────────────────────────────────────────────────────
// Event decoding
// ─────────────────────────────────────────────────────────

/// Decode a list of raw RPC events into [`CredentialEvent`] structs.
pub fn decode_events(raw: &[RawEvent], contract_id: &str) -> Vec<CredentialEvent> {
    raw.iter()
        .filter(|e| e.in_successful_contract_call.unwrap_or(true))
        .filter_map(|e| decode_single(e, contract_id))
        .collect()
}

#[derive(Debug, Default, PartialEq)]
struct DecodedData {
    university: Option<String>,
    student: Option<String>,
    actor: Option<String>,
    detail: Option<String>,
    metadata_uri: Option<String>,
}

fn decode_single(raw: &RawEvent, contract_id: &str) -> Option<CredentialEvent> {
    let topics: Vec<String> = match &raw.topic_json {
        Some(topics) => topics.iter().map(|t| scalar(&plain_scval(t))).collect(),
        None => raw.topic.iter().map(|t| extract_u64_or_raw(t)).collect(),
    };
    let value = match &raw.value_json {
        Some(v) => plain_scval(v),
        None => raw.value.clone(),
    };

    // Leading topic symbol determines the event type.
    let kind = EventKind::from_topic(topics.first()?);

    let ledger = raw.ledger.unwrap_or(0) as i64;
    let timestamp = raw
        .ledger_closed_at
        .as_deref()
        .and_then(parse_iso_to_unix)
        .unwrap_or(0);

    // Second topic: token id for credential events, an address otherwise.
    let subject = topics.get(1).cloned();
    let (credential_id, subject_address) = if kind.is_credential_event() {
        (subject, None)
    } else {
        (None, subject)
    };

    let data = decode_data(&value, kind, subject_address);

    Some(CredentialEvent {
        event_type: kind.as_str().to_string(),
        credential_id,
        university: data.university,
        student: data.student,
        actor: data.actor,
        detail: data.detail,
        metadata_uri: data.metadata_uri,
        payload: (!value.is_null()).then(|| value.to_string()),
        ledger,
        timestamp,
        contract_id: raw
            .contract_id
            .clone()
            .unwrap_or_else(|| contract_id.to_string()),
        tx_hash: raw.tx_hash.clone(),
    })
}

/// Flatten the RPC's JSON rendering of an `ScVal` into plain JSON.
///
/// Each value is a one-key object naming its type: `{"symbol":"issued"}`,
/// `{"u64":"7"}`, `{"address":"G…"}`, `{"vec":[…]}`, and
/// `{"map":[{"key":…,"val":…}]}` for contract structs. Maps become objects
/// keyed by field name; 32/64-bit integers become numbers.
fn plain_scval(v: &Value) -> Value {
    let Value::Object(map) = v else {
        return v.clone();
    };
    let Some((tag, inner)) = map.iter().next().filter(|_| map.len() == 1) else {
        return v.clone();
    };

    match tag.as_str() {
        "u32" | "u64" | "timepoint" | "duration" => inner
            .as_str()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Value::from)
            .unwrap_or_else(|| inner.clone()),
        "i32" | "i64" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Value::from)
            .unwrap_or_else(|| inner.clone()),
        "vec" => match inner {
            Value::Array(items) => Value::Array(items.iter().map(plain_scval).collect()),
            _ => Value::Null,
        },
        "map" => match inner {
            Value::Array(entries) => Value::Object(
                entries
                    .iter()
                    .filter_map(|entry| {
                        let key = scalar(&plain_scval(entry.get("key")?));
                        Some((key, plain_scval(entry.get("val")?)))
                    })
                    .collect(),
            ),
            _ => Value::Null,
        },
        "symbol" | "string" | "address" | "bool" | "bytes" | "u128" | "i128" | "u256"
        | "i256" => inner.clone(),
        _ => v.clone(),
    }
}

/// Topic text: strings as-is, anything else in its JSON form.
fn scalar(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Pull apart the JSON `value` blob that Soroban returns for event data.
/// The XDR is decoded by the RPC into a `{"type":…, …}` JSON object.
fn decode_data(value: &Value, kind: EventKind, subject: Option<String>) -> DecodedData {
    match kind {
        EventKind::UniversityRegistered | EventKind::UniversityAdded => DecodedData {
            university: subject.or_else(|| extract_field(value, &["university"])),
            detail: extract_field(value, &["name"]).or_else(|| find_nested(value, "name")),
            ..Default::default()
        },
        EventKind::UniversityRejected => DecodedData {
            university: subject.or_else(|| extract_field(value, &["university"])),
            actor: extract_field(value, &["rejected_by", "admin", "address"]),
            ..Default::default()
        },
        EventKind::CredentialIssued => DecodedData {
            university: extract_field(value, &["university", "issuer"])
                .or_else(|| find_nested(value, "university")),
            student: extract_field(value, &["student"]).or_else(|| find_nested(value, "student")),
            detail: extract_field(value, &["degree"]),
            metadata_uri: extract_field(value, &["metadata_uri", "tokenURI"])
                .filter(|uri| !uri.is_empty()),
            ..Default::default()
        },
        EventKind::CredentialRevoked => DecodedData {
            actor: extract_field(value, &["revoked_by", "revokedBy", "address"]),
            ..Default::default()
        },
        EventKind::RoleSet => DecodedData {
            actor: subject,
            detail: role_name(value),
            ..Default::default()
        },
        EventKind::RoleDel => DecodedData {
            actor: subject,
            ..Default::default()
        },
        EventKind::Unknown => DecodedData::default(),
    }
}

fn extract_field(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(v) = value.get(key) {
            let s = match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => v.get("value").and_then(|inner| inner.as_str()).map(String::from),
            };
            if s.is_some() {
                return s;
            }
        }
    }
    None
}

fn find_nested(value: &Value, key: &str) -> Option<String> {
    if let Value::Object(map) = value {
        for (k, v) in map {
            if k == key {
                return v.as_str().map(String::from);
            }
            if let Some(found) = find_nested(v, key) {
                return Some(found);
            }
        }
    }
    None
}

/// A unit enum variant such as `Role::Admin` arrives as a bare symbol, a
/// one-element vec, or a `{"type":"symbol","value":…}` wrapper.
fn role_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.first().and_then(role_name),
        Value::Object(map) => map.get("value").and_then(role_name),
        _ => None,
    }
}

/// Extract a symbol, token id or address from an older-style topic string,
/// which may be a `{"type":…,"value":…}` object or the raw text.
fn extract_u64_or_raw(raw: &str) -> String {
    if let Ok(v) = serde_json::from_str::<Value>(raw) {
        if let Some(n) = v.get("value").and_then(|x| x.as_u64()) {
            return n.to_string();
        }
        if let Some(s) = v.get("value").and_then(|x| x.as_str()) {
            return s.to_string();
        }
    }
    raw.to_string()
}

/// Parse an ISO-8601 timestamp string into a Unix epoch (seconds).
fn parse_iso_to_unix(s: &str) -> Option<i64> {
    use chrono::DateTime;
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.timestamp())
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
