//! Two-phase transaction relay.
//!
//! Mutating registry calls reach the ledger as signed transaction envelopes.
//! Relaying one is split into two explicit steps:
//!
//! 1. [`Relay::submit`] hands the envelope to `sendTransaction` and returns a
//!    [`PendingHandle`]. Success here only means "accepted for ordering".
//! 2. [`Relay::await_finalization`] polls `getTransaction` until the ledger
//!    reports `SUCCESS` or `FAILED`, or until the client-side timeout elapses
//!    ([`IndexerError::StillPending`]). Abandoning the wait does not cancel
//!    the transaction.
//!
//! Submissions are never retried here: a transport failure during `submit`
//! leaves the outcome unknown, and the caller must check the hash before
//! trying again. Polling `getTransaction` is a read and is retried freely.

use std::time::Duration;

use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::errors::{IndexerError, Result};
use crate::rpc;

/// Returned by phase 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingHandle {
    pub hash: String,
    pub submitted_at: DateTime<Utc>,
}

/// Returned by phase 2 for a successfully finalized transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub hash: String,
    pub ledger: u64,
    /// Ledger close time (Unix seconds), when the RPC reports it.
    pub finalized_at: Option<i64>,
    pub result_xdr: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendTransactionResult {
    pub status: String,
    pub hash: Option<String>,
    #[serde(rename = "errorResultXdr")]
    pub error_result_xdr: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GetTransactionResult {
    pub status: String,
    pub ledger: Option<u64>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
    #[serde(rename = "resultXdr")]
    pub result_xdr: Option<String>,
}

/// Transaction relay bound to one RPC endpoint.
#[derive(Clone)]
pub struct Relay {
    client: Client,
    rpc_url: String,
    poll_interval: Duration,
    timeout: Duration,
}

impl Relay {
    pub fn new(
        client: Client,
        rpc_url: impl Into<String>,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            rpc_url: rpc_url.into(),
            poll_interval,
            timeout,
        }
    }

    /// Phase 1: submit a signed, base64-encoded transaction envelope.
    pub async fn submit(&self, envelope_xdr: &str) -> Result<PendingHandle> {
        validate_envelope(envelope_xdr)?;

        let result: SendTransactionResult = rpc::call(
            &self.client,
            &self.rpc_url,
            "sendTransaction",
            json!({ "transaction": envelope_xdr.trim() }),
        )
        .await?;

        let handle = classify_submission(result)?;
        info!("Transaction {} accepted for ordering", handle.hash);
        Ok(handle)
    }

    /// Phase 2: wait for the ledger to finalize `handle`, bounded by the
    /// relay's timeout.
    pub async fn await_finalization(&self, handle: &PendingHandle) -> Result<Receipt> {
        self.await_finalization_within(&handle.hash, self.timeout).await
    }

    /// Phase 2 for a bare hash with an explicit bound.
    pub async fn await_finalization_within(&self, hash: &str, timeout: Duration) -> Result<Receipt> {
        validate_hash(hash)?;

        match tokio::time::timeout(timeout, self.poll_until_final(hash)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("Transaction {hash} not finalized after {timeout:?}");
                Err(IndexerError::StillPending(hash.to_string()))
            }
        }
    }

    async fn poll_until_final(&self, hash: &str) -> Result<Receipt> {
        loop {
            let polled: Result<GetTransactionResult> = rpc::call(
                &self.client,
                &self.rpc_url,
                "getTransaction",
                json!({ "hash": hash }),
            )
            .await;

            match polled {
                Ok(result) => {
                    if let Some(receipt) = classify_status(hash, result)? {
                        info!("Transaction {hash} finalized in ledger {}", receipt.ledger);
                        return Ok(receipt);
                    }
                    debug!("Transaction {hash} not yet finalized");
                }
                Err(e) if e.is_transient() => {
                    warn!("getTransaction for {hash} failed, polling again: {e}");
                }
                Err(e) => return Err(e),
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// The envelope must be non-empty standard base64.
pub fn validate_envelope(envelope_xdr: &str) -> Result<()> {
    let trimmed = envelope_xdr.trim();
    if trimmed.is_empty() {
        return Err(IndexerError::InvalidInput("empty transaction envelope".to_string()));
    }
    base64::engine::general_purpose::STANDARD
        .decode(trimmed)
        .map(|_| ())
        .map_err(|e| IndexerError::InvalidInput(format!("envelope is not base64: {e}")))
}

/// Transaction hashes are 32 bytes, hex-encoded.
pub fn validate_hash(hash: &str) -> Result<()> {
    match hex::decode(hash) {
        Ok(bytes) if bytes.len() == 32 => Ok(()),
        Ok(bytes) => Err(IndexerError::InvalidInput(format!(
            "transaction hash must be 32 bytes, got {}",
            bytes.len()
        ))),
        Err(e) => Err(IndexerError::InvalidInput(format!(
            "transaction hash is not hex: {e}"
        ))),
    }
}

/// Map a `sendTransaction` result onto phase-1 semantics.
///
/// `PENDING` and `DUPLICATE` are both "accepted": a duplicate means an
/// identical envelope is already queued, so the same hash can be awaited.
pub fn classify_submission(result: SendTransactionResult) -> Result<PendingHandle> {
    let hash = result.hash.unwrap_or_default();
    match result.status.as_str() {
        "PENDING" | "DUPLICATE" => {
            validate_hash(&hash)?;
            Ok(PendingHandle {
                hash,
                submitted_at: Utc::now(),
            })
        }
        "TRY_AGAIN_LATER" => Err(IndexerError::TransientRpc(
            "sendTransaction: ledger asked to try again later".to_string(),
        )),
        "ERROR" => Err(IndexerError::Rejected {
            hash,
            reason: result
                .error_result_xdr
                .unwrap_or_else(|| "submission rejected".to_string()),
        }),
        other => Err(IndexerError::Protocol(format!(
            "unexpected sendTransaction status {other:?}"
        ))),
    }
}

/// Map a `getTransaction` result onto phase-2 semantics: `Some(receipt)` once
/// final and successful, `None` while the ledger has not seen it yet.
pub fn classify_status(hash: &str, result: GetTransactionResult) -> Result<Option<Receipt>> {
    match result.status.as_str() {
        "SUCCESS" => Ok(Some(Receipt {
            hash: hash.to_string(),
            ledger: result.ledger.unwrap_or(0),
            finalized_at: result.created_at.as_deref().and_then(|t| t.parse().ok()),
            result_xdr: result.result_xdr,
        })),
        "NOT_FOUND" => Ok(None),
        "FAILED" => Err(IndexerError::Rejected {
            hash: hash.to_string(),
            reason: result
                .result_xdr
                .unwrap_or_else(|| "transaction failed on-chain".to_string()),
        }),
        other => Err(IndexerError::Protocol(format!(
            "unexpected getTransaction status {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    const HASH: &str = "a3f1c2d4e5b60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f90";

    fn sent(status: &str, hash: Option<&str>) -> SendTransactionResult {
        SendTransactionResult {
            status: status.to_string(),
            hash: hash.map(String::from),
            error_result_xdr: None,
        }
    }

    fn got(status: &str) -> GetTransactionResult {
        GetTransactionResult {
            status: status.to_string(),
            ledger: Some(4242),
            created_at: Some("1704067200".to_string()),
            result_xdr: Some("AAAA".to_string()),
        }
    }

    fn unreachable_relay(timeout: Duration) -> Relay {
        // Port 9 (discard) refuses connections on loopback.
        let client = Client::builder()
            .timeout(Duration::from_secs(1))
            .build()
            .unwrap();
        Relay::new(
            client,
            "http://127.0.0.1:9",
            Duration::from_millis(10),
            timeout,
        )
    }

    #[test]
    fn envelope_must_be_base64() {
        assert!(validate_envelope("AAAAAgAAAAA=").is_ok());
        assert!(matches!(
            validate_envelope("   "),
            Err(IndexerError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_envelope("not base64!"),
            Err(IndexerError::InvalidInput(_))
        ));
    }

    #[test]
    fn hash_must_be_32_hex_bytes() {
        assert!(validate_hash(HASH).is_ok());
        assert!(validate_hash("abcd").is_err());
        assert!(validate_hash(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn pending_and_duplicate_are_accepted() {
        for status in ["PENDING", "DUPLICATE"] {
            let handle = classify_submission(sent(status, Some(HASH))).unwrap();
            assert_eq!(handle.hash, HASH);
        }
    }

    #[test]
    fn try_again_later_is_transient_and_error_is_rejected() {
        let busy = classify_submission(sent("TRY_AGAIN_LATER", Some(HASH))).unwrap_err();
        assert!(busy.is_transient());

        let mut refused = sent("ERROR", Some(HASH));
        refused.error_result_xdr = Some("AAAAAAAAAGT////7AAAAAA==".to_string());
        match classify_submission(refused).unwrap_err() {
            IndexerError::Rejected { hash, reason } => {
                assert_eq!(hash, HASH);
                assert_eq!(reason, "AAAAAAAAAGT////7AAAAAA==");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn finalization_statuses() {
        let receipt = classify_status(HASH, got("SUCCESS")).unwrap().unwrap();
        assert_eq!(receipt.ledger, 4242);
        assert_eq!(receipt.finalized_at, Some(1_704_067_200));

        assert_eq!(classify_status(HASH, got("NOT_FOUND")).unwrap(), None);

        let failed = classify_status(HASH, got("FAILED")).unwrap_err();
        assert!(matches!(failed, IndexerError::Rejected { .. }));
        assert!(!failed.is_transient());
    }

    #[test]
    fn unknown_statuses_are_protocol_errors() {
        let sent_err = classify_submission(sent("SOMETHING_NEW", Some(HASH))).unwrap_err();
        assert!(matches!(sent_err, IndexerError::Protocol(_)), "{sent_err}");
        assert_eq!(sent_err.status_code(), StatusCode::BAD_GATEWAY);

        let got_err = classify_status(HASH, got("SOMETHING_NEW")).unwrap_err();
        assert!(matches!(got_err, IndexerError::Protocol(_)), "{got_err}");
        assert_eq!(got_err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn submit_transport_failure_is_transient() {
        let relay = unreachable_relay(Duration::from_millis(100));
        let err = relay.submit("AAAAAgAAAAA=").await.unwrap_err();
        assert!(err.is_transient(), "got {err:?}");
    }

    #[tokio::test]
    async fn submit_validates_before_sending() {
        let relay = unreachable_relay(Duration::from_millis(100));
        let err = relay.submit("%%%").await.unwrap_err();
        assert!(matches!(err, IndexerError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn unreachable_ledger_reports_still_pending_after_timeout() {
        let relay = unreachable_relay(Duration::from_millis(150));
        let handle = PendingHandle {
            hash: HASH.to_string(),
            submitted_at: Utc::now(),
        };
        let err = relay.await_finalization(&handle).await.unwrap_err();
        assert!(matches!(err, IndexerError::StillPending(ref h) if h == HASH));
    }
}
