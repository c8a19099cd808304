//! Read-side projection of a single credential for verifiers.
//!
//! A view is folded from the indexed `credential_issued` / `credential_revoked`
//! events and then enriched with the off-chain metadata document. Only the
//! events decide validity; the metadata lookup can only make the view less
//! detailed (`metadata_available = false`).

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::events::{EventKind, EventRecord};
use crate::metadata::{ContentPointer, CredentialMetadata, MetadataStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewStatus {
    Valid,
    Revoked,
    /// No issuance seen in ledgers up to the view's `indexed_through`.
    NotFound,
}

#[derive(Debug, Clone, Serialize)]
pub struct CredentialView {
    pub credential_id: String,
    pub status: ViewStatus,
    pub issuer: Option<String>,
    pub student: Option<String>,
    /// `issuer` and `student` shortened for display.
    pub issuer_display: Option<String>,
    pub student_display: Option<String>,
    pub degree: Option<String>,
    pub major: Option<String>,
    pub metadata_uri: Option<String>,
    pub metadata: Option<CredentialMetadata>,
    pub metadata_available: bool,
    pub issued_at: Option<i64>,
    pub revoked_at: Option<i64>,
    pub revoked_by: Option<String>,
    pub share_url: String,
    /// Explorer link to the issuing transaction.
    pub explorer_url: Option<String>,
    /// Last ledger the indexer has fully scanned. Anything issued after it
    /// is not reflected yet, so `not_found` means "not found so far".
    pub indexed_through: i64,
}

/// Base URLs used to build the links in a view.
#[derive(Debug, Clone)]
pub struct Links {
    pub app_url: String,
    pub explorer_url: String,
}

impl Links {
    pub fn share_url(&self, credential_id: &str) -> String {
        format!("{}/verify/{credential_id}", self.app_url.trim_end_matches('/'))
    }

    pub fn transaction_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{tx_hash}", self.explorer_url.trim_end_matches('/'))
    }
}

/// Shorten an account address for display: `GABCDE...WXYZ`.
pub fn format_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Fold a credential's event history into a view without metadata.
pub fn project(credential_id: &str, history: &[EventRecord], links: &Links) -> CredentialView {
    let mut view = CredentialView {
        credential_id: credential_id.to_string(),
        status: ViewStatus::NotFound,
        issuer: None,
        student: None,
        issuer_display: None,
        student_display: None,
        degree: None,
        major: None,
        metadata_uri: None,
        metadata: None,
        metadata_available: false,
        issued_at: None,
        revoked_at: None,
        revoked_by: None,
        share_url: links.share_url(credential_id),
        explorer_url: None,
        indexed_through: 0,
    };

    for event in history {
        match EventKind::from_stored(&event.event_type) {
            EventKind::CredentialIssued => {
                view.status = ViewStatus::Valid;
                view.issuer = event.university.clone();
                view.student = event.student.clone();
                view.issuer_display = view.issuer.as_deref().map(format_address);
                view.student_display = view.student.as_deref().map(format_address);
                view.degree = event.detail.clone();
                view.major = payload_field(event.payload.as_deref(), "major");
                view.metadata_uri = event.metadata_uri.clone();
                view.issued_at = Some(event.timestamp);
                view.explorer_url = event.tx_hash.as_deref().map(|h| links.transaction_url(h));
            }
            // Revocation is final; a revoke without a prior issue is ignored.
            EventKind::CredentialRevoked if view.status != ViewStatus::NotFound => {
                view.status = ViewStatus::Revoked;
                view.revoked_at = Some(event.timestamp);
                view.revoked_by = event.actor.clone();
            }
            _ => {}
        }
    }
    view
}

/// Look up the metadata document behind `uri`. Any failure degrades to
/// `(None, false)`.
pub async fn resolve_metadata<S: MetadataStore>(
    store: &S,
    uri: Option<&str>,
) -> (Option<CredentialMetadata>, bool) {
    let Some(uri) = uri else {
        return (None, false);
    };
    let pointer = match ContentPointer::parse(uri) {
        Ok(pointer) => pointer,
        Err(e) => {
            warn!("Credential metadata URI {uri:?} is unusable: {e}");
            return (None, false);
        }
    };
    match store.get(&pointer).await {
        Ok(Some(doc)) => (Some(doc), true),
        Ok(None) => {
            warn!("Metadata {} not found", pointer.cid());
            (None, false)
        }
        Err(e) => {
            warn!("Metadata {} unavailable: {e}", pointer.cid());
            (None, false)
        }
    }
}

/// Build the full view: events first, then metadata for non-missing credentials.
/// `indexed_through` is the indexer's watermark when `history` was read.
pub async fn credential_view<S: MetadataStore>(
    store: &S,
    credential_id: &str,
    history: &[EventRecord],
    indexed_through: i64,
    links: &Links,
) -> CredentialView {
    let mut view = project(credential_id, history, links);
    view.indexed_through = indexed_through;
    if view.status != ViewStatus::NotFound {
        let (metadata, available) = resolve_metadata(store, view.metadata_uri.as_deref()).await;
        if view.major.is_none() {
            view.major = metadata.as_ref().map(|m| m.major.clone()).filter(|m| !m.is_empty());
        }
        view.metadata = metadata;
        view.metadata_available = available;
    }
    view
}

fn payload_field(payload: Option<&str>, key: &str) -> Option<String> {
    let value: Value = serde_json::from_str(payload?).ok()?;
    value
        .get(key)
        .and_then(|v| v.as_str().or_else(|| v.get("value").and_then(Value::as_str)))
        .map(String::from)
}
