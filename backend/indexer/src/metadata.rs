//! Off-chain credential metadata.
//!
//! The registry only stores a content-addressed pointer. The JSON document it
//! points to lives in an IPFS-like store behind the [`MetadataStore`]
//! capability, which is kept apart from the registry's own guarantees: a
//! missing or malformed document never makes a credential invalid.

use std::collections::HashMap;
use std::future::Future;

use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::errors::{IndexerError, Result};

/// Serialized documents above this size are refused.
pub const MAX_METADATA_BYTES: usize = 10 * 1024;

/// The metadata document pinned for each credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialMetadata {
    pub student_name: String,
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub university: String,
    pub degree: String,
    #[serde(default)]
    pub major: String,
    #[serde(default)]
    pub issue_date: String,
    #[serde(default)]
    pub graduation_date: String,
}

impl CredentialMetadata {
    /// Serialize for pinning, enforcing [`MAX_METADATA_BYTES`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.student_name.trim().is_empty() || self.degree.trim().is_empty() {
            return Err(IndexerError::InvalidInput(
                "studentName and degree are required".to_string(),
            ));
        }
        let bytes = serde_json::to_vec(self)?;
        if bytes.len() > MAX_METADATA_BYTES {
            return Err(IndexerError::MetadataTooLarge {
                size: bytes.len(),
                limit: MAX_METADATA_BYTES,
            });
        }
        Ok(bytes)
    }

    fn pin_name(&self) -> String {
        let stem = if self.student_id.is_empty() {
            &self.student_name
        } else {
            &self.student_id
        };
        format!("{stem}.json")
    }
}

/// A content identifier, without scheme or gateway prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentPointer(String);

impl ContentPointer {
    /// Accepts a bare CID, `ipfs://<cid>`, or a gateway URL `…/ipfs/<cid>`.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let rest = if let Some(stripped) = raw.strip_prefix("ipfs://") {
            stripped
        } else if let Some((_, after)) = raw.split_once("/ipfs/") {
            after
        } else {
            raw
        };
        let cid = rest
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default();

        if cid.is_empty() || !cid.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(IndexerError::InvalidInput(format!(
                "not a content pointer: {raw:?}"
            )));
        }
        Ok(Self(cid.to_string()))
    }

    pub fn cid(&self) -> &str {
        &self.0
    }

    /// The form stored on-chain.
    pub fn uri(&self) -> String {
        format!("ipfs://{}", self.0)
    }

    pub fn gateway_url(&self, gateway: &str) -> String {
        format!("{}/ipfs/{}", gateway.trim_end_matches('/'), self.0)
    }
}

/// Content-addressed blob store for credential metadata.
///
/// `get` returns `Ok(None)` when the store has no such document and `Err`
/// when it could not answer or the document is malformed.
pub trait MetadataStore: Send + Sync {
    fn put(&self, doc: &CredentialMetadata) -> impl Future<Output = Result<ContentPointer>> + Send;

    fn get(
        &self,
        pointer: &ContentPointer,
    ) -> impl Future<Output = Result<Option<CredentialMetadata>>> + Send;
}

// ─────────────────────────────────────────────────────────
// Pinata / IPFS gateway
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

/// Pins through Pinata's `pinJSONToIPFS` and reads back through a gateway.
#[derive(Clone)]
pub struct PinataStore {
    client: Client,
    api_url: String,
    jwt: String,
    gateway_url: String,
}

impl PinataStore {
    pub fn new(client: Client, api_url: String, jwt: String, gateway_url: String) -> Self {
        Self {
            client,
            api_url,
            jwt,
            gateway_url,
        }
    }
}

impl MetadataStore for PinataStore {
    async fn put(&self, doc: &CredentialMetadata) -> Result<ContentPointer> {
        doc.to_bytes()?;

        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.jwt)
            .json(&json!({
                "pinataContent": doc,
                "pinataMetadata": { "name": doc.pin_name() },
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(IndexerError::Upstream(format!(
                "pinning failed with HTTP {status}"
            )));
        }

        let pinned: PinResponse = resp.json().await?;
        let pointer = ContentPointer::parse(&pinned.ipfs_hash)?;
        info!("Pinned credential metadata as {}", pointer.cid());
        Ok(pointer)
    }

    async fn get(&self, pointer: &ContentPointer) -> Result<Option<CredentialMetadata>> {
        let url = pointer.gateway_url(&self.gateway_url);
        debug!("Fetching metadata from {url}");

        let resp = self.client.get(&url).send().await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if !status.is_success() => Err(IndexerError::Upstream(format!(
                "gateway returned HTTP {status}"
            ))),
            _ => {
                let body = read_limited(resp, MAX_METADATA_BYTES).await?;
                serde_json::from_slice(&body).map(Some).map_err(|e| {
                    IndexerError::MetadataUnavailable(format!("malformed document: {e}"))
                })
            }
        }
    }
}

/// Read a response body, refusing anything over `limit` bytes whether the
/// server declares its length up front or not.
async fn read_limited(mut resp: Response, limit: usize) -> Result<Vec<u8>> {
    if let Some(declared) = resp.content_length() {
        let size = usize::try_from(declared).unwrap_or(usize::MAX);
        if size > limit {
            return Err(IndexerError::MetadataTooLarge { size, limit });
        }
    }

    let mut body = Vec::new();
    while let Some(chunk) = resp.chunk().await? {
        let size = body.len() + chunk.len();
        if size > limit {
            return Err(IndexerError::MetadataTooLarge { size, limit });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

// ─────────────────────────────────────────────────────────
// In-process store
// ─────────────────────────────────────────────────────────

/// Keeps documents in memory, addressed by the SHA-256 of their JSON.
/// Used when no pinning credentials are configured.
#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<ContentPointer, CredentialMetadata>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataStore for MemoryStore {
    async fn put(&self, doc: &CredentialMetadata) -> Result<ContentPointer> {
        let bytes = doc.to_bytes()?;
        let pointer = ContentPointer(hex::encode(Sha256::digest(&bytes)));
        self.docs.write().await.insert(pointer.clone(), doc.clone());
        Ok(pointer)
    }

    async fn get(&self, pointer: &ContentPointer) -> Result<Option<CredentialMetadata>> {
        Ok(self.docs.read().await.get(pointer).cloned())
    }
}

// ─────────────────────────────────────────────────────────
// Runtime selection
// ─────────────────────────────────────────────────────────

/// The store chosen at startup.
pub enum Store {
    Pinata(PinataStore),
    Memory(MemoryStore),
}

impl MetadataStore for Store {
    async fn put(&self, doc: &CredentialMetadata) -> Result<ContentPointer> {
        match self {
            Self::Pinata(store) => store.put(doc).await,
            Self::Memory(store) => store.put(doc).await,
        }
    }

    async fn get(&self, pointer: &ContentPointer) -> Result<Option<CredentialMetadata>> {
        match self {
            Self::Pinata(store) => store.get(pointer).await,
            Self::Memory(store) => store.get(pointer).await,
        }
    }
}
