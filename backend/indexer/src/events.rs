//! Canonical event types emitted by the ChainCred registry contract.
//!
//! These mirror the Soroban contract events defined in
//! `contracts/chaincred/src/events.rs` and `contracts/chaincred/src/rbac.rs`.

use serde::{Deserialize, Serialize};

/// All recognised event kinds from the ChainCred contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A university self-registered (`uni_reg` topic).
    UniversityRegistered,
    /// An admin approved a registration (`uni_add` topic).
    UniversityAdded,
    /// An admin rejected a registration (`uni_rej` topic).
    UniversityRejected,
    /// A credential was issued (`issued` topic).
    CredentialIssued,
    /// A credential was revoked by its issuer (`revoked` topic).
    CredentialRevoked,
    /// A role was granted or replaced (`role_set` topic).
    RoleSet,
    /// A role was revoked (`role_del` topic).
    RoleDel,
    /// An event from this contract that we don't recognise yet.
    Unknown,
}

impl EventKind {
    /// Parse the leading topic symbol string produced by Soroban into an [`EventKind`].
    pub fn from_topic(topic: &str) -> Self {
        match topic {
            "uni_reg" => Self::UniversityRegistered,
            "uni_add" => Self::UniversityAdded,
            "uni_rej" => Self::UniversityRejected,
            "issued" => Self::CredentialIssued,
            "revoked" => Self::CredentialRevoked,
            "role_set" => Self::RoleSet,
            "role_del" => Self::RoleDel,
            _ => Self::Unknown,
        }
    }

    /// Return a short identifier string suitable for storage in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UniversityRegistered => "university_registered",
            Self::UniversityAdded => "university_added",
            Self::UniversityRejected => "university_rejected",
            Self::CredentialIssued => "credential_issued",
            Self::CredentialRevoked => "credential_revoked",
            Self::RoleSet => "role_set",
            Self::RoleDel => "role_del",
            Self::Unknown => "unknown",
        }
    }

    /// Inverse of [`EventKind::as_str`], for rows read back from the database.
    pub fn from_stored(stored: &str) -> Self {
        match stored {
            "university_registered" => Self::UniversityRegistered,
            "university_added" => Self::UniversityAdded,
            "university_rejected" => Self::UniversityRejected,
            "credential_issued" => Self::CredentialIssued,
            "credential_revoked" => Self::CredentialRevoked,
            "role_set" => Self::RoleSet,
            "role_del" => Self::RoleDel,
            _ => Self::Unknown,
        }
    }

    /// `true` when the second topic is a credential token id rather than an
    /// address.
    pub fn is_credential_event(&self) -> bool {
        matches!(self, Self::CredentialIssued | Self::CredentialRevoked)
    }
}

/// A fully decoded ChainCred event, ready to be stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialEvent {
    pub event_type: String,
    pub credential_id: Option<String>,
    pub university: Option<String>,
    pub student: Option<String>,
    /// Address acting or acted upon: rejecting admin, revoker, or role holder.
    pub actor: Option<String>,
    /// Kind-specific summary: university name, degree, or role.
    pub detail: Option<String>,
    pub metadata_uri: Option<String>,
    /// The event data as returned by the RPC, serialized JSON.
    pub payload: Option<String>,
    pub ledger: i64,
    pub timestamp: i64,
    pub contract_id: String,
    pub tx_hash: Option<String>,
}

/// A raw event record as stored in / read from the database.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventRecord {
    pub id: i64,
    pub event_type: String,
    pub credential_id: Option<String>,
    pub university: Option<String>,
    pub student: Option<String>,
    pub actor: Option<String>,
    pub detail: Option<String>,
    pub metadata_uri: Option<String>,
    pub payload: Option<String>,
    pub ledger: i64,
    pub timestamp: i64,
    pub contract_id: String,
    pub tx_hash: Option<String>,
    pub created_at: i64,
}
