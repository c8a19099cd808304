//! # Types
//!
//! Shared data structures used across all modules of the ChainCred registry.
//!
//! ## Design decisions
//!
//! ### Config / State split
//!
//! A `Credential` is internally stored as two separate ledger entries:
//!
//! - [`CredentialConfig`]: written once at issuance; never mutated.
//! - [`CredentialState`]: written at issuance and once more on revocation.
//!
//! No entry point ever rewrites a config entry, so holder, issuer, id,
//! details and metadata pointer are immutable by construction. The public
//! API exposes the reconstructed [`Credential`] struct.
//!
//! ### University status as a Finite-State Machine
//!
//! ```text
//! NotRegistered ──register──► Pending ──approve──► Verified
//!                                └─────reject────► Rejected
//! ```
//!
//! `Verified` and `Rejected` are terminal. Every unseen account starts at
//! `NotRegistered`.
//!
//! ### Credential lifecycle
//!
//! ```text
//! (absent) ──issue──► Active ──revoke──► Revoked
//! ```

use soroban_sdk::{contracttype, Address, String, Vec};

/// Approval status of a university account.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UniversityStatus {
    /// Never registered.
    NotRegistered,
    /// Registered, awaiting an admin decision.
    Pending,
    /// Approved by an admin; may issue credentials.
    Verified,
    /// Rejected by an admin.
    Rejected,
}

/// A university as recorded by the registry.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct University {
    pub account: Address,
    pub name: String,
    pub country: String,
    pub registration_number: String,
    pub status: UniversityStatus,
    /// Ledger timestamp of the registration call (0 when never registered).
    pub registered_at: u64,
}

/// Human-readable credential fields stored inline on-chain.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CredentialDetails {
    pub student_name: String,
    pub student_id: String,
    pub university: String,
    pub degree: String,
    pub major: String,
    pub issue_date: String,
    pub graduation_date: String,
}

/// Immutable credential configuration, written once at issuance.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CredentialConfig {
    pub id: u64,
    pub student: Address,
    pub issuer: Address,
    pub details: CredentialDetails,
    pub metadata_uri: String,
    pub issued_at: u64,
}

/// Mutable credential state. `revoked` only ever moves false → true.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CredentialState {
    pub revoked: bool,
    /// Ledger timestamp of revocation (0 while active).
    pub revoked_at: u64,
}

/// Full on-chain representation of an issued credential.
///
/// Reconstructed internally from the split `CredentialConfig` +
/// `CredentialState` storage entries.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Credential {
    /// Sequential token identifier, starting at 0.
    pub id: u64,
    /// Holder account.
    pub student: Address,
    /// Verified university that issued the credential.
    pub issuer: Address,
    pub details: CredentialDetails,
    /// Content-addressed pointer to off-chain metadata (e.g. `ipfs://<cid>`).
    /// Stored verbatim; may be empty.
    pub metadata_uri: String,
    pub revoked: bool,
    pub revoked_at: u64,
    pub issued_at: u64,
}

/// Outcome classification returned by `verify_credential`.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CredentialStatus {
    Active,
    Revoked,
    /// No credential with this id was ever issued.
    NotFound,
}

/// The record part of a verification: either no credential was ever issued
/// under the id, or the stored record (revoked or not).
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CredentialLookup {
    NotFound,
    Found(Credential),
}

impl CredentialLookup {
    pub fn found(&self) -> Option<&Credential> {
        match self {
            CredentialLookup::Found(credential) => Some(credential),
            CredentialLookup::NotFound => None,
        }
    }
}

/// Result of a public verification query.
///
/// `credential` is `NotFound` exactly when `status == NotFound`, so callers
/// can tell "never issued" apart from "revoked".
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Verification {
    pub is_valid: bool,
    pub status: CredentialStatus,
    pub credential: CredentialLookup,
}

/// One page of the pending-registration queue.
///
/// `next` is the slot to pass as `start` for the following page; `more` is
/// `false` once every slot handed out so far has been scanned.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingPage {
    pub universities: Vec<University>,
    pub next: u32,
    pub more: bool,
}
