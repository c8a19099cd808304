//! # Storage
//!
//! Provides typed helpers over Soroban's two storage tiers used by ChainCred:
//!
//! ## Instance storage (contract-lifetime TTL)
//!
//! | Key               | Type  | Description                                  |
//! |-------------------|-------|----------------------------------------------|
//! | `CredentialCount` | `u64` | Auto-increment credential ID counter         |
//! | `PendingNext`     | `u32` | Next free registration slot (never reused)   |
//!
//! Instance TTL is bumped by **7 days** whenever it falls below 1 day remaining.
//!
//! ## Persistent storage (per-entry TTL)
//!
//! | Key                   | Type               | Description                         |
//! |-----------------------|--------------------|-------------------------------------|
//! | `University(addr)`    | `University`       | Registration record                 |
//! | `CredConfig(id)`      | `CredentialConfig` | Immutable credential configuration  |
//! | `CredState(id)`       | `CredentialState`  | Revocation flag                     |
//! | `PendingAt(slot)`     | `Address`          | Pending account in registration slot |
//! | `PendingSlot(addr)`   | `u32`              | Slot of a pending account            |
//! | `StudentCredCount(a)` | `u32`              | Number of credentials held           |
//! | `StudentCred(a, n)`   | `u64`              | n-th credential id held              |
//! | `IssuerCredCount(a)`  | `u32`              | Number of credentials issued         |
//! | `IssuerCred(a, n)`    | `u64`              | n-th credential id issued            |
//!
//! Persistent TTL is bumped by **30 days** whenever it falls below 7 days remaining.
//!
//! Lists are spread over one entry per element so no single entry grows with
//! the number of registrations or issuances. A decided university leaves a
//! hole at its slot; readers skip it.
//!
//! Loaders return `Option` and leave the choice of error to the entry point.

use soroban_sdk::{contracttype, Address, Env, Vec};

use crate::types::{Credential, CredentialConfig, CredentialState, University};

// ── TTL Constants ────────────────────────────────────────────────────

/// Approximate ledgers per day (~5 seconds per ledger).
pub(crate) const DAY_IN_LEDGERS: u32 = 17_280;

/// Instance storage: bump by 7 days when below 1 day remaining.
const INSTANCE_BUMP_AMOUNT: u32 = 7 * DAY_IN_LEDGERS;
const INSTANCE_LIFETIME_THRESHOLD: u32 = DAY_IN_LEDGERS;

/// Persistent storage: bump by 30 days when below 7 days remaining.
pub(crate) const PERSISTENT_BUMP_AMOUNT: u32 = 30 * DAY_IN_LEDGERS;
pub(crate) const PERSISTENT_LIFETIME_THRESHOLD: u32 = 7 * DAY_IN_LEDGERS;

// ── Storage Keys ─────────────────────────────────────────────────────

/// All registry storage keys. Role assignments live under `RbacKey` in
/// `rbac.rs`.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DataKey {
    /// Global auto-increment counter for credential IDs (Instance).
    CredentialCount,
    /// Next registration slot to hand out (Instance).
    PendingNext,
    /// Pending account registered in a slot (Persistent).
    PendingAt(u32),
    /// Slot held by a pending account (Persistent).
    PendingSlot(Address),
    /// University record keyed by account (Persistent).
    University(Address),
    /// Immutable credential configuration keyed by ID (Persistent).
    CredConfig(u64),
    /// Mutable credential state keyed by ID (Persistent).
    CredState(u64),
    /// Number of credentials held by a student (Persistent).
    StudentCredCount(Address),
    /// Credential id at a position in a student's holdings (Persistent).
    StudentCred(Address, u32),
    /// Number of credentials issued by a university (Persistent).
    IssuerCredCount(Address),
    /// Credential id at a position in a university's issuances (Persistent).
    IssuerCred(Address, u32),
}

// ── Instance Storage Helpers ─────────────────────────────────────────

/// Extend instance storage TTL if it falls below the threshold.
pub(crate) fn bump_instance(env: &Env) {
    env.storage()
        .instance()
        .extend_ttl(INSTANCE_LIFETIME_THRESHOLD, INSTANCE_BUMP_AMOUNT);
}

/// Atomically reads, increments, and stores the credential counter.
/// Returns the ID to use for the *current* credential (pre-increment value).
pub fn get_and_increment_credential_id(env: &Env) -> u64 {
    bump_instance(env);
    let current = credential_count(env);
    env.storage()
        .instance()
        .set(&DataKey::CredentialCount, &(current + 1));
    current
}

/// Number of credentials ever issued (revoked ones included).
pub fn credential_count(env: &Env) -> u64 {
    env.storage()
        .instance()
        .get(&DataKey::CredentialCount)
        .unwrap_or(0)
}

/// Number of registration slots handed out so far. Slots `0..n` may hold a
/// pending account or a hole left by a decision.
pub fn pending_slot_count(env: &Env) -> u32 {
    bump_instance(env);
    env.storage()
        .instance()
        .get(&DataKey::PendingNext)
        .unwrap_or(0)
}

pub fn pending_at(env: &Env, slot: u32) -> Option<Address> {
    let key = DataKey::PendingAt(slot);
    let account: Option<Address> = env.storage().persistent().get(&key);
    if account.is_some() {
        bump_persistent(env, &key);
    }
    account
}

pub fn push_pending(env: &Env, account: &Address) {
    let slot = pending_slot_count(env);
    env.storage()
        .instance()
        .set(&DataKey::PendingNext, &(slot + 1));

    let at_key = DataKey::PendingAt(slot);
    let slot_key = DataKey::PendingSlot(account.clone());
    env.storage().persistent().set(&at_key, account);
    env.storage().persistent().set(&slot_key, &slot);
    bump_persistent(env, &at_key);
    bump_persistent(env, &slot_key);
}

/// Clear `account`'s registration slot. Other slots keep their positions.
pub fn remove_pending(env: &Env, account: &Address) {
    let slot_key = DataKey::PendingSlot(account.clone());
    if let Some(slot) = env.storage().persistent().get::<_, u32>(&slot_key) {
        env.storage().persistent().remove(&DataKey::PendingAt(slot));
        env.storage().persistent().remove(&slot_key);
    }
}

// ── Persistent Storage Helpers ───────────────────────────────────────

/// Extend the TTL for a persistent storage key.
fn bump_persistent(env: &Env, key: &DataKey) {
    env.storage()
        .persistent()
        .extend_ttl(key, PERSISTENT_LIFETIME_THRESHOLD, PERSISTENT_BUMP_AMOUNT);
}

pub fn load_university(env: &Env, account: &Address) -> Option<University> {
    let key = DataKey::University(account.clone());
    let university: Option<University> = env.storage().persistent().get(&key);
    if university.is_some() {
        bump_persistent(env, &key);
    }
    university
}

pub fn save_university(env: &Env, university: &University) {
    let key = DataKey::University(university.account.clone());
    env.storage().persistent().set(&key, university);
    bump_persistent(env, &key);
}

/// Save both the immutable config and initial mutable state for a new
/// credential, and index it under its student and issuer.
pub fn save_credential(env: &Env, credential: &Credential) {
    let config_key = DataKey::CredConfig(credential.id);
    let state_key = DataKey::CredState(credential.id);

    let config = CredentialConfig {
        id: credential.id,
        student: credential.student.clone(),
        issuer: credential.issuer.clone(),
        details: credential.details.clone(),
        metadata_uri: credential.metadata_uri.clone(),
        issued_at: credential.issued_at,
    };

    let state = CredentialState {
        revoked: credential.revoked,
        revoked_at: credential.revoked_at,
    };

    env.storage().persistent().set(&config_key, &config);
    env.storage().persistent().set(&state_key, &state);
    bump_persistent(env, &config_key);
    bump_persistent(env, &state_key);

    let student = &credential.student;
    let issuer = &credential.issuer;
    append_id(
        env,
        DataKey::StudentCredCount(student.clone()),
        |n| DataKey::StudentCred(student.clone(), n),
        credential.id,
    );
    append_id(
        env,
        DataKey::IssuerCredCount(issuer.clone()),
        |n| DataKey::IssuerCred(issuer.clone(), n),
        credential.id,
    );
}

fn append_id(env: &Env, count_key: DataKey, item_key: impl Fn(u32) -> DataKey, id: u64) {
    let count = load_count(env, &count_key);
    let key = item_key(count);
    env.storage().persistent().set(&key, &id);
    env.storage().persistent().set(&count_key, &(count + 1));
    bump_persistent(env, &key);
    bump_persistent(env, &count_key);
}

fn load_count(env: &Env, count_key: &DataKey) -> u32 {
    match env.storage().persistent().get::<_, u32>(count_key) {
        Some(count) => {
            bump_persistent(env, count_key);
            count
        }
        None => 0,
    }
}

/// Ids at positions `start..start + limit`, clipped to the list length.
fn load_ids(
    env: &Env,
    count_key: DataKey,
    item_key: impl Fn(u32) -> DataKey,
    start: u32,
    limit: u32,
) -> Vec<u64> {
    let count = load_count(env, &count_key);
    let end = start.saturating_add(limit).min(count);
    let mut ids = Vec::new(env);
    for index in start..end {
        let key = item_key(index);
        if let Some(id) = env.storage().persistent().get::<_, u64>(&key) {
            bump_persistent(env, &key);
            ids.push_back(id);
        }
    }
    ids
}

pub fn student_credential_count(env: &Env, student: &Address) -> u32 {
    load_count(env, &DataKey::StudentCredCount(student.clone()))
}

pub fn issuer_credential_count(env: &Env, issuer: &Address) -> u32 {
    load_count(env, &DataKey::IssuerCredCount(issuer.clone()))
}

/// A page of credential ids held by `student`, in issuance order.
pub fn student_credential_ids(env: &Env, student: &Address, start: u32, limit: u32) -> Vec<u64> {
    load_ids(
        env,
        DataKey::StudentCredCount(student.clone()),
        |n| DataKey::StudentCred(student.clone(), n),
        start,
        limit,
    )
}

/// A page of credential ids issued by `issuer`, in issuance order.
pub fn issuer_credential_ids(env: &Env, issuer: &Address, start: u32, limit: u32) -> Vec<u64> {
    load_ids(
        env,
        DataKey::IssuerCredCount(issuer.clone()),
        |n| DataKey::IssuerCred(issuer.clone(), n),
        start,
        limit,
    )
}

/// Load the full `Credential` by combining config and state.
pub fn load_credential(env: &Env, id: u64) -> Option<Credential> {
    let config = load_credential_config(env, id)?;
    let state = load_credential_state(env, id)?;
    Some(Credential {
        id: config.id,
        student: config.student,
        issuer: config.issuer,
        details: config.details,
        metadata_uri: config.metadata_uri,
        revoked: state.revoked,
        revoked_at: state.revoked_at,
        issued_at: config.issued_at,
    })
}

/// Load only the immutable credential configuration.
pub fn load_credential_config(env: &Env, id: u64) -> Option<CredentialConfig> {
    let key = DataKey::CredConfig(id);
    let config: Option<CredentialConfig> = env.storage().persistent().get(&key);
    if config.is_some() {
        bump_persistent(env, &key);
    }
    config
}

/// Load only the mutable credential state.
pub fn load_credential_state(env: &Env, id: u64) -> Option<CredentialState> {
    let key = DataKey::CredState(id);
    let state: Option<CredentialState> = env.storage().persistent().get(&key);
    if state.is_some() {
        bump_persistent(env, &key);
    }
    state
}

/// Save only the mutable credential state (revocation).
pub fn save_credential_state(env: &Env, id: u64, state: &CredentialState) {
    let key = DataKey::CredState(id);
    env.storage().persistent().set(&key, state);
    bump_persistent(env, &key);
}
