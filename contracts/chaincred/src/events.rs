//! # Events
//!
//! Every successful state transition publishes exactly one event. Topics are
//! `(symbol, subject)` where the subject is the university address or the
//! credential token id; the data is one of the structs below.
//!
//! | Topic       | Subject      | Data                   |
//! |-------------|--------------|------------------------|
//! | `uni_reg`   | university   | [`UniversityRegistered`] |
//! | `uni_add`   | university   | [`UniversityAdded`]    |
//! | `uni_rej`   | university   | [`UniversityRejected`] |
//! | `issued`    | token id     | [`CredentialIssued`]   |
//! | `revoked`   | token id     | [`CredentialRevoked`]  |

use soroban_sdk::{contracttype, symbol_short, Address, Env, String};

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UniversityRegistered {
    pub university: Address,
    pub name: String,
    pub country: String,
}

/// Published when an admin approves a registration.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UniversityAdded {
    pub university: Address,
    pub name: String,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UniversityRejected {
    pub university: Address,
    pub rejected_by: Address,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CredentialIssued {
    pub token_id: u64,
    pub student: Address,
    pub university: Address,
    pub degree: String,
    pub major: String,
    pub metadata_uri: String,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CredentialRevoked {
    pub token_id: u64,
    pub revoked_by: Address,
    pub timestamp: u64,
}

pub fn university_registered(env: &Env, event: UniversityRegistered) {
    env.events()
        .publish((symbol_short!("uni_reg"), event.university.clone()), event);
}

pub fn university_added(env: &Env, event: UniversityAdded) {
    env.events()
        .publish((symbol_short!("uni_add"), event.university.clone()), event);
}

pub fn university_rejected(env: &Env, event: UniversityRejected) {
    env.events()
        .publish((symbol_short!("uni_rej"), event.university.clone()), event);
}

pub fn credential_issued(env: &Env, event: CredentialIssued) {
    env.events()
        .publish((symbol_short!("issued"), event.token_id), event);
}

pub fn credential_revoked(env: &Env, event: CredentialRevoked) {
    env.events()
        .publish((symbol_short!("revoked"), event.token_id), event);
}
