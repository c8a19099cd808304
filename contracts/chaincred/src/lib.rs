// contracts/chaincred/src/lib.rs

//! # ChainCred Registry Contract
//!
//! Root crate of the **ChainCred** academic credential registry. It exposes
//! the single Soroban contract `ChainCred` whose entry points cover the full
//! university and credential lifecycle:
//!
//! | Phase        | Entry Point(s)                                              |
//! |--------------|-------------------------------------------------------------|
//! | Bootstrap    | [`ChainCred::init`]                                         |
//! | Role admin   | `grant_role`, `revoke_role`, `transfer_super_admin`         |
//! | Registration | [`ChainCred::register_university`]                          |
//! | Approval     | `approve_university`, `reject_university`                   |
//! | Issuance     | [`ChainCred::issue_credential`]                             |
//! | Revocation   | [`ChainCred::revoke_credential`]                            |
//! | Queries      | `verify_credential`, `get_*`, `is_university`, `role_of`, `has_role` |
//!
//! ## Architecture
//!
//! Authorization is delegated to [`rbac`]. Storage access is delegated to
//! [`storage`]. Event payloads live in [`events`]. This file contains the
//! public entry points and the lifecycle guards; every mutating entry point
//! authenticates its explicit caller argument first, then checks role or
//! ownership, then the lifecycle state.
//!
//! A failed guard aborts the invocation with a typed [`Error`], and the host
//! rolls back every write made by that invocation.

#![no_std]

use soroban_sdk::{contract, contracterror, contractimpl, panic_with_error, Address, Env, String, Vec};

pub mod events;
pub mod rbac;
mod storage;
mod types;

#[cfg(test)]
mod invariants;
#[cfg(test)]
mod test_events;

use events::{
    CredentialIssued, CredentialRevoked, UniversityAdded, UniversityRegistered,
    UniversityRejected,
};
use storage::{
    credential_count, get_and_increment_credential_id, issuer_credential_count,
    issuer_credential_ids, load_credential, load_credential_state, load_university, pending_at,
    pending_slot_count, push_pending, remove_pending, save_credential, save_credential_state,
    save_university, student_credential_count, student_credential_ids,
};
pub use rbac::Role;
pub use types::{
    Credential, CredentialDetails, CredentialLookup, CredentialStatus, PendingPage, University,
    UniversityStatus, Verification,
};

/// Largest page any listing query returns; bigger `limit`s are clipped.
pub const MAX_PAGE_SIZE: u32 = 50;

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    Unauthorized       = 1,
    InvalidState       = 2,
    NotFound           = 3,
    AlreadyRevoked     = 4,
    AlreadyRegistered  = 5,
    AlreadyInitialized = 6,
    NotInitialized     = 7,
    InvalidInput       = 8,
    RoleNotFound       = 9,
}

#[contract]
pub struct ChainCred;

#[contractimpl]
impl ChainCred {
    // ─────────────────────────────────────────────────────────
    // Initialisation
    // ─────────────────────────────────────────────────────────

    /// Initialise the contract and set the first SuperAdmin.
    ///
    /// Must be called exactly once immediately after deployment.
    /// Subsequent calls fail with `Error::AlreadyInitialized`.
    pub fn init(env: Env, super_admin: Address) {
        super_admin.require_auth();
        rbac::init_super_admin(&env, &super_admin);
    }

    // ─────────────────────────────────────────────────────────
    // Role management
    // ─────────────────────────────────────────────────────────

    /// Grant `role` to `target`. `caller` must hold `SuperAdmin` or `Admin`.
    pub fn grant_role(env: Env, caller: Address, target: Address, role: Role) {
        rbac::grant_role(&env, &caller, &target, role);
    }

    /// Revoke the role held by `target`. Cannot remove the SuperAdmin.
    pub fn revoke_role(env: Env, caller: Address, target: Address) {
        rbac::revoke_role(&env, &caller, &target);
    }

    /// Transfer SuperAdmin to `new_super_admin`.
    pub fn transfer_super_admin(env: Env, current_super_admin: Address, new_super_admin: Address) {
        rbac::transfer_super_admin(&env, &current_super_admin, &new_super_admin);
    }

    pub fn role_of(env: Env, address: Address) -> Option<Role> {
        rbac::role_of(&env, address)
    }

    pub fn has_role(env: Env, address: Address, role: Role) -> bool {
        rbac::has_role(&env, address, role)
    }

    // ─────────────────────────────────────────────────────────
    // University lifecycle
    // ─────────────────────────────────────────────────────────

    /// Self-register `caller` as a university. The record starts `Pending`.
    ///
    /// - `AlreadyRegistered` if the caller is `Pending` or `Verified`.
    /// - `InvalidState` if the caller was `Rejected`; rejection is final.
    /// - `InvalidInput` if any field is empty.
    pub fn register_university(
        env: Env,
        caller: Address,
        name: String,
        country: String,
        registration_number: String,
    ) {
        caller.require_auth();

        if name.len() == 0 || country.len() == 0 || registration_number.len() == 0 {
            panic_with_error!(&env, Error::InvalidInput);
        }

        match load_university(&env, &caller).map(|u| u.status) {
            None | Some(UniversityStatus::NotRegistered) => {}
            Some(UniversityStatus::Pending) | Some(UniversityStatus::Verified) => {
                panic_with_error!(&env, Error::AlreadyRegistered)
            }
            Some(UniversityStatus::Rejected) => panic_with_error!(&env, Error::InvalidState),
        }

        let university = University {
            account: caller.clone(),
            name: name.clone(),
            country: country.clone(),
            registration_number,
            status: UniversityStatus::Pending,
            registered_at: env.ledger().timestamp(),
        };
        save_university(&env, &university);
        push_pending(&env, &caller);

        events::university_registered(
            &env,
            UniversityRegistered {
                university: caller,
                name,
                country,
            },
        );
    }

    /// Move a `Pending` university to `Verified`.
    pub fn approve_university(env: Env, admin: Address, target: Address) {
        let mut university = Self::pending_for_decision(&env, &admin, &target);
        university.status = UniversityStatus::Verified;
        save_university(&env, &university);
        remove_pending(&env, &target);

        events::university_added(
            &env,
            UniversityAdded {
                university: target,
                name: university.name,
            },
        );
    }

    /// Move a `Pending` university to `Rejected`.
    pub fn reject_university(env: Env, admin: Address, target: Address) {
        let mut university = Self::pending_for_decision(&env, &admin, &target);
        university.status = UniversityStatus::Rejected;
        save_university(&env, &university);
        remove_pending(&env, &target);

        events::university_rejected(
            &env,
            UniversityRejected {
                university: target,
                rejected_by: admin,
            },
        );
    }

    // ─────────────────────────────────────────────────────────
    // Credential lifecycle
    // ─────────────────────────────────────────────────────────

    /// Issue a credential to `student`. Returns the new sequential token id.
    ///
    /// `issuer` must be a `Verified` university. `metadata_uri` is stored
    /// verbatim; its reachability is not checked.
    pub fn issue_credential(
        env: Env,
        issuer: Address,
        student: Address,
        details: CredentialDetails,
        metadata_uri: String,
    ) -> u64 {
        issuer.require_auth();

        let verified = load_university(&env, &issuer)
            .map(|u| u.status == UniversityStatus::Verified)
            .unwrap_or(false);
        if !verified {
            panic_with_error!(&env, Error::Unauthorized);
        }

        if details.student_name.len() == 0 || details.degree.len() == 0 {
            panic_with_error!(&env, Error::InvalidInput);
        }

        let id = get_and_increment_credential_id(&env);
        let credential = Credential {
            id,
            student: student.clone(),
            issuer: issuer.clone(),
            details,
            metadata_uri,
            revoked: false,
            revoked_at: 0,
            issued_at: env.ledger().timestamp(),
        };
        save_credential(&env, &credential);

        events::credential_issued(
            &env,
            CredentialIssued {
                token_id: id,
                student,
                university: issuer,
                degree: credential.details.degree,
                major: credential.details.major,
                metadata_uri: credential.metadata_uri,
            },
        );
        id
    }

    /// Revoke credential `id`. Only the original issuer may revoke, and only
    /// once: a second revocation fails with `AlreadyRevoked`.
    pub fn revoke_credential(env: Env, caller: Address, id: u64) {
        caller.require_auth();

        let credential = match load_credential(&env, id) {
            Some(c) => c,
            None => panic_with_error!(&env, Error::NotFound),
        };
        if credential.issuer != caller {
            panic_with_error!(&env, Error::Unauthorized);
        }

        let mut state = match load_credential_state(&env, id) {
            Some(s) => s,
            None => panic_with_error!(&env, Error::NotFound),
        };
        if state.revoked {
            panic_with_error!(&env, Error::AlreadyRevoked);
        }

        let now = env.ledger().timestamp();
        state.revoked = true;
        state.revoked_at = now;
        save_credential_state(&env, id, &state);

        events::credential_revoked(
            &env,
            CredentialRevoked {
                token_id: id,
                revoked_by: caller,
                timestamp: now,
            },
        );
    }

    // ─────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────

    /// Public verification. Never fails: an unknown id yields
    /// `NotFound` with no record, a revoked one `Revoked` with its record.
    pub fn verify_credential(env: Env, id: u64) -> Verification {
        match load_credential(&env, id) {
            None => Verification {
                is_valid: false,
                status: CredentialStatus::NotFound,
                credential: CredentialLookup::NotFound,
            },
            Some(credential) => {
                let status = if credential.revoked {
                    CredentialStatus::Revoked
                } else {
                    CredentialStatus::Active
                };
                Verification {
                    is_valid: status == CredentialStatus::Active,
                    status,
                    credential: CredentialLookup::Found(credential),
                }
            }
        }
    }

    pub fn get_credential(env: Env, id: u64) -> Credential {
        match load_credential(&env, id) {
            Some(c) => c,
            None => panic_with_error!(&env, Error::NotFound),
        }
    }

    /// Holder account of credential `id`.
    pub fn get_credential_owner(env: Env, id: u64) -> Address {
        Self::get_credential(env, id).student
    }

    /// Credentials held by `student` at positions `start..start + limit`, in
    /// issuance order, revoked ones included.
    pub fn get_student_credentials(
        env: Env,
        student: Address,
        start: u32,
        limit: u32,
    ) -> Vec<Credential> {
        let ids = student_credential_ids(&env, &student, start, limit.min(MAX_PAGE_SIZE));
        Self::collect(&env, ids)
    }

    pub fn get_student_credential_count(env: Env, student: Address) -> u32 {
        student_credential_count(&env, &student)
    }

    /// Credentials issued by `university` at positions `start..start + limit`,
    /// in issuance order, revoked ones included.
    pub fn get_university_credentials(
        env: Env,
        university: Address,
        start: u32,
        limit: u32,
    ) -> Vec<Credential> {
        let ids = issuer_credential_ids(&env, &university, start, limit.min(MAX_PAGE_SIZE));
        Self::collect(&env, ids)
    }

    pub fn get_university_credential_count(env: Env, university: Address) -> u32 {
        issuer_credential_count(&env, &university)
    }

    /// Universities awaiting a decision, in registration order.
    ///
    /// Scans up to `limit` registration slots from `start`. Decided
    /// universities leave empty slots, so a page may hold fewer than `limit`
    /// entries while `more` is still `true`.
    pub fn get_pending_universities(env: Env, start: u32, limit: u32) -> PendingPage {
        let end = pending_slot_count(&env);
        let stop = start.saturating_add(limit.min(MAX_PAGE_SIZE)).min(end);

        let mut universities = Vec::new(&env);
        for slot in start..stop {
            let university =
                pending_at(&env, slot).and_then(|account| load_university(&env, &account));
            if let Some(university) = university {
                universities.push_back(university);
            }
        }

        let next = stop.max(start);
        PendingPage {
            universities,
            next,
            more: next < end,
        }
    }

    /// `true` iff `account` is a `Verified` university.
    pub fn is_university(env: Env, account: Address) -> bool {
        Self::get_university_status(env, account) == UniversityStatus::Verified
    }

    pub fn get_university_status(env: Env, account: Address) -> UniversityStatus {
        load_university(&env, &account)
            .map(|u| u.status)
            .unwrap_or(UniversityStatus::NotRegistered)
    }

    /// Registration record for `account`. Unseen accounts yield an empty
    /// `NotRegistered` record.
    pub fn get_university_info(env: Env, account: Address) -> University {
        load_university(&env, &account).unwrap_or_else(|| University {
            account,
            name: String::from_str(&env, ""),
            country: String::from_str(&env, ""),
            registration_number: String::from_str(&env, ""),
            status: UniversityStatus::NotRegistered,
            registered_at: 0,
        })
    }

    pub fn get_total_credentials(env: Env) -> u64 {
        credential_count(&env)
    }
}

impl ChainCred {
    /// Shared guard for approve/reject: authenticated admin, `Pending` target.
    fn pending_for_decision(env: &Env, admin: &Address, target: &Address) -> University {
        admin.require_auth();
        rbac::require_admin_or_above(env, admin);

        match load_university(env, target) {
            Some(u) if u.status == UniversityStatus::Pending => u,
            _ => panic_with_error!(env, Error::InvalidState),
        }
    }

    fn collect(env: &Env, ids: Vec<u64>) -> Vec<Credential> {
        let mut out = Vec::new(env);
        for id in ids.iter() {
            if let Some(credential) = load_credential(env, id) {
                out.push_back(credential);
            }
        }
        out
    }
}
