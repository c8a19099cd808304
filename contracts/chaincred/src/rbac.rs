//! # Role-Based Access Control
//!
//! ChainCred has two administrative roles:
//!
//! | Role         | Holders | May                                                        |
//! |--------------|---------|------------------------------------------------------------|
//! | `SuperAdmin` | exactly one | everything an `Admin` may, plus transfer SuperAdmin    |
//! | `Admin`      | any     | grant/revoke `Admin`, approve/reject university registrations |
//!
//! Universities are *not* a role: issuing rights follow from a university's
//! `Verified` status, which only an admin can grant.
//!
//! Every check here returns a tagged contract error through
//! `panic_with_error!` instead of a bare panic.

use soroban_sdk::{contracttype, panic_with_error, symbol_short, Address, Env};

use crate::storage::{bump_instance, PERSISTENT_BUMP_AMOUNT, PERSISTENT_LIFETIME_THRESHOLD};
use crate::Error;

/// Administrative role held by an address.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    SuperAdmin,
    Admin,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RbacKey {
    /// Current SuperAdmin address (Instance).
    SuperAdmin,
    /// Role assigned to an address (Persistent).
    Role(Address),
}

// ── Storage ──────────────────────────────────────────────────────────

fn store_role(env: &Env, address: &Address, role: Role) {
    let key = RbacKey::Role(address.clone());
    env.storage().persistent().set(&key, &role);
    env.storage()
        .persistent()
        .extend_ttl(&key, PERSISTENT_LIFETIME_THRESHOLD, PERSISTENT_BUMP_AMOUNT);
}

fn clear_role(env: &Env, address: &Address) {
    env.storage()
        .persistent()
        .remove(&RbacKey::Role(address.clone()));
}

fn super_admin(env: &Env) -> Option<Address> {
    bump_instance(env);
    env.storage().instance().get(&RbacKey::SuperAdmin)
}

// ── Initialisation ───────────────────────────────────────────────────

/// Record the first SuperAdmin. Panics with `AlreadyInitialized` on a
/// second call.
pub fn init_super_admin(env: &Env, address: &Address) {
    if env.storage().instance().has(&RbacKey::SuperAdmin) {
        panic_with_error!(env, Error::AlreadyInitialized);
    }
    env.storage().instance().set(&RbacKey::SuperAdmin, address);
    bump_instance(env);
    store_role(env, address, Role::SuperAdmin);

    env.events()
        .publish((symbol_short!("role_set"), address.clone()), Role::SuperAdmin);
}

// ── Queries ──────────────────────────────────────────────────────────

/// Role held by `address`. A hit keeps the entry alive like any other read.
pub fn role_of(env: &Env, address: Address) -> Option<Role> {
    let key = RbacKey::Role(address);
    let role: Option<Role> = env.storage().persistent().get(&key);
    if role.is_some() {
        env.storage()
            .persistent()
            .extend_ttl(&key, PERSISTENT_LIFETIME_THRESHOLD, PERSISTENT_BUMP_AMOUNT);
    }
    role
}

pub fn has_role(env: &Env, address: Address, role: Role) -> bool {
    role_of(env, address) == Some(role)
}

/// `true` for SuperAdmin and Admin holders.
pub fn is_admin(env: &Env, address: &Address) -> bool {
    matches!(
        role_of(env, address.clone()),
        Some(Role::SuperAdmin) | Some(Role::Admin)
    )
}

// ── Guards ───────────────────────────────────────────────────────────

/// Fail with `NotInitialized` before `init`, `Unauthorized` for non-admins.
pub fn require_admin_or_above(env: &Env, caller: &Address) {
    if super_admin(env).is_none() {
        panic_with_error!(env, Error::NotInitialized);
    }
    if !is_admin(env, caller) {
        panic_with_error!(env, Error::Unauthorized);
    }
}

// ── Mutations ────────────────────────────────────────────────────────

/// Grant `role` to `target`. Only `Admin` can be granted this way; the
/// SuperAdmin seat moves only through [`transfer_super_admin`].
pub fn grant_role(env: &Env, caller: &Address, target: &Address, role: Role) {
    caller.require_auth();
    require_admin_or_above(env, caller);

    if role == Role::SuperAdmin {
        panic_with_error!(env, Error::Unauthorized);
    }
    // The SuperAdmin cannot be demoted by a grant.
    if has_role(env, target.clone(), Role::SuperAdmin) {
        panic_with_error!(env, Error::Unauthorized);
    }

    store_role(env, target, role);
    env.events()
        .publish((symbol_short!("role_set"), target.clone()), role);
}

/// Remove whatever role `target` holds.
pub fn revoke_role(env: &Env, caller: &Address, target: &Address) {
    caller.require_auth();
    require_admin_or_above(env, caller);

    match role_of(env, target.clone()) {
        None => panic_with_error!(env, Error::RoleNotFound),
        Some(Role::SuperAdmin) => panic_with_error!(env, Error::Unauthorized),
        Some(Role::Admin) => {}
    }

    clear_role(env, target);
    env.events()
        .publish((symbol_short!("role_del"), target.clone()), caller.clone());
}

/// Hand the SuperAdmin seat to `new_super_admin`. The previous holder loses
/// the role immediately.
pub fn transfer_super_admin(env: &Env, current: &Address, new_super_admin: &Address) {
    current.require_auth();
    match super_admin(env) {
        None => panic_with_error!(env, Error::NotInitialized),
        Some(holder) if holder != *current => panic_with_error!(env, Error::Unauthorized),
        Some(_) => {}
    }

    clear_role(env, current);
    store_role(env, new_super_admin, Role::SuperAdmin);
    env.storage()
        .instance()
        .set(&RbacKey::SuperAdmin, new_super_admin);

    env.events()
        .publish((symbol_short!("role_del"), current.clone()), current.clone());
    env.events().publish(
        (symbol_short!("role_set"), new_super_admin.clone()),
        Role::SuperAdmin,
    );
}
