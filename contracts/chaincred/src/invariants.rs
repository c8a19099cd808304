#![allow(dead_code)]

extern crate std;

use crate::types::{
    Credential, CredentialLookup, CredentialStatus, UniversityStatus, Verification,
};

/// INV-1: University status only moves forward:
///   NotRegistered -> Pending
///   Pending       -> Verified | Rejected
///   Verified      -> (none)
///   Rejected      -> (none)
/// Staying in place is always allowed.
pub fn assert_valid_university_transition(from: UniversityStatus, to: UniversityStatus) {
    let valid = from == to
        || matches!(
            (from, to),
            (UniversityStatus::NotRegistered, UniversityStatus::Pending)
                | (UniversityStatus::Pending, UniversityStatus::Verified)
                | (UniversityStatus::Pending, UniversityStatus::Rejected)
        );

    assert!(
        valid,
        "INV-1 violated: invalid university transition from {:?} to {:?}",
        from, to
    );
}

/// INV-2: Revocation is one-way.
pub fn assert_revocation_monotonic(before: &Credential, after: &Credential) {
    assert!(
        !before.revoked || after.revoked,
        "INV-2 violated: credential {} was un-revoked",
        before.id
    );
}

/// INV-3: Credential ids are sequential starting from 0.
pub fn assert_sequential_ids(credentials: &[Credential]) {
    for (i, credential) in credentials.iter().enumerate() {
        assert_eq!(
            credential.id, i as u64,
            "INV-3 violated: expected id {}, got {}",
            i, credential.id
        );
    }
}

/// INV-4: Everything except the revocation fields is fixed at issuance.
pub fn assert_credential_immutable_fields(original: &Credential, current: &Credential) {
    assert_eq!(original.id, current.id, "INV-4 violated: credential id changed");
    assert_eq!(
        original.student, current.student,
        "INV-4 violated: credential holder changed"
    );
    assert_eq!(
        original.issuer, current.issuer,
        "INV-4 violated: credential issuer changed"
    );
    assert_eq!(
        original.details, current.details,
        "INV-4 violated: credential details changed"
    );
    assert_eq!(
        original.metadata_uri, current.metadata_uri,
        "INV-4 violated: credential metadata pointer changed"
    );
    assert_eq!(
        original.issued_at, current.issued_at,
        "INV-4 violated: credential issuance time changed"
    );
}

/// INV-5: A verification result is internally consistent: valid iff active,
/// record present iff the id exists, and the record agrees with the status.
pub fn assert_verification_consistent(v: &Verification) {
    match v.status {
        CredentialStatus::Active => {
            assert!(v.is_valid, "INV-5 violated: active credential reported invalid");
            let c = v.credential.found().expect("INV-5 violated: active without record");
            assert!(!c.revoked, "INV-5 violated: active record flagged revoked");
        }
        CredentialStatus::Revoked => {
            assert!(!v.is_valid, "INV-5 violated: revoked credential reported valid");
            let c = v.credential.found().expect("INV-5 violated: revoked without record");
            assert!(c.revoked, "INV-5 violated: revoked record not flagged");
        }
        CredentialStatus::NotFound => {
            assert!(!v.is_valid, "INV-5 violated: missing credential reported valid");
            assert!(
                v.credential == CredentialLookup::NotFound,
                "INV-5 violated: missing credential returned a record"
            );
        }
    }
}

/// INV-6: An active credential carries no revocation timestamp, and a
/// revoked one was not revoked before it was issued.
pub fn assert_revocation_timestamp(credential: &Credential) {
    if credential.revoked {
        assert!(
            credential.revoked_at >= credential.issued_at,
            "INV-6 violated: credential {} revoked before issuance",
            credential.id
        );
    } else {
        assert_eq!(
            credential.revoked_at, 0,
            "INV-6 violated: active credential {} has a revocation time",
            credential.id
        );
    }
}

/// Run all stateless credential invariants.
pub fn assert_all_credential_invariants(credential: &Credential) {
    assert_revocation_timestamp(credential);
}
