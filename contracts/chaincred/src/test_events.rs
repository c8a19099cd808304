extern crate std;

use soroban_sdk::{
    symbol_short,
    testutils::{Address as _, Events, Ledger},
    vec, Address, Env, IntoVal, String, TryIntoVal,
};

use crate::events::{
    CredentialIssued, CredentialRevoked, UniversityAdded, UniversityRegistered,
    UniversityRejected,
};
use crate::{ChainCred, ChainCredClient, CredentialDetails, Role};

fn setup_with_init() -> (Env, ChainCredClient<'static>, Address) {
    let env = Env::default();
    env.mock_all_auths();
    let contract_id = env.register(ChainCred, ());
    let client = ChainCredClient::new(&env, &contract_id);
    let super_admin = Address::generate(&env);
    client.init(&super_admin);
    (env, client, super_admin)
}

fn details(env: &Env) -> CredentialDetails {
    CredentialDetails {
        student_name: String::from_str(env, "Grace Hopper"),
        student_id: String::from_str(env, "S-1906"),
        university: String::from_str(env, "State U"),
        degree: String::from_str(env, "Doctor of Philosophy"),
        major: String::from_str(env, "Mathematics"),
        issue_date: String::from_str(env, "2024-06-01"),
        graduation_date: String::from_str(env, "2024-05-20"),
    }
}

fn register(env: &Env, client: &ChainCredClient, university: &Address) {
    client.register_university(
        university,
        &String::from_str(env, "State U"),
        &String::from_str(env, "X"),
        &String::from_str(env, "123"),
    );
}

#[test]
fn test_university_registered_event() {
    let (env, client, _) = setup_with_init();
    let university = Address::generate(&env);
    register(&env, &client, &university);

    let all_events = env.events().all();
    let last_event = all_events.last().expect("No events found");

    // Topic: (symbol_short!("uni_reg"), university)
    assert_eq!(last_event.0, client.address);
    let expected_topics = vec![
        &env,
        symbol_short!("uni_reg").into_val(&env),
        university.into_val(&env),
    ];
    assert_eq!(last_event.1, expected_topics);

    let event_data: UniversityRegistered = last_event.2.try_into_val(&env).unwrap();
    assert_eq!(
        event_data,
        UniversityRegistered {
            university: university.clone(),
            name: String::from_str(&env, "State U"),
            country: String::from_str(&env, "X"),
        }
    );
}

#[test]
fn test_university_added_event_on_approval() {
    let (env, client, super_admin) = setup_with_init();
    let university = Address::generate(&env);
    register(&env, &client, &university);
    client.approve_university(&super_admin, &university);

    let all_events = env.events().all();
    let last_event = all_events.last().expect("No events found");

    let expected_topics = vec![
        &env,
        symbol_short!("uni_add").into_val(&env),
        university.into_val(&env),
    ];
    assert_eq!(last_event.1, expected_topics);

    let event_data: UniversityAdded = last_event.2.try_into_val(&env).unwrap();
    assert_eq!(
        event_data,
        UniversityAdded {
            university: university.clone(),
            name: String::from_str(&env, "State U"),
        }
    );
}

#[test]
fn test_university_rejected_event() {
    let (env, client, super_admin) = setup_with_init();
    let university = Address::generate(&env);
    register(&env, &client, &university);
    client.reject_university(&super_admin, &university);

    let all_events = env.events().all();
    let last_event = all_events.last().expect("No events found");

    let expected_topics = vec![
        &env,
        symbol_short!("uni_rej").into_val(&env),
        university.into_val(&env),
    ];
    assert_eq!(last_event.1, expected_topics);

    let event_data: UniversityRejected = last_event.2.try_into_val(&env).unwrap();
    assert_eq!(
        event_data,
        UniversityRejected {
            university: university.clone(),
            rejected_by: super_admin.clone(),
        }
    );
}

#[test]
fn test_credential_issued_event() {
    let (env, client, super_admin) = setup_with_init();
    let university = Address::generate(&env);
    let student = Address::generate(&env);
    let uri = String::from_str(&env, "ipfs://bafkreiexample");
    register(&env, &client, &university);
    client.approve_university(&super_admin, &university);

    let id = client.issue_credential(&university, &student, &details(&env), &uri);

    let all_events = env.events().all();
    let last_event = all_events.last().expect("No events found");

    // Topic: (symbol_short!("issued"), token_id)
    assert_eq!(last_event.0, client.address);
    let expected_topics = vec![
        &env,
        symbol_short!("issued").into_val(&env),
        id.into_val(&env),
    ];
    assert_eq!(last_event.1, expected_topics);

    let event_data: CredentialIssued = last_event.2.try_into_val(&env).unwrap();
    assert_eq!(
        event_data,
        CredentialIssued {
            token_id: id,
            student: student.clone(),
            university: university.clone(),
            degree: String::from_str(&env, "Doctor of Philosophy"),
            major: String::from_str(&env, "Mathematics"),
            metadata_uri: uri,
        }
    );
}

#[test]
fn test_credential_revoked_event() {
    let (env, client, super_admin) = setup_with_init();
    let university = Address::generate(&env);
    let student = Address::generate(&env);
    register(&env, &client, &university);
    client.approve_university(&super_admin, &university);
    let id = client.issue_credential(
        &university,
        &student,
        &details(&env),
        &String::from_str(&env, ""),
    );

    env.ledger().with_mut(|li| li.timestamp = 86_400);
    client.revoke_credential(&university, &id);

    let all_events = env.events().all();
    let last_event = all_events.last().expect("No events found");

    let expected_topics = vec![
        &env,
        symbol_short!("revoked").into_val(&env),
        id.into_val(&env),
    ];
    assert_eq!(last_event.1, expected_topics);

    let event_data: CredentialRevoked = last_event.2.try_into_val(&env).unwrap();
    assert_eq!(
        event_data,
        CredentialRevoked {
            token_id: id,
            revoked_by: university.clone(),
            timestamp: 86_400,
        }
    );
}

#[test]
fn test_role_set_event() {
    let (env, client, super_admin) = setup_with_init();
    let admin = Address::generate(&env);
    client.grant_role(&super_admin, &admin, &Role::Admin);

    let all_events = env.events().all();
    let last_event = all_events.last().expect("No events found");

    let expected_topics = vec![
        &env,
        symbol_short!("role_set").into_val(&env),
        admin.into_val(&env),
    ];
    assert_eq!(last_event.1, expected_topics);

    let role: Role = last_event.2.try_into_val(&env).unwrap();
    assert_eq!(role, Role::Admin);
}
