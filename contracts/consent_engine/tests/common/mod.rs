#![allow(dead_code)]

use consent_engine::{
    AccessLevel, AuditAction, AuditEvent, AuditFilter, ConsentEngine, ConsentEngineClient,
    EmergencyContact, EmergencyScope, EngineConfig, GrantRequest, MultiSigPolicy, ReplayedState,
};
use soroban_sdk::testutils::{Address as _, Ledger};
use soroban_sdk::{vec, Address, Env, Symbol, Vec};

pub const DAY: u64 = 86_400;
pub const START: u64 = 1_700_000_000;

pub struct EngineTest<'a> {
    pub client: ConsentEngineClient<'a>,
    pub admin: Address,
    pub patient: Address,
    pub doctor: Address,
    pub hospital: Address,
}

pub fn default_config() -> EngineConfig {
    EngineConfig {
        provider_can_revoke: false,
        emergency_scope: EmergencyScope::Roster,
        confirmation_ttl: 600,
        max_grant_duration: 0,
        max_approvers: 5,
    }
}

pub fn setup_engine(env: &Env) -> EngineTest<'_> {
    setup_with_config(env, default_config())
}

pub fn setup_with_config(env: &Env, config: EngineConfig) -> EngineTest<'_> {
    env.mock_all_auths();
    env.ledger().with_mut(|l| l.timestamp = START);

    let contract_id = env.register_contract(None, ConsentEngine);
    let client = ConsentEngineClient::new(env, &contract_id);

    let admin = Address::generate(env);
    client.initialize(&admin, &config);
    for name in ["blood_test", "imaging", "genomics", "allergies"] {
        client.register_category(&admin, &Symbol::new(env, name));
    }

    EngineTest {
        client,
        admin,
        patient: Address::generate(env),
        doctor: Address::generate(env),
        hospital: Address::generate(env),
    }
}

pub fn cat(env: &Env, name: &str) -> Symbol {
    Symbol::new(env, name)
}

pub fn now(env: &Env) -> u64 {
    env.ledger().timestamp()
}

pub fn advance(env: &Env, seconds: u64) {
    let next = env.ledger().timestamp() + seconds;
    env.ledger().with_mut(|l| l.timestamp = next);
}

pub fn simple_request(
    env: &Env,
    patient: &Address,
    provider: &Address,
    categories: &[&str],
    duration: u64,
) -> GrantRequest {
    let mut list = Vec::new(env);
    for name in categories {
        list.push_back(cat(env, name));
    }
    GrantRequest {
        patient: patient.clone(),
        provider: provider.clone(),
        categories: list,
        access_level: AccessLevel::Read,
        expiry: now(env) + duration,
        multisig: None,
        tokenize: false,
    }
}

pub fn multisig_request(
    env: &Env,
    patient: &Address,
    provider: &Address,
    approvers: Vec<Address>,
    threshold: u32,
    window: u64,
) -> GrantRequest {
    let mut request = simple_request(env, patient, provider, &["blood_test"], 30 * DAY);
    request.multisig = Some(MultiSigPolicy {
        approvers,
        threshold,
        deadline: now(env) + window,
    });
    request
}

pub fn full_contact(env: &Env, id: &Address) -> EmergencyContact {
    EmergencyContact {
        id: id.clone(),
        access_level: AccessLevel::Full,
        categories: vec![env],
    }
}

pub fn all_events(env: &Env, t: &EngineTest, patient: &Address) -> Vec<AuditEvent> {
    let mut out = Vec::new(env);
    let mut start = 0u64;
    loop {
        let page = t.client.audit_events(patient, &AuditFilter::All, &start, &100u32);
        for event in page.events.iter() {
            out.push_back(event);
        }
        match page.next {
            Some(next) => start = next,
            None => break,
        }
    }
    out
}

/// Walks the whole hash chain in windows of `window` entries.
pub fn verify_trail(t: &EngineTest, patient: &Address, window: u32) -> bool {
    let mut start = 0u64;
    loop {
        let check = t.client.verify_audit_trail(patient, &start, &window);
        if !check.valid {
            return false;
        }
        match check.next {
            Some(next) => start = next,
            None => return true,
        }
    }
}

pub fn replay_all(t: &EngineTest, patient: &Address, window: u32) -> ReplayedState {
    let mut state = t.client.replay(patient, &None, &window);
    while !state.complete {
        state = t.client.replay(patient, &Some(state), &window);
    }
    state
}

pub fn count_action(t: &EngineTest, patient: &Address, action: AuditAction) -> u32 {
    t.client
        .audit_events(patient, &AuditFilter::Action(action), &0u64, &100u32)
        .events
        .len()
}

pub fn next_seq(t: &EngineTest, patient: &Address) -> u64 {
    t.client.audit_head(patient).next_seq
}
