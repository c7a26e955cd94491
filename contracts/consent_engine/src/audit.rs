//! Append-only, hash-chained audit log kept per patient.
//!
//! Entries live under `DataKey::Audit(patient, seq)` with `seq` starting at 1
//! and never skipping. Each entry carries the hash of its predecessor and its
//! own hash over the entry with the `hash` field zeroed, so any edit to a
//! stored entry breaks [`verify`]. Nothing in this module rewrites or removes
//! an entry once written.

use soroban_sdk::{symbol_short, xdr::ToXdr, Address, BytesN, Env, Map, Symbol, Vec};

use crate::errors::Error;
use crate::events;
use crate::sequencer;
use crate::storage;
use crate::types::{
    AuditAction, AuditActor, AuditEvent, AuditFilter, AuditPage, AuditSubject, ChainCheck, DataKey,
    DetailValue, GrantStatus, PatientScope, ReplayedState,
};

pub const MAX_PAGE: u32 = 100;
pub const MAX_SCAN: u32 = 200;

pub const DETAIL_STATUS: Symbol = symbol_short!("status");

pub fn detail(env: &Env) -> Map<Symbol, DetailValue> {
    Map::new(env)
}

fn zero_hash(env: &Env) -> BytesN<32> {
    BytesN::from_array(env, &[0u8; 32])
}

fn entry_hash(env: &Env, event: &AuditEvent) -> BytesN<32> {
    let mut unsealed = event.clone();
    unsealed.hash = zero_hash(env);
    env.crypto().sha256(&unsealed.to_xdr(env)).into()
}

pub(crate) fn append(
    env: &Env,
    scope: &mut PatientScope,
    patient: &Address,
    actor: AuditActor,
    action: AuditAction,
    subject: AuditSubject,
    detail: Map<Symbol, DetailValue>,
) -> u64 {
    let seq = scope.next_seq;
    let mut event = AuditEvent {
        seq,
        patient: patient.clone(),
        actor,
        action,
        subject,
        timestamp: env.ledger().timestamp(),
        detail,
        prev_hash: scope.head_hash.clone(),
        hash: zero_hash(env),
    };
    event.hash = entry_hash(env, &event);

    storage::put(env, &DataKey::Audit(patient.clone(), seq), &event);
    scope.next_seq = seq.saturating_add(1);
    scope.head_hash = event.hash.clone();

    events::audit_appended(env, patient, seq, action);
    seq
}

pub fn get(env: &Env, patient: &Address, seq: u64) -> Option<AuditEvent> {
    storage::get(env, &DataKey::Audit(patient.clone(), seq))
}

fn matches(filter: &AuditFilter, event: &AuditEvent) -> bool {
    match filter {
        AuditFilter::All => true,
        AuditFilter::TimeRange(from, to) => event.timestamp >= *from && event.timestamp <= *to,
        AuditFilter::Actor(actor) => event.actor == *actor,
        AuditFilter::Action(action) => event.action == *action,
    }
}

/// Read-only, seq-ordered projection of a patient's log.
///
/// Scanning starts at `start` (clamped to 1) and stops after `limit` matches
/// or `MAX_SCAN` inspected entries; `next` is the cursor to resume from.
pub fn query(
    env: &Env,
    patient: &Address,
    filter: &AuditFilter,
    start: u64,
    limit: u32,
) -> Result<AuditPage, Error> {
    if limit == 0 || limit > MAX_PAGE {
        return Err(Error::InvalidPagination);
    }
    if let AuditFilter::TimeRange(from, to) = filter {
        if from > to {
            return Err(Error::InvalidTimeRange);
        }
    }

    let end = sequencer::peek(env, patient).next_seq;
    let mut seq = if start == 0 { 1 } else { start };
    let mut scanned = 0u32;
    let mut events = Vec::new(env);

    while seq < end && events.len() < limit && scanned < MAX_SCAN {
        if let Some(event) = get(env, patient, seq) {
            if matches(filter, &event) {
                events.push_back(event);
            }
        }
        seq += 1;
        scanned += 1;
    }

    let next = if seq < end { Some(seq) } else { None };
    Ok(AuditPage { events, next })
}

fn scan_window(
    env: &Env,
    patient: &Address,
    start: u64,
    limit: u32,
) -> Result<(u64, PatientScope), Error> {
    if limit == 0 || limit > MAX_SCAN {
        return Err(Error::InvalidPagination);
    }
    let scope = sequencer::peek(env, patient);
    let first = if start == 0 { 1 } else { start };
    if first > scope.next_seq {
        return Err(Error::InvalidPagination);
    }
    Ok((first, scope))
}

/// Recomputes the hash chain and checks `seq` continuity for at most `limit`
/// entries from `start`. The first entry is chained to the stored hash of its
/// predecessor. The window that reaches the head also checks the head hash.
pub fn verify(
    env: &Env,
    patient: &Address,
    start: u64,
    limit: u32,
) -> Result<ChainCheck, Error> {
    let (first, scope) = scan_window(env, patient, start, limit)?;

    let mut expected_prev = if first == 1 {
        zero_hash(env)
    } else {
        match get(env, patient, first - 1) {
            Some(event) => event.hash,
            None => {
                return Ok(ChainCheck {
                    valid: false,
                    checked: 0,
                    last_hash: zero_hash(env),
                    next: None,
                });
            }
        }
    };

    let mut seq = first;
    let mut checked = 0u32;
    while seq < scope.next_seq && checked < limit {
        let intact = match get(env, patient, seq) {
            Some(event) => {
                let linked = event.seq == seq
                    && event.patient == *patient
                    && event.prev_hash == expected_prev
                    && entry_hash(env, &event) == event.hash;
                expected_prev = event.hash;
                linked
            }
            None => false,
        };
        if !intact {
            return Ok(ChainCheck {
                valid: false,
                checked,
                last_hash: expected_prev,
                next: None,
            });
        }
        seq += 1;
        checked += 1;
    }

    let next = if seq < scope.next_seq { Some(seq) } else { None };
    let valid = next.is_some() || expected_prev == scope.head_hash;
    Ok(ChainCheck {
        valid,
        checked,
        last_hash: expected_prev,
        next,
    })
}

fn apply(state: &mut ReplayedState, event: &AuditEvent) {
    let grant_id = match event.subject {
        AuditSubject::Grant(id) => Some(id),
        _ => None,
    };
    match (event.action, grant_id) {
        (AuditAction::GrantCreated, Some(id)) => {
            let initial = match event.detail.get(DETAIL_STATUS) {
                Some(DetailValue::Label(label)) if label == symbol_short!("pending") => {
                    GrantStatus::Pending
                }
                _ => GrantStatus::Active,
            };
            state.grants.set(id, initial);
        }
        (AuditAction::GrantApproved, Some(id)) => state.grants.set(id, GrantStatus::Active),
        (AuditAction::GrantRevoked, Some(id)) => state.grants.set(id, GrantStatus::Revoked),
        (AuditAction::GrantExpired, Some(id)) => state.grants.set(id, GrantStatus::Expired),
        (AuditAction::EmergencyActivated, _) => state.emergency_active = true,
        (AuditAction::EmergencyDeactivated, _) => state.emergency_active = false,
        _ => {}
    }
}

/// Rebuilds grant statuses and the emergency flag from the log alone,
/// applying at most `limit` entries. Pass the returned state back in as
/// `resume` until it comes back `complete`.
pub fn replay(
    env: &Env,
    patient: &Address,
    resume: Option<ReplayedState>,
    limit: u32,
) -> Result<ReplayedState, Error> {
    let mut state = resume.unwrap_or(ReplayedState {
        grants: Map::new(env),
        emergency_active: false,
        events: 0,
        next_seq: 1,
        complete: false,
    });
    let (first, scope) = scan_window(env, patient, state.next_seq, limit)?;

    let mut seq = first;
    let mut applied = 0u32;
    while seq < scope.next_seq && applied < limit {
        if let Some(event) = get(env, patient, seq) {
            apply(&mut state, &event);
            state.events += 1;
        }
        seq += 1;
        applied += 1;
    }

    state.next_seq = seq;
    state.complete = seq == scope.next_seq;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::ScopeWriter;
    use crate::ConsentEngine;
    use soroban_sdk::testutils::{Address as _, Ledger};

    fn principal(address: &Address) -> AuditActor {
        AuditActor::Principal(address.clone())
    }

    #[test]
    fn test_append_assigns_gapless_sequence() {
        let env = Env::default();
        let contract_id = env.register_contract(None, ConsentEngine);
        let patient = Address::generate(&env);

        env.as_contract(&contract_id, || {
            let mut writer = ScopeWriter::open(&env, &patient);
            for expected in 1..=5u64 {
                let seq = writer.record(
                    &env,
                    principal(&patient),
                    AuditAction::RecordAccessed,
                    AuditSubject::Emergency,
                    detail(&env),
                );
                assert_eq!(seq, expected);
            }
            assert_eq!(writer.recorded(), 5);
            writer.commit(&env).unwrap();

            let head = sequencer::head(&env, &patient);
            assert_eq!(head.next_seq, 6);
            assert_eq!(head.version, 1);
            assert!(verify(&env, &patient, 0, MAX_SCAN).unwrap().valid);
        });
    }

    #[test]
    fn test_tampered_entry_breaks_chain() {
        let env = Env::default();
        let contract_id = env.register_contract(None, ConsentEngine);
        let patient = Address::generate(&env);
        let intruder = Address::generate(&env);

        env.as_contract(&contract_id, || {
            let mut writer = ScopeWriter::open(&env, &patient);
            for _ in 0..3 {
                writer.record(
                    &env,
                    principal(&patient),
                    AuditAction::GrantCreated,
                    AuditSubject::Grant(1),
                    detail(&env),
                );
            }
            writer.commit(&env).unwrap();
            assert!(verify(&env, &patient, 0, MAX_SCAN).unwrap().valid);

            let mut event = get(&env, &patient, 2).unwrap();
            event.actor = principal(&intruder);
            env.storage()
                .persistent()
                .set(&DataKey::Audit(patient.clone(), 2), &event);

            assert!(!verify(&env, &patient, 0, MAX_SCAN).unwrap().valid);

            // only the window holding the edited entry fails
            assert!(verify(&env, &patient, 1, 1).unwrap().valid);
            assert!(!verify(&env, &patient, 2, 1).unwrap().valid);
        });
    }

    #[test]
    fn test_query_filters_and_paginates() {
        let env = Env::default();
        let contract_id = env.register_contract(None, ConsentEngine);
        let patient = Address::generate(&env);
        let doctor = Address::generate(&env);

        env.as_contract(&contract_id, || {
            let mut writer = ScopeWriter::open(&env, &patient);
            for i in 0..6u64 {
                env.ledger().with_mut(|l| l.timestamp = 1_000 + i * 10);
                let actor = if i % 2 == 0 { &patient } else { &doctor };
                writer.record(
                    &env,
                    principal(actor),
                    AuditAction::RecordAccessed,
                    AuditSubject::Record(symbol_short!("imaging")),
                    detail(&env),
                );
            }
            writer.commit(&env).unwrap();

            let page = query(&env, &patient, &AuditFilter::All, 0, 4).unwrap();
            assert_eq!(page.events.len(), 4);
            assert_eq!(page.next, Some(5));

            let rest = query(&env, &patient, &AuditFilter::All, 5, 4).unwrap();
            assert_eq!(rest.events.len(), 2);
            assert_eq!(rest.next, None);

            let by_doctor = query(&env, &patient, &AuditFilter::Actor(principal(&doctor)), 0, 10)
                .unwrap();
            assert_eq!(by_doctor.events.len(), 3);

            let window = query(&env, &patient, &AuditFilter::TimeRange(1_010, 1_030), 0, 10)
                .unwrap();
            assert_eq!(window.events.len(), 3);
            assert_eq!(window.events.get(0).unwrap().seq, 2);

            assert_eq!(
                query(&env, &patient, &AuditFilter::All, 0, 0),
                Err(Error::InvalidPagination)
            );
            assert_eq!(
                query(&env, &patient, &AuditFilter::TimeRange(10, 5), 0, 10),
                Err(Error::InvalidTimeRange)
            );
        });
    }

    #[test]
    fn test_verify_and_replay_resume_across_windows() {
        let env = Env::default();
        let contract_id = env.register_contract(None, ConsentEngine);
        let patient = Address::generate(&env);

        env.as_contract(&contract_id, || {
            let mut writer = ScopeWriter::open(&env, &patient);
            for id in 1..=7u64 {
                writer.record(
                    &env,
                    principal(&patient),
                    AuditAction::GrantCreated,
                    AuditSubject::Grant(id),
                    detail(&env),
                );
            }
            writer.commit(&env).unwrap();

            let first = verify(&env, &patient, 0, 3).unwrap();
            assert!(first.valid);
            assert_eq!(first.checked, 3);
            assert_eq!(first.next, Some(4));
            assert_eq!(first.last_hash, get(&env, &patient, 3).unwrap().hash);
            assert_eq!(get(&env, &patient, 4).unwrap().prev_hash, first.last_hash);

            let second = verify(&env, &patient, 4, 3).unwrap();
            assert_eq!(second.next, Some(7));
            let last = verify(&env, &patient, 7, 3).unwrap();
            assert!(last.valid);
            assert_eq!(last.checked, 1);
            assert_eq!(last.next, None);
            assert_eq!(last.last_hash, sequencer::head(&env, &patient).head_hash);

            let mut state = replay(&env, &patient, None, 3).unwrap();
            assert!(!state.complete);
            assert_eq!(state.next_seq, 4);
            while !state.complete {
                state = replay(&env, &patient, Some(state), 3).unwrap();
            }
            assert_eq!(state.events, 7);
            assert_eq!(state.grants.len(), 7);

            assert_eq!(verify(&env, &patient, 0, 0), Err(Error::InvalidPagination));
            assert_eq!(
                verify(&env, &patient, 0, MAX_SCAN + 1),
                Err(Error::InvalidPagination)
            );
            assert_eq!(verify(&env, &patient, 9, 3), Err(Error::InvalidPagination));
        });
    }
}
