//! Break-glass access for a patient's emergency roster.
//!
//! Activation by a person is a two-step handshake: the patient or a roster
//! contact asks for a one-time confirmation token, then presents it before it
//! expires. A registered medical-alert source may activate without a token.

use soroban_sdk::{symbol_short, xdr::ToXdr, Address, BytesN, Env, Symbol, Vec};

use crate::audit;
use crate::errors::Error;
use crate::sequencer::ScopeWriter;
use crate::storage;
use crate::types::{
    AccessLevel, AuditAction, AuditActor, AuditSubject, ConfirmationChallenge, DataKey,
    DetailValue, EmergencyContact, EmergencyScope, EmergencyState, EngineConfig,
};
use crate::validation;

const DETAIL_CONTACTS: Symbol = symbol_short!("contacts");
const DETAIL_FLAGGED: Symbol = symbol_short!("flagged");
const DETAIL_EXPIRES: Symbol = symbol_short!("expires");
const DETAIL_SOURCE: Symbol = symbol_short!("source");

pub fn load(env: &Env, patient: &Address) -> EmergencyState {
    storage::get(env, &DataKey::Emergency(patient.clone())).unwrap_or(EmergencyState {
        active: false,
        activated_by: None,
        activated_at: 0,
        challenge: None,
        contacts: Vec::new(env),
        flagged_categories: Vec::new(env),
    })
}

fn save(env: &Env, patient: &Address, state: &EmergencyState) {
    storage::put(env, &DataKey::Emergency(patient.clone()), state);
}

fn find_contact(state: &EmergencyState, actor: &Address) -> Option<EmergencyContact> {
    state.contacts.iter().find(|c| c.id == *actor)
}

/// Replaces the roster and the emergency-accessible categories. An
/// outstanding confirmation token held by a dropped contact is discarded.
pub fn configure(
    env: &Env,
    writer: &mut ScopeWriter,
    contacts: Vec<EmergencyContact>,
    flagged_categories: Vec<Symbol>,
) -> Result<(), Error> {
    let patient = writer.patient().clone();
    validation::validate_contacts(env, &patient, &contacts)?;
    validation::validate_categories(env, &flagged_categories)?;

    let mut state = load(env, &patient);
    let mut detail = audit::detail(env);
    detail.set(DETAIL_CONTACTS, DetailValue::Count(contacts.len()));
    detail.set(DETAIL_FLAGGED, DetailValue::Count(flagged_categories.len()));

    state.contacts = contacts;
    state.flagged_categories = flagged_categories;
    let stale = match &state.challenge {
        Some(challenge) => {
            challenge.actor != patient && find_contact(&state, &challenge.actor).is_none()
        }
        None => false,
    };
    if stale {
        state.challenge = None;
    }
    save(env, &patient, &state);

    writer.record(
        env,
        AuditActor::Principal(patient),
        AuditAction::EmergencyConfigured,
        AuditSubject::Emergency,
        detail,
    );
    Ok(())
}

/// Issues a fresh confirmation token to `actor`, replacing any earlier one.
pub fn issue_token(
    env: &Env,
    writer: &mut ScopeWriter,
    config: &EngineConfig,
    actor: &Address,
) -> Result<BytesN<32>, Error> {
    let patient = writer.patient().clone();
    let mut state = load(env, &patient);
    if state.contacts.is_empty() {
        return Err(Error::EmergencyNotConfigured);
    }
    if *actor != patient && find_contact(&state, actor).is_none() {
        return Err(Error::Unauthorized);
    }
    if state.active {
        return Err(Error::EmergencyAlreadyActive);
    }

    let now = env.ledger().timestamp();
    let salt: u64 = env.prng().gen();
    let preimage = (patient.clone(), actor.clone(), now, salt).to_xdr(env);
    let token: BytesN<32> = env.crypto().sha256(&preimage).into();
    let expires_at = now.saturating_add(config.confirmation_ttl);

    state.challenge = Some(ConfirmationChallenge {
        actor: actor.clone(),
        token: token.clone(),
        issued_at: now,
        expires_at,
    });
    save(env, &patient, &state);

    let mut detail = audit::detail(env);
    detail.set(DETAIL_EXPIRES, DetailValue::Time(expires_at));
    writer.record(
        env,
        AuditActor::Principal(actor.clone()),
        AuditAction::EmergencyTokenIssued,
        AuditSubject::Emergency,
        detail,
    );
    Ok(token)
}

/// Consumes the confirmation token issued to `actor` and turns emergency
/// access on.
pub fn activate(
    env: &Env,
    writer: &mut ScopeWriter,
    actor: &Address,
    token: &BytesN<32>,
) -> Result<(), Error> {
    let patient = writer.patient().clone();
    let mut state = load(env, &patient);
    if state.contacts.is_empty() {
        return Err(Error::EmergencyNotConfigured);
    }
    if *actor != patient && find_contact(&state, actor).is_none() {
        return Err(Error::Unauthorized);
    }
    if state.active {
        return Err(Error::EmergencyAlreadyActive);
    }

    let now = env.ledger().timestamp();
    let challenge = match &state.challenge {
        Some(challenge) if challenge.actor == *actor => challenge.clone(),
        _ => return Err(Error::NoPendingConfirmation),
    };
    if now >= challenge.expires_at {
        return Err(Error::ConfirmationExpired);
    }
    if challenge.token != *token {
        return Err(Error::InvalidConfirmationToken);
    }

    state.active = true;
    state.activated_by = Some(AuditActor::Principal(actor.clone()));
    state.activated_at = now;
    state.challenge = None;
    save(env, &patient, &state);

    writer.record(
        env,
        AuditActor::Principal(actor.clone()),
        AuditAction::EmergencyActivated,
        AuditSubject::Emergency,
        audit::detail(env),
    );
    Ok(())
}

/// Activation driven by a medical-alert source. The caller has already
/// checked that `source` is registered.
pub fn auto_activate(
    env: &Env,
    writer: &mut ScopeWriter,
    source: &Address,
    alert_id: Symbol,
) -> Result<(), Error> {
    let patient = writer.patient().clone();
    let mut state = load(env, &patient);
    if state.contacts.is_empty() {
        return Err(Error::EmergencyNotConfigured);
    }
    if state.active {
        return Err(Error::EmergencyAlreadyActive);
    }

    let actor = AuditActor::AutoTrigger(alert_id);
    state.active = true;
    state.activated_by = Some(actor.clone());
    state.activated_at = env.ledger().timestamp();
    state.challenge = None;
    save(env, &patient, &state);

    let mut detail = audit::detail(env);
    detail.set(DETAIL_SOURCE, DetailValue::Principal(source.clone()));
    writer.record(
        env,
        actor,
        AuditAction::EmergencyActivated,
        AuditSubject::Emergency,
        detail,
    );
    Ok(())
}

/// Returns `false` when emergency access was already off.
pub fn deactivate(env: &Env, writer: &mut ScopeWriter, actor: &Address) -> Result<bool, Error> {
    let patient = writer.patient().clone();
    let mut state = load(env, &patient);
    if !state.active {
        return Ok(false);
    }
    let is_activator = state.activated_by == Some(AuditActor::Principal(actor.clone()));
    if *actor != patient && !is_activator {
        return Err(Error::Unauthorized);
    }

    state.active = false;
    state.activated_by = None;
    save(env, &patient, &state);

    writer.record(
        env,
        AuditActor::Principal(actor.clone()),
        AuditAction::EmergencyDeactivated,
        AuditSubject::Emergency,
        audit::detail(env),
    );
    Ok(true)
}

/// Whether `actor` may read `category` under the current emergency.
pub fn covers(
    state: &EmergencyState,
    config: &EngineConfig,
    actor: &Address,
    category: &Symbol,
) -> bool {
    if !state.active {
        return false;
    }
    let Some(contact) = find_contact(state, actor) else {
        return false;
    };
    let listed = contact.access_level == AccessLevel::Full || contact.categories.contains(category);
    if !listed {
        return false;
    }
    match config.emergency_scope {
        EmergencyScope::Roster => true,
        EmergencyScope::FlaggedCategories => state.flagged_categories.contains(category),
    }
}
