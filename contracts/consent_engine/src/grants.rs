//! Grant store and the grant state machine.
//!
//! ```text
//! Pending --threshold met--> Active --revoke--> Revoked
//!    |                         |
//!    +--revoke / deadline--> Revoked   +--now >= expiry--> Expired
//! ```
//!
//! Revoked and Expired are terminal. Every transition appends exactly one
//! audit event through the patient's [`ScopeWriter`].

use soroban_sdk::{symbol_short, Address, Env, Symbol, Vec};

use crate::audit::{self, DETAIL_STATUS};
use crate::errors::Error;
use crate::events;
use crate::multisig;
use crate::sequencer::ScopeWriter;
use crate::storage;
use crate::token;
use crate::types::{
    AuditAction, AuditActor, AuditSubject, ConsentGrant, DataKey, DetailValue, EngineConfig,
    GrantRequest, GrantStatus, RequestState, RevocationReason, RevokeOutcome,
};
use crate::validation;

const DETAIL_PROVIDER: Symbol = symbol_short!("provider");
const DETAIL_EXPIRY: Symbol = symbol_short!("expiry");
const DETAIL_REQUEST: Symbol = symbol_short!("request");
const DETAIL_TOKEN: Symbol = symbol_short!("token");
const DETAIL_REASON: Symbol = symbol_short!("reason");
const DETAIL_APPROVER: Symbol = symbol_short!("approver");

/// Actor recorded for transitions the engine drives on its own (expiry pins,
/// missed deadlines).
pub fn system_actor(env: &Env) -> AuditActor {
    AuditActor::Principal(env.current_contract_address())
}

pub fn reason_label(reason: RevocationReason) -> Symbol {
    match reason {
        RevocationReason::PatientRevoked => symbol_short!("patient"),
        RevocationReason::ProviderRevoked => symbol_short!("provider"),
        RevocationReason::ThresholdNotMet => symbol_short!("threshold"),
    }
}

// ==================== Storage ====================

pub fn load(env: &Env, patient: &Address, grant_id: u64) -> Result<ConsentGrant, Error> {
    storage::get(env, &DataKey::Grant(patient.clone(), grant_id)).ok_or(Error::GrantNotFound)
}

pub fn save(env: &Env, grant: &ConsentGrant) {
    storage::put(env, &DataKey::Grant(grant.patient.clone(), grant.id), grant);
}

pub fn patient_grant_ids(env: &Env, patient: &Address) -> Vec<u64> {
    storage::get(env, &DataKey::PatientGrants(patient.clone())).unwrap_or(Vec::new(env))
}

/// Ids of the grants `patient` issued to `provider`, ascending.
pub fn provider_grant_ids(env: &Env, patient: &Address, provider: &Address) -> Vec<u64> {
    storage::get(
        env,
        &DataKey::ProviderGrants(patient.clone(), provider.clone()),
    )
    .unwrap_or(Vec::new(env))
}

fn index(env: &Env, grant: &ConsentGrant) {
    let mut by_patient = patient_grant_ids(env, &grant.patient);
    by_patient.push_back(grant.id);
    storage::put(env, &DataKey::PatientGrants(grant.patient.clone()), &by_patient);

    let mut by_provider = provider_grant_ids(env, &grant.patient, &grant.provider);
    by_provider.push_back(grant.id);
    storage::put(
        env,
        &DataKey::ProviderGrants(grant.patient.clone(), grant.provider.clone()),
        &by_provider,
    );
}

/// Drops a grant that reached a terminal state from its provider's index.
/// The patient index keeps every grant.
pub fn retire(env: &Env, grant: &ConsentGrant) {
    let mut by_provider = provider_grant_ids(env, &grant.patient, &grant.provider);
    if let Some(index) = by_provider.iter().position(|id| id == grant.id) {
        by_provider.remove(index as u32);
        storage::put(
            env,
            &DataKey::ProviderGrants(grant.patient.clone(), grant.provider.clone()),
            &by_provider,
        );
    }
}

// ==================== State machine ====================

pub fn can_transition(from: GrantStatus, to: GrantStatus) -> bool {
    matches!(
        (from, to),
        (GrantStatus::Pending, GrantStatus::Active)
            | (GrantStatus::Pending, GrantStatus::Revoked)
            | (GrantStatus::Active, GrantStatus::Revoked)
            | (GrantStatus::Active, GrantStatus::Expired)
    )
}

pub fn transition(grant: &mut ConsentGrant, to: GrantStatus, now: u64) -> Result<(), Error> {
    if !can_transition(grant.status, to) {
        return Err(Error::InvalidTransition);
    }
    grant.status = to;
    grant.updated_at = now;
    Ok(())
}

pub fn is_terminal(status: GrantStatus) -> bool {
    matches!(status, GrantStatus::Revoked | GrantStatus::Expired)
}

// ==================== Operations ====================

/// Validates `request`, stores the new grant and returns its id.
pub fn create(
    env: &Env,
    writer: &mut ScopeWriter,
    config: &EngineConfig,
    initiator: &Address,
    request: GrantRequest,
) -> Result<u64, Error> {
    let now = env.ledger().timestamp();
    validation::validate_grant_request(env, config, &request, initiator, now)?;

    let id = writer.allocate_grant_id();
    let mut grant = ConsentGrant {
        id,
        patient: request.patient.clone(),
        provider: request.provider.clone(),
        categories: request.categories,
        access_level: request.access_level,
        created_at: now,
        expiry: request.expiry,
        requires_multisig: request.multisig.is_some(),
        multisig_request: None,
        status: GrantStatus::Active,
        revocation: None,
        tokenize: request.tokenize,
        token_id: None,
        updated_at: now,
    };

    let mut detail = audit::detail(env);
    detail.set(DETAIL_PROVIDER, DetailValue::Principal(grant.provider.clone()));
    detail.set(DETAIL_EXPIRY, DetailValue::Time(grant.expiry));

    match &request.multisig {
        Some(policy) => {
            let request_id = multisig::open(env, writer, id, policy);
            grant.status = GrantStatus::Pending;
            grant.multisig_request = Some(request_id);
            detail.set(DETAIL_STATUS, DetailValue::Label(symbol_short!("pending")));
            detail.set(DETAIL_REQUEST, DetailValue::Id(request_id));
        }
        None => {
            detail.set(DETAIL_STATUS, DetailValue::Label(symbol_short!("active")));
            if grant.tokenize {
                let token_id = token::mint(env, &mut grant, now)?;
                detail.set(DETAIL_TOKEN, DetailValue::Digest(token_id));
            }
        }
    }

    save(env, &grant);
    index(env, &grant);

    writer.record(
        env,
        AuditActor::Principal(initiator.clone()),
        AuditAction::GrantCreated,
        AuditSubject::Grant(id),
        detail,
    );
    Ok(id)
}

/// Pending -> Active once the approval threshold is met.
pub fn activate(
    env: &Env,
    writer: &mut ScopeWriter,
    grant: &mut ConsentGrant,
    approver: &Address,
    now: u64,
) -> Result<(), Error> {
    transition(grant, GrantStatus::Active, now)?;

    let mut detail = audit::detail(env);
    detail.set(DETAIL_APPROVER, DetailValue::Principal(approver.clone()));
    if grant.tokenize {
        let token_id = token::mint(env, grant, now)?;
        detail.set(DETAIL_TOKEN, DetailValue::Digest(token_id));
    }
    save(env, grant);

    writer.record(
        env,
        AuditActor::Principal(approver.clone()),
        AuditAction::GrantApproved,
        AuditSubject::Grant(grant.id),
        detail,
    );
    Ok(())
}

/// Pins an Active grant whose expiry has passed. Returns `true` when the
/// grant moved to Expired during this call.
pub fn settle_expiry(
    env: &Env,
    writer: &mut ScopeWriter,
    grant: &mut ConsentGrant,
    now: u64,
) -> Result<bool, Error> {
    if grant.status != GrantStatus::Active || now < grant.expiry {
        return Ok(false);
    }
    transition(grant, GrantStatus::Expired, now)?;
    save(env, grant);
    retire(env, grant);

    let mut detail = audit::detail(env);
    detail.set(DETAIL_EXPIRY, DetailValue::Time(grant.expiry));
    writer.record(
        env,
        system_actor(env),
        AuditAction::GrantExpired,
        AuditSubject::Grant(grant.id),
        detail,
    );
    events::log_warn(
        env,
        symbol_short!("expire"),
        None,
        &grant.patient,
        Some(grant.id),
    );
    Ok(true)
}

/// Revokes `grant_id` on behalf of `actor`.
///
/// The patient may always revoke; the provider only when the configuration
/// allows it. A grant already in a terminal state yields `AlreadyRevoked`, as
/// does one found expired or past its approval deadline, which is settled
/// first.
pub fn revoke(
    env: &Env,
    writer: &mut ScopeWriter,
    config: &EngineConfig,
    grant_id: u64,
    actor: &Address,
) -> Result<RevokeOutcome, Error> {
    let patient = writer.patient().clone();
    let mut grant = load(env, &patient, grant_id)?;

    let reason = if *actor == grant.patient {
        RevocationReason::PatientRevoked
    } else if *actor == grant.provider && config.provider_can_revoke {
        RevocationReason::ProviderRevoked
    } else {
        return Err(Error::Unauthorized);
    };

    let now = env.ledger().timestamp();
    if is_terminal(grant.status) || settle_expiry(env, writer, &mut grant, now)? {
        return Ok(RevokeOutcome::AlreadyRevoked);
    }

    let mut detail = audit::detail(env);
    detail.set(DETAIL_REASON, DetailValue::Label(reason_label(reason)));

    if grant.status == GrantStatus::Pending {
        if let Some(request_id) = grant.multisig_request {
            let mut request = multisig::load(env, &patient, request_id)?;
            if multisig::settle_deadline(env, writer, &mut request, &mut grant, now)? {
                return Ok(RevokeOutcome::AlreadyRevoked);
            }
            if request.state == RequestState::Open {
                request.state = RequestState::Cancelled;
                multisig::save(env, &patient, &request);
                detail.set(DETAIL_REQUEST, DetailValue::Id(request_id));
            }
        }
    }

    transition(&mut grant, GrantStatus::Revoked, now)?;
    grant.revocation = Some(reason);
    if let Some(token_id) = grant.token_id.clone() {
        token::burn(env, &token_id, now)?;
        detail.set(DETAIL_TOKEN, DetailValue::Digest(token_id));
    }
    save(env, &grant);
    retire(env, &grant);

    writer.record(
        env,
        AuditActor::Principal(actor.clone()),
        AuditAction::GrantRevoked,
        AuditSubject::Grant(grant_id),
        detail,
    );
    Ok(RevokeOutcome::Revoked)
}

/// Settles up to `limit` overdue grants of the writer's patient: Active
/// grants past expiry and Pending grants past their approval deadline.
pub fn sweep(env: &Env, writer: &mut ScopeWriter, limit: u32) -> Result<u32, Error> {
    if limit == 0 {
        return Err(Error::InvalidPagination);
    }
    let patient = writer.patient().clone();
    let now = env.ledger().timestamp();
    let mut settled = 0u32;

    for grant_id in patient_grant_ids(env, &patient).iter() {
        if settled >= limit {
            break;
        }
        let mut grant = load(env, &patient, grant_id)?;
        let changed = match (grant.status, grant.multisig_request) {
            (GrantStatus::Active, _) => settle_expiry(env, writer, &mut grant, now)?,
            (GrantStatus::Pending, Some(request_id)) => {
                let mut request = multisig::load(env, &patient, request_id)?;
                multisig::settle_deadline(env, writer, &mut request, &mut grant, now)?
            }
            _ => false,
        };
        if changed {
            settled += 1;
        }
    }
    Ok(settled)
}
