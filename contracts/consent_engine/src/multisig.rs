use soroban_sdk::{symbol_short, Address, Env, Map, Symbol};

use crate::audit;
use crate::errors::Error;
use crate::events;
use crate::grants;
use crate::sequencer::ScopeWriter;
use crate::storage;
use crate::types::{
    AuditAction, AuditActor, AuditSubject, ConsentGrant, DataKey, DetailValue, GrantStatus,
    MultiSigPolicy, MultiSigRequest, RequestState, RevocationReason, SignatureStatus,
};

const DETAIL_COLLECTED: Symbol = symbol_short!("collected");
const DETAIL_THRESHOLD: Symbol = symbol_short!("threshold");
const DETAIL_REQUEST: Symbol = symbol_short!("request");
const DETAIL_REASON: Symbol = symbol_short!("reason");

pub fn load(env: &Env, patient: &Address, request_id: u64) -> Result<MultiSigRequest, Error> {
    storage::get(env, &DataKey::Request(patient.clone(), request_id))
        .ok_or(Error::RequestNotFound)
}

pub fn save(env: &Env, patient: &Address, request: &MultiSigRequest) {
    storage::put(env, &DataKey::Request(patient.clone(), request.id), request);
}

/// Opens the approval request for a freshly created Pending grant.
pub fn open(
    env: &Env,
    writer: &mut ScopeWriter,
    grant_id: u64,
    policy: &MultiSigPolicy,
) -> u64 {
    let id = writer.allocate_request_id();
    let request = MultiSigRequest {
        id,
        grant_id,
        approvers: policy.approvers.clone(),
        threshold: policy.threshold,
        signatures: Map::new(env),
        deadline: policy.deadline,
        state: RequestState::Open,
    };
    save(env, writer.patient(), &request);
    id
}

/// Closes an open request whose deadline has passed and revokes its grant
/// with `ThresholdNotMet`. Returns `true` when that happened in this call.
pub fn settle_deadline(
    env: &Env,
    writer: &mut ScopeWriter,
    request: &mut MultiSigRequest,
    grant: &mut ConsentGrant,
    now: u64,
) -> Result<bool, Error> {
    if request.state != RequestState::Open || now < request.deadline {
        return Ok(false);
    }
    request.state = RequestState::Expired;
    save(env, &grant.patient, request);

    grants::transition(grant, GrantStatus::Revoked, now)?;
    grant.revocation = Some(RevocationReason::ThresholdNotMet);
    grants::save(env, grant);
    grants::retire(env, grant);

    let mut detail = audit::detail(env);
    detail.set(
        DETAIL_REASON,
        DetailValue::Label(grants::reason_label(RevocationReason::ThresholdNotMet)),
    );
    detail.set(DETAIL_REQUEST, DetailValue::Id(request.id));
    detail.set(DETAIL_COLLECTED, DetailValue::Count(request.signatures.len()));
    detail.set(DETAIL_THRESHOLD, DetailValue::Count(request.threshold));
    writer.record(
        env,
        grants::system_actor(env),
        AuditAction::GrantRevoked,
        AuditSubject::Grant(grant.id),
        detail,
    );
    events::log_warn(
        env,
        symbol_short!("deadline"),
        None,
        &grant.patient,
        Some(grant.id),
    );
    Ok(true)
}

/// Counts `approver`'s signature on `request_id`.
///
/// Resubmitting with the nonce already on record is a no-op; a different
/// nonce from the same approver is rejected. The signature that reaches the
/// threshold activates the grant.
pub fn submit(
    env: &Env,
    writer: &mut ScopeWriter,
    request_id: u64,
    approver: &Address,
    nonce: u64,
) -> Result<SignatureStatus, Error> {
    let patient = writer.patient().clone();
    let mut request = load(env, &patient, request_id)?;

    if !request.approvers.contains(approver) {
        return Err(Error::NotAnApprover);
    }
    match request.state {
        RequestState::Open => {}
        RequestState::Expired => return Err(Error::ThresholdNotMet),
        RequestState::Approved | RequestState::Cancelled => return Err(Error::RequestClosed),
    }

    let now = env.ledger().timestamp();
    let mut grant = grants::load(env, &patient, request.grant_id)?;
    if settle_deadline(env, writer, &mut request, &mut grant, now)? {
        return Ok(SignatureStatus::ThresholdNotMet);
    }

    if let Some(recorded) = request.signatures.get(approver.clone()) {
        if recorded == nonce {
            return Ok(SignatureStatus::AlreadyCounted(request.signatures.len()));
        }
        return Err(Error::DuplicateSignature);
    }

    request.signatures.set(approver.clone(), nonce);
    let collected = request.signatures.len();

    if collected >= request.threshold {
        request.state = RequestState::Approved;
        save(env, &patient, &request);
        grants::activate(env, writer, &mut grant, approver, now)?;
        return Ok(SignatureStatus::Activated(grant.id));
    }

    save(env, &patient, &request);
    let mut detail = audit::detail(env);
    detail.set(DETAIL_REQUEST, DetailValue::Id(request.id));
    detail.set(DETAIL_COLLECTED, DetailValue::Count(collected));
    detail.set(DETAIL_THRESHOLD, DetailValue::Count(request.threshold));
    writer.record(
        env,
        AuditActor::Principal(approver.clone()),
        AuditAction::SignatureCollected,
        AuditSubject::Grant(grant.id),
        detail,
    );
    Ok(SignatureStatus::Pending(collected, request.threshold))
}
