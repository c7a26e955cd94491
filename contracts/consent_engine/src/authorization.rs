use soroban_sdk::{log, symbol_short, Address, Env, Map, Symbol};

use crate::audit;
use crate::config;
use crate::emergency;
use crate::errors::Error;
use crate::grants;
use crate::sequencer::ScopeWriter;
use crate::types::{
    AccessRoute, AuditAction, AuditActor, AuditSubject, DenyReason, DetailValue, EngineConfig,
    GrantStatus, Verdict,
};

const DETAIL_ROUTE: Symbol = symbol_short!("route");
const DETAIL_GRANT: Symbol = symbol_short!("grant");
const DETAIL_REASON: Symbol = symbol_short!("reason");

fn route_detail(env: &Env, route: &AccessRoute) -> Map<Symbol, DetailValue> {
    let mut detail = audit::detail(env);
    let label = match route {
        AccessRoute::SelfAccess => symbol_short!("self"),
        AccessRoute::EmergencyAccess => symbol_short!("emergency"),
        AccessRoute::ConsentGrant(id) => {
            detail.set(DETAIL_GRANT, DetailValue::Id(*id));
            symbol_short!("grant")
        }
    };
    detail.set(DETAIL_ROUTE, DetailValue::Label(label));
    detail
}

fn deny_detail(env: &Env, reason: DenyReason) -> Map<Symbol, DetailValue> {
    let mut detail = audit::detail(env);
    let label = match reason {
        DenyReason::NoActiveGrant => symbol_short!("no_grant"),
        DenyReason::UnknownCategory => symbol_short!("unknown"),
    };
    detail.set(DETAIL_REASON, DetailValue::Label(label));
    detail
}

/// First grant of `actor` that can serve `category` right now. Active grants
/// past their expiry are pinned to Expired on the way.
fn find_grant(
    env: &Env,
    writer: &mut ScopeWriter,
    actor: &Address,
    category: &Symbol,
    now: u64,
) -> Result<Option<u64>, Error> {
    let patient = writer.patient().clone();
    for grant_id in grants::provider_grant_ids(env, &patient, actor).iter() {
        let mut grant = grants::load(env, &patient, grant_id)?;
        if grants::settle_expiry(env, writer, &mut grant, now)? {
            continue;
        }
        if grant.status == GrantStatus::Active
            && grant.expiry > now
            && grant.categories.contains(category)
        {
            return Ok(Some(grant.id));
        }
    }
    Ok(None)
}

/// Decides whether `actor` may access `category` of the writer's patient.
///
/// Routes are tried in a fixed order: the patient's own access, emergency
/// access for a covering roster contact, then the actor's grants by
/// ascending id. Every call records exactly one verdict event.
pub fn authorize(
    env: &Env,
    writer: &mut ScopeWriter,
    config: &EngineConfig,
    actor: &Address,
    category: &Symbol,
) -> Result<Verdict, Error> {
    let patient = writer.patient().clone();
    let now = env.ledger().timestamp();
    let principal = AuditActor::Principal(actor.clone());
    let subject = AuditSubject::Record(category.clone());

    if *actor == patient {
        let route = AccessRoute::SelfAccess;
        writer.record(
            env,
            principal,
            AuditAction::RecordAccessed,
            subject,
            route_detail(env, &route),
        );
        return Ok(Verdict::Allow(route));
    }

    if !config::is_known_category(env, category) {
        let reason = DenyReason::UnknownCategory;
        log!(env, "unknown category requested", category.clone());
        writer.record(
            env,
            principal,
            AuditAction::AccessDenied,
            subject,
            deny_detail(env, reason),
        );
        return Ok(Verdict::Deny(reason));
    }

    let state = emergency::load(env, &patient);
    if emergency::covers(&state, config, actor, category) {
        let route = AccessRoute::EmergencyAccess;
        writer.record(
            env,
            principal,
            AuditAction::EmergencyAccess,
            subject,
            route_detail(env, &route),
        );
        return Ok(Verdict::Allow(route));
    }

    if let Some(grant_id) = find_grant(env, writer, actor, category, now)? {
        let route = AccessRoute::ConsentGrant(grant_id);
        writer.record(
            env,
            principal,
            AuditAction::RecordAccessed,
            subject,
            route_detail(env, &route),
        );
        return Ok(Verdict::Allow(route));
    }

    let reason = DenyReason::NoActiveGrant;
    writer.record(
        env,
        principal,
        AuditAction::AccessDenied,
        subject,
        deny_detail(env, reason),
    );
    Ok(Verdict::Deny(reason))
}
