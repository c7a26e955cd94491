// Consent Engine - patient consent grants, break-glass access and audit trail
#![no_std]
#![allow(clippy::too_many_arguments)]


mod audit;
mod authorization;
mod config;
mod emergency;
mod errors;
mod events;
mod grants;
mod multisig;
mod sequencer;
mod storage;
mod token;
mod types;
mod validation;

use soroban_sdk::{contract, contractimpl, symbol_short, Address, BytesN, Env, Symbol, Vec};

pub use crate::errors::{Error, ErrorInfo, ErrorKind};
pub use crate::events::{LogLevel, StructuredLog};
pub use crate::types::*;

use crate::sequencer::ScopeWriter;

#[contract]
pub struct ConsentEngine;

#[contractimpl]
impl ConsentEngine {
    // ==================== Administration ====================

    pub fn initialize(env: Env, admin: Address, config: EngineConfig) -> Result<(), Error> {
        admin.require_auth();
        if config::is_initialized(&env) {
            return Err(Error::AlreadyInitialized);
        }
        config::validate_config(&config)?;
        config::store(&env, &admin, &config);
        events::admin_changed(&env, symbol_short!("init"), &admin);
        Ok(())
    }

    pub fn update_config(env: Env, admin: Address, config: EngineConfig) -> Result<(), Error> {
        config::require_admin(&env, &admin)?;
        config::validate_config(&config)?;
        config::set_config(&env, &config);
        events::admin_changed(&env, symbol_short!("config"), &admin);
        Ok(())
    }

    pub fn config(env: Env) -> Result<EngineConfig, Error> {
        config::get_config(&env)
    }

    /// Adds `category` to the data-category vocabulary. Returns `false` if it
    /// was already registered.
    pub fn register_category(env: Env, admin: Address, category: Symbol) -> Result<bool, Error> {
        config::require_admin(&env, &admin)?;
        let added = config::register_category(&env, category)?;
        if added {
            events::admin_changed(&env, symbol_short!("category"), &admin);
        }
        Ok(added)
    }

    pub fn categories(env: Env) -> Vec<Symbol> {
        config::categories(&env)
    }

    pub fn register_alert_source(env: Env, admin: Address, source: Address) -> Result<(), Error> {
        config::require_admin(&env, &admin)?;
        config::add_alert_source(&env, source);
        events::admin_changed(&env, symbol_short!("alert_add"), &admin);
        Ok(())
    }

    pub fn remove_alert_source(env: Env, admin: Address, source: Address) -> Result<(), Error> {
        config::require_admin(&env, &admin)?;
        config::remove_alert_source(&env, &source);
        events::admin_changed(&env, symbol_short!("alert_rm"), &admin);
        Ok(())
    }

    // ==================== Grants ====================

    /// Creates a grant on behalf of `initiator`, who must be the patient or
    /// the named provider. Grants without a multi-signature policy start
    /// Active; the rest start Pending.
    pub fn create_grant(env: Env, initiator: Address, request: GrantRequest) -> Result<u64, Error> {
        initiator.require_auth();
        let config = config::get_config(&env)?;
        let patient = request.patient.clone();

        let mut writer = ScopeWriter::open(&env, &patient);
        let grant_id = grants::create(&env, &mut writer, &config, &initiator, request)?;
        writer.commit(&env)?;

        events::log_info(
            &env,
            symbol_short!("grant_new"),
            Some(initiator),
            &patient,
            Some(grant_id),
        );
        Ok(grant_id)
    }

    pub fn submit_signature(
        env: Env,
        patient: Address,
        request_id: u64,
        approver: Address,
        nonce: u64,
    ) -> Result<SignatureStatus, Error> {
        approver.require_auth();
        config::get_config(&env)?;

        let mut writer = ScopeWriter::open(&env, &patient);
        let status = multisig::submit(&env, &mut writer, request_id, &approver, nonce)?;
        writer.commit(&env)?;

        if status == SignatureStatus::ThresholdNotMet {
            events::log_warn(
                &env,
                symbol_short!("sign"),
                Some(approver),
                &patient,
                Some(request_id),
            );
        } else {
            events::log_info(
                &env,
                symbol_short!("sign"),
                Some(approver),
                &patient,
                Some(request_id),
            );
        }
        Ok(status)
    }

    pub fn revoke_grant(
        env: Env,
        patient: Address,
        grant_id: u64,
        actor: Address,
    ) -> Result<RevokeOutcome, Error> {
        actor.require_auth();
        let config = config::get_config(&env)?;

        let mut writer = ScopeWriter::open(&env, &patient);
        let outcome = grants::revoke(&env, &mut writer, &config, grant_id, &actor)?;
        writer.commit(&env)?;

        events::log_info(
            &env,
            symbol_short!("revoke"),
            Some(actor),
            &patient,
            Some(grant_id),
        );
        Ok(outcome)
    }

    /// Pins up to `limit` overdue grants of `patient`. Anyone may call it.
    pub fn sweep(env: Env, patient: Address, limit: u32) -> Result<u32, Error> {
        config::get_config(&env)?;

        let mut writer = ScopeWriter::open(&env, &patient);
        let settled = grants::sweep(&env, &mut writer, limit)?;
        writer.commit(&env)?;

        if settled > 0 {
            events::log_info(
                &env,
                symbol_short!("sweep"),
                None,
                &patient,
                Some(settled as u64),
            );
        }
        Ok(settled)
    }

    pub fn get_grant(env: Env, patient: Address, grant_id: u64) -> Result<ConsentGrant, Error> {
        grants::load(&env, &patient, grant_id)
    }

    pub fn patient_grants(env: Env, patient: Address) -> Vec<ConsentGrant> {
        let mut result = Vec::new(&env);
        for grant_id in grants::patient_grant_ids(&env, &patient).iter() {
            if let Ok(grant) = grants::load(&env, &patient, grant_id) {
                result.push_back(grant);
            }
        }
        result
    }

    pub fn get_request(
        env: Env,
        patient: Address,
        request_id: u64,
    ) -> Result<MultiSigRequest, Error> {
        multisig::load(&env, &patient, request_id)
    }

    pub fn get_token(env: Env, token_id: BytesN<32>) -> Result<ConsentToken, Error> {
        token::get(&env, &token_id).ok_or(Error::TokenNotFound)
    }

    // ==================== Authorization ====================

    pub fn authorize(
        env: Env,
        actor: Address,
        patient: Address,
        category: Symbol,
    ) -> Result<Verdict, Error> {
        actor.require_auth();
        let config = config::get_config(&env)?;

        let mut writer = ScopeWriter::open(&env, &patient);
        let verdict = authorization::authorize(&env, &mut writer, &config, &actor, &category)?;
        writer.commit(&env)?;

        match verdict {
            Verdict::Allow(_) => events::log_info(
                &env,
                symbol_short!("authorize"),
                Some(actor),
                &patient,
                None,
            ),
            Verdict::Deny(_) => events::log_warn(
                &env,
                symbol_short!("authorize"),
                Some(actor),
                &patient,
                None,
            ),
        }
        Ok(verdict)
    }

    // ==================== Emergency ====================

    pub fn configure_emergency(
        env: Env,
        patient: Address,
        contacts: Vec<EmergencyContact>,
        flagged_categories: Vec<Symbol>,
    ) -> Result<(), Error> {
        patient.require_auth();
        config::get_config(&env)?;

        let mut writer = ScopeWriter::open(&env, &patient);
        emergency::configure(&env, &mut writer, contacts, flagged_categories)?;
        writer.commit(&env)?;

        events::log_info(
            &env,
            symbol_short!("emerg_cfg"),
            Some(patient.clone()),
            &patient,
            None,
        );
        Ok(())
    }

    /// Issues the one-time confirmation token `actor` must present to
    /// `activate_emergency`.
    pub fn request_emergency_token(
        env: Env,
        patient: Address,
        actor: Address,
    ) -> Result<BytesN<32>, Error> {
        actor.require_auth();
        let config = config::get_config(&env)?;

        let mut writer = ScopeWriter::open(&env, &patient);
        let token = emergency::issue_token(&env, &mut writer, &config, &actor)?;
        writer.commit(&env)?;

        events::log_info(&env, symbol_short!("emerg_tok"), Some(actor), &patient, None);
        Ok(token)
    }

    pub fn activate_emergency(
        env: Env,
        patient: Address,
        actor: Address,
        token: BytesN<32>,
    ) -> Result<(), Error> {
        actor.require_auth();
        config::get_config(&env)?;

        let mut writer = ScopeWriter::open(&env, &patient);
        emergency::activate(&env, &mut writer, &actor, &token)?;
        writer.commit(&env)?;

        events::log_warn(&env, symbol_short!("emerg_on"), Some(actor), &patient, None);
        Ok(())
    }

    /// Activation by a registered medical-alert source, without a token.
    pub fn auto_activate_emergency(
        env: Env,
        source: Address,
        patient: Address,
        alert_id: Symbol,
    ) -> Result<(), Error> {
        source.require_auth();
        config::get_config(&env)?;
        if !config::is_alert_source(&env, &source) {
            return Err(Error::UnknownAlertSource);
        }

        let mut writer = ScopeWriter::open(&env, &patient);
        emergency::auto_activate(&env, &mut writer, &source, alert_id)?;
        writer.commit(&env)?;

        events::log_warn(
            &env,
            symbol_short!("auto_on"),
            Some(source),
            &patient,
            None,
        );
        Ok(())
    }

    pub fn deactivate_emergency(env: Env, patient: Address, actor: Address) -> Result<(), Error> {
        actor.require_auth();
        config::get_config(&env)?;

        let mut writer = ScopeWriter::open(&env, &patient);
        let changed = emergency::deactivate(&env, &mut writer, &actor)?;
        writer.commit(&env)?;

        if changed {
            events::log_info(&env, symbol_short!("emerg_off"), Some(actor), &patient, None);
        }
        Ok(())
    }

    /// Current emergency state. The outstanding confirmation token, if any,
    /// is blanked out.
    pub fn emergency_state(env: Env, patient: Address) -> EmergencyState {
        let mut state = emergency::load(&env, &patient);
        if let Some(challenge) = state.challenge.as_mut() {
            challenge.token = BytesN::from_array(&env, &[0u8; 32]);
        }
        state
    }

    // ==================== Audit ====================

    pub fn audit_events(
        env: Env,
        patient: Address,
        filter: AuditFilter,
        start: u64,
        limit: u32,
    ) -> Result<AuditPage, Error> {
        audit::query(&env, &patient, &filter, start, limit)
    }

    pub fn audit_head(env: Env, patient: Address) -> AuditHead {
        sequencer::head(&env, &patient)
    }

    /// Checks up to `limit` entries of the hash chain from `start`. Resume
    /// from `next` until it is `None`.
    pub fn verify_audit_trail(
        env: Env,
        patient: Address,
        start: u64,
        limit: u32,
    ) -> Result<ChainCheck, Error> {
        audit::verify(&env, &patient, start, limit)
    }

    /// Grant statuses and the emergency flag rebuilt from the log alone, at
    /// most `limit` entries per call.
    pub fn replay(
        env: Env,
        patient: Address,
        resume: Option<ReplayedState>,
        limit: u32,
    ) -> Result<ReplayedState, Error> {
        audit::replay(&env, &patient, resume, limit)
    }

    pub fn error_info(env: Env, error: Error) -> ErrorInfo {
        error.info(&env)
    }
}
