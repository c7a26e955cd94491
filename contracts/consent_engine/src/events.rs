use soroban_sdk::{contracttype, symbol_short, Address, BytesN, Env, Symbol};

use crate::types::AuditAction;

// ==================== Structured Logs ====================

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[contracttype]
pub enum LogLevel {
    Info,
    Warn,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct StructuredLog {
    pub level: LogLevel,
    pub operation: Symbol,
    pub actor: Option<Address>,
    pub patient: Address,
    pub subject: Option<u64>,
    pub timestamp: u64,
}

pub const LOG_INFO: Symbol = symbol_short!("LOG_INFO");
pub const LOG_WARN: Symbol = symbol_short!("LOG_WARN");

fn publish_log(
    env: &Env,
    level: LogLevel,
    operation: Symbol,
    actor: Option<Address>,
    patient: &Address,
    subject: Option<u64>,
) {
    let topic = match level {
        LogLevel::Info => LOG_INFO,
        LogLevel::Warn => LOG_WARN,
    };
    let entry = StructuredLog {
        level,
        operation,
        actor,
        patient: patient.clone(),
        subject,
        timestamp: env.ledger().timestamp(),
    };
    env.events().publish((symbol_short!("engine"), topic), entry);
}

pub fn log_info(
    env: &Env,
    operation: Symbol,
    actor: Option<Address>,
    patient: &Address,
    subject: Option<u64>,
) {
    publish_log(env, LogLevel::Info, operation, actor, patient, subject);
}

pub fn log_warn(
    env: &Env,
    operation: Symbol,
    actor: Option<Address>,
    patient: &Address,
    subject: Option<u64>,
) {
    publish_log(env, LogLevel::Warn, operation, actor, patient, subject);
}

// ==================== Audit & Token Events ====================

pub fn action_topic(action: AuditAction) -> Symbol {
    match action {
        AuditAction::GrantCreated => symbol_short!("g_created"),
        AuditAction::GrantApproved => symbol_short!("g_approve"),
        AuditAction::GrantRevoked => symbol_short!("g_revoked"),
        AuditAction::GrantExpired => symbol_short!("g_expired"),
        AuditAction::RecordAccessed => symbol_short!("accessed"),
        AuditAction::EmergencyActivated => symbol_short!("emerg_on"),
        AuditAction::EmergencyDeactivated => symbol_short!("emerg_off"),
        AuditAction::EmergencyAccess => symbol_short!("emerg_acc"),
        AuditAction::AccessDenied => symbol_short!("denied"),
        AuditAction::SignatureCollected => symbol_short!("sig_added"),
        AuditAction::EmergencyConfigured => symbol_short!("emerg_cfg"),
        AuditAction::EmergencyTokenIssued => symbol_short!("emerg_tok"),
    }
}

/// Mirrors every audit append for real-time monitors.
pub fn audit_appended(env: &Env, patient: &Address, seq: u64, action: AuditAction) {
    env.events().publish(
        (symbol_short!("audit"), action_topic(action)),
        (patient.clone(), seq),
    );
}

pub fn token_minted(env: &Env, token_id: &BytesN<32>, patient: &Address, grant_id: u64) {
    env.events().publish(
        (symbol_short!("token"), symbol_short!("mint")),
        (token_id.clone(), patient.clone(), grant_id),
    );
}

pub fn token_burned(env: &Env, token_id: &BytesN<32>) {
    env.events().publish(
        (symbol_short!("token"), symbol_short!("burn")),
        token_id.clone(),
    );
}

// ==================== Admin Events ====================

pub fn admin_changed(env: &Env, operation: Symbol, admin: &Address) {
    env.events().publish(
        (symbol_short!("engine"), symbol_short!("admin")),
        (operation, admin.clone(), env.ledger().timestamp()),
    );
}
