use soroban_sdk::{contracttype, Address, BytesN, Map, Symbol, Vec};

// ==================== Storage Keys ====================

#[derive(Clone)]
#[contracttype]
pub enum DataKey {
    Admin,
    Config,
    Categories,
    AlertSources,
    Scope(Address),                   // patient -> scope head
    Grant(Address, u64),              // (patient, grant_id) -> grant
    PatientGrants(Address),           // patient -> grant ids
    ProviderGrants(Address, Address), // (patient, provider) -> grant ids
    Request(Address, u64),            // (patient, request_id) -> multisig request
    Emergency(Address),               // patient -> emergency state
    Audit(Address, u64),              // (patient, seq) -> audit event
    Token(BytesN<32>),                // token_id -> consent token
}

// ==================== Configuration ====================

/// How the emergency roster interacts with per-category emergency flags.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[contracttype]
pub enum EmergencyScope {
    /// Roster membership alone decides emergency access.
    Roster,
    /// The category must also be flagged emergency-accessible by the patient.
    FlaggedCategories,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct EngineConfig {
    pub provider_can_revoke: bool,
    pub emergency_scope: EmergencyScope,
    pub confirmation_ttl: u64,   // seconds a confirmation token stays valid
    pub max_grant_duration: u64, // 0 = unbounded
    pub max_approvers: u32,
}

// ==================== Grants ====================

#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[contracttype]
pub enum AccessLevel {
    Read,
    ReadWrite,
    Full,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[contracttype]
pub enum GrantStatus {
    Pending,
    Active,
    Revoked,
    Expired,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[contracttype]
pub enum RevocationReason {
    PatientRevoked,
    ProviderRevoked,
    ThresholdNotMet,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct MultiSigPolicy {
    pub approvers: Vec<Address>,
    pub threshold: u32,
    pub deadline: u64,
}

/// Input of `create_grant`.
#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct GrantRequest {
    pub patient: Address,
    pub provider: Address,
    pub categories: Vec<Symbol>,
    pub access_level: AccessLevel,
    pub expiry: u64,
    pub multisig: Option<MultiSigPolicy>,
    pub tokenize: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct ConsentGrant {
    pub id: u64,
    pub patient: Address,
    pub provider: Address,
    pub categories: Vec<Symbol>,
    pub access_level: AccessLevel,
    pub created_at: u64,
    pub expiry: u64,
    pub requires_multisig: bool,
    pub multisig_request: Option<u64>,
    pub status: GrantStatus,
    pub revocation: Option<RevocationReason>,
    pub tokenize: bool,
    pub token_id: Option<BytesN<32>>,
    pub updated_at: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[contracttype]
pub enum RevokeOutcome {
    Revoked,
    AlreadyRevoked,
}

// ==================== Multi-Signature ====================

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[contracttype]
pub enum RequestState {
    Open,
    Approved,
    Expired,
    Cancelled,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct MultiSigRequest {
    pub id: u64,
    pub grant_id: u64,
    pub approvers: Vec<Address>,
    pub threshold: u32,
    pub signatures: Map<Address, u64>, // approver -> nonce
    pub deadline: u64,
    pub state: RequestState,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub enum SignatureStatus {
    Pending(u32, u32), // (collected, threshold)
    Activated(u64),    // grant id
    AlreadyCounted(u32),
    ThresholdNotMet,
}

// ==================== Emergency ====================

#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct EmergencyContact {
    pub id: Address,
    pub access_level: AccessLevel,
    pub categories: Vec<Symbol>, // ignored for Full
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct ConfirmationChallenge {
    pub actor: Address,
    pub token: BytesN<32>,
    pub issued_at: u64,
    pub expires_at: u64,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct EmergencyState {
    pub active: bool,
    pub activated_by: Option<AuditActor>,
    pub activated_at: u64,
    pub challenge: Option<ConfirmationChallenge>,
    pub contacts: Vec<EmergencyContact>,
    pub flagged_categories: Vec<Symbol>,
}

// ==================== Authorization ====================

#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub enum AccessRoute {
    SelfAccess,
    EmergencyAccess,
    ConsentGrant(u64),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[contracttype]
pub enum DenyReason {
    NoActiveGrant,
    UnknownCategory,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub enum Verdict {
    Allow(AccessRoute),
    Deny(DenyReason),
}

// ==================== Audit ====================

#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub enum AuditActor {
    Principal(Address),
    AutoTrigger(Symbol), // alert id of the medical-alert collaborator
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[contracttype]
pub enum AuditAction {
    GrantCreated,
    GrantApproved,
    GrantRevoked,
    GrantExpired,
    RecordAccessed,
    EmergencyActivated,
    EmergencyDeactivated,
    EmergencyAccess,
    AccessDenied,
    SignatureCollected,
    EmergencyConfigured,
    EmergencyTokenIssued,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub enum AuditSubject {
    Grant(u64),
    Record(Symbol),
    Emergency,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub enum DetailValue {
    Id(u64),
    Count(u32),
    Time(u64),
    Label(Symbol),
    Principal(Address),
    Digest(BytesN<32>),
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct AuditEvent {
    pub seq: u64,
    pub patient: Address,
    pub actor: AuditActor,
    pub action: AuditAction,
    pub subject: AuditSubject,
    pub timestamp: u64,
    pub detail: Map<Symbol, DetailValue>,
    pub prev_hash: BytesN<32>,
    pub hash: BytesN<32>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub enum AuditFilter {
    All,
    TimeRange(u64, u64), // inclusive bounds
    Actor(AuditActor),
    Action(AuditAction),
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct AuditPage {
    pub events: Vec<AuditEvent>,
    pub next: Option<u64>, // seq to resume from
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct AuditHead {
    pub next_seq: u64,
    pub head_hash: BytesN<32>,
    pub version: u64,
}

/// Outcome of checking one window of a patient's hash chain.
#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct ChainCheck {
    pub valid: bool,
    pub checked: u32,
    pub last_hash: BytesN<32>, // the next window's first entry must chain from this
    pub next: Option<u64>,     // seq to resume from
}

/// State rebuilt from the audit log alone. A replay that stopped at its
/// window limit is resumed by passing it back in.
#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct ReplayedState {
    pub grants: Map<u64, GrantStatus>,
    pub emergency_active: bool,
    pub events: u64,
    pub next_seq: u64, // first seq not yet applied
    pub complete: bool,
}

// ==================== Sequencing ====================

/// Per-patient head record. Every mutation of a patient's grants,
/// emergency state or audit log advances `version` exactly once.
#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct PatientScope {
    pub version: u64,
    pub next_seq: u64,
    pub head_hash: BytesN<32>,
    pub next_grant_id: u64,
    pub next_request_id: u64,
}

// ==================== Consent Tokens ====================

#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct ConsentToken {
    pub token_id: BytesN<32>,
    pub patient: Address,
    pub grant_id: u64,
    pub holder: Address,
    pub minted_at: u64,
    pub burned_at: Option<u64>,
}
