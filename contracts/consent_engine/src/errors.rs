use soroban_sdk::{contracterror, contracttype, Env, String};

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    // Configuration
    NotInitialized = 1,
    AlreadyInitialized = 2,
    InvalidConfig = 3,

    // Validation: rejected before any state change
    EmptyCategories = 10,
    UnknownCategory = 11,
    DuplicateCategory = 12,
    InvalidExpiry = 13,
    GrantTooLong = 14,
    SelfGrant = 15,
    NoApprovers = 16,
    DuplicateApprover = 17,
    TooManyApprovers = 18,
    InvalidThreshold = 19,
    InvalidDeadline = 20,
    DuplicateContact = 21,
    InvalidPagination = 22,
    InvalidTimeRange = 23,

    // Authorization
    Unauthorized = 30,
    NotAnApprover = 31,
    PatientApprovalRequired = 32,
    InvalidConfirmationToken = 33,
    UnknownAlertSource = 34,

    // Lifecycle state
    GrantNotFound = 40,
    RequestNotFound = 41,
    InvalidTransition = 42,
    RequestClosed = 43,
    EmergencyAlreadyActive = 44,
    NoPendingConfirmation = 45,
    TokenAlreadyMinted = 46,
    TokenAlreadyBurned = 47,
    TokenNotFound = 48,
    ScopeConflict = 49,

    ThresholdNotMet = 50,
    ConfirmationExpired = 60,
    DuplicateSignature = 70,
    EmergencyNotConfigured = 80,
}

/// Error families exposed to callers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[contracttype]
pub enum ErrorKind {
    Config,
    Validation,
    Authorization,
    State,
    ThresholdNotMet,
    Expired,
    DuplicateSignature,
    EmergencyNotConfigured,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct ErrorInfo {
    pub code: u32,
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match *self as u32 {
            0..=9 => ErrorKind::Config,
            10..=29 => ErrorKind::Validation,
            30..=39 => ErrorKind::Authorization,
            40..=49 => ErrorKind::State,
            50..=59 => ErrorKind::ThresholdNotMet,
            60..=69 => ErrorKind::Expired,
            70..=79 => ErrorKind::DuplicateSignature,
            _ => ErrorKind::EmergencyNotConfigured,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Error::NotInitialized => "engine is not initialized",
            Error::AlreadyInitialized => "engine is already initialized",
            Error::InvalidConfig => "configuration values out of range",
            Error::EmptyCategories => "a grant needs at least one data category",
            Error::UnknownCategory => "data category is not in the vocabulary",
            Error::DuplicateCategory => "data category listed twice",
            Error::InvalidExpiry => "expiry must be in the future",
            Error::GrantTooLong => "grant duration exceeds the configured maximum",
            Error::SelfGrant => "patient and provider must differ",
            Error::NoApprovers => "multi-signature policy needs approvers",
            Error::DuplicateApprover => "approver listed twice",
            Error::TooManyApprovers => "approver count exceeds the configured maximum",
            Error::InvalidThreshold => "threshold must be between 1 and the approver count",
            Error::InvalidDeadline => "deadline must be in the future and not after expiry",
            Error::DuplicateContact => "emergency contact listed twice",
            Error::InvalidPagination => "page limit out of range",
            Error::InvalidTimeRange => "time range start is after its end",
            Error::Unauthorized => "actor may not perform this operation",
            Error::NotAnApprover => "signer is not a required approver",
            Error::PatientApprovalRequired => {
                "provider-initiated grants need the patient among the approvers"
            }
            Error::InvalidConfirmationToken => "confirmation token does not match",
            Error::UnknownAlertSource => "caller is not a registered medical-alert source",
            Error::GrantNotFound => "grant not found",
            Error::RequestNotFound => "multi-signature request not found",
            Error::InvalidTransition => "grant cannot move to that state",
            Error::RequestClosed => "multi-signature request is closed",
            Error::EmergencyAlreadyActive => "emergency access is already active",
            Error::NoPendingConfirmation => "no confirmation token was issued to this actor",
            Error::TokenAlreadyMinted => "consent token already minted for this grant",
            Error::TokenAlreadyBurned => "consent token already burned",
            Error::TokenNotFound => "consent token not found",
            Error::ScopeConflict => "patient scope changed concurrently",
            Error::ThresholdNotMet => "approval threshold was not met before the deadline",
            Error::ConfirmationExpired => "confirmation token expired",
            Error::DuplicateSignature => "approver already signed with a different nonce",
            Error::EmergencyNotConfigured => "no emergency contacts configured",
        }
    }

    pub fn info(&self, env: &Env) -> ErrorInfo {
        ErrorInfo {
            code: *self as u32,
            kind: self.kind(),
            message: String::from_str(env, self.message()),
        }
    }
}
