use soroban_sdk::{Address, Env, Symbol, Vec};

use crate::config;
use crate::errors::Error;
use crate::types::{EmergencyContact, EngineConfig, GrantRequest, MultiSigPolicy};

/// Every entry must be in the vocabulary and listed once. An empty list is
/// accepted here; callers that need at least one category check that first.
pub fn validate_categories(env: &Env, categories: &Vec<Symbol>) -> Result<(), Error> {
    let vocabulary = config::categories(env);
    let mut seen: Vec<Symbol> = Vec::new(env);
    for category in categories.iter() {
        if !vocabulary.contains(&category) {
            return Err(Error::UnknownCategory);
        }
        if seen.contains(&category) {
            return Err(Error::DuplicateCategory);
        }
        seen.push_back(category);
    }
    Ok(())
}

fn validate_multisig(
    env: &Env,
    config: &EngineConfig,
    policy: &MultiSigPolicy,
    expiry: u64,
    now: u64,
) -> Result<(), Error> {
    let count = policy.approvers.len();
    if count == 0 {
        return Err(Error::NoApprovers);
    }
    if count > config.max_approvers {
        return Err(Error::TooManyApprovers);
    }
    let mut seen: Vec<Address> = Vec::new(env);
    for approver in policy.approvers.iter() {
        if seen.contains(&approver) {
            return Err(Error::DuplicateApprover);
        }
        seen.push_back(approver);
    }
    if policy.threshold == 0 || policy.threshold > count {
        return Err(Error::InvalidThreshold);
    }
    if policy.deadline <= now || policy.deadline > expiry {
        return Err(Error::InvalidDeadline);
    }
    Ok(())
}

pub fn validate_grant_request(
    env: &Env,
    config: &EngineConfig,
    request: &GrantRequest,
    initiator: &Address,
    now: u64,
) -> Result<(), Error> {
    if *initiator != request.patient && *initiator != request.provider {
        return Err(Error::Unauthorized);
    }
    if request.patient == request.provider {
        return Err(Error::SelfGrant);
    }
    if request.categories.is_empty() {
        return Err(Error::EmptyCategories);
    }
    validate_categories(env, &request.categories)?;

    if request.expiry <= now {
        return Err(Error::InvalidExpiry);
    }
    if config.max_grant_duration > 0 && request.expiry - now > config.max_grant_duration {
        return Err(Error::GrantTooLong);
    }

    match &request.multisig {
        Some(policy) => {
            validate_multisig(env, config, policy, request.expiry, now)?;
            if *initiator != request.patient && !policy.approvers.contains(&request.patient) {
                return Err(Error::PatientApprovalRequired);
            }
        }
        None => {
            if *initiator != request.patient {
                return Err(Error::PatientApprovalRequired);
            }
        }
    }
    Ok(())
}

pub fn validate_contacts(
    env: &Env,
    patient: &Address,
    contacts: &Vec<EmergencyContact>,
) -> Result<(), Error> {
    let mut seen: Vec<Address> = Vec::new(env);
    for contact in contacts.iter() {
        if contact.id == *patient || seen.contains(&contact.id) {
            return Err(Error::DuplicateContact);
        }
        validate_categories(env, &contact.categories)?;
        seen.push_back(contact.id);
    }
    Ok(())
}
