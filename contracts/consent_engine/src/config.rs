use soroban_sdk::{Address, Env, Symbol, Vec};

use crate::errors::Error;
use crate::types::{DataKey, EngineConfig};

pub const MAX_CATEGORIES: u32 = 64;

pub fn is_initialized(env: &Env) -> bool {
    env.storage().instance().has(&DataKey::Admin)
}

pub fn get_admin(env: &Env) -> Result<Address, Error> {
    env.storage()
        .instance()
        .get(&DataKey::Admin)
        .ok_or(Error::NotInitialized)
}

pub fn get_config(env: &Env) -> Result<EngineConfig, Error> {
    env.storage()
        .instance()
        .get(&DataKey::Config)
        .ok_or(Error::NotInitialized)
}

pub fn validate_config(config: &EngineConfig) -> Result<(), Error> {
    if config.confirmation_ttl == 0 || config.max_approvers == 0 {
        return Err(Error::InvalidConfig);
    }
    Ok(())
}

pub fn store(env: &Env, admin: &Address, config: &EngineConfig) {
    env.storage().instance().set(&DataKey::Admin, admin);
    env.storage().instance().set(&DataKey::Config, config);
}

pub fn set_config(env: &Env, config: &EngineConfig) {
    env.storage().instance().set(&DataKey::Config, config);
}

/// Checks `caller` is the admin and that it signed the call.
pub fn require_admin(env: &Env, caller: &Address) -> Result<(), Error> {
    caller.require_auth();
    let admin = get_admin(env)?;
    if admin != *caller {
        return Err(Error::Unauthorized);
    }
    Ok(())
}

// ==================== Category vocabulary ====================

pub fn categories(env: &Env) -> Vec<Symbol> {
    env.storage()
        .instance()
        .get(&DataKey::Categories)
        .unwrap_or(Vec::new(env))
}

pub fn is_known_category(env: &Env, category: &Symbol) -> bool {
    categories(env).contains(category)
}

/// Returns `false` when the category was already registered.
pub fn register_category(env: &Env, category: Symbol) -> Result<bool, Error> {
    let mut vocabulary = categories(env);
    if vocabulary.contains(&category) {
        return Ok(false);
    }
    if vocabulary.len() >= MAX_CATEGORIES {
        return Err(Error::InvalidConfig);
    }
    vocabulary.push_back(category);
    env.storage()
        .instance()
        .set(&DataKey::Categories, &vocabulary);
    Ok(true)
}

// ==================== Medical-alert sources ====================

pub fn alert_sources(env: &Env) -> Vec<Address> {
    env.storage()
        .instance()
        .get(&DataKey::AlertSources)
        .unwrap_or(Vec::new(env))
}

pub fn is_alert_source(env: &Env, source: &Address) -> bool {
    alert_sources(env).contains(source)
}

pub fn add_alert_source(env: &Env, source: Address) {
    let mut sources = alert_sources(env);
    if !sources.contains(&source) {
        sources.push_back(source);
        env.storage()
            .instance()
            .set(&DataKey::AlertSources, &sources);
    }
}

pub fn remove_alert_source(env: &Env, source: &Address) {
    let sources = alert_sources(env);
    let mut kept = Vec::new(env);
    for current in sources.iter() {
        if current != *source {
            kept.push_back(current);
        }
    }
    env.storage().instance().set(&DataKey::AlertSources, &kept);
}
