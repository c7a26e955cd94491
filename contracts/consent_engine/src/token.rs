//! Consent tokens: a handle bound 1:1 to an activated grant.
//!
//! A token is minted once, burned once, and its record is kept after the
//! burn so the id derived from `(patient, grant_id)` is never handed out
//! again.

use soroban_sdk::{xdr::ToXdr, Address, BytesN, Env};

use crate::errors::Error;
use crate::events;
use crate::storage;
use crate::types::{ConsentGrant, ConsentToken, DataKey};

pub fn token_id_for(env: &Env, patient: &Address, grant_id: u64) -> BytesN<32> {
    let preimage = (patient.clone(), grant_id).to_xdr(env);
    env.crypto().sha256(&preimage).into()
}

pub fn get(env: &Env, token_id: &BytesN<32>) -> Option<ConsentToken> {
    storage::get(env, &DataKey::Token(token_id.clone()))
}

/// Mints the token for `grant` and records its id on the grant. The caller
/// persists the grant.
pub fn mint(env: &Env, grant: &mut ConsentGrant, now: u64) -> Result<BytesN<32>, Error> {
    let token_id = token_id_for(env, &grant.patient, grant.id);
    if grant.token_id.is_some() || storage::has(env, &DataKey::Token(token_id.clone())) {
        return Err(Error::TokenAlreadyMinted);
    }

    let token = ConsentToken {
        token_id: token_id.clone(),
        patient: grant.patient.clone(),
        grant_id: grant.id,
        holder: grant.provider.clone(),
        minted_at: now,
        burned_at: None,
    };
    storage::put(env, &DataKey::Token(token_id.clone()), &token);
    grant.token_id = Some(token_id.clone());

    events::token_minted(env, &token_id, &grant.patient, grant.id);
    Ok(token_id)
}

pub fn burn(env: &Env, token_id: &BytesN<32>, now: u64) -> Result<(), Error> {
    let key = DataKey::Token(token_id.clone());
    let mut token: ConsentToken = storage::get(env, &key).ok_or(Error::TokenNotFound)?;
    if token.burned_at.is_some() {
        return Err(Error::TokenAlreadyBurned);
    }
    token.burned_at = Some(now);
    storage::put(env, &key, &token);

    events::token_burned(env, token_id);
    Ok(())
}
