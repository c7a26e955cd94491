use soroban_sdk::{Env, IntoVal, TryFromVal, Val};

use crate::types::DataKey;

// Persistent entries are per patient; keep them alive well past a month of
// inactivity and top them up on every write.
const TTL_THRESHOLD: u32 = 17_280;
const TTL_EXTEND_TO: u32 = 535_680;

pub fn put<V>(env: &Env, key: &DataKey, value: &V)
where
    V: IntoVal<Env, Val>,
{
    env.storage().persistent().set(key, value);
    env.storage()
        .persistent()
        .extend_ttl(key, TTL_THRESHOLD, TTL_EXTEND_TO);
}

pub fn get<V>(env: &Env, key: &DataKey) -> Option<V>
where
    V: TryFromVal<Env, Val>,
{
    env.storage().persistent().get(key)
}

pub fn has(env: &Env, key: &DataKey) -> bool {
    env.storage().persistent().has(key)
}
