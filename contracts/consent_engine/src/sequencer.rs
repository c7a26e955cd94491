//! Single-writer discipline for a patient scope.
//!
//! Every mutation of one patient's grants, multi-signature requests,
//! emergency state and audit log goes through a [`ScopeWriter`]. The writer
//! owns the scope head for the duration of the call: it hands out ids and
//! audit sequence numbers, and on commit it compares the stored version with
//! the version it opened (compare-and-swap) before publishing `version + 1`.
//! Keys are partitioned by patient, so writers for different patients never
//! touch the same entries.

use soroban_sdk::{log, Address, BytesN, Env, Map, Symbol};

use crate::audit;
use crate::errors::Error;
use crate::storage;
use crate::types::{
    AuditAction, AuditActor, AuditHead, AuditSubject, DataKey, DetailValue, PatientScope,
};

pub fn genesis(env: &Env) -> PatientScope {
    PatientScope {
        version: 0,
        next_seq: 1,
        head_hash: BytesN::from_array(env, &[0u8; 32]),
        next_grant_id: 1,
        next_request_id: 1,
    }
}

/// Reads the committed head without opening a writer.
pub fn peek(env: &Env, patient: &Address) -> PatientScope {
    storage::get(env, &DataKey::Scope(patient.clone())).unwrap_or_else(|| genesis(env))
}

pub fn head(env: &Env, patient: &Address) -> AuditHead {
    let scope = peek(env, patient);
    AuditHead {
        next_seq: scope.next_seq,
        head_hash: scope.head_hash,
        version: scope.version,
    }
}

pub struct ScopeWriter {
    patient: Address,
    opened_version: u64,
    opened_seq: u64,
    scope: PatientScope,
    dirty: bool,
}

impl ScopeWriter {
    pub fn open(env: &Env, patient: &Address) -> Self {
        let scope = peek(env, patient);
        Self {
            patient: patient.clone(),
            opened_version: scope.version,
            opened_seq: scope.next_seq,
            scope,
            dirty: false,
        }
    }

    pub fn patient(&self) -> &Address {
        &self.patient
    }

    pub fn allocate_grant_id(&mut self) -> u64 {
        let id = self.scope.next_grant_id;
        self.scope.next_grant_id = id.saturating_add(1);
        self.dirty = true;
        id
    }

    pub fn allocate_request_id(&mut self) -> u64 {
        let id = self.scope.next_request_id;
        self.scope.next_request_id = id.saturating_add(1);
        self.dirty = true;
        id
    }

    /// Appends one audit event to this patient's log and returns its `seq`.
    pub fn record(
        &mut self,
        env: &Env,
        actor: AuditActor,
        action: AuditAction,
        subject: AuditSubject,
        detail: Map<Symbol, DetailValue>,
    ) -> u64 {
        self.dirty = true;
        audit::append(
            env,
            &mut self.scope,
            &self.patient,
            actor,
            action,
            subject,
            detail,
        )
    }

    /// Events recorded so far by this writer.
    #[cfg(test)]
    pub fn recorded(&self) -> u64 {
        self.scope.next_seq.saturating_sub(self.opened_seq)
    }

    /// Publishes the scope head. A writer that recorded nothing commits
    /// nothing.
    pub fn commit(mut self, env: &Env) -> Result<u64, Error> {
        if !self.dirty {
            return Ok(self.opened_version);
        }
        let stored = peek(env, &self.patient);
        if stored.version != self.opened_version {
            log!(
                env,
                "scope conflict: opened {} found {}",
                self.opened_version,
                stored.version
            );
            return Err(Error::ScopeConflict);
        }
        self.scope.version = self.opened_version.saturating_add(1);
        storage::put(env, &DataKey::Scope(self.patient.clone()), &self.scope);
        Ok(self.scope.version)
    }
}
