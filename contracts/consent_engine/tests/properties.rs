mod common;

use common::*;
use consent_engine::{AccessRoute, AuditAction, GrantStatus, SignatureStatus, Verdict};
use proptest::prelude::*;
use soroban_sdk::testutils::Address as _;
use soroban_sdk::{Address, Env, Vec};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Once `now >= expiry` no call is ever allowed through that grant.
    #[test]
    fn expiry_is_monotonic(
        duration in 1u64..(10 * DAY),
        probes in proptest::collection::vec(0u64..(3 * DAY), 1..8)
    ) {
        let env = Env::default();
        let t = setup_engine(&env);
        let imaging = cat(&env, "imaging");
        let request = simple_request(&env, &t.patient, &t.doctor, &["imaging"], duration);
        let grant_id = t.client.create_grant(&t.patient, &request);
        let expiry = t.client.get_grant(&t.patient, &grant_id).expiry;

        let mut seen_expired = false;
        for step in probes {
            advance(&env, step);
            let verdict = t.client.authorize(&t.doctor, &t.patient, &imaging);
            if now(&env) >= expiry {
                seen_expired = true;
            }
            if seen_expired {
                prop_assert_ne!(verdict, Verdict::Allow(AccessRoute::ConsentGrant(grant_id)));
            } else {
                prop_assert_eq!(verdict, Verdict::Allow(AccessRoute::ConsentGrant(grant_id)));
            }
        }
        let expired_events = count_action(&t, &t.patient, AuditAction::GrantExpired);
        prop_assert_eq!(expired_events, if seen_expired { 1 } else { 0 });
    }

    /// Activation happens exactly when the number of distinct signers reaches
    /// the threshold, whatever the replays in between.
    #[test]
    fn threshold_counts_distinct_signers(
        approver_count in 1u32..5,
        threshold_seed in 0u32..5,
        picks in proptest::collection::vec(0u32..5, 1..12)
    ) {
        let env = Env::default();
        let t = setup_engine(&env);
        let threshold = threshold_seed % approver_count + 1;

        let mut approvers = Vec::new(&env);
        for _ in 0..approver_count {
            approvers.push_back(Address::generate(&env));
        }
        let request = multisig_request(&env, &t.patient, &t.hospital, approvers.clone(), threshold, DAY);
        let grant_id = t.client.create_grant(&t.patient, &request);
        let request_id = t.client.get_grant(&t.patient, &grant_id).multisig_request.unwrap();

        let mut signed: Vec<u32> = Vec::new(&env);
        for pick in picks {
            let index = pick % approver_count;
            let approver = approvers.get(index).unwrap();
            let already_active = signed.len() >= threshold;
            let result = t.client.try_submit_signature(&t.patient, &request_id, &approver, &1u64);

            if already_active {
                prop_assert!(result.is_err());
                continue;
            }
            let status = result.unwrap().unwrap();
            if signed.contains(index) {
                prop_assert_eq!(status, SignatureStatus::AlreadyCounted(signed.len()));
            } else {
                signed.push_back(index);
                if signed.len() >= threshold {
                    prop_assert_eq!(status, SignatureStatus::Activated(grant_id));
                } else {
                    prop_assert_eq!(status, SignatureStatus::Pending(signed.len(), threshold));
                }
            }
        }

        let expected = if signed.len() >= threshold { GrantStatus::Active } else { GrantStatus::Pending };
        prop_assert_eq!(t.client.get_grant(&t.patient, &grant_id).status, expected);
        let stored = t.client.get_request(&t.patient, &request_id);
        prop_assert!(stored.signatures.len() <= approver_count);
    }

    /// Arbitrary interleavings of operations keep the per-patient sequence
    /// gapless and the hash chain intact.
    #[test]
    fn audit_sequence_stays_gapless(ops in proptest::collection::vec(0u8..5, 1..20)) {
        let env = Env::default();
        let t = setup_engine(&env);
        let blood = cat(&env, "blood_test");
        let mut grant_ids: Vec<u64> = Vec::new(&env);

        for op in ops {
            match op {
                0 => {
                    let request = simple_request(&env, &t.patient, &t.doctor, &["blood_test"], DAY);
                    grant_ids.push_back(t.client.create_grant(&t.patient, &request));
                }
                1 => {
                    t.client.authorize(&t.doctor, &t.patient, &blood);
                }
                2 => {
                    if let Some(id) = grant_ids.last() {
                        t.client.revoke_grant(&t.patient, &id, &t.patient);
                    }
                }
                3 => advance(&env, DAY / 2),
                _ => {
                    t.client.sweep(&t.patient, &5u32);
                }
            }
        }

        let events = all_events(&env, &t, &t.patient);
        for (index, event) in events.iter().enumerate() {
            prop_assert_eq!(event.seq, index as u64 + 1);
        }
        prop_assert_eq!(events.len() as u64 + 1, next_seq(&t, &t.patient));
        prop_assert!(verify_trail(&t, &t.patient, 7));
    }
}
