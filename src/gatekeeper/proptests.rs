//! Property-based tests for the access grant lifecycle
//!
//! Tests for:
//! - Exclusivity: a user never holds a pending request and a grant for the same channel
//! - Expiry arithmetic: every stored grant satisfies `expires_at == join_time + duration`
//! - Sweep safety: the sweeper never removes a grant that has not expired
//! - Duration bounds: out-of-range approvals change nothing

use super::{AccessError, AccessPolicy, ExpirationSweeper, GrantAuthority};
use crate::clock::{Clock, ManualClock};
use crate::store::{ApplicantProfile, Channel, Document, DocumentSeed, Store};
use crate::telegram::mock::MockGateway;
use crate::telegram::traits::{ChannelId, UserId};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

const CHANNEL: ChannelId = ChannelId(-1005555);
const ADMIN: UserId = UserId(1);

#[derive(Debug, Clone)]
enum Op {
    Submit(u8),
    Approve(u8, u64),
    Reject(u8),
    Revoke(u8),
    Advance(i64),
    Sweep,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..5).prop_map(Op::Submit),
        ((0u8..5), (0u64..800)).prop_map(|(u, h)| Op::Approve(u, h)),
        (0u8..5).prop_map(Op::Reject),
        (0u8..5).prop_map(Op::Revoke),
        (0i64..200_000).prop_map(Op::Advance),
        Just(Op::Sweep),
    ]
}

fn applicant(n: u8) -> UserId {
    UserId(1000 + n as i64)
}

fn profile(n: u8) -> ApplicantProfile {
    ApplicantProfile {
        name: format!("Name{}", n),
        surname: format!("Surname{}", n),
        country: "Nowhere".to_string(),
    }
}

struct Harness {
    authority: GrantAuthority<MockGateway>,
    sweeper: ExpirationSweeper<MockGateway>,
    store: Arc<Store>,
    clock: ManualClock,
}

fn harness() -> Harness {
    let store = Arc::new(Store::in_memory(DocumentSeed {
        super_admins: vec![ADMIN],
        channels: vec![Channel::new(
            CHANNEL,
            "Prop".to_string(),
            "https://t.me/+prop".to_string(),
            0,
        )],
    }));
    let gateway = MockGateway::new();
    let clock = ManualClock::new(1_700_000_000);
    let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());

    Harness {
        authority: GrantAuthority::new(
            store.clone(),
            gateway.clone(),
            shared_clock.clone(),
            AccessPolicy::default(),
        ),
        sweeper: ExpirationSweeper::new(
            store.clone(),
            gateway,
            shared_clock,
            Duration::from_secs(60),
        ),
        store,
        clock,
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn check_invariants(doc: &Document) -> Result<(), TestCaseError> {
    for channel in doc.channels.values() {
        for user in channel.members.keys() {
            prop_assert!(
                !channel.pending.contains_key(user),
                "{} is both pending and a member",
                user
            );
        }
        for grant in channel.members.values() {
            prop_assert_eq!(
                grant.expires_at(),
                grant.join_time() + grant.duration() as i64
            );
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property test: lifecycle invariants hold after every operation
    #[test]
    fn prop_lifecycle_invariants(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let rt = runtime();
        let h = harness();

        for op in ops {
            let before = rt.block_on(h.store.load()).unwrap();
            let now = h.clock.now();

            match op {
                Op::Submit(n) => {
                    let _ = rt.block_on(h.authority.submit_registration(applicant(n), CHANNEL, profile(n)));
                }
                Op::Approve(n, hours) => {
                    let _ = rt.block_on(h.authority.approve(ADMIN, CHANNEL, applicant(n), hours));
                }
                Op::Reject(n) => {
                    let _ = rt.block_on(h.authority.reject(ADMIN, CHANNEL, applicant(n)));
                }
                Op::Revoke(n) => {
                    let _ = rt.block_on(h.authority.revoke(ADMIN, CHANNEL, applicant(n)));
                }
                Op::Advance(secs) => h.clock.advance(secs),
                Op::Sweep => {
                    rt.block_on(h.sweeper.sweep_once()).unwrap();

                    let after = rt.block_on(h.store.load()).unwrap();
                    let before_channel = before.channel(CHANNEL).unwrap();
                    let after_channel = after.channel(CHANNEL).unwrap();

                    // live grants survive, expired grants are gone
                    for (user, grant) in &before_channel.members {
                        let kept = after_channel.members.contains_key(user);
                        prop_assert_eq!(kept, !grant.is_expired(now));
                    }
                    prop_assert_eq!(&before_channel.pending, &after_channel.pending);
                }
            }

            check_invariants(&rt.block_on(h.store.load()).unwrap())?;
        }
    }

    /// Property test: out-of-range approvals leave the pending request untouched
    #[test]
    fn prop_out_of_range_duration_rejected(
        hours in prop_oneof![Just(0u64), 751u64..100_000],
    ) {
        let rt = runtime();
        let h = harness();

        rt.block_on(h.authority.submit_registration(applicant(0), CHANNEL, profile(0))).unwrap();
        let before = rt.block_on(h.store.load()).unwrap();

        let result = rt.block_on(h.authority.approve(ADMIN, CHANNEL, applicant(0), hours));
        let is_invalid_duration = matches!(result, Err(AccessError::InvalidDuration { .. }));
        prop_assert!(is_invalid_duration);
        prop_assert_eq!(rt.block_on(h.store.load()).unwrap(), before);
    }

    /// Property test: in-range approvals expire exactly `hours` later
    #[test]
    fn prop_grant_expiry_matches_hours(hours in 1u64..=750) {
        let rt = runtime();
        let h = harness();
        let now = h.clock.now();

        rt.block_on(h.authority.submit_registration(applicant(0), CHANNEL, profile(0))).unwrap();
        let grant = rt.block_on(h.authority.approve(ADMIN, CHANNEL, applicant(0), hours)).unwrap();

        prop_assert_eq!(grant.join_time(), now);
        prop_assert_eq!(grant.expires_at(), now + (hours * 3600) as i64);
    }
}
