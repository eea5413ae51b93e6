//! Integration tests for the invite/join protocol against the in-memory
//! store: the happy path, every refusal, and recovery from mid-protocol
//! failures.

mod common;

use chrono::{Duration, Utc};

use common::InstrumentedStore;
use tandem_core::invite::{CODE_LEN, generate_invite};
use tandem_core::{JoinError, PlanLimits, join_plan};
use tandem_store::models::{Invite, InviteStatus};
use tandem_store::{MemoryStore, PlanStore};

use tandem_core::ops;

#[tokio::test]
async fn create_invite_join_full_scenario() {
    let store = MemoryStore::new();

    // U1 creates a plan and mints an invite.
    let plan = ops::create_plan(&store, "u1").await.expect("create should succeed");
    assert_eq!(plan.id, "u1");

    let invite = generate_invite(&store, "u1", "u1").await.expect("invite should mint");
    assert_eq!(invite.code.len(), CODE_LEN);
    assert_eq!(invite.status, InviteStatus::Pending);

    // U2 redeems it.
    let plan_id = join_plan(&store, &invite.code, "u2", PlanLimits::default())
        .await
        .expect("join should succeed");
    assert_eq!(plan_id, "u1");

    // Membership holds both identities, exactly once each.
    let plan = store.read_plan("u1", "u2").await.unwrap();
    assert_eq!(plan.members, vec!["u1", "u2"]);

    // The invite is gone, the pointer is set, and no grant remains.
    assert!(store.get_invite(&invite.code).await.unwrap().is_none());
    let pointer = store.get_user_pointer("u2").await.unwrap().unwrap();
    assert_eq!(pointer.plan_id, "u1");
    assert!(!store.has_grant("u1", "u2").await.unwrap());
}

#[tokio::test]
async fn unknown_code_is_invalid() {
    let store = MemoryStore::new();
    let err = join_plan(&store, "NOSUCH", "u2", PlanLimits::default())
        .await
        .unwrap_err();
    assert!(matches!(err, JoinError::InvalidCode));
}

#[tokio::test]
async fn consumed_invite_reports_already_used() {
    let store = MemoryStore::new();
    ops::create_plan(&store, "u1").await.unwrap();

    let now = Utc::now();
    store
        .put_invite(&Invite {
            code: "USED01".into(),
            plan_id: "u1".into(),
            status: InviteStatus::Consumed,
            created_at: now,
            expires_at: now + Duration::hours(24),
        })
        .await
        .unwrap();

    let err = join_plan(&store, "USED01", "u2", PlanLimits::default())
        .await
        .unwrap_err();
    assert!(matches!(err, JoinError::AlreadyUsed));
}

#[tokio::test]
async fn expired_invite_is_deleted_and_then_invalid() {
    let store = MemoryStore::new();
    ops::create_plan(&store, "u1").await.unwrap();

    let now = Utc::now();
    store
        .put_invite(&Invite {
            code: "OLD123".into(),
            plan_id: "u1".into(),
            status: InviteStatus::Pending,
            created_at: now - Duration::hours(25),
            expires_at: now - Duration::hours(1),
        })
        .await
        .unwrap();

    let err = join_plan(&store, "OLD123", "u2", PlanLimits::default())
        .await
        .unwrap_err();
    assert!(matches!(err, JoinError::Expired));

    // Deleted as a side effect, so the second redemption sees no record.
    assert!(store.get_invite("OLD123").await.unwrap().is_none());
    let err = join_plan(&store, "OLD123", "u2", PlanLimits::default())
        .await
        .unwrap_err();
    assert!(matches!(err, JoinError::InvalidCode));
}

#[tokio::test]
async fn full_plan_refuses_and_leaves_no_grant() {
    let store = MemoryStore::new();
    ops::create_plan(&store, "u1").await.unwrap();
    store.add_member("u1", "u2").await.unwrap();

    let invite = generate_invite(&store, "u1", "u1").await.unwrap();
    let err = join_plan(&store, &invite.code, "u3", PlanLimits::default())
        .await
        .unwrap_err();
    assert!(matches!(err, JoinError::PlanFull { capacity: 2 }));

    // Membership unchanged, no dangling grant, invite still redeemable by
    // someone else the owner chooses to pass it to.
    let plan = store.read_plan("u1", "u1").await.unwrap();
    assert_eq!(plan.members, vec!["u1", "u2"]);
    assert!(!store.has_grant("u1", "u3").await.unwrap());
    assert!(store.get_invite(&invite.code).await.unwrap().is_some());
}

#[tokio::test]
async fn capacity_is_configurable() {
    let store = MemoryStore::new();
    ops::create_plan(&store, "u1").await.unwrap();
    store.add_member("u1", "u2").await.unwrap();

    let invite = generate_invite(&store, "u1", "u1").await.unwrap();
    let limits = PlanLimits { max_members: 3 };
    let plan_id = join_plan(&store, &invite.code, "u3", limits)
        .await
        .expect("third member should fit under a cap of 3");
    assert_eq!(plan_id, "u1");

    let plan = store.read_plan("u1", "u3").await.unwrap();
    assert_eq!(plan.members.len(), 3);
}

#[tokio::test]
async fn vanished_plan_reports_not_found_without_dangling_grant() {
    let store = MemoryStore::new();

    // An invite pointing at a plan that no longer exists.
    let now = Utc::now();
    store
        .put_invite(&Invite {
            code: "GHOST1".into(),
            plan_id: "gone".into(),
            status: InviteStatus::Pending,
            created_at: now,
            expires_at: now + Duration::hours(24),
        })
        .await
        .unwrap();

    let err = join_plan(&store, "GHOST1", "u2", PlanLimits::default())
        .await
        .unwrap_err();
    assert!(matches!(err, JoinError::PlanNotFound(ref p) if p == "gone"));
    assert!(!store.has_grant("gone", "u2").await.unwrap());
}

#[tokio::test]
async fn add_member_failure_rolls_back_grant_and_retry_succeeds() {
    let store = InstrumentedStore::new();
    ops::create_plan(&store, "u1").await.unwrap();
    let invite = generate_invite(&store, "u1", "u1").await.unwrap();

    store.fail_next("add_member", 1).await;
    let err = join_plan(&store, &invite.code, "u2", PlanLimits::default())
        .await
        .unwrap_err();
    assert!(matches!(err, JoinError::Store(_)));

    // The compensating delete ran; nothing dangles and membership is
    // untouched.
    assert!(!store.has_grant("u1", "u2").await.unwrap());
    let plan = store.read_plan("u1", "u1").await.unwrap();
    assert_eq!(plan.members, vec!["u1"]);

    // The same code redeems cleanly on retry.
    join_plan(&store, &invite.code, "u2", PlanLimits::default())
        .await
        .expect("retry should succeed");
    let plan = store.read_plan("u1", "u1").await.unwrap();
    assert_eq!(plan.members, vec!["u1", "u2"]);
}

#[tokio::test]
async fn pointer_failure_still_leaves_no_grant_and_retry_is_idempotent() {
    let store = InstrumentedStore::new();
    ops::create_plan(&store, "u1").await.unwrap();
    let invite = generate_invite(&store, "u1", "u1").await.unwrap();

    // Crash after AddMember: membership is durable, the pointer write
    // fails, the grant must still be cleaned up.
    store.fail_next("set_user_pointer", 1).await;
    let err = join_plan(&store, &invite.code, "u2", PlanLimits::default())
        .await
        .unwrap_err();
    assert!(matches!(err, JoinError::Store(_)));
    assert!(!store.has_grant("u1", "u2").await.unwrap());

    // Retrying re-enters past the capacity check (u2 is already a member)
    // and never duplicates the identity.
    join_plan(&store, &invite.code, "u2", PlanLimits::default())
        .await
        .expect("retry should succeed");
    let plan = store.read_plan("u1", "u2").await.unwrap();
    assert_eq!(plan.members, vec!["u1", "u2"]);
    assert!(store.get_invite(&invite.code).await.unwrap().is_none());
    let pointer = store.get_user_pointer("u2").await.unwrap().unwrap();
    assert_eq!(pointer.plan_id, "u1");
}

#[tokio::test]
async fn cleanup_failure_is_swallowed_after_commit() {
    let store = InstrumentedStore::new();
    ops::create_plan(&store, "u1").await.unwrap();
    let invite = generate_invite(&store, "u1", "u1").await.unwrap();

    // Invite deletion fails once; the join must still report success
    // because membership is already durable.
    store.fail_next("delete_invite", 1).await;
    let plan_id = join_plan(&store, &invite.code, "u2", PlanLimits::default())
        .await
        .expect("join should succeed despite cleanup failure");
    assert_eq!(plan_id, "u1");

    let plan = store.read_plan("u1", "u2").await.unwrap();
    assert_eq!(plan.members, vec!["u1", "u2"]);
}

#[tokio::test]
async fn non_member_cannot_mint_invites() {
    let store = MemoryStore::new();
    ops::create_plan(&store, "u1").await.unwrap();

    let err = generate_invite(&store, "u1", "u9").await.unwrap_err();
    // The store refuses the read before the membership check even runs.
    assert!(matches!(err, tandem_core::OpError::Store(_)));
}
