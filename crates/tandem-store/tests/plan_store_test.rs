//! Integration tests for the PostgreSQL [`PlanStore`] backend: document
//! CRUD per path, the membership-or-grant read rule, targeted JSONB
//! merges, and idempotent membership union.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::json;

use tandem_store::models::{AccessGrant, Booking, DayPlan, Location, TravelPlan, UserPointer};
use tandem_store::{PgStore, PlanStore, StoreError};
use tandem_test_utils::{create_test_db, drop_test_db};

#[tokio::test]
async fn create_and_read_plan_roundtrip() {
    let (pool, db_name) = create_test_db().await;
    let store = PgStore::new(pool.clone());

    let mut plan = TravelPlan::new("u1");
    plan.start_date = NaiveDate::from_ymd_opt(2025, 10, 1);
    plan.end_date = NaiveDate::from_ymd_opt(2025, 10, 5);
    plan.total_days = 5;
    plan.daily_plans.insert(
        "Day 1".into(),
        DayPlan {
            title: Some("Arrival".into()),
            locations: vec![Location::new("Hotel check-in", None)],
            completed: false,
        },
    );
    let flight = Booking::new(json!({"airline": "VY", "number": "VY8461"}));
    plan.flights.insert(flight.id, flight.clone());

    store.create_plan(&plan).await.expect("create should succeed");

    let read = store.read_plan("u1", "u1").await.expect("read should succeed");
    assert_eq!(read.id, "u1");
    assert_eq!(read.members, vec!["u1"]);
    assert_eq!(read.total_days, 5);
    assert_eq!(read.daily_plans["Day 1"].title.as_deref(), Some("Arrival"));
    assert_eq!(read.flights[&flight.id].details["number"], "VY8461");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn duplicate_plan_id_is_rejected() {
    let (pool, db_name) = create_test_db().await;
    let store = PgStore::new(pool.clone());

    store.create_plan(&TravelPlan::new("u1")).await.unwrap();
    let err = store.create_plan(&TravelPlan::new("u1")).await.unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists { .. }), "got {err:?}");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn read_rule_requires_membership_or_grant() {
    let (pool, db_name) = create_test_db().await;
    let store = PgStore::new(pool.clone());

    store.create_plan(&TravelPlan::new("u1")).await.unwrap();

    let err = store.read_plan("u1", "u2").await.unwrap_err();
    assert!(matches!(err, StoreError::PermissionDenied { .. }), "got {err:?}");

    store.put_grant(&AccessGrant::new("u1", "u2")).await.unwrap();
    assert!(store.read_plan("u1", "u2").await.is_ok());

    store.delete_grant("u1", "u2").await.unwrap();
    let err = store.read_plan("u1", "u2").await.unwrap_err();
    assert!(matches!(err, StoreError::PermissionDenied { .. }));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn add_member_unions_idempotently() {
    let (pool, db_name) = create_test_db().await;
    let store = PgStore::new(pool.clone());

    store.create_plan(&TravelPlan::new("u1")).await.unwrap();

    store.add_member("u1", "u2").await.unwrap();
    store.add_member("u1", "u2").await.unwrap();

    let plan = store.read_plan("u1", "u1").await.unwrap();
    assert_eq!(plan.members, vec!["u1", "u2"]);

    // Membership alone now authorizes the read.
    assert!(store.read_plan("u1", "u2").await.is_ok());

    let err = store.add_member("missing", "u2").await.unwrap_err();
    assert!(err.is_not_found());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn day_merge_touches_one_key_only() {
    let (pool, db_name) = create_test_db().await;
    let store = PgStore::new(pool.clone());

    let mut plan = TravelPlan::new("u1");
    plan.daily_plans.insert("Day 1".into(), DayPlan::default());
    plan.daily_plans.insert(
        "Day 2".into(),
        DayPlan {
            title: Some("Beach".into()),
            ..DayPlan::default()
        },
    );
    store.create_plan(&plan).await.unwrap();

    let day = DayPlan {
        locations: vec![Location::new("Old town walk", Some("evening".into()))],
        ..DayPlan::default()
    };
    store.set_day_plan("u1", "Day 1", &day).await.unwrap();

    let read = store.read_plan("u1", "u1").await.unwrap();
    assert_eq!(read.daily_plans["Day 1"].locations.len(), 1);
    assert_eq!(read.daily_plans["Day 2"].title.as_deref(), Some("Beach"));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn booking_put_and_remove_by_key() {
    let (pool, db_name) = create_test_db().await;
    let store = PgStore::new(pool.clone());

    store.create_plan(&TravelPlan::new("u1")).await.unwrap();

    let a = Booking::new(json!({"airline": "LH"}));
    let b = Booking::new(json!({"airline": "BA"}));
    store.put_flight("u1", &a).await.unwrap();
    store.put_flight("u1", &b).await.unwrap();

    store.remove_flight("u1", a.id).await.unwrap();
    // Removing an absent id is a no-op.
    store.remove_flight("u1", a.id).await.unwrap();

    let plan = store.read_plan("u1", "u1").await.unwrap();
    assert_eq!(plan.flights.len(), 1);
    assert!(plan.flights.contains_key(&b.id));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn user_pointer_upserts() {
    let (pool, db_name) = create_test_db().await;
    let store = PgStore::new(pool.clone());

    assert!(store.get_user_pointer("u2").await.unwrap().is_none());

    store
        .set_user_pointer(&UserPointer::new("u2", "plan-a"))
        .await
        .unwrap();
    store
        .set_user_pointer(&UserPointer::new("u2", "plan-b"))
        .await
        .unwrap();

    let pointer = store.get_user_pointer("u2").await.unwrap().unwrap();
    assert_eq!(pointer.plan_id, "plan-b");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn dates_update_missing_plan_is_not_found() {
    let (pool, db_name) = create_test_db().await;
    let store = PgStore::new(pool.clone());

    let err = store
        .set_dates("missing", None, None, 0)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    pool.close().await;
    drop_test_db(&db_name).await;
}
