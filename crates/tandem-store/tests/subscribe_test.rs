//! Integration tests for the LISTEN/NOTIFY subscription feed.

use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use tokio::time::timeout;

use tandem_store::models::{Booking, TravelPlan};
use tandem_store::{PgStore, PlanStore, StoreError};
use tandem_test_utils::{create_test_db, drop_test_db};

/// Generous bound for a notification round-trip through the database.
const RECV_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn subscription_yields_initial_then_change_snapshots() {
    let (pool, db_name) = create_test_db().await;
    let store = PgStore::new(pool.clone());

    store.create_plan(&TravelPlan::new("u1")).await.unwrap();

    let mut stream = store.subscribe("u1", "u1").await.unwrap();

    let initial = timeout(RECV_TIMEOUT, stream.next())
        .await
        .expect("initial snapshot should arrive")
        .expect("stream should be open");
    assert_eq!(initial.total_days, 0);

    store.set_dates("u1", None, None, 4).await.unwrap();

    let updated = timeout(RECV_TIMEOUT, stream.next())
        .await
        .expect("change snapshot should arrive")
        .expect("stream should be open");
    assert_eq!(updated.total_days, 4);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn subscription_sees_other_writers() {
    let (pool, db_name) = create_test_db().await;

    // Two store handles standing in for two clients on one database.
    let reader = PgStore::new(pool.clone());
    let writer = PgStore::new(pool.clone());

    reader.create_plan(&TravelPlan::new("u1")).await.unwrap();
    reader.add_member("u1", "u2").await.unwrap();

    let mut stream = reader.subscribe("u1", "u1").await.unwrap();
    let _initial = timeout(RECV_TIMEOUT, stream.next()).await.unwrap().unwrap();

    let flight = Booking::new(json!({"airline": "IB"}));
    writer.put_flight("u1", &flight).await.unwrap();

    let updated = timeout(RECV_TIMEOUT, stream.next())
        .await
        .expect("snapshot from the other writer should arrive")
        .expect("stream should be open");
    assert!(updated.flights.contains_key(&flight.id));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn subscription_attach_respects_read_rule() {
    let (pool, db_name) = create_test_db().await;
    let store = PgStore::new(pool.clone());

    store.create_plan(&TravelPlan::new("u1")).await.unwrap();

    let err = store.subscribe("u1", "u2").await.err().expect("should be denied");
    assert!(matches!(err, StoreError::PermissionDenied { .. }));

    pool.close().await;
    drop_test_db(&db_name).await;
}
