//! Integration tests for the `tandem serve` JSON API against a real
//! PostgreSQL instance.

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use tandem_store::models::TravelPlan;
use tandem_store::{PgStore, PlanStore};
use tandem_test_utils::{create_test_db, drop_test_db};

// The serve router lives in the binary crate; include it directly the way
// the binary does.
#[allow(dead_code)]
#[path = "../src/serve_cmd.rs"]
mod serve_cmd;

#[tokio::test]
async fn plan_detail_roundtrips_through_the_api() {
    let (pool, db_name) = create_test_db().await;

    let store = PgStore::new(pool.clone());
    let mut plan = TravelPlan::new("u1");
    plan.total_days = 2;
    plan.daily_plans.insert("Day 1".into(), Default::default());
    plan.daily_plans.insert(
        "Day 2".into(),
        tandem_store::models::DayPlan {
            completed: true,
            ..Default::default()
        },
    );
    store.create_plan(&plan).await.unwrap();

    let app = serve_cmd::build_router(pool.clone());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/plans/u1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["id"], "u1");
    assert_eq!(body["total_days"], 2);
    assert_eq!(body["days_completed"], 1);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn missing_plan_is_a_json_404() {
    let (pool, db_name) = create_test_db().await;

    let app = serve_cmd::build_router(pool.clone());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/plans/nobody")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].as_str().unwrap().contains("not found"));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn index_lists_plans_as_html() {
    let (pool, db_name) = create_test_db().await;

    let store = PgStore::new(pool.clone());
    store.create_plan(&TravelPlan::new("u1")).await.unwrap();

    let app = serve_cmd::build_router(pool.clone());
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("u1"));

    pool.close().await;
    drop_test_db(&db_name).await;
}
