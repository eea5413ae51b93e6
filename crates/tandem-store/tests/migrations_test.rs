//! Migration smoke tests: the embedded migrations apply cleanly and create
//! the expected tables.

use tandem_test_utils::{create_test_db, drop_test_db};

#[tokio::test]
async fn migrations_create_expected_tables() {
    let (pool, db_name) = create_test_db().await;

    let tables: Vec<(String,)> = sqlx::query_as(
        "SELECT tablename::text FROM pg_tables WHERE schemaname = 'public' ORDER BY tablename",
    )
    .fetch_all(&pool)
    .await
    .expect("should list tables");

    let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
    for expected in ["invite_auth", "invites", "travel_plans", "users"] {
        assert!(names.contains(&expected), "missing table {expected}: {names:?}");
    }

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn migrations_install_notify_trigger() {
    let (pool, db_name) = create_test_db().await;

    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM pg_trigger WHERE tgname = 'travel_plans_notify')",
    )
    .fetch_one(&pool)
    .await
    .expect("should query pg_trigger");

    assert!(exists, "travel_plans_notify trigger should exist");

    pool.close().await;
    drop_test_db(&db_name).await;
}
