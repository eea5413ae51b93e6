//! Database query functions for the `users` table (identity -> plan pointers).

use sqlx::PgPool;

use crate::models::UserPointer;

/// Fetch the pointer for an identity, if one exists.
pub async fn get_user_pointer(
    pool: &PgPool,
    identity: &str,
) -> Result<Option<UserPointer>, sqlx::Error> {
    sqlx::query_as::<_, UserPointer>("SELECT * FROM users WHERE identity = $1")
        .bind(identity)
        .fetch_optional(pool)
        .await
}

/// Upsert the pointer. An identity has at most one plan at a time, so
/// switching plans overwrites the previous row.
pub async fn set_user_pointer(pool: &PgPool, pointer: &UserPointer) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (identity, plan_id, joined_at) VALUES ($1, $2, $3) \
         ON CONFLICT (identity) DO UPDATE \
         SET plan_id = EXCLUDED.plan_id, joined_at = EXCLUDED.joined_at",
    )
    .bind(&pointer.identity)
    .bind(&pointer.plan_id)
    .bind(pointer.joined_at)
    .execute(pool)
    .await?;

    Ok(())
}
