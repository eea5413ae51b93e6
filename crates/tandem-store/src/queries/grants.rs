//! Database query functions for the `invite_auth` table (temporary access
//! grants consumed by the join protocol).

use sqlx::PgPool;

use crate::models::AccessGrant;

/// Write a grant. Re-granting to the same (plan, identity) pair is a no-op,
/// which keeps the join protocol's first step idempotent.
pub async fn put_grant(pool: &PgPool, grant: &AccessGrant) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO invite_auth (plan_id, identity, granted_at) VALUES ($1, $2, $3) \
         ON CONFLICT (plan_id, identity) DO NOTHING",
    )
    .bind(&grant.plan_id)
    .bind(&grant.identity)
    .bind(grant.granted_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete a grant. Deleting an absent grant is a no-op.
pub async fn delete_grant(pool: &PgPool, plan_id: &str, identity: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM invite_auth WHERE plan_id = $1 AND identity = $2")
        .bind(plan_id)
        .bind(identity)
        .execute(pool)
        .await?;

    Ok(())
}

/// Whether a grant exists for the (plan, identity) pair.
pub async fn has_grant(pool: &PgPool, plan_id: &str, identity: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM invite_auth WHERE plan_id = $1 AND identity = $2)")
        .bind(plan_id)
        .bind(identity)
        .fetch_one(pool)
        .await
}
