//! Database query functions for the `invites` table.

use sqlx::PgPool;

use crate::models::Invite;

/// Fetch an invite by its code.
pub async fn get_invite(pool: &PgPool, code: &str) -> Result<Option<Invite>, sqlx::Error> {
    sqlx::query_as::<_, Invite>("SELECT * FROM invites WHERE code = $1")
        .bind(code)
        .fetch_optional(pool)
        .await
}

/// Insert an invite, updating status and expiry on a code collision.
pub async fn put_invite(pool: &PgPool, invite: &Invite) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO invites (code, plan_id, status, created_at, expires_at) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (code) DO UPDATE \
         SET plan_id = EXCLUDED.plan_id, status = EXCLUDED.status, \
             created_at = EXCLUDED.created_at, expires_at = EXCLUDED.expires_at",
    )
    .bind(&invite.code)
    .bind(&invite.plan_id)
    .bind(invite.status)
    .bind(invite.created_at)
    .bind(invite.expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete an invite. Deleting an absent code is a no-op.
pub async fn delete_invite(pool: &PgPool, code: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM invites WHERE code = $1")
        .bind(code)
        .execute(pool)
        .await?;

    Ok(())
}
