//! Invite minting and validation.
//!
//! Invite codes are 6 characters of base-36 derived from cryptographically
//! random bytes. At that length a birthday collision across outstanding
//! invites is possible but vanishingly unlikely for a store where invites
//! live at most 24 hours; the tradeoff buys a code a human can read over
//! the phone.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use tandem_store::PlanStore;
use tandem_store::models::{Invite, InviteStatus};

use crate::error::{JoinError, OpError};

/// Length of a generated invite code.
pub const CODE_LEN: usize = 6;

/// How long an invite stays redeemable.
pub const INVITE_TTL_HOURS: i64 = 24;

const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Produce a fresh 6-character, uppercase, base-36 code.
pub fn generate_code() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);

    let mut n = u128::from_le_bytes(bytes);
    let mut code = String::with_capacity(CODE_LEN);
    for _ in 0..CODE_LEN {
        code.push(ALPHABET[(n % 36) as usize] as char);
        n /= 36;
    }
    code
}

/// Mint an invite for `plan_id` and write it to the store.
///
/// Only a current member may invite; that check runs locally against the
/// plan document before anything is written.
pub async fn generate_invite(
    store: &dyn PlanStore,
    plan_id: &str,
    identity: &str,
) -> Result<Invite, OpError> {
    let plan = store.read_plan(plan_id, identity).await?;
    if !plan.is_member(identity) {
        return Err(OpError::validation(format!(
            "{identity} is not a member of plan {plan_id} and cannot invite"
        )));
    }

    let now = Utc::now();
    let invite = Invite {
        code: generate_code(),
        plan_id: plan_id.to_owned(),
        status: InviteStatus::Pending,
        created_at: now,
        expires_at: now + Duration::hours(INVITE_TTL_HOURS),
    };
    store.put_invite(&invite).await?;

    tracing::info!(plan_id = %plan_id, code = %invite.code, "invite created");
    Ok(invite)
}

/// Look up and vet an invite code for redemption.
///
/// An expired invite is deleted as a side effect, so redeeming the same
/// expired code a second time reports `InvalidCode` rather than `Expired`.
pub(crate) async fn validate_invite(
    store: &dyn PlanStore,
    code: &str,
    now: DateTime<Utc>,
) -> Result<Invite, JoinError> {
    let invite = store.get_invite(code).await?.ok_or(JoinError::InvalidCode)?;

    if invite.status != InviteStatus::Pending {
        return Err(JoinError::AlreadyUsed);
    }

    if invite.is_expired(now) {
        if let Err(e) = store.delete_invite(code).await {
            tracing::warn!(code = %code, error = %e, "failed to delete expired invite");
        }
        return Err(JoinError::Expired);
    }

    Ok(invite)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_six_uppercase_base36_chars() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LEN);
            assert!(
                code.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()),
                "unexpected character in code: {code}"
            );
        }
    }

    #[test]
    fn codes_are_not_constant() {
        let a = generate_code();
        let b = generate_code();
        // Astronomically unlikely to collide back to back.
        assert_ne!(a, b);
    }
}
