//! The join protocol: exchange a pending invite for plan membership.
//!
//! The store's read rule blocks a non-member from reading a plan until an
//! access grant names them, so joining is a linear saga:
//!
//! ```text
//! ValidateInvite -> GrantAccess -> ReadPlan -> CapacityCheck
//!     -> AddMember -> Cleanup
//! ```
//!
//! Each step can fail independently and there are no multi-key
//! transactions, so every failure in steps ReadPlan..AddMember runs the
//! one compensating action that matters: deleting the grant. Cleanup is
//! best-effort; once membership is durably committed its failures are
//! logged, never surfaced. Re-running the saga with the same code after a
//! partial failure is safe: granting is an upsert, membership is a
//! set-union, and the pointer write is an overwrite.

use chrono::Utc;

use tandem_store::models::{AccessGrant, UserPointer};
use tandem_store::{PlanStore, StoreError};

use crate::error::JoinError;
use crate::invite::validate_invite;

/// Per-plan membership policy.
#[derive(Debug, Clone, Copy)]
pub struct PlanLimits {
    /// Maximum identities in a plan's membership.
    pub max_members: usize,
}

impl Default for PlanLimits {
    fn default() -> Self {
        // Two travellers per plan. Kept as a parameter rather than a
        // literal so a different cap is one config change away.
        Self { max_members: 2 }
    }
}

/// Redeem `code` and add `identity` to the referenced plan.
///
/// Returns the joined plan's id. On success the invite record is gone and
/// no access grant remains; on failure no grant remains either, and the
/// error says which protocol step refused.
pub async fn join_plan(
    store: &dyn PlanStore,
    code: &str,
    identity: &str,
    limits: PlanLimits,
) -> Result<String, JoinError> {
    let invite = validate_invite(store, code, Utc::now()).await?;
    let plan_id = invite.plan_id;

    // GrantAccess: open the read path for an identity the plan does not
    // yet list. Upsert semantics make a re-run after a crash a no-op.
    store
        .put_grant(&AccessGrant::new(&plan_id, identity))
        .await?;

    // ReadPlan.
    let plan = match store.read_plan(&plan_id, identity).await {
        Ok(plan) => plan,
        Err(e) => {
            rollback_grant(store, &plan_id, identity).await;
            return Err(match e {
                StoreError::NotFound { .. } => JoinError::PlanNotFound(plan_id),
                other => other.into(),
            });
        }
    };

    // CapacityCheck. An identity already in the membership passes; that is
    // the re-entry path after a crash between AddMember and Cleanup.
    if !plan.is_member(identity) && plan.members.len() >= limits.max_members {
        rollback_grant(store, &plan_id, identity).await;
        return Err(JoinError::PlanFull {
            capacity: limits.max_members,
        });
    }

    // AddMember: set-union into the membership, then point the identity at
    // its new plan.
    if let Err(e) = store.add_member(&plan_id, identity).await {
        rollback_grant(store, &plan_id, identity).await;
        return Err(e.into());
    }
    if let Err(e) = store
        .set_user_pointer(&UserPointer::new(identity, &plan_id))
        .await
    {
        // Membership is already durable; the grant still must not dangle.
        rollback_grant(store, &plan_id, identity).await;
        return Err(e.into());
    }

    // Cleanup: the invite is single-use and the grant is superseded by
    // membership. Best-effort only from here on.
    if let Err(e) = store.delete_invite(code).await {
        tracing::warn!(code = %code, error = %e, "failed to delete consumed invite");
    }
    if let Err(e) = store.delete_grant(&plan_id, identity).await {
        tracing::warn!(
            plan_id = %plan_id,
            identity = %identity,
            error = %e,
            "failed to delete access grant after join"
        );
    }

    tracing::info!(plan_id = %plan_id, identity = %identity, "joined plan");
    Ok(plan_id)
}

/// Compensating action for steps after GrantAccess: remove the grant so a
/// failed join leaves no read access behind.
async fn rollback_grant(store: &dyn PlanStore, plan_id: &str, identity: &str) {
    if let Err(e) = store.delete_grant(plan_id, identity).await {
        tracing::warn!(
            plan_id = %plan_id,
            identity = %identity,
            error = %e,
            "failed to roll back access grant"
        );
    }
}
