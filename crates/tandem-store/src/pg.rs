//! PostgreSQL-backed [`PlanStore`].
//!
//! Documents map to rows (nested plan collections as JSONB); the realtime
//! subscription rides on LISTEN/NOTIFY. A trigger on `travel_plans` fans
//! out `plan_changed` notifications carrying the plan id, and each
//! subscriber re-reads the row when its plan is named.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{AccessGrant, Booking, DayPlan, Invite, TravelPlan, UserPointer};
use crate::queries::{grants, invites, plans, users};
use crate::store::{PlanStore, PlanStream, paths};

/// The notification channel fed by the `travel_plans_notify` trigger.
const PLAN_CHANNEL: &str = "plan_changed";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Enforce the membership-or-grant read rule for `reader`.
    async fn check_read_access(&self, plan_id: &str, reader: &str) -> StoreResult<()> {
        if plans::can_read_plan(&self.pool, plan_id, reader).await? {
            Ok(())
        } else {
            Err(StoreError::permission_denied(paths::plan(plan_id), reader))
        }
    }

    /// Map a zero-rows-affected update to a missing-plan error.
    fn require_row(rows: u64, plan_id: &str) -> StoreResult<()> {
        if rows == 0 {
            Err(StoreError::not_found(paths::plan(plan_id)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PlanStore for PgStore {
    async fn create_plan(&self, plan: &TravelPlan) -> StoreResult<()> {
        plans::insert_plan(&self.pool, plan).await.map_err(|e| {
            let is_duplicate = e
                .as_database_error()
                .is_some_and(|d| d.is_unique_violation());
            if is_duplicate {
                StoreError::already_exists(paths::plan(&plan.id))
            } else {
                StoreError::Database(e)
            }
        })
    }

    async fn read_plan(&self, plan_id: &str, reader: &str) -> StoreResult<TravelPlan> {
        let plan = plans::get_plan(&self.pool, plan_id)
            .await?
            .ok_or_else(|| StoreError::not_found(paths::plan(plan_id)))?;

        // The existence of the document is not secret; only its contents
        // are gated, so NotFound is checked before the access rule.
        self.check_read_access(plan_id, reader).await?;
        Ok(plan)
    }

    async fn subscribe(&self, plan_id: &str, reader: &str) -> StoreResult<PlanStream> {
        // Access is checked once at attach; from then on membership itself
        // authorizes the re-reads (the subscriber is a member, or joined
        // moments ago and will observe that write too).
        let initial = self.read_plan(plan_id, reader).await?;

        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(PLAN_CHANNEL).await?;

        let pool = self.pool.clone();
        let plan_id = plan_id.to_owned();

        let stream = async_stream::stream! {
            yield initial;
            loop {
                match listener.recv().await {
                    Ok(n) if n.payload() == plan_id => {
                        match plans::get_plan(&pool, &plan_id).await {
                            Ok(Some(plan)) => yield plan,
                            // Plan deleted out from under us; end the feed.
                            Ok(None) => break,
                            Err(e) => {
                                tracing::warn!(
                                    plan_id = %plan_id,
                                    error = %e,
                                    "failed to re-read plan after change notification"
                                );
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(
                            plan_id = %plan_id,
                            error = %e,
                            "plan subscription listener error, ending feed"
                        );
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn set_dates(
        &self,
        plan_id: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        total_days: i32,
    ) -> StoreResult<()> {
        let rows = plans::set_dates(&self.pool, plan_id, start, end, total_days).await?;
        Self::require_row(rows, plan_id)
    }

    async fn set_daily_plans(
        &self,
        plan_id: &str,
        daily_plans: &BTreeMap<String, DayPlan>,
    ) -> StoreResult<()> {
        let rows = plans::set_daily_plans(&self.pool, plan_id, daily_plans).await?;
        Self::require_row(rows, plan_id)
    }

    async fn set_day_plan(&self, plan_id: &str, label: &str, day: &DayPlan) -> StoreResult<()> {
        let rows = plans::set_day_plan(&self.pool, plan_id, label, day).await?;
        Self::require_row(rows, plan_id)
    }

    async fn set_skipped_days(&self, plan_id: &str, days: &BTreeSet<String>) -> StoreResult<()> {
        let rows = plans::set_skipped_days(&self.pool, plan_id, days).await?;
        Self::require_row(rows, plan_id)
    }

    async fn put_flight(&self, plan_id: &str, flight: &Booking) -> StoreResult<()> {
        let rows = plans::put_flight(&self.pool, plan_id, flight).await?;
        Self::require_row(rows, plan_id)
    }

    async fn remove_flight(&self, plan_id: &str, id: Uuid) -> StoreResult<()> {
        let rows = plans::remove_flight(&self.pool, plan_id, id).await?;
        Self::require_row(rows, plan_id)
    }

    async fn put_stay(&self, plan_id: &str, stay: &Booking) -> StoreResult<()> {
        let rows = plans::put_stay(&self.pool, plan_id, stay).await?;
        Self::require_row(rows, plan_id)
    }

    async fn remove_stay(&self, plan_id: &str, id: Uuid) -> StoreResult<()> {
        let rows = plans::remove_stay(&self.pool, plan_id, id).await?;
        Self::require_row(rows, plan_id)
    }

    async fn add_member(&self, plan_id: &str, identity: &str) -> StoreResult<()> {
        let rows = plans::add_member(&self.pool, plan_id, identity).await?;
        if rows == 0 {
            // Zero rows means either the plan is missing or the identity is
            // already a member; only the former is an error.
            if plans::get_plan(&self.pool, plan_id).await?.is_none() {
                return Err(StoreError::not_found(paths::plan(plan_id)));
            }
        }
        Ok(())
    }

    async fn get_user_pointer(&self, identity: &str) -> StoreResult<Option<UserPointer>> {
        Ok(users::get_user_pointer(&self.pool, identity).await?)
    }

    async fn set_user_pointer(&self, pointer: &UserPointer) -> StoreResult<()> {
        users::set_user_pointer(&self.pool, pointer).await?;
        Ok(())
    }

    async fn get_invite(&self, code: &str) -> StoreResult<Option<Invite>> {
        Ok(invites::get_invite(&self.pool, code).await?)
    }

    async fn put_invite(&self, invite: &Invite) -> StoreResult<()> {
        invites::put_invite(&self.pool, invite).await?;
        Ok(())
    }

    async fn delete_invite(&self, code: &str) -> StoreResult<()> {
        invites::delete_invite(&self.pool, code).await?;
        Ok(())
    }

    async fn put_grant(&self, grant: &AccessGrant) -> StoreResult<()> {
        grants::put_grant(&self.pool, grant).await?;
        Ok(())
    }

    async fn delete_grant(&self, plan_id: &str, identity: &str) -> StoreResult<()> {
        grants::delete_grant(&self.pool, plan_id, identity).await?;
        Ok(())
    }

    async fn has_grant(&self, plan_id: &str, identity: &str) -> StoreResult<bool> {
        Ok(grants::has_grant(&self.pool, plan_id, identity).await?)
    }
}
