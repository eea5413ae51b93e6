//! The `PlanStore` trait -- the adapter interface for realtime plan storage.
//!
//! Each backend (in-memory, PostgreSQL) implements this trait. The trait is
//! intentionally object-safe so engines and protocols can hold an
//! `Arc<dyn PlanStore>` without caring which backend is behind it.
//!
//! The logical tree the trait models, and the only wire contract that
//! matters for interoperability:
//!
//! ```text
//! users/{identity}                -> UserPointer
//! travelPlans/{planId}            -> TravelPlan
//! invites/{code}                  -> Invite
//! inviteAuth/{planId}/{identity}  -> AccessGrant
//! ```
//!
//! Consistency model: writes land last-write-wins at the granularity of the
//! field or map key being written. Nested-collection mutations (a single
//! day, a single booking) merge one key and leave siblings untouched, so
//! two clients editing different entries both survive. There are no
//! multi-key transactions.
//!
//! Access rule (the read-path contract every backend enforces): a plan is
//! readable by an identity iff that identity is listed in the plan's
//! membership or holds an [`AccessGrant`] for it.

use std::collections::{BTreeMap, BTreeSet};
use std::pin::Pin;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::Stream;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::{AccessGrant, Booking, DayPlan, Invite, TravelPlan, UserPointer};

/// A live feed of plan snapshots: one on attach, then one per change.
pub type PlanStream = Pin<Box<dyn Stream<Item = TravelPlan> + Send>>;

/// Adapter interface for the realtime plan tree.
///
/// # Object Safety
///
/// This trait is object-safe: every method returns a concrete type or a
/// boxed stream, so `Arc<dyn PlanStore>` works.
#[async_trait]
pub trait PlanStore: Send + Sync {
    // -- travelPlans/{planId} ------------------------------------------------

    /// Create the plan document. Fails if a plan with this id exists.
    async fn create_plan(&self, plan: &TravelPlan) -> StoreResult<()>;

    /// Read the plan document on behalf of `reader`, enforcing the
    /// membership-or-grant access rule.
    async fn read_plan(&self, plan_id: &str, reader: &str) -> StoreResult<TravelPlan>;

    /// Attach a standing subscription to the plan document on behalf of
    /// `reader`. The stream yields the current snapshot immediately, then
    /// a fresh snapshot after every observed write.
    async fn subscribe(&self, plan_id: &str, reader: &str) -> StoreResult<PlanStream>;

    /// Merge-write the date fields (and the derived day count) only.
    async fn set_dates(
        &self,
        plan_id: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        total_days: i32,
    ) -> StoreResult<()>;

    /// Replace the whole `daily_plans` map (regeneration and self-heal).
    async fn set_daily_plans(
        &self,
        plan_id: &str,
        daily_plans: &BTreeMap<String, DayPlan>,
    ) -> StoreResult<()>;

    /// Merge-write one day under its label, leaving sibling days untouched.
    async fn set_day_plan(&self, plan_id: &str, label: &str, day: &DayPlan) -> StoreResult<()>;

    /// Replace the skipped-days set.
    async fn set_skipped_days(&self, plan_id: &str, days: &BTreeSet<String>) -> StoreResult<()>;

    /// Merge-write one flight under its id.
    async fn put_flight(&self, plan_id: &str, flight: &Booking) -> StoreResult<()>;

    /// Delete one flight by id. Deleting an absent id is a no-op.
    async fn remove_flight(&self, plan_id: &str, id: Uuid) -> StoreResult<()>;

    /// Merge-write one stay under its id.
    async fn put_stay(&self, plan_id: &str, stay: &Booking) -> StoreResult<()>;

    /// Delete one stay by id. Deleting an absent id is a no-op.
    async fn remove_stay(&self, plan_id: &str, id: Uuid) -> StoreResult<()>;

    /// Add `identity` to the plan's membership. Set-union semantics: adding
    /// an existing member is a no-op, so the operation is idempotent.
    async fn add_member(&self, plan_id: &str, identity: &str) -> StoreResult<()>;

    // -- users/{identity} ----------------------------------------------------

    async fn get_user_pointer(&self, identity: &str) -> StoreResult<Option<UserPointer>>;

    /// Write the pointer, overwriting any previous plan assignment.
    async fn set_user_pointer(&self, pointer: &UserPointer) -> StoreResult<()>;

    // -- invites/{code} ------------------------------------------------------

    async fn get_invite(&self, code: &str) -> StoreResult<Option<Invite>>;

    async fn put_invite(&self, invite: &Invite) -> StoreResult<()>;

    /// Delete the invite. Deleting an absent code is a no-op.
    async fn delete_invite(&self, code: &str) -> StoreResult<()>;

    // -- inviteAuth/{planId}/{identity} --------------------------------------

    async fn put_grant(&self, grant: &AccessGrant) -> StoreResult<()>;

    /// Delete the grant. Deleting an absent grant is a no-op.
    async fn delete_grant(&self, plan_id: &str, identity: &str) -> StoreResult<()>;

    /// Whether a grant exists (used by tests and the access rule itself).
    async fn has_grant(&self, plan_id: &str, identity: &str) -> StoreResult<bool>;
}

// Compile-time assertion: PlanStore must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn PlanStore) {}
};

/// Logical path helpers, shared by backends for error reporting.
pub(crate) mod paths {
    pub fn plan(plan_id: &str) -> String {
        format!("travelPlans/{plan_id}")
    }

    pub fn user(identity: &str) -> String {
        format!("users/{identity}")
    }

    pub fn invite(code: &str) -> String {
        format!("invites/{code}")
    }

    pub fn grant(plan_id: &str, identity: &str) -> String {
        format!("inviteAuth/{plan_id}/{identity}")
    }
}
