//! Test doubles shared by the protocol and engine integration tests.

// Each test binary uses a subset of this module.
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;
use uuid::Uuid;

use tandem_store::models::{AccessGrant, Booking, DayPlan, Invite, TravelPlan, UserPointer};
use tandem_store::{MemoryStore, PlanStore, PlanStream, StoreError, StoreResult};

/// A [`MemoryStore`] wrapper that counts mutations and injects failures.
///
/// Failures are injected per method name: the next `n` calls to that
/// method fail with a transport-style error, then calls pass through
/// again. Reads are never counted as writes.
pub struct InstrumentedStore {
    pub inner: Arc<MemoryStore>,
    writes: AtomicUsize,
    failures: Mutex<HashMap<&'static str, usize>>,
}

impl InstrumentedStore {
    pub fn new() -> Self {
        Self::wrapping(Arc::new(MemoryStore::new()))
    }

    pub fn wrapping(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            writes: AtomicUsize::new(0),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Total mutations issued through this wrapper.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make the next `times` calls to `method` fail.
    pub async fn fail_next(&self, method: &'static str, times: usize) {
        self.failures.lock().await.insert(method, times);
    }

    async fn gate(&self, method: &'static str, is_write: bool) -> StoreResult<()> {
        if is_write {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        let mut failures = self.failures.lock().await;
        if let Some(remaining) = failures.get_mut(method) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PlanStore for InstrumentedStore {
    async fn create_plan(&self, plan: &TravelPlan) -> StoreResult<()> {
        self.gate("create_plan", true).await?;
        self.inner.create_plan(plan).await
    }

    async fn read_plan(&self, plan_id: &str, reader: &str) -> StoreResult<TravelPlan> {
        self.gate("read_plan", false).await?;
        self.inner.read_plan(plan_id, reader).await
    }

    async fn subscribe(&self, plan_id: &str, reader: &str) -> StoreResult<PlanStream> {
        self.inner.subscribe(plan_id, reader).await
    }

    async fn set_dates(
        &self,
        plan_id: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        total_days: i32,
    ) -> StoreResult<()> {
        self.gate("set_dates", true).await?;
        self.inner.set_dates(plan_id, start, end, total_days).await
    }

    async fn set_daily_plans(
        &self,
        plan_id: &str,
        daily_plans: &BTreeMap<String, DayPlan>,
    ) -> StoreResult<()> {
        self.gate("set_daily_plans", true).await?;
        self.inner.set_daily_plans(plan_id, daily_plans).await
    }

    async fn set_day_plan(&self, plan_id: &str, label: &str, day: &DayPlan) -> StoreResult<()> {
        self.gate("set_day_plan", true).await?;
        self.inner.set_day_plan(plan_id, label, day).await
    }

    async fn set_skipped_days(&self, plan_id: &str, days: &BTreeSet<String>) -> StoreResult<()> {
        self.gate("set_skipped_days", true).await?;
        self.inner.set_skipped_days(plan_id, days).await
    }

    async fn put_flight(&self, plan_id: &str, flight: &Booking) -> StoreResult<()> {
        self.gate("put_flight", true).await?;
        self.inner.put_flight(plan_id, flight).await
    }

    async fn remove_flight(&self, plan_id: &str, id: Uuid) -> StoreResult<()> {
        self.gate("remove_flight", true).await?;
        self.inner.remove_flight(plan_id, id).await
    }

    async fn put_stay(&self, plan_id: &str, stay: &Booking) -> StoreResult<()> {
        self.gate("put_stay", true).await?;
        self.inner.put_stay(plan_id, stay).await
    }

    async fn remove_stay(&self, plan_id: &str, id: Uuid) -> StoreResult<()> {
        self.gate("remove_stay", true).await?;
        self.inner.remove_stay(plan_id, id).await
    }

    async fn add_member(&self, plan_id: &str, identity: &str) -> StoreResult<()> {
        self.gate("add_member", true).await?;
        self.inner.add_member(plan_id, identity).await
    }

    async fn get_user_pointer(&self, identity: &str) -> StoreResult<Option<UserPointer>> {
        self.gate("get_user_pointer", false).await?;
        self.inner.get_user_pointer(identity).await
    }

    async fn set_user_pointer(&self, pointer: &UserPointer) -> StoreResult<()> {
        self.gate("set_user_pointer", true).await?;
        self.inner.set_user_pointer(pointer).await
    }

    async fn get_invite(&self, code: &str) -> StoreResult<Option<Invite>> {
        self.gate("get_invite", false).await?;
        self.inner.get_invite(code).await
    }

    async fn put_invite(&self, invite: &Invite) -> StoreResult<()> {
        self.gate("put_invite", true).await?;
        self.inner.put_invite(invite).await
    }

    async fn delete_invite(&self, code: &str) -> StoreResult<()> {
        self.gate("delete_invite", true).await?;
        self.inner.delete_invite(code).await
    }

    async fn put_grant(&self, grant: &AccessGrant) -> StoreResult<()> {
        self.gate("put_grant", true).await?;
        self.inner.put_grant(grant).await
    }

    async fn delete_grant(&self, plan_id: &str, identity: &str) -> StoreResult<()> {
        self.gate("delete_grant", true).await?;
        self.inner.delete_grant(plan_id, identity).await
    }

    async fn has_grant(&self, plan_id: &str, identity: &str) -> StoreResult<bool> {
        self.gate("has_grant", false).await?;
        self.inner.has_grant(plan_id, identity).await
    }
}
