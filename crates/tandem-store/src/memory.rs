//! In-memory [`PlanStore`] backend.
//!
//! Holds the whole tree behind one `RwLock` and fans plan snapshots out on
//! a per-plan broadcast channel. Semantics match the PostgreSQL backend:
//! per-key merges, idempotent member union, membership-or-grant read rule,
//! and a snapshot-per-change subscription feed.
//!
//! Used by the core protocol and engine tests, and by anything that wants
//! a store without a database at hand.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{AccessGrant, Booking, DayPlan, Invite, TravelPlan, UserPointer};
use crate::store::{PlanStore, PlanStream, paths};

/// Buffered snapshots per subscriber before a slow consumer starts losing
/// intermediate states (it still converges on the latest snapshot).
const CHANNEL_CAPACITY: usize = 64;

#[derive(Default)]
struct Tree {
    plans: HashMap<String, TravelPlan>,
    users: HashMap<String, UserPointer>,
    invites: HashMap<String, Invite>,
    grants: HashMap<(String, String), AccessGrant>,
}

#[derive(Default)]
pub struct MemoryStore {
    tree: RwLock<Tree>,
    watchers: Mutex<HashMap<String, broadcast::Sender<TravelPlan>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutate a plan in place and fan the new snapshot out to subscribers.
    async fn update_plan<F>(&self, plan_id: &str, f: F) -> StoreResult<()>
    where
        F: FnOnce(&mut TravelPlan),
    {
        let snapshot = {
            let mut tree = self.tree.write().await;
            let plan = tree
                .plans
                .get_mut(plan_id)
                .ok_or_else(|| StoreError::not_found(paths::plan(plan_id)))?;
            f(plan);
            plan.clone()
        };
        self.publish(snapshot).await;
        Ok(())
    }

    async fn publish(&self, snapshot: TravelPlan) {
        let watchers = self.watchers.lock().await;
        if let Some(tx) = watchers.get(&snapshot.id) {
            // Send only fails when no receiver is alive, which is fine.
            let _ = tx.send(snapshot);
        }
    }

    fn can_read(tree: &Tree, plan_id: &str, reader: &str) -> bool {
        let is_member = tree
            .plans
            .get(plan_id)
            .is_some_and(|p| p.is_member(reader));
        is_member
            || tree
                .grants
                .contains_key(&(plan_id.to_owned(), reader.to_owned()))
    }
}

#[async_trait]
impl PlanStore for MemoryStore {
    async fn create_plan(&self, plan: &TravelPlan) -> StoreResult<()> {
        let mut tree = self.tree.write().await;
        if tree.plans.contains_key(&plan.id) {
            return Err(StoreError::already_exists(paths::plan(&plan.id)));
        }
        tree.plans.insert(plan.id.clone(), plan.clone());
        drop(tree);
        self.publish(plan.clone()).await;
        Ok(())
    }

    async fn read_plan(&self, plan_id: &str, reader: &str) -> StoreResult<TravelPlan> {
        let tree = self.tree.read().await;
        let plan = tree
            .plans
            .get(plan_id)
            .ok_or_else(|| StoreError::not_found(paths::plan(plan_id)))?;
        if !Self::can_read(&tree, plan_id, reader) {
            return Err(StoreError::permission_denied(paths::plan(plan_id), reader));
        }
        Ok(plan.clone())
    }

    async fn subscribe(&self, plan_id: &str, reader: &str) -> StoreResult<PlanStream> {
        let initial = self.read_plan(plan_id, reader).await?;

        let rx = {
            let mut watchers = self.watchers.lock().await;
            watchers
                .entry(plan_id.to_owned())
                .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
                .subscribe()
        };

        let plan_id = plan_id.to_owned();
        let changes = BroadcastStream::new(rx).filter_map(move |item| match item {
            Ok(plan) => Some(plan),
            // A lagged consumer skips intermediate snapshots; the next
            // received snapshot is the current state anyway.
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(plan_id = %plan_id, skipped, "subscriber lagged");
                None
            }
        });

        Ok(Box::pin(tokio_stream::once(initial).chain(changes)))
    }

    async fn set_dates(
        &self,
        plan_id: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        total_days: i32,
    ) -> StoreResult<()> {
        self.update_plan(plan_id, |plan| {
            plan.start_date = start;
            plan.end_date = end;
            plan.total_days = total_days;
        })
        .await
    }

    async fn set_daily_plans(
        &self,
        plan_id: &str,
        daily_plans: &BTreeMap<String, DayPlan>,
    ) -> StoreResult<()> {
        let daily_plans = daily_plans.clone();
        self.update_plan(plan_id, move |plan| plan.daily_plans = daily_plans)
            .await
    }

    async fn set_day_plan(&self, plan_id: &str, label: &str, day: &DayPlan) -> StoreResult<()> {
        let label = label.to_owned();
        let day = day.clone();
        self.update_plan(plan_id, move |plan| {
            plan.daily_plans.insert(label, day);
        })
        .await
    }

    async fn set_skipped_days(&self, plan_id: &str, days: &BTreeSet<String>) -> StoreResult<()> {
        let days = days.clone();
        self.update_plan(plan_id, move |plan| plan.skipped_days = days)
            .await
    }

    async fn put_flight(&self, plan_id: &str, flight: &Booking) -> StoreResult<()> {
        let flight = flight.clone();
        self.update_plan(plan_id, move |plan| {
            plan.flights.insert(flight.id, flight);
        })
        .await
    }

    async fn remove_flight(&self, plan_id: &str, id: Uuid) -> StoreResult<()> {
        self.update_plan(plan_id, |plan| {
            plan.flights.remove(&id);
        })
        .await
    }

    async fn put_stay(&self, plan_id: &str, stay: &Booking) -> StoreResult<()> {
        let stay = stay.clone();
        self.update_plan(plan_id, move |plan| {
            plan.stays.insert(stay.id, stay);
        })
        .await
    }

    async fn remove_stay(&self, plan_id: &str, id: Uuid) -> StoreResult<()> {
        self.update_plan(plan_id, |plan| {
            plan.stays.remove(&id);
        })
        .await
    }

    async fn add_member(&self, plan_id: &str, identity: &str) -> StoreResult<()> {
        let identity = identity.to_owned();
        self.update_plan(plan_id, move |plan| {
            if !plan.is_member(&identity) {
                plan.members.push(identity);
            }
        })
        .await
    }

    async fn get_user_pointer(&self, identity: &str) -> StoreResult<Option<UserPointer>> {
        Ok(self.tree.read().await.users.get(identity).cloned())
    }

    async fn set_user_pointer(&self, pointer: &UserPointer) -> StoreResult<()> {
        self.tree
            .write()
            .await
            .users
            .insert(pointer.identity.clone(), pointer.clone());
        Ok(())
    }

    async fn get_invite(&self, code: &str) -> StoreResult<Option<Invite>> {
        Ok(self.tree.read().await.invites.get(code).cloned())
    }

    async fn put_invite(&self, invite: &Invite) -> StoreResult<()> {
        self.tree
            .write()
            .await
            .invites
            .insert(invite.code.clone(), invite.clone());
        Ok(())
    }

    async fn delete_invite(&self, code: &str) -> StoreResult<()> {
        self.tree.write().await.invites.remove(code);
        Ok(())
    }

    async fn put_grant(&self, grant: &AccessGrant) -> StoreResult<()> {
        self.tree
            .write()
            .await
            .grants
            .insert((grant.plan_id.clone(), grant.identity.clone()), grant.clone());
        Ok(())
    }

    async fn delete_grant(&self, plan_id: &str, identity: &str) -> StoreResult<()> {
        self.tree
            .write()
            .await
            .grants
            .remove(&(plan_id.to_owned(), identity.to_owned()));
        Ok(())
    }

    async fn has_grant(&self, plan_id: &str, identity: &str) -> StoreResult<bool> {
        Ok(self
            .tree
            .read()
            .await
            .grants
            .contains_key(&(plan_id.to_owned(), identity.to_owned())))
    }
}
