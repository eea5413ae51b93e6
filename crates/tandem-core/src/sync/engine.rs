//! The pure heart of the sync engine.
//!
//! `EngineCore` owns the local plan state and decides, synchronously,
//! which outbound writes each event produces. It does no I/O, so the
//! convergence rules (loop avoidance, debounce classification, self-heal)
//! are testable without a store or a clock. The async task in
//! [`super`] drives it.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use uuid::Uuid;

use tandem_store::models::{Booking, DayPlan, TravelPlan};

use crate::schedule;

use super::writes::WriteOp;

/// A local mutation submitted to the engine.
///
/// Date edits are the high-frequency class and get debounced; everything
/// else is structural (append/remove/toggle under a stable key) and is
/// written immediately because it is safe to apply eagerly.
#[derive(Debug, Clone)]
pub enum Edit {
    DateRange { start: NaiveDate, end: NaiveDate },
    SetDay { label: String, day: DayPlan },
    SetSkippedDays(BTreeSet<String>),
    PutFlight(Booking),
    RemoveFlight(Uuid),
    PutStay(Booking),
    RemoveStay(Uuid),
}

/// The coalesced date write: only the latest edit in a burst survives. The
/// day-plan map is not captured here; the flush reads it from local state
/// so day edits made inside the quiet period are not clobbered.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingDates {
    start: NaiveDate,
    end: NaiveDate,
    total_days: i32,
}

pub(crate) struct EngineCore {
    plan: TravelPlan,
    /// Held while a remote snapshot is being applied to local state, so
    /// the mutation handlers below do not echo the update back out as a
    /// local write.
    applying_remote: bool,
    immediate: Vec<WriteOp>,
    pending_dates: Option<PendingDates>,
}

impl EngineCore {
    /// Seed the core with the subscription's initial snapshot. The
    /// self-heal check runs on it like on any other snapshot, so a store
    /// left inconsistent by a partial write is repaired on attach.
    pub fn new(initial: TravelPlan) -> Self {
        let mut core = Self {
            plan: initial,
            applying_remote: false,
            immediate: Vec::new(),
            pending_dates: None,
        };
        core.self_heal();
        core
    }

    pub fn plan(&self) -> &TravelPlan {
        &self.plan
    }

    // -- local edits ---------------------------------------------------------

    /// Apply a local edit to local state and schedule its outbound write.
    ///
    /// Local state changes unconditionally (optimistic, for responsiveness);
    /// the write is skipped while `applying_remote` is held.
    pub fn apply_edit(&mut self, edit: Edit) {
        match edit {
            Edit::DateRange { start, end } => self.set_date_range(start, end),
            Edit::SetDay { label, day } => {
                self.plan.daily_plans.insert(label.clone(), day.clone());
                self.schedule(WriteOp::DayPlan { label, day });
            }
            Edit::SetSkippedDays(days) => {
                self.plan.skipped_days = days.clone();
                self.schedule(WriteOp::SkippedDays(days));
            }
            Edit::PutFlight(b) => {
                self.plan.flights.insert(b.id, b.clone());
                self.schedule(WriteOp::Flight(b));
            }
            Edit::RemoveFlight(id) => {
                self.plan.flights.remove(&id);
                self.schedule(WriteOp::RemoveFlight(id));
            }
            Edit::PutStay(b) => {
                self.plan.stays.insert(b.id, b.clone());
                self.schedule(WriteOp::Stay(b));
            }
            Edit::RemoveStay(id) => {
                self.plan.stays.remove(&id);
                self.schedule(WriteOp::RemoveStay(id));
            }
        }
    }

    fn set_date_range(&mut self, start: NaiveDate, end: NaiveDate) {
        let total_days = schedule::inclusive_day_count(start, end) as i32;
        let daily_plans = schedule::regenerate_daily_plans(total_days, &self.plan.daily_plans);

        self.plan.start_date = Some(start);
        self.plan.end_date = Some(end);
        self.plan.total_days = total_days;
        self.plan.daily_plans = daily_plans;

        if self.applying_remote {
            return;
        }
        // Coalesce: a newer date edit replaces any still-unflushed one.
        self.pending_dates = Some(PendingDates {
            start,
            end,
            total_days,
        });
    }

    fn schedule(&mut self, op: WriteOp) {
        if self.applying_remote {
            return;
        }
        self.immediate.push(op);
    }

    // -- remote snapshots ----------------------------------------------------

    /// Replace local state with a snapshot from the subscription.
    ///
    /// The flag is held for the whole application cycle; the only write a
    /// snapshot may produce is the self-heal repair, which is scheduled
    /// deliberately outside the guarded path.
    pub fn apply_remote(&mut self, snapshot: TravelPlan) {
        self.applying_remote = true;

        self.plan.members = snapshot.members;
        self.plan.start_date = snapshot.start_date;
        self.plan.end_date = snapshot.end_date;
        self.plan.total_days = snapshot.total_days;
        self.plan.daily_plans = snapshot.daily_plans;
        self.plan.flights = snapshot.flights;
        self.plan.stays = snapshot.stays;
        self.plan.skipped_days = snapshot.skipped_days;

        self.self_heal();
        self.applying_remote = false;
    }

    /// Repair a positive day count paired with an empty day-plan map by
    /// regenerating the map and writing it back.
    fn self_heal(&mut self) {
        if !schedule::needs_self_heal(&self.plan) {
            return;
        }
        let daily_plans =
            schedule::regenerate_daily_plans(self.plan.total_days, &self.plan.daily_plans);
        self.plan.daily_plans = daily_plans.clone();
        // Not routed through schedule(): this is the repair write itself,
        // issued even though it originates from a remote snapshot.
        self.immediate.push(WriteOp::DailyPlans(daily_plans));
        tracing::info!(
            plan_id = %self.plan.id,
            total_days = self.plan.total_days,
            "regenerated empty day-plan map"
        );
    }

    // -- scheduled-write accessors -------------------------------------------

    pub fn take_immediate(&mut self) -> Vec<WriteOp> {
        std::mem::take(&mut self.immediate)
    }

    pub fn has_pending_dates(&self) -> bool {
        self.pending_dates.is_some()
    }

    /// Convert the coalesced date edit into its flush sequence: the date
    /// fields first, then the day-plan map as local state holds it now
    /// (regenerated at edit time, plus any day edits made since).
    pub fn take_pending_dates(&mut self) -> Option<Vec<WriteOp>> {
        self.pending_dates.take().map(|p| {
            vec![
                WriteOp::Dates {
                    start: Some(p.start),
                    end: Some(p.end),
                    total_days: p.total_days,
                },
                WriteOp::DailyPlans(self.plan.daily_plans.clone()),
            ]
        })
    }
}
