//! Outbound write operations and the retry queue.
//!
//! Every local edit eventually becomes one of these ops. Failed ops are
//! not dropped: they re-enter the queue with exponential backoff until the
//! store accepts them, and the engine's status channel shows the plan as
//! not-saved while anything is queued.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Duration;

use chrono::NaiveDate;
use tokio::time::Instant;
use uuid::Uuid;

use tandem_store::models::{Booking, DayPlan};
use tandem_store::{PlanStore, StoreResult};

/// A single outbound store write, at the narrowest granularity the store
/// offers for the field being changed.
#[derive(Debug, Clone)]
pub(crate) enum WriteOp {
    Dates {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        total_days: i32,
    },
    DailyPlans(BTreeMap<String, DayPlan>),
    DayPlan {
        label: String,
        day: DayPlan,
    },
    SkippedDays(BTreeSet<String>),
    Flight(Booking),
    RemoveFlight(Uuid),
    Stay(Booking),
    RemoveStay(Uuid),
}

impl WriteOp {
    /// Short name for log lines.
    pub(crate) fn describe(&self) -> &'static str {
        match self {
            Self::Dates { .. } => "dates",
            Self::DailyPlans(_) => "daily_plans",
            Self::DayPlan { .. } => "day_plan",
            Self::SkippedDays(_) => "skipped_days",
            Self::Flight(_) => "flight",
            Self::RemoveFlight(_) => "remove_flight",
            Self::Stay(_) => "stay",
            Self::RemoveStay(_) => "remove_stay",
        }
    }

    /// Issue this write against the store.
    pub(crate) async fn apply(&self, store: &dyn PlanStore, plan_id: &str) -> StoreResult<()> {
        match self {
            Self::Dates {
                start,
                end,
                total_days,
            } => store.set_dates(plan_id, *start, *end, *total_days).await,
            Self::DailyPlans(plans) => store.set_daily_plans(plan_id, plans).await,
            Self::DayPlan { label, day } => store.set_day_plan(plan_id, label, day).await,
            Self::SkippedDays(days) => store.set_skipped_days(plan_id, days).await,
            Self::Flight(b) => store.put_flight(plan_id, b).await,
            Self::RemoveFlight(id) => store.remove_flight(plan_id, *id).await,
            Self::Stay(b) => store.put_stay(plan_id, b).await,
            Self::RemoveStay(id) => store.remove_stay(plan_id, *id).await,
        }
    }
}

/// A failed write waiting for its next attempt.
#[derive(Debug)]
pub(crate) struct PendingWrite {
    pub op: WriteOp,
    pub attempt: u32,
    pub due: Instant,
}

/// FIFO of failed writes with capped exponential backoff.
#[derive(Debug)]
pub(crate) struct RetryQueue {
    entries: VecDeque<PendingWrite>,
    base: Duration,
    cap: Duration,
}

impl RetryQueue {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            base,
            cap,
        }
    }

    /// Queue a failed op. `attempt` counts prior failures of this op, so
    /// the first retry waits `base`, the next `2 * base`, and so on up to
    /// the cap.
    pub fn push_failed(&mut self, op: WriteOp, attempt: u32) {
        let due = Instant::now() + self.backoff(attempt);
        self.entries.push_back(PendingWrite { op, attempt, due });
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// The earliest moment any entry becomes due.
    pub fn next_due(&self) -> Option<Instant> {
        self.entries.iter().map(|p| p.due).min()
    }

    /// Remove and return every entry due at `now`, oldest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<PendingWrite> {
        let mut due = Vec::new();
        let mut rest = VecDeque::new();
        for entry in self.entries.drain(..) {
            if entry.due <= now {
                due.push(entry);
            } else {
                rest.push_back(entry);
            }
        }
        self.entries = rest;
        due
    }

    /// Drain everything regardless of due time (final flush on shutdown).
    pub fn take_all(&mut self) -> Vec<PendingWrite> {
        self.entries.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> RetryQueue {
        RetryQueue::new(Duration::from_millis(500), Duration::from_secs(30))
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let q = queue();
        assert_eq!(q.backoff(0), Duration::from_millis(500));
        assert_eq!(q.backoff(1), Duration::from_secs(1));
        assert_eq!(q.backoff(3), Duration::from_secs(4));
        // Far past the cap.
        assert_eq!(q.backoff(12), Duration::from_secs(30));
        // Shift amount is clamped, no overflow.
        assert_eq!(q.backoff(40), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn take_due_splits_by_deadline() {
        let mut q = queue();
        q.push_failed(WriteOp::SkippedDays(BTreeSet::new()), 0);
        q.push_failed(WriteOp::SkippedDays(BTreeSet::new()), 4);

        // Nothing is due immediately.
        assert!(q.take_due(Instant::now()).is_empty());
        assert_eq!(q.take_all().len(), 2);
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn next_due_is_earliest_entry() {
        let mut q = queue();
        q.push_failed(WriteOp::SkippedDays(BTreeSet::new()), 4);
        q.push_failed(WriteOp::SkippedDays(BTreeSet::new()), 0);

        let next = q.next_due().unwrap();
        // The attempt-0 entry (500ms backoff) must be the earliest.
        assert!(next <= Instant::now() + Duration::from_millis(600));
    }
}
