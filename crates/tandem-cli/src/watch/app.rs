//! Dashboard state: a thin layer over the sync engine's watch channels.

use tokio::sync::watch;

use tandem_core::schedule;
use tandem_core::sync::{Edit, SyncHandle, SyncStatus};
use tandem_store::models::TravelPlan;

pub struct App {
    handle: SyncHandle,
    state: watch::Receiver<TravelPlan>,
    status: watch::Receiver<SyncStatus>,
    pub selected_day: usize,
    pub should_quit: bool,
}

impl App {
    pub fn new(handle: SyncHandle) -> Self {
        let state = handle.state();
        let status = handle.status();
        Self {
            handle,
            state,
            status,
            selected_day: 0,
            should_quit: false,
        }
    }

    /// The current local plan snapshot.
    pub fn plan(&self) -> TravelPlan {
        self.state.borrow().clone()
    }

    /// The engine's health.
    pub fn sync_status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// Day labels in trip order.
    pub fn day_labels(&self) -> Vec<String> {
        let plan = self.state.borrow();
        let mut labels: Vec<String> = plan.daily_plans.keys().cloned().collect();
        labels.sort_by_key(|l| schedule::day_number(l).unwrap_or(usize::MAX));
        labels
    }

    pub fn selected_label(&self) -> Option<String> {
        self.day_labels().get(self.selected_day).cloned()
    }

    pub fn move_down(&mut self) {
        let count = self.day_labels().len();
        if count > 0 && self.selected_day + 1 < count {
            self.selected_day += 1;
        }
    }

    pub fn move_up(&mut self) {
        self.selected_day = self.selected_day.saturating_sub(1);
    }

    /// Toggle the selected day's completed flag through the engine.
    pub async fn toggle_selected_completed(&mut self) {
        let Some(label) = self.selected_label() else {
            return;
        };
        let Some(mut day) = self.state.borrow().daily_plans.get(&label).cloned() else {
            return;
        };
        day.completed = !day.completed;
        let _ = self.handle.edit(Edit::SetDay { label, day }).await;
    }

    /// Toggle the selected day in the skipped set through the engine.
    pub async fn toggle_selected_skipped(&mut self) {
        let Some(label) = self.selected_label() else {
            return;
        };
        let mut skipped = self.state.borrow().skipped_days.clone();
        if !skipped.remove(&label) {
            skipped.insert(label);
        }
        let _ = self.handle.edit(Edit::SetSkippedDays(skipped)).await;
    }

    pub async fn shutdown(self) {
        self.handle.shutdown().await;
    }
}
