//! Day-count and day-plan-map arithmetic.
//!
//! The day-plan map is derived state: its keys are always `Day 1` through
//! `Day N` where N is the inclusive day count between the plan's start and
//! end dates. Regeneration preserves days that already hold content and
//! defaults the rest, and the same routine doubles as the self-heal step
//! when a partial write leaves a positive day count next to an empty map.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use tandem_store::models::{DayPlan, TravelPlan};

/// Inclusive count of calendar days between `start` and `end`.
///
/// Callers validate `end >= start` first; a same-day trip counts as 1.
pub fn inclusive_day_count(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

/// The map key for day `n` (1-based).
pub fn day_label(n: usize) -> String {
    format!("Day {n}")
}

/// Parse a day label back to its 1-based number. Returns `None` for keys
/// that are not of the `Day N` form.
pub fn day_number(label: &str) -> Option<usize> {
    label.strip_prefix("Day ")?.parse().ok()
}

/// Build the day-plan map for `total_days`, carrying over existing entries.
///
/// Every label `Day 1..Day N` is present in the result. An existing entry
/// under the same label survives as-is; missing days get an
/// empty-locations placeholder. Days beyond the new count are dropped,
/// which is why resizing a populated plan asks for confirmation upstream.
pub fn regenerate_daily_plans(
    total_days: i32,
    existing: &BTreeMap<String, DayPlan>,
) -> BTreeMap<String, DayPlan> {
    let mut plans = BTreeMap::new();
    for n in 1..=total_days.max(0) as usize {
        let label = day_label(n);
        let day = existing.get(&label).cloned().unwrap_or_default();
        plans.insert(label, day);
    }
    plans
}

/// Whether a snapshot shows the inconsistency the self-heal step repairs:
/// a positive day count next to an empty day-plan map (the footprint of a
/// prior partial write).
pub fn needs_self_heal(plan: &TravelPlan) -> bool {
    plan.total_days > 0 && plan.daily_plans.is_empty()
}
