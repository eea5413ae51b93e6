//! The store-backed plan operation surface.
//!
//! One function per user-visible operation; UI layers stay pure consumers.
//! Every function validates locally before touching the store, then issues
//! the narrowest write that expresses the change (a single day, a single
//! booking key) so concurrent edits to other parts of the plan survive.
//!
//! Writes here resolve last-write-wins against concurrent writers; that is
//! the chosen consistency model for a two-person plan, not an accident.

use chrono::NaiveDate;
use serde_json::Value;
use uuid::Uuid;

use tandem_store::models::{Booking, Comment, Location, TravelPlan, UserPointer};
use tandem_store::{PlanStore, StoreError};

use crate::error::OpError;
use crate::schedule;

/// Which booking collection an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingKind {
    Flight,
    Stay,
}

impl BookingKind {
    fn map<'a>(&self, plan: &'a TravelPlan) -> &'a std::collections::BTreeMap<Uuid, Booking> {
        match self {
            Self::Flight => &plan.flights,
            Self::Stay => &plan.stays,
        }
    }

    async fn put(&self, store: &dyn PlanStore, plan_id: &str, b: &Booking) -> Result<(), StoreError> {
        match self {
            Self::Flight => store.put_flight(plan_id, b).await,
            Self::Stay => store.put_stay(plan_id, b).await,
        }
    }

    async fn remove(&self, store: &dyn PlanStore, plan_id: &str, id: Uuid) -> Result<(), StoreError> {
        match self {
            Self::Flight => store.remove_flight(plan_id, id).await,
            Self::Stay => store.remove_stay(plan_id, id).await,
        }
    }
}

impl std::fmt::Display for BookingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flight => f.write_str("flight"),
            Self::Stay => f.write_str("stay"),
        }
    }
}

/// Create a fresh plan keyed by (and owned by) `identity`, and point the
/// identity at it immediately.
pub async fn create_plan(store: &dyn PlanStore, identity: &str) -> Result<TravelPlan, OpError> {
    if identity.is_empty() {
        return Err(OpError::validation("identity must not be empty"));
    }

    let plan = TravelPlan::new(identity);
    match store.create_plan(&plan).await {
        Ok(()) => {}
        Err(StoreError::AlreadyExists { .. }) => {
            return Err(OpError::validation(format!(
                "{identity} already owns a plan; open it instead of creating a new one"
            )));
        }
        Err(e) => return Err(e.into()),
    }
    store
        .set_user_pointer(&UserPointer::new(identity, &plan.id))
        .await?;

    tracing::info!(plan_id = %plan.id, "plan created");
    Ok(plan)
}

/// Set the trip's date range, recomputing the day count and regenerating
/// the day-plan map (existing populated days carry over).
///
/// Resizing a plan that already has populated days loses any days beyond
/// the new count; callers confirm with the user before invoking this.
pub async fn set_date_range(
    store: &dyn PlanStore,
    plan_id: &str,
    identity: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<TravelPlan, OpError> {
    if end < start {
        return Err(OpError::validation(format!(
            "end date {end} is before start date {start}"
        )));
    }

    let mut plan = store.read_plan(plan_id, identity).await?;
    let total_days = schedule::inclusive_day_count(start, end) as i32;
    let daily_plans = schedule::regenerate_daily_plans(total_days, &plan.daily_plans);

    store
        .set_dates(plan_id, Some(start), Some(end), total_days)
        .await?;
    store.set_daily_plans(plan_id, &daily_plans).await?;

    plan.start_date = Some(start);
    plan.end_date = Some(end);
    plan.total_days = total_days;
    plan.daily_plans = daily_plans;
    Ok(plan)
}

/// Append a location to a day's schedule. Returns the stored location with
/// its generated id.
pub async fn add_location(
    store: &dyn PlanStore,
    plan_id: &str,
    identity: &str,
    day_label: &str,
    name: &str,
    note: Option<String>,
) -> Result<Location, OpError> {
    if name.trim().is_empty() {
        return Err(OpError::validation("location name must not be empty"));
    }

    let plan = store.read_plan(plan_id, identity).await?;
    let mut day = plan
        .daily_plans
        .get(day_label)
        .cloned()
        .ok_or_else(|| OpError::validation(format!("no such day: {day_label}")))?;

    let location = Location::new(name.trim(), note);
    day.locations.push(location.clone());
    store.set_day_plan(plan_id, day_label, &day).await?;

    Ok(location)
}

/// Remove a location from a day by its stable id.
pub async fn remove_location(
    store: &dyn PlanStore,
    plan_id: &str,
    identity: &str,
    day_label: &str,
    location_id: Uuid,
) -> Result<(), OpError> {
    let plan = store.read_plan(plan_id, identity).await?;
    let mut day = plan
        .daily_plans
        .get(day_label)
        .cloned()
        .ok_or_else(|| OpError::validation(format!("no such day: {day_label}")))?;

    let before = day.locations.len();
    day.locations.retain(|l| l.id != location_id);
    if day.locations.len() == before {
        return Err(OpError::validation(format!(
            "no location {location_id} on {day_label}"
        )));
    }

    store.set_day_plan(plan_id, day_label, &day).await?;
    Ok(())
}

/// Propose a flight or stay. `details` is an opaque payload and must be a
/// JSON object.
pub async fn add_booking(
    store: &dyn PlanStore,
    plan_id: &str,
    identity: &str,
    kind: BookingKind,
    details: Value,
) -> Result<Booking, OpError> {
    if !details.is_object() {
        return Err(OpError::validation(format!(
            "{kind} details must be a JSON object"
        )));
    }

    // Membership check doubles as existence check.
    store.read_plan(plan_id, identity).await?;

    let booking = Booking::new(details);
    kind.put(store, plan_id, &booking).await?;
    Ok(booking)
}

/// Remove a booking by id.
pub async fn remove_booking(
    store: &dyn PlanStore,
    plan_id: &str,
    identity: &str,
    kind: BookingKind,
    id: Uuid,
) -> Result<(), OpError> {
    let plan = store.read_plan(plan_id, identity).await?;
    if !kind.map(&plan).contains_key(&id) {
        return Err(OpError::validation(format!("no such {kind}: {id}")));
    }
    kind.remove(store, plan_id, id).await?;
    Ok(())
}

/// Toggle the caller's vote on a booking. Returns whether the vote is now
/// present.
pub async fn toggle_vote(
    store: &dyn PlanStore,
    plan_id: &str,
    identity: &str,
    kind: BookingKind,
    id: Uuid,
) -> Result<bool, OpError> {
    let plan = store.read_plan(plan_id, identity).await?;
    let mut booking = kind
        .map(&plan)
        .get(&id)
        .cloned()
        .ok_or_else(|| OpError::validation(format!("no such {kind}: {id}")))?;

    let voted = booking.toggle_vote(identity);
    kind.put(store, plan_id, &booking).await?;
    Ok(voted)
}

/// Append a comment to a booking. Returns the stored comment.
pub async fn add_comment(
    store: &dyn PlanStore,
    plan_id: &str,
    identity: &str,
    kind: BookingKind,
    id: Uuid,
    text: &str,
) -> Result<Comment, OpError> {
    if text.trim().is_empty() {
        return Err(OpError::validation("comment text must not be empty"));
    }

    let plan = store.read_plan(plan_id, identity).await?;
    let mut booking = kind
        .map(&plan)
        .get(&id)
        .cloned()
        .ok_or_else(|| OpError::validation(format!("no such {kind}: {id}")))?;

    let comment = Comment {
        id: Uuid::new_v4(),
        author: identity.to_owned(),
        text: text.trim().to_owned(),
        at: chrono::Utc::now(),
    };
    booking.comments.push(comment.clone());
    kind.put(store, plan_id, &booking).await?;
    Ok(comment)
}

/// Delete a comment from a booking by comment id.
pub async fn delete_comment(
    store: &dyn PlanStore,
    plan_id: &str,
    identity: &str,
    kind: BookingKind,
    id: Uuid,
    comment_id: Uuid,
) -> Result<(), OpError> {
    let plan = store.read_plan(plan_id, identity).await?;
    let mut booking = kind
        .map(&plan)
        .get(&id)
        .cloned()
        .ok_or_else(|| OpError::validation(format!("no such {kind}: {id}")))?;

    let before = booking.comments.len();
    booking.comments.retain(|c| c.id != comment_id);
    if booking.comments.len() == before {
        return Err(OpError::validation(format!("no comment {comment_id} on {kind} {id}")));
    }

    kind.put(store, plan_id, &booking).await?;
    Ok(())
}

/// Toggle a day's completed flag. Returns the new value.
pub async fn toggle_day_completed(
    store: &dyn PlanStore,
    plan_id: &str,
    identity: &str,
    day_label: &str,
) -> Result<bool, OpError> {
    let plan = store.read_plan(plan_id, identity).await?;
    let mut day = plan
        .daily_plans
        .get(day_label)
        .cloned()
        .ok_or_else(|| OpError::validation(format!("no such day: {day_label}")))?;

    day.completed = !day.completed;
    let completed = day.completed;
    store.set_day_plan(plan_id, day_label, &day).await?;
    Ok(completed)
}

/// Toggle a day's membership in the skipped set. Returns whether the day
/// is now skipped.
pub async fn toggle_day_skipped(
    store: &dyn PlanStore,
    plan_id: &str,
    identity: &str,
    day_label: &str,
) -> Result<bool, OpError> {
    let plan = store.read_plan(plan_id, identity).await?;
    if !plan.daily_plans.contains_key(day_label) {
        return Err(OpError::validation(format!("no such day: {day_label}")));
    }

    let mut skipped = plan.skipped_days.clone();
    let now_skipped = if !skipped.remove(day_label) {
        skipped.insert(day_label.to_owned());
        true
    } else {
        false
    };
    store.set_skipped_days(plan_id, &skipped).await?;
    Ok(now_skipped)
}
