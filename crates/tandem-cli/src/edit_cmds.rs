//! Editing commands: trip dates, day toggles, and locations.

use std::io::Write;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use uuid::Uuid;

use tandem_core::{ops, schedule};
use tandem_store::PlanStore;

use crate::plan_cmds::resolve_plan_id;

/// Set the trip's date range, confirming first when the resize would
/// reshape a plan that already has content in its days.
pub async fn run_dates(
    store: &dyn PlanStore,
    identity: &str,
    start: &str,
    end: &str,
    assume_yes: bool,
) -> Result<()> {
    let start: NaiveDate = start
        .parse()
        .with_context(|| format!("invalid start date {start:?}, expected YYYY-MM-DD"))?;
    let end: NaiveDate = end
        .parse()
        .with_context(|| format!("invalid end date {end:?}, expected YYYY-MM-DD"))?;
    if end < start {
        bail!("end date {end} is before start date {start}");
    }

    let plan_id = resolve_plan_id(store, identity).await?;
    let plan = store.read_plan(&plan_id, identity).await?;

    let new_total = schedule::inclusive_day_count(start, end) as i32;
    if plan.has_populated_days() && new_total != plan.total_days && !assume_yes {
        let prompt = format!(
            "Resizing from {} to {} days; days beyond the new range are dropped. Continue? [y/N] ",
            plan.total_days, new_total
        );
        if !confirm(&prompt)? {
            println!("Dates unchanged.");
            return Ok(());
        }
    }

    let updated = ops::set_date_range(store, &plan_id, identity, start, end).await?;
    println!(
        "Dates set: {start} to {end} ({} days, Day 1 through Day {}).",
        updated.total_days, updated.total_days
    );

    Ok(())
}

/// Toggle a day's completed flag.
pub async fn run_day_complete(store: &dyn PlanStore, identity: &str, label: &str) -> Result<()> {
    let plan_id = resolve_plan_id(store, identity).await?;
    let completed = ops::toggle_day_completed(store, &plan_id, identity, label).await?;
    println!(
        "{label} marked {}.",
        if completed { "completed" } else { "not completed" }
    );
    Ok(())
}

/// Toggle a day's skipped flag.
pub async fn run_day_skip(store: &dyn PlanStore, identity: &str, label: &str) -> Result<()> {
    let plan_id = resolve_plan_id(store, identity).await?;
    let skipped = ops::toggle_day_skipped(store, &plan_id, identity, label).await?;
    println!(
        "{label} {}.",
        if skipped { "skipped" } else { "back on the schedule" }
    );
    Ok(())
}

/// Add a location to a day's schedule.
pub async fn run_spot_add(
    store: &dyn PlanStore,
    identity: &str,
    day: &str,
    name: &str,
    note: Option<String>,
) -> Result<()> {
    let plan_id = resolve_plan_id(store, identity).await?;
    let location = ops::add_location(store, &plan_id, identity, day, name, note).await?;
    println!("Added {:?} to {day} ({}).", location.name, location.id);
    Ok(())
}

/// Remove a location from a day by id.
pub async fn run_spot_remove(
    store: &dyn PlanStore,
    identity: &str,
    day: &str,
    location_id: &str,
) -> Result<()> {
    let location_id = parse_id(location_id)?;
    let plan_id = resolve_plan_id(store, identity).await?;
    ops::remove_location(store, &plan_id, identity, day, location_id).await?;
    println!("Removed location {location_id} from {day}.");
    Ok(())
}

pub fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("invalid id: {raw}"))
}

/// Ask a yes/no question on the terminal. Defaults to no.
fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
