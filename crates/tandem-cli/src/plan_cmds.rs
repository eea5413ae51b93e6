//! `tandem plan` commands: create a plan and show the current one.

use anyhow::{Context, Result};

use tandem_core::ops;
use tandem_core::schedule;
use tandem_store::PlanStore;
use tandem_store::models::TravelPlan;

/// Create a plan owned by `identity` and claim it.
pub async fn run_plan_create(store: &dyn PlanStore, identity: &str) -> Result<()> {
    let plan = ops::create_plan(store, identity).await?;

    println!("Plan created.");
    println!("  id: {}", plan.id);
    println!("  owner: {}", plan.owner);
    println!();
    println!("Next: run `tandem dates <START> <END>` to set the trip dates,");
    println!("and `tandem invite` to bring your travel partner in.");

    Ok(())
}

/// Show the plan the identity currently points at.
pub async fn run_plan_show(store: &dyn PlanStore, identity: &str) -> Result<()> {
    let plan_id = resolve_plan_id(store, identity).await?;
    let plan = store.read_plan(&plan_id, identity).await?;
    print_plan(&plan);
    Ok(())
}

/// Look up the caller's plan assignment.
pub async fn resolve_plan_id(store: &dyn PlanStore, identity: &str) -> Result<String> {
    let pointer = store
        .get_user_pointer(identity)
        .await?
        .with_context(|| {
            format!(
                "{identity} has no plan yet; run `tandem plan create` or `tandem join <CODE>`"
            )
        })?;
    Ok(pointer.plan_id)
}

fn print_plan(plan: &TravelPlan) {
    println!("Plan {} (owner {})", plan.id, plan.owner);
    println!("Members: {}", plan.members.join(", "));
    match (plan.start_date, plan.end_date) {
        (Some(start), Some(end)) => {
            println!("Dates: {start} to {end} ({} days)", plan.total_days)
        }
        _ => println!("Dates: not set"),
    }
    println!();

    if plan.daily_plans.is_empty() {
        println!("No daily plans yet.");
    } else {
        println!("Days:");
        let mut labels: Vec<&String> = plan.daily_plans.keys().collect();
        labels.sort_by_key(|l| schedule::day_number(l).unwrap_or(usize::MAX));
        for label in labels {
            let day = &plan.daily_plans[label];
            let mut flags = String::new();
            if day.completed {
                flags.push_str(" [done]");
            }
            if plan.skipped_days.contains(label) {
                flags.push_str(" [skipped]");
            }
            match &day.title {
                Some(title) => println!("  {label}{flags}: {title}"),
                None => println!("  {label}{flags}"),
            }
            for location in &day.locations {
                match &location.note {
                    Some(note) => println!("    - {} ({note})  [{}]", location.name, location.id),
                    None => println!("    - {}  [{}]", location.name, location.id),
                }
            }
        }
    }

    for (heading, bookings) in [("Flights", &plan.flights), ("Stays", &plan.stays)] {
        if bookings.is_empty() {
            continue;
        }
        println!();
        println!("{heading}:");
        for booking in bookings.values() {
            println!(
                "  {}  votes: {}  {}",
                booking.id,
                booking.votes.len(),
                serde_json::to_string(&booking.details).unwrap_or_default()
            );
            for comment in &booking.comments {
                println!(
                    "    {} ({}): {}  [{}]",
                    comment.author,
                    comment.at.format("%Y-%m-%d %H:%M UTC"),
                    comment.text,
                    comment.id
                );
            }
        }
    }
}
