//! Flight and stay commands: propose, withdraw, vote, comment.

use anyhow::{Context, Result};

use tandem_core::ops::{self, BookingKind};
use tandem_store::PlanStore;

use crate::edit_cmds::parse_id;
use crate::plan_cmds::resolve_plan_id;

/// Propose a booking. `details` is free-form JSON, e.g.
/// `{"airline": "VY", "number": "VY8461", "price": 89}`.
pub async fn run_add(
    store: &dyn PlanStore,
    identity: &str,
    kind: BookingKind,
    details: &str,
) -> Result<()> {
    let details: serde_json::Value = serde_json::from_str(details)
        .with_context(|| format!("details are not valid JSON: {details:?}"))?;

    let plan_id = resolve_plan_id(store, identity).await?;
    let booking = ops::add_booking(store, &plan_id, identity, kind, details).await?;
    println!("Added {kind} {}.", booking.id);
    Ok(())
}

/// Withdraw a booking by id.
pub async fn run_remove(
    store: &dyn PlanStore,
    identity: &str,
    kind: BookingKind,
    id: &str,
) -> Result<()> {
    let id = parse_id(id)?;
    let plan_id = resolve_plan_id(store, identity).await?;
    ops::remove_booking(store, &plan_id, identity, kind, id).await?;
    println!("Removed {kind} {id}.");
    Ok(())
}

/// Toggle the caller's vote on a booking.
pub async fn run_vote(
    store: &dyn PlanStore,
    identity: &str,
    kind: BookingKind,
    id: &str,
) -> Result<()> {
    let id = parse_id(id)?;
    let plan_id = resolve_plan_id(store, identity).await?;
    let voted = ops::toggle_vote(store, &plan_id, identity, kind, id).await?;
    println!(
        "{} vote on {kind} {id}.",
        if voted { "Cast" } else { "Withdrew" }
    );
    Ok(())
}

/// Append a comment to a booking.
pub async fn run_comment(
    store: &dyn PlanStore,
    identity: &str,
    kind: BookingKind,
    id: &str,
    text: &str,
) -> Result<()> {
    let id = parse_id(id)?;
    let plan_id = resolve_plan_id(store, identity).await?;
    let comment = ops::add_comment(store, &plan_id, identity, kind, id, text).await?;
    println!("Comment added ({}).", comment.id);
    Ok(())
}

/// Delete a comment from a booking.
pub async fn run_uncomment(
    store: &dyn PlanStore,
    identity: &str,
    kind: BookingKind,
    id: &str,
    comment_id: &str,
) -> Result<()> {
    let id = parse_id(id)?;
    let comment_id = parse_id(comment_id)?;
    let plan_id = resolve_plan_id(store, identity).await?;
    ops::delete_comment(store, &plan_id, identity, kind, id, comment_id).await?;
    println!("Comment {comment_id} removed.");
    Ok(())
}
