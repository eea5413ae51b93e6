//! `tandem invite` and `tandem join`: the two halves of the invite
//! protocol as seen from the terminal.

use anyhow::Result;

use tandem_core::invite::{INVITE_TTL_HOURS, generate_invite};
use tandem_core::{JoinError, PlanLimits, join_plan};
use tandem_store::PlanStore;

use crate::plan_cmds::resolve_plan_id;

/// Mint an invite code for the caller's plan.
pub async fn run_invite(store: &dyn PlanStore, identity: &str) -> Result<()> {
    let plan_id = resolve_plan_id(store, identity).await?;
    let invite = generate_invite(store, &plan_id, identity).await?;

    println!("Invite code: {}", invite.code);
    println!(
        "Share it with your travel partner; it is single-use and expires in {INVITE_TTL_HOURS} hours."
    );

    Ok(())
}

/// Redeem an invite code and join the plan it names.
pub async fn run_join(store: &dyn PlanStore, identity: &str, code: &str) -> Result<()> {
    let code = code.trim().to_uppercase();

    match join_plan(store, &code, identity, PlanLimits::default()).await {
        Ok(plan_id) => {
            println!("Joined plan {plan_id}.");
            println!("Run `tandem plan show` to see it, or `tandem watch` for the live view.");
            Ok(())
        }
        Err(e) => {
            // Protocol refusals get a friendly line; transport errors keep
            // their context chain.
            match &e {
                JoinError::InvalidCode => eprintln!("That code is not recognized. Check for typos, or ask for a fresh invite."),
                JoinError::AlreadyUsed => eprintln!("That code has already been used."),
                JoinError::Expired => eprintln!("That code has expired; ask for a fresh invite."),
                JoinError::PlanNotFound(_) => eprintln!("The plan behind that code no longer exists."),
                JoinError::PlanFull { capacity } => eprintln!("That plan already has its full {capacity} members."),
                JoinError::Store(_) => {}
            }
            Err(e.into())
        }
    }
}
