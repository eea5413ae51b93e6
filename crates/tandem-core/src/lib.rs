//! Core protocols for a shared travel plan: invites, the join saga, plan
//! operations, and the live sync engine.

pub mod error;
pub mod invite;
pub mod join;
pub mod ops;
pub mod schedule;
pub mod sync;

pub use error::{JoinError, OpError};
pub use join::{PlanLimits, join_plan};
