//! Thin query functions, one per SQL statement, grouped by table.

pub mod grants;
pub mod invites;
pub mod plans;
pub mod users;
