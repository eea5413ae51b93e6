use thiserror::Error;

use tandem_store::StoreError;

/// Ways redeeming an invite code can fail.
///
/// Everything except `Store` is a terminal protocol outcome the user can
/// act on; `Store` wraps transport failures, which leave the saga rolled
/// back and are safe to retry.
#[derive(Debug, Error)]
pub enum JoinError {
    #[error("invite code not recognized")]
    InvalidCode,

    #[error("invite code has already been used")]
    AlreadyUsed,

    #[error("invite code has expired")]
    Expired,

    #[error("plan {0} no longer exists")]
    PlanNotFound(String),

    #[error("plan already has its full complement of {capacity} members")]
    PlanFull { capacity: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from the plan operation surface.
#[derive(Debug, Error)]
pub enum OpError {
    /// Rejected locally before any store call was attempted.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OpError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
