use thiserror::Error;

/// Errors surfaced by a [`crate::store::PlanStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No document exists at the given logical path.
    #[error("no document at {path}")]
    NotFound { path: String },

    /// A document already exists at a create-only path.
    #[error("document already exists at {path}")]
    AlreadyExists { path: String },

    /// The reader is neither a member of the plan nor holds an access grant.
    #[error("{identity} may not read {path}")]
    PermissionDenied { path: String, identity: String },

    /// The backing database rejected or lost the operation.
    #[error("store backend error")]
    Database(#[from] sqlx::Error),

    /// A stored document could not be encoded or decoded.
    #[error("store encoding error")]
    Encoding(#[from] serde_json::Error),

    /// The realtime subscription channel closed unexpectedly.
    #[error("subscription to {path} lost")]
    SubscriptionLost { path: String },
}

impl StoreError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists { path: path.into() }
    }

    pub fn permission_denied(path: impl Into<String>, identity: impl Into<String>) -> Self {
        Self::PermissionDenied {
            path: path.into(),
            identity: identity.into(),
        }
    }

    /// Whether this error is a plain missing-document miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
