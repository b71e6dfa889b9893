use thiserror::Error;

/// The delegation core's error taxonomy.
///
/// Validation, conflict, and authorization failures are terminal for the
/// request and are never retried. Store errors that are not conflicts are
/// considered transient; the sweep retries them on its next tick.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Malformed input: bad dates, self-delegation, unknown case or user.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The case already carries an active delegation.
    #[error("case {case_id} already has an active delegation")]
    Conflict { case_id: String },

    /// The caller lacks the right to delegate or revoke.
    #[error("not authorized: {0}")]
    Authorization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] store::Error),
}

impl Error {
    /// Stable code for transports and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Conflict { .. } => "CONFLICT_ERROR",
            Error::Authorization(_) => "AUTHORIZATION_ERROR",
            Error::NotFound(_) => "NOT_FOUND_ERROR",
            Error::Store(store::Error::ActiveDelegationExists { .. }) => "CONFLICT_ERROR",
            Error::Store(_) => "TRANSIENT_STORE_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
