//! Policy error types.

use thiserror::Error;

/// Policy errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A role name that is not part of the organizational model.
    #[error("unknown role: {0}")]
    UnknownRole(String),

    /// A permission name that is not part of the capability model.
    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    /// Failed to parse a policy file.
    #[error("failed to parse policy: {0}")]
    Parse(String),

    /// An I/O error occurred while reading policy.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
