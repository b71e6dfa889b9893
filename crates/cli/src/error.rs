//! CLI error types.

use thiserror::Error;

/// CLI errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration is invalid or missing required fields.
    #[error("config error: {0}")]
    Config(String),

    /// A timestamp argument that is not RFC 3339.
    #[error("invalid timestamp '{value}': {source}")]
    InvalidTimestamp {
        value: String,
        source: chrono::ParseError,
    },

    /// The acting employee is not in the directory.
    #[error("unknown employee '{0}'")]
    UnknownActor(String),

    /// An error from the delegation core.
    #[error(transparent)]
    Engine(#[from] engine::Error),

    /// An error from the storage layer.
    #[error(transparent)]
    Store(#[from] store::Error),

    /// An error from the policy layer.
    #[error(transparent)]
    Policy(#[from] policy::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable code surfaced next to the message.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Engine(e) => e.code(),
            Error::Store(_) => "TRANSIENT_STORE_ERROR",
            Error::Config(_) | Error::InvalidTimestamp { .. } | Error::UnknownActor(_) => {
                "VALIDATION_ERROR"
            }
            Error::Policy(_) => "VALIDATION_ERROR",
            Error::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
