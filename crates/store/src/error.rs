use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Another `active` delegation already exists for the case. Raised by the
    /// in-transaction check and, as a backstop, by the partial unique index.
    #[error("case {case_id} already has an active delegation")]
    ActiveDelegationExists { case_id: String },

    #[error("not found: {0}")]
    NotFound(String),

    /// A persisted value no application version could have written.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, Error>;
