//! SQLite-backed persistence for the delegation core.
//!
//! Three stores share one database file:
//!
//! - [`DelegationStore`]: the delegation ledger. Rows are append-only apart
//!   from the two terminal status transitions (`active → expired`,
//!   `active → revoked`), both performed as conditional updates so that
//!   concurrent writers racing on the same row cannot both win.
//! - [`PolicyStore`]: explicit permission grants and the export-allow list.
//! - [`DirectoryStore`]: the case book and employee directory. These stand
//!   in for the external case-administration and identity collaborators; the
//!   delegation core only reads them.
//!
//! Timestamps are persisted as fixed-width RFC 3339 UTC text (microsecond
//! precision), so SQL string comparison against `expiry_at` is also a correct
//! time comparison.

mod delegation;
mod directory;
mod error;
mod policy_store;
mod time;
mod types;

pub use delegation::{DelegationStore, ListScope};
pub use directory::{CaseRecord, DirectoryStore};
pub use error::{Error, Result};
pub use policy_store::PolicyStore;
pub use types::{Delegation, DelegationId, DelegationStatus};
