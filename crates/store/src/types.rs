//! Delegation domain types.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique identifier for a delegation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DelegationId(pub Uuid);

impl DelegationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DelegationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DelegationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DelegationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, uuid::Error> {
        Ok(Self(s.parse()?))
    }
}

/// Lifecycle state of a delegation.
///
/// `Active` is the only non-terminal state: it moves to `Expired` when the
/// sweep observes a passed `expiry_at`, or to `Revoked` on explicit action.
/// Rows never leave a terminal state and are never deleted (audit trail).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelegationStatus {
    Active,
    Expired,
    Revoked,
}

impl DelegationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DelegationStatus::Active => "active",
            DelegationStatus::Expired => "expired",
            DelegationStatus::Revoked => "revoked",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, DelegationStatus::Active)
    }

    pub(crate) fn parse(raw: &str) -> Result<Self> {
        match raw {
            "active" => Ok(DelegationStatus::Active),
            "expired" => Ok(DelegationStatus::Expired),
            "revoked" => Ok(DelegationStatus::Revoked),
            other => Err(Error::Corrupt(format!("bad delegation status {other:?}"))),
        }
    }
}

impl std::fmt::Display for DelegationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A time-boxed transfer of case-handling authority between two employees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub id: DelegationId,
    pub case_id: String,
    pub delegator: String,
    pub delegatee: String,
    pub created_at: DateTime<Utc>,
    pub expiry_at: DateTime<Utc>,
    pub status: DelegationStatus,
    pub notes: Option<String>,
}

impl Delegation {
    /// Build a fresh `active` delegation stamped with `created_at = now`.
    pub fn new(
        case_id: impl Into<String>,
        delegator: impl Into<String>,
        delegatee: impl Into<String>,
        expiry_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: DelegationId::new(),
            case_id: case_id.into(),
            delegator: delegator.into(),
            delegatee: delegatee.into(),
            created_at: Utc::now(),
            expiry_at,
            status: DelegationStatus::Active,
            notes,
        }
    }

    /// Whether this delegation grants authority at `now`.
    ///
    /// The status column is never trusted alone: a row can still read
    /// `active` before the sweep has run, so the expiry is re-checked here.
    pub fn in_window(&self, now: DateTime<Utc>) -> bool {
        self.status == DelegationStatus::Active && now < self.expiry_at
    }
}
