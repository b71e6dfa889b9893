//! Wire-shaped lifecycle events.

use serde::{Deserialize, Serialize};

/// A delegation lifecycle event, serialized as `{"type": ..., "data": ...}`.
///
/// Events are grouped per delegatee: one event carries the number of cases
/// the employee lost in a single transition, never one event per case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PushEvent {
    DelegationExpired { delegatee: String, case_count: usize },
    DelegationRevoked { delegatee: String, case_count: usize },
}

impl PushEvent {
    pub fn expired(delegatee: impl Into<String>, case_count: usize) -> Self {
        Self::DelegationExpired {
            delegatee: delegatee.into(),
            case_count,
        }
    }

    pub fn revoked(delegatee: impl Into<String>, case_count: usize) -> Self {
        Self::DelegationRevoked {
            delegatee: delegatee.into(),
            case_count,
        }
    }

    /// The employee this event must be routed to.
    pub fn delegatee(&self) -> &str {
        match self {
            Self::DelegationExpired { delegatee, .. } => delegatee,
            Self::DelegationRevoked { delegatee, .. } => delegatee,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::DelegationExpired { .. } => "DELEGATION_EXPIRED",
            Self::DelegationRevoked { .. } => "DELEGATION_REVOKED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape() {
        let event = PushEvent::expired("E2", 3);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "DELEGATION_EXPIRED",
                "data": { "delegatee": "E2", "case_count": 3 }
            })
        );
        let back: PushEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
