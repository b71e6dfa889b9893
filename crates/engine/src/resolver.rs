//! Per-request authority resolution.

use crate::{Directory, Error, Result, Shared};
use chrono::{DateTime, Utc};
use policy::{Capability, EffectiveSet, Identity, Role};
use std::sync::Arc;
use store::{CaseRecord, Delegation, DelegationStore};

/// The final authority decision for one user over one case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Access {
    pub can_view: bool,
    pub can_edit: bool,
    pub can_delegate: bool,
    /// The real acting identity, for audit and timeline tagging. Never
    /// masqueraded as the base owner: activity during a delegation window
    /// must show who actually acted.
    pub attributed_owner: String,
}

/// Pure decision over already-fetched rows.
///
/// `owner` is the identity of the case's base owner (organizational scoping
/// needs its department and branch); `active` is the case's `active`-status
/// delegation row, if any. The row's expiry is re-checked against `now`
/// here: a logically expired delegation never grants access, even when the
/// sweep has not converted the row yet.
pub fn decide(
    case: &CaseRecord,
    owner: Option<&Identity>,
    active: Option<&Delegation>,
    actor: &Identity,
    effective: &EffectiveSet,
    now: DateTime<Utc>,
) -> Access {
    let base = match actor.role {
        Role::Administrator | Role::Director => true,
        Role::DeputyDirector => owner.is_some_and(|o| o.branch == actor.branch),
        Role::Manager | Role::DeputyManager => {
            owner.is_some_and(|o| o.department == actor.department)
        }
        Role::Employee => case.assigned_employee_code == actor.employee_code,
    };

    let delegated = active
        .is_some_and(|d| d.delegatee == actor.employee_code && d.in_window(now));

    let authority = base || delegated;
    Access {
        can_view: authority,
        can_edit: authority,
        // A delegatee cannot re-delegate: conflicts with the existing active
        // row are rejected, so delegation authority stays with the base side.
        can_delegate: base && effective.allows(Capability::DelegateCases),
        attributed_owner: actor.employee_code.clone(),
    }
}

/// Fetch-and-decide wrapper sitting on the hot path of every protected case
/// request: one indexed delegation lookup, one or two directory reads, no
/// network calls.
pub struct AccessResolver<D: Directory> {
    delegations: Shared<DelegationStore>,
    directory: Arc<D>,
}

impl<D: Directory> AccessResolver<D> {
    pub(crate) fn new(delegations: Shared<DelegationStore>, directory: Arc<D>) -> Self {
        Self {
            delegations,
            directory,
        }
    }

    pub fn resolve(
        &self,
        actor: &Identity,
        effective: &EffectiveSet,
        case_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Access> {
        let case = self
            .directory
            .case(case_id)?
            .ok_or_else(|| Error::NotFound(format!("case {case_id}")))?;
        let owner = self.directory.identity(&case.assigned_employee_code)?;
        let active = self.delegations.lock().active_for_case(case_id)?;
        Ok(decide(
            &case,
            owner.as_ref(),
            active.as_ref(),
            actor,
            effective,
            now,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use policy::RolePolicy;
    use store::DelegationStatus;

    fn case(owner: &str) -> CaseRecord {
        CaseRecord {
            case_id: "C-1".to_string(),
            assigned_employee_code: owner.to_string(),
            state: "open".to_string(),
        }
    }

    fn identity(code: &str, role: Role, department: &str, branch: &str) -> Identity {
        Identity {
            employee_code: code.to_string(),
            role,
            department: department.to_string(),
            branch: branch.to_string(),
        }
    }

    fn effective_for(identity: &Identity) -> EffectiveSet {
        RolePolicy::standard().compute_effective(identity, &[], false)
    }

    fn delegation_to(code: &str, expiry_at: DateTime<Utc>) -> Delegation {
        Delegation {
            id: store::DelegationId::new(),
            case_id: "C-1".to_string(),
            delegator: "E1".to_string(),
            delegatee: code.to_string(),
            created_at: expiry_at - Duration::hours(1),
            expiry_at,
            status: DelegationStatus::Active,
            notes: None,
        }
    }

    #[test]
    fn base_owner_edits_and_delegates() {
        let owner = identity("E1", Role::Employee, "RECOVERY", "HQ");
        let access = decide(
            &case("E1"),
            Some(&owner),
            None,
            &owner,
            &effective_for(&owner),
            Utc::now(),
        );
        assert!(access.can_edit);
        assert!(access.can_delegate);
    }

    #[test]
    fn unrelated_employee_gets_nothing() {
        let actor = identity("E9", Role::Employee, "RECOVERY", "HQ");
        let owner = identity("E1", Role::Employee, "RECOVERY", "HQ");
        let access = decide(
            &case("E1"),
            Some(&owner),
            None,
            &actor,
            &effective_for(&actor),
            Utc::now(),
        );
        assert!(!access.can_view);
        assert!(!access.can_edit);
        assert!(!access.can_delegate);
    }

    #[test]
    fn department_scoping_for_managers() {
        let owner = identity("E1", Role::Employee, "RECOVERY", "HQ");
        let same = identity("M1", Role::Manager, "RECOVERY", "HQ");
        let other = identity("M2", Role::Manager, "LEGAL", "HQ");

        assert!(
            decide(&case("E1"), Some(&owner), None, &same, &effective_for(&same), Utc::now())
                .can_edit
        );
        assert!(
            !decide(&case("E1"), Some(&owner), None, &other, &effective_for(&other), Utc::now())
                .can_edit
        );
    }

    #[test]
    fn branch_scoping_for_deputy_directors() {
        let owner = identity("E1", Role::Employee, "RECOVERY", "NORTH");
        let same = identity("D1", Role::DeputyDirector, "BOARD", "NORTH");
        let other = identity("D2", Role::DeputyDirector, "BOARD", "SOUTH");

        assert!(
            decide(&case("E1"), Some(&owner), None, &same, &effective_for(&same), Utc::now())
                .can_edit
        );
        assert!(
            !decide(&case("E1"), Some(&owner), None, &other, &effective_for(&other), Utc::now())
                .can_edit
        );
    }

    #[test]
    fn delegation_grants_edit_only_inside_the_window() {
        let actor = identity("E2", Role::Employee, "LEGAL", "HQ");
        let owner = identity("E1", Role::Employee, "RECOVERY", "HQ");
        let effective = effective_for(&actor);
        let expiry = Utc::now() + Duration::hours(1);
        let delegation = delegation_to("E2", expiry);

        let inside = decide(
            &case("E1"),
            Some(&owner),
            Some(&delegation),
            &actor,
            &effective,
            expiry - Duration::minutes(30),
        );
        assert!(inside.can_edit);
        assert!(!inside.can_delegate);

        // At and after expiry the row may still read `active`; the time
        // check protects the decision from sweep latency.
        for instant in [expiry, expiry + Duration::seconds(1)] {
            let outside = decide(
                &case("E1"),
                Some(&owner),
                Some(&delegation),
                &actor,
                &effective,
                instant,
            );
            assert!(!outside.can_edit, "no authority at {instant}");
        }
    }

    #[test]
    fn delegation_never_helps_a_third_party() {
        let actor = identity("E3", Role::Employee, "LEGAL", "HQ");
        let owner = identity("E1", Role::Employee, "RECOVERY", "HQ");
        let delegation = delegation_to("E2", Utc::now() + Duration::hours(1));
        let access = decide(
            &case("E1"),
            Some(&owner),
            Some(&delegation),
            &actor,
            &effective_for(&actor),
            Utc::now(),
        );
        assert!(!access.can_view);
    }

    #[test]
    fn attribution_is_the_acting_identity() {
        let actor = identity("E2", Role::Employee, "LEGAL", "HQ");
        let owner = identity("E1", Role::Employee, "RECOVERY", "HQ");
        let delegation = delegation_to("E2", Utc::now() + Duration::hours(1));
        let access = decide(
            &case("E1"),
            Some(&owner),
            Some(&delegation),
            &actor,
            &effective_for(&actor),
            Utc::now(),
        );
        assert_eq!(access.attributed_owner, "E2");
    }
}
