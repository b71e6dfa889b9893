//! Delegation creation, revocation, and listing.

use crate::{Directory, Error, Result, Shared};
use chrono::{DateTime, Utc};
use policy::{Capability, EffectiveSet, Identity, Role};
use push::{Dispatcher, PushEvent};
use std::sync::Arc;
use store::{Delegation, DelegationId, DelegationStatus, DelegationStore, ListScope};

/// A request to transfer authority over a set of cases to one employee.
#[derive(Debug, Clone)]
pub struct CreateDelegation {
    pub case_ids: Vec<String>,
    pub delegatee: String,
    pub expiry_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// The only writer of new and revoked delegation rows.
pub struct DelegationManager<D: Directory> {
    delegations: Shared<DelegationStore>,
    directory: Arc<D>,
    dispatcher: Dispatcher,
}

impl<D: Directory> DelegationManager<D> {
    pub(crate) fn new(
        delegations: Shared<DelegationStore>,
        directory: Arc<D>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            delegations,
            directory,
            dispatcher,
        }
    }

    /// Create a batch of delegations, all-or-nothing.
    ///
    /// The acting user is the delegator. If any case fails a precondition the
    /// whole request fails and nothing is persisted; a half-transferred set
    /// would leave it unclear which cases the delegatee actually controls.
    pub fn create(
        &self,
        actor: &Identity,
        effective: &EffectiveSet,
        request: CreateDelegation,
    ) -> Result<Vec<Delegation>> {
        let now = Utc::now();

        if request.case_ids.is_empty() {
            return Err(Error::Validation("at least one case is required".into()));
        }
        if !effective.allows(Capability::DelegateCases) {
            return Err(Error::Authorization(format!(
                "{} lacks the delegate_cases capability",
                actor.employee_code
            )));
        }
        if request.delegatee == actor.employee_code {
            return Err(Error::Validation(
                "a case cannot be delegated to its delegator".into(),
            ));
        }
        if request.expiry_at <= now {
            return Err(Error::Validation(
                "expiry must be strictly in the future".into(),
            ));
        }
        if self.directory.identity(&request.delegatee)?.is_none() {
            return Err(Error::Validation(format!(
                "unknown employee {}",
                request.delegatee
            )));
        }

        // Validate and insert under one ledger lock so the batch is atomic
        // against concurrent create calls in this process; the store's
        // transaction and partial unique index cover external writers.
        let delegations = self.delegations.lock();
        let mut rows = Vec::with_capacity(request.case_ids.len());
        for case_id in &request.case_ids {
            let case = self
                .directory
                .case(case_id)?
                .ok_or_else(|| Error::Validation(format!("unknown case {case_id}")))?;
            let active = delegations.active_for_case(case_id)?;

            let holds_authority = case.assigned_employee_code == actor.employee_code
                || active
                    .as_ref()
                    .is_some_and(|d| d.delegatee == actor.employee_code && d.in_window(now));
            if !holds_authority {
                return Err(Error::Authorization(format!(
                    "{} does not hold authority over case {case_id}",
                    actor.employee_code
                )));
            }
            if active.is_some() {
                return Err(Error::Conflict {
                    case_id: case_id.clone(),
                });
            }

            rows.push(Delegation {
                id: DelegationId::new(),
                case_id: case_id.clone(),
                delegator: actor.employee_code.clone(),
                delegatee: request.delegatee.clone(),
                created_at: now,
                expiry_at: request.expiry_at,
                status: DelegationStatus::Active,
                notes: request.notes.clone(),
            });
        }

        delegations.insert_batch(&rows).map_err(|e| match e {
            store::Error::ActiveDelegationExists { case_id } => Error::Conflict { case_id },
            other => Error::Store(other),
        })?;

        tracing::info!(
            delegator = %actor.employee_code,
            delegatee = %request.delegatee,
            cases = rows.len(),
            "delegations created"
        );
        Ok(rows)
    }

    /// Revoke a delegation, idempotently.
    ///
    /// Revoking an already-terminal delegation is a no-op success: either
    /// way the delegatee no longer holds authority, and callers have no need
    /// to distinguish the two outcomes. A revoke that loses the
    /// race against the sweep keeps the sweep's recorded `expired` status.
    pub fn revoke(&self, actor: &Identity, id: DelegationId) -> Result<Delegation> {
        let delegations = self.delegations.lock();
        let delegation = delegations
            .get(id)?
            .ok_or_else(|| Error::NotFound(format!("delegation {id}")))?;
        self.ensure_may_revoke(actor, &delegation)?;

        if delegation.status.is_terminal() {
            return Ok(delegation);
        }

        let changed = delegations.mark_revoked(id)?;
        let finalized = delegations
            .get(id)?
            .ok_or_else(|| Error::NotFound(format!("delegation {id}")))?;
        drop(delegations);

        // Publish strictly after the transition commits. If the conditional
        // update changed nothing, a racing writer finalized the row and
        // already triggered its own notification.
        if changed {
            let delivered = self
                .dispatcher
                .publish(PushEvent::revoked(&finalized.delegatee, 1));
            tracing::info!(
                delegation = %id,
                delegatee = %finalized.delegatee,
                actor = %actor.employee_code,
                delivered,
                "delegation revoked"
            );
        }
        Ok(finalized)
    }

    /// Page through the delegations the actor is entitled to see.
    pub fn list(&self, actor: &Identity, page: u32, limit: u32) -> Result<Vec<Delegation>> {
        let limit = limit.clamp(1, 200);
        let offset = page.saturating_sub(1).saturating_mul(limit);

        let scope = match actor.role {
            Role::Administrator => ListScope::All,
            role if role.is_department_head() => {
                let mut members = self.directory.department_members(&actor.department)?;
                if !members.contains(&actor.employee_code) {
                    members.push(actor.employee_code.clone());
                }
                ListScope::Members(members)
            }
            _ => ListScope::Members(vec![actor.employee_code.clone()]),
        };

        Ok(self.delegations.lock().list(&scope, limit, offset)?)
    }

    fn ensure_may_revoke(&self, actor: &Identity, delegation: &Delegation) -> Result<()> {
        if actor.employee_code == delegation.delegator || actor.role == Role::Administrator {
            return Ok(());
        }
        if actor.role.is_department_head() {
            let delegator = self.directory.identity(&delegation.delegator)?;
            if delegator.is_some_and(|d| d.department == actor.department) {
                return Ok(());
            }
        }
        Err(Error::Authorization(format!(
            "{} may not revoke delegation {}",
            actor.employee_code, delegation.id
        )))
    }
}
