//! Effective-permission computation over the policy store.

use crate::{Error, Result, Shared};
use policy::{Capability, EffectiveSet, Grant, Identity, RolePolicy};
use std::sync::Arc;
use store::PolicyStore;

/// Server-side permission engine facade.
///
/// Every call re-reads the grant rows and recomputes the set; client-held
/// copies are advisory for rendering and never an enforcement point.
pub struct PermissionService {
    policies: Shared<PolicyStore>,
    rules: Arc<RolePolicy>,
}

impl PermissionService {
    pub(crate) fn new(policies: Shared<PolicyStore>, rules: Arc<RolePolicy>) -> Self {
        Self { policies, rules }
    }

    /// Compose the effective capability set for one employee, right now.
    pub fn effective_for(&self, identity: &Identity) -> Result<EffectiveSet> {
        let policies = self.policies.lock();
        let grants = policies.grants_for(&identity.employee_code)?;
        let export_listed = policies.is_export_listed(&identity.employee_code)?;
        Ok(self
            .rules
            .compute_effective(identity, &grants, export_listed))
    }

    /// Explicit grant rows for an employee (administration view).
    pub fn grants_for(&self, actor: &Identity, employee_code: &str) -> Result<Vec<Grant>> {
        self.ensure_may_manage(actor)?;
        Ok(self.policies.lock().grants_for(employee_code)?)
    }

    /// Replace an employee's explicit grants wholesale.
    pub fn replace_grants(
        &self,
        actor: &Identity,
        employee_code: &str,
        capabilities: &[Capability],
    ) -> Result<()> {
        self.ensure_may_manage(actor)?;
        self.policies
            .lock()
            .replace_grants(employee_code, capabilities)?;
        tracing::info!(
            actor = %actor.employee_code,
            employee = %employee_code,
            grants = capabilities.len(),
            "permission grants replaced"
        );
        Ok(())
    }

    /// Add or remove an employee from the export-allow list.
    pub fn set_export_listed(
        &self,
        actor: &Identity,
        employee_code: &str,
        listed: bool,
    ) -> Result<()> {
        self.ensure_may_manage(actor)?;
        self.policies
            .lock()
            .set_export_listed(employee_code, listed)?;
        Ok(())
    }

    fn ensure_may_manage(&self, actor: &Identity) -> Result<()> {
        // Re-derived per request, not taken from the caller's session.
        if self.effective_for(actor)?.allows(Capability::ManagePermissions) {
            Ok(())
        } else {
            Err(Error::Authorization(format!(
                "{} may not manage permissions",
                actor.employee_code
            )))
        }
    }
}
