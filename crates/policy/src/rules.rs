//! Default-rule tables and effective-set composition.

use crate::{Capability, EffectiveSet, Error, Grant, Identity, Result, Role};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Role/department default policy, loadable from TOML.
///
/// Composition order, highest precedence first:
/// 1. administrator short-circuit (always every capability),
/// 2. explicit [`Grant`] rows for the employee,
/// 3. role defaults plus department export rules,
/// 4. the export-allow list, OR-merged into the export capability only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePolicy {
    /// Capabilities granted by default to each role.
    #[serde(default)]
    pub defaults: HashMap<Role, HashSet<Capability>>,

    /// Department codes that unconditionally imply report export.
    #[serde(default)]
    pub export_departments: Vec<String>,
}

impl RolePolicy {
    /// Load policy from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse policy from a TOML string.
    pub fn parse(toml: &str) -> Result<Self> {
        toml::from_str(toml).map_err(|e| Error::Parse(e.to_string()))
    }

    /// The built-in default table, used when no policy file is present.
    pub fn standard() -> Self {
        use Capability::*;
        let mut defaults = HashMap::new();
        defaults.insert(
            Role::Administrator,
            HashSet::from(Capability::ALL),
        );
        defaults.insert(
            Role::Director,
            HashSet::from([ViewCases, ManageCases, DelegateCases, ExportReports]),
        );
        defaults.insert(
            Role::DeputyDirector,
            HashSet::from([ViewCases, ManageCases, DelegateCases, ExportReports]),
        );
        defaults.insert(
            Role::Manager,
            HashSet::from([ViewCases, ManageCases, DelegateCases]),
        );
        defaults.insert(
            Role::DeputyManager,
            HashSet::from([ViewCases, ManageCases, DelegateCases]),
        );
        defaults.insert(Role::Employee, HashSet::from([ViewCases, DelegateCases]));

        Self {
            defaults,
            export_departments: Vec::new(),
        }
    }

    /// Compose the effective capability set for one employee.
    ///
    /// Pure and deterministic: the same inputs always produce the same set.
    /// `export_listed` is the employee's membership in the export-allow list.
    pub fn compute_effective(
        &self,
        identity: &Identity,
        grants: &[Grant],
        export_listed: bool,
    ) -> EffectiveSet {
        let mut effective = EffectiveSet::new();

        // Administrators are never downgraded by grant rows.
        if identity.role == Role::Administrator {
            for capability in Capability::ALL {
                effective.set(capability, true);
            }
            return effective;
        }

        if let Some(caps) = self.defaults.get(&identity.role) {
            for capability in caps {
                effective.set(*capability, true);
            }
        }
        if self.export_departments.contains(&identity.department) {
            effective.set(Capability::ExportReports, true);
        }

        // Explicit grants override the defaults in either direction.
        for grant in grants {
            effective.set(grant.capability, grant.allowed);
        }

        // The export list only ever widens.
        if export_listed {
            effective.set(Capability::ExportReports, true);
        }

        effective
    }
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(role: Role, department: &str) -> Identity {
        Identity {
            employee_code: "E100".to_string(),
            role,
            department: department.to_string(),
            branch: "HQ".to_string(),
        }
    }

    #[test]
    fn administrator_exports_despite_denying_grant() {
        let policy = RolePolicy::standard();
        let deny = [Grant {
            capability: Capability::ExportReports,
            allowed: false,
        }];
        let effective = policy.compute_effective(&identity(Role::Administrator, "IT"), &deny, false);
        assert!(effective.allows(Capability::ExportReports));
        assert!(effective.allows(Capability::ManagePermissions));
    }

    #[test]
    fn employee_defaults_exclude_management() {
        let policy = RolePolicy::standard();
        let effective = policy.compute_effective(&identity(Role::Employee, "RECOVERY"), &[], false);
        assert!(effective.allows(Capability::ViewCases));
        assert!(effective.allows(Capability::DelegateCases));
        assert!(!effective.allows(Capability::ManageCases));
        assert!(!effective.allows(Capability::ExportReports));
    }

    #[test]
    fn explicit_grant_overrides_role_default() {
        let policy = RolePolicy::standard();
        let grants = [
            Grant {
                capability: Capability::ManageCases,
                allowed: true,
            },
            Grant {
                capability: Capability::DelegateCases,
                allowed: false,
            },
        ];
        let effective = policy.compute_effective(&identity(Role::Employee, "RECOVERY"), &grants, false);
        assert!(effective.allows(Capability::ManageCases));
        assert!(!effective.allows(Capability::DelegateCases));
    }

    #[test]
    fn export_department_implies_export() {
        let mut policy = RolePolicy::standard();
        policy.export_departments.push("AUDIT".to_string());
        let effective = policy.compute_effective(&identity(Role::Employee, "AUDIT"), &[], false);
        assert!(effective.allows(Capability::ExportReports));
    }

    #[test]
    fn export_list_only_widens() {
        let policy = RolePolicy::standard();
        let listed = policy.compute_effective(&identity(Role::Employee, "RECOVERY"), &[], true);
        assert!(listed.allows(Capability::ExportReports));

        // A denying grant is overridden by the additive export list.
        let deny = [Grant {
            capability: Capability::ExportReports,
            allowed: false,
        }];
        let still = policy.compute_effective(&identity(Role::Employee, "RECOVERY"), &deny, true);
        assert!(still.allows(Capability::ExportReports));
    }

    #[test]
    fn parse_toml() {
        let toml = r#"
export_departments = ["AUDIT"]

[defaults]
employee = ["view_cases"]
manager = ["view_cases", "manage_cases", "delegate_cases"]
"#;
        let policy = RolePolicy::parse(toml).unwrap();
        let effective = policy.compute_effective(&identity(Role::Employee, "DESK"), &[], false);
        assert!(effective.allows(Capability::ViewCases));
        assert!(!effective.allows(Capability::DelegateCases));
    }
}
