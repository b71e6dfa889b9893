//! Role- and grant-based permission composition.
//!
//! Core principle: **the server recomputes effective permissions on every
//! protected request.** Client-held copies are advisory for rendering only.

mod error;
mod rules;

pub use error::{Error, Result};
pub use rules::RolePolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Capabilities an employee may hold over the case book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewCases,
    ManageCases,
    DelegateCases,
    ExportReports,
    ManagePermissions,
}

impl Capability {
    /// Every capability, in display order.
    pub const ALL: [Capability; 5] = [
        Capability::ViewCases,
        Capability::ManageCases,
        Capability::DelegateCases,
        Capability::ExportReports,
        Capability::ManagePermissions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ViewCases => "view_cases",
            Capability::ManageCases => "manage_cases",
            Capability::DelegateCases => "delegate_cases",
            Capability::ExportReports => "export_reports",
            Capability::ManagePermissions => "manage_permissions",
        }
    }
}

impl std::str::FromStr for Capability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "view_cases" => Ok(Capability::ViewCases),
            "manage_cases" => Ok(Capability::ManageCases),
            "delegate_cases" => Ok(Capability::DelegateCases),
            "export_reports" => Ok(Capability::ExportReports),
            "manage_permissions" => Ok(Capability::ManagePermissions),
            other => Err(Error::UnknownCapability(other.to_string())),
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Organizational rank of an employee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Administrator,
    Director,
    DeputyDirector,
    Manager,
    DeputyManager,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "administrator",
            Role::Director => "director",
            Role::DeputyDirector => "deputy_director",
            Role::Manager => "manager",
            Role::DeputyManager => "deputy_manager",
            Role::Employee => "employee",
        }
    }

    /// Managers and their deputies supervise a department.
    pub fn is_department_head(&self) -> bool {
        matches!(self, Role::Manager | Role::DeputyManager)
    }
}

impl std::str::FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "administrator" => Ok(Role::Administrator),
            "director" => Ok(Role::Director),
            "deputy_director" => Ok(Role::DeputyDirector),
            "manager" => Ok(Role::Manager),
            "deputy_manager" => Ok(Role::DeputyManager),
            "employee" => Ok(Role::Employee),
            other => Err(Error::UnknownRole(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated identity, as supplied by the external identity module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub employee_code: String,
    pub role: Role,
    pub department: String,
    pub branch: String,
}

/// An explicit per-employee permission override, authoritative over defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    pub capability: Capability,
    pub allowed: bool,
}

/// The composed capability map for one employee at one evaluation instant.
///
/// Never persisted; recomputed on every session check and protected request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveSet {
    capabilities: HashMap<Capability, bool>,
}

impl EffectiveSet {
    fn new() -> Self {
        let capabilities = Capability::ALL.iter().map(|c| (*c, false)).collect();
        Self { capabilities }
    }

    fn set(&mut self, capability: Capability, allowed: bool) {
        self.capabilities.insert(capability, allowed);
    }

    pub fn allows(&self, capability: Capability) -> bool {
        self.capabilities.get(&capability).copied().unwrap_or(false)
    }

    /// Capabilities in display order with their resolved values.
    pub fn entries(&self) -> impl Iterator<Item = (Capability, bool)> + '_ {
        Capability::ALL.iter().map(|c| (*c, self.allows(*c)))
    }
}
