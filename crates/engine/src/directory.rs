//! Seam to the external case and identity collaborators.

use crate::Result;
use parking_lot::Mutex;
use policy::Identity;
use store::{CaseRecord, DirectoryStore};

/// Read-only view of the case book and employee directory.
///
/// In production these belong to the surrounding application; the delegation
/// core only needs existence, base ownership, and organizational placement.
pub trait Directory: Send + Sync {
    fn case(&self, case_id: &str) -> Result<Option<CaseRecord>>;
    fn identity(&self, employee_code: &str) -> Result<Option<Identity>>;
    fn department_members(&self, department: &str) -> Result<Vec<String>>;
}

impl Directory for Mutex<DirectoryStore> {
    fn case(&self, case_id: &str) -> Result<Option<CaseRecord>> {
        Ok(self.lock().case(case_id)?)
    }

    fn identity(&self, employee_code: &str) -> Result<Option<Identity>> {
        Ok(self.lock().identity(employee_code)?)
    }

    fn department_members(&self, department: &str) -> Result<Vec<String>> {
        Ok(self.lock().department_members(department)?)
    }
}
