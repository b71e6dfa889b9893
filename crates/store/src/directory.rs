//! Case book and employee directory.
//!
//! These tables stand in for the external case-administration and identity
//! collaborators. The delegation core only reads them; base ownership of a
//! case changes exclusively through the external administration path.

use crate::{Error, Result};
use policy::{Identity, Role};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::time::Duration;

/// A debt case, referenced by the delegation core but not owned by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseRecord {
    pub case_id: String,
    /// The durable base owner, unaffected by delegation overlays.
    pub assigned_employee_code: String,
    pub state: String,
}

pub struct DirectoryStore {
    conn: Connection,
}

impl DirectoryStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cases (
                case_id TEXT PRIMARY KEY,
                assigned_employee_code TEXT NOT NULL,
                state TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS employees (
                employee_code TEXT PRIMARY KEY,
                role TEXT NOT NULL,
                department TEXT NOT NULL,
                branch TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_employees_department
                ON employees(department);
            "#,
        )?;
        Ok(())
    }

    pub fn case(&self, case_id: &str) -> Result<Option<CaseRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT case_id, assigned_employee_code, state FROM cases WHERE case_id = ?1",
                [case_id],
                |row| {
                    Ok(CaseRecord {
                        case_id: row.get(0)?,
                        assigned_employee_code: row.get(1)?,
                        state: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    pub fn identity(&self, employee_code: &str) -> Result<Option<Identity>> {
        let raw = self
            .conn
            .query_row(
                "SELECT employee_code, role, department, branch FROM employees WHERE employee_code = ?1",
                [employee_code],
                |row| {
                    let code: String = row.get(0)?;
                    let role: String = row.get(1)?;
                    let department: String = row.get(2)?;
                    let branch: String = row.get(3)?;
                    Ok((code, role, department, branch))
                },
            )
            .optional()?;

        let Some((employee_code, role, department, branch)) = raw else {
            return Ok(None);
        };
        let role: Role = role
            .parse()
            .map_err(|e| Error::Corrupt(format!("employee row: {e}")))?;
        Ok(Some(Identity {
            employee_code,
            role,
            department,
            branch,
        }))
    }

    /// Employee codes belonging to a department.
    pub fn department_members(&self, department: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT employee_code FROM employees WHERE department = ?1")?;
        let rows = stmt.query_map([department], |row| row.get(0))?;
        let members = rows.collect::<rusqlite::Result<_>>()?;
        Ok(members)
    }

    pub fn upsert_case(&self, record: &CaseRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO cases (case_id, assigned_employee_code, state) VALUES (?1, ?2, ?3)
             ON CONFLICT(case_id) DO UPDATE SET assigned_employee_code = ?2, state = ?3",
            params![record.case_id, record.assigned_employee_code, record.state],
        )?;
        Ok(())
    }

    pub fn upsert_employee(&self, identity: &Identity) -> Result<()> {
        self.conn.execute(
            "INSERT INTO employees (employee_code, role, department, branch) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(employee_code) DO UPDATE SET role = ?2, department = ?3, branch = ?4",
            params![
                identity.employee_code,
                identity.role.as_str(),
                identity.department,
                identity.branch,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_round_trips_role() {
        let store = DirectoryStore::in_memory().unwrap();
        let identity = Identity {
            employee_code: "E7".to_string(),
            role: Role::DeputyManager,
            department: "RECOVERY".to_string(),
            branch: "NORTH".to_string(),
        };
        store.upsert_employee(&identity).unwrap();
        assert_eq!(store.identity("E7").unwrap().unwrap(), identity);
        assert!(store.identity("E8").unwrap().is_none());
    }

    #[test]
    fn department_members_filters() {
        let store = DirectoryStore::in_memory().unwrap();
        for (code, dept) in [("E1", "RECOVERY"), ("E2", "RECOVERY"), ("E3", "LEGAL")] {
            store
                .upsert_employee(&Identity {
                    employee_code: code.to_string(),
                    role: Role::Employee,
                    department: dept.to_string(),
                    branch: "HQ".to_string(),
                })
                .unwrap();
        }
        let mut members = store.department_members("RECOVERY").unwrap();
        members.sort();
        assert_eq!(members, vec!["E1".to_string(), "E2".to_string()]);
    }
}
