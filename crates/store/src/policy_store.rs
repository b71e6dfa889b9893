//! Explicit permission grants and the export-allow list.

use crate::{Error, Result};
use policy::{Capability, Grant};
use rusqlite::{Connection, params};
use std::path::Path;
use std::time::Duration;

/// SQLite-backed store of per-employee policy overrides.
///
/// Grant rows are authoritative over role defaults. Administration replaces
/// an employee's rows wholesale, so a grant never outlives the decision that
/// created it. The `allowed` column makes an explicit deny a data change
/// rather than a schema change.
pub struct PolicyStore {
    conn: Connection,
}

impl PolicyStore {
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
            CREATE TABLE IF NOT EXISTS permission_grants (
                employee_code TEXT NOT NULL,
                permission TEXT NOT NULL,
                allowed INTEGER NOT NULL,
                PRIMARY KEY (employee_code, permission)
            );
            CREATE TABLE IF NOT EXISTS export_allowlist (
                employee_code TEXT PRIMARY KEY
            );
            "#,
        )?;
        Ok(())
    }

    /// Explicit grant rows for one employee.
    pub fn grants_for(&self, employee_code: &str) -> Result<Vec<Grant>> {
        let mut stmt = self.conn.prepare(
            "SELECT permission, allowed FROM permission_grants WHERE employee_code = ?1",
        )?;
        let rows = stmt.query_map([employee_code], |row| {
            let permission: String = row.get(0)?;
            let allowed: bool = row.get(1)?;
            Ok((permission, allowed))
        })?;

        let mut grants = Vec::new();
        for row in rows {
            let (permission, allowed) = row?;
            let capability: Capability = permission
                .parse()
                .map_err(|e| Error::Corrupt(format!("grant row: {e}")))?;
            grants.push(Grant {
                capability,
                allowed,
            });
        }
        Ok(grants)
    }

    /// Replace an employee's grant rows with the given allowed capabilities.
    pub fn replace_grants(&self, employee_code: &str, capabilities: &[Capability]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM permission_grants WHERE employee_code = ?1",
            [employee_code],
        )?;
        for capability in capabilities {
            tx.execute(
                "INSERT INTO permission_grants (employee_code, permission, allowed) VALUES (?1, ?2, 1)",
                params![employee_code, capability.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Whether the employee is on the export-allow list.
    pub fn is_export_listed(&self, employee_code: &str) -> Result<bool> {
        let listed: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM export_allowlist WHERE employee_code = ?1)",
            [employee_code],
            |r| r.get(0),
        )?;
        Ok(listed)
    }

    pub fn set_export_listed(&self, employee_code: &str, listed: bool) -> Result<()> {
        if listed {
            self.conn.execute(
                "INSERT OR IGNORE INTO export_allowlist (employee_code) VALUES (?1)",
                [employee_code],
            )?;
        } else {
            self.conn.execute(
                "DELETE FROM export_allowlist WHERE employee_code = ?1",
                [employee_code],
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_grants_is_wholesale() {
        let store = PolicyStore::in_memory().unwrap();
        store
            .replace_grants("E1", &[Capability::ManageCases, Capability::ExportReports])
            .unwrap();
        assert_eq!(store.grants_for("E1").unwrap().len(), 2);

        store.replace_grants("E1", &[Capability::ViewCases]).unwrap();
        let grants = store.grants_for("E1").unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].capability, Capability::ViewCases);
        assert!(grants[0].allowed);
    }

    #[test]
    fn export_list_toggles() {
        let store = PolicyStore::in_memory().unwrap();
        assert!(!store.is_export_listed("E9").unwrap());
        store.set_export_listed("E9", true).unwrap();
        store.set_export_listed("E9", true).unwrap();
        assert!(store.is_export_listed("E9").unwrap());
        store.set_export_listed("E9", false).unwrap();
        assert!(!store.is_export_listed("E9").unwrap());
    }
}
