//! The delegation ledger.

use crate::time;
use crate::{Delegation, DelegationId, DelegationStatus, Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::time::Duration;

const COLUMNS: &str = "id, case_id, delegator, delegatee, created_at, expiry_at, status, notes";

/// Visibility scope for delegation listings.
#[derive(Debug, Clone)]
pub enum ListScope {
    /// Every row (administrators).
    All,
    /// Rows where the delegator or delegatee is one of these employees.
    Members(Vec<String>),
}

/// SQLite-backed store of delegation records.
///
/// Rows are never deleted; the only mutations are the two terminal status
/// transitions, each guarded by a `status = 'active'` conditional update.
pub struct DelegationStore {
    conn: Connection,
}

impl DelegationStore {
    /// Open or create the delegation ledger at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory ledger (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS delegations (
                id TEXT PRIMARY KEY,
                case_id TEXT NOT NULL,
                delegator TEXT NOT NULL,
                delegatee TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expiry_at TEXT NOT NULL,
                status TEXT NOT NULL,
                notes TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_delegations_case
                ON delegations(case_id, status);
            CREATE INDEX IF NOT EXISTS idx_delegations_due
                ON delegations(status, expiry_at);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_delegations_single_active
                ON delegations(case_id) WHERE status = 'active';
            "#,
        )?;
        Ok(())
    }

    /// Persist a batch of new delegations, all-or-nothing.
    ///
    /// Each case is re-checked for an existing `active` row inside the
    /// transaction; the partial unique index is the backstop for writers
    /// racing between check and insert. Any failure rolls the batch back.
    pub fn insert_batch(&self, rows: &[Delegation]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for row in rows {
            let occupied: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM delegations WHERE case_id = ?1 AND status = 'active')",
                [&row.case_id],
                |r| r.get(0),
            )?;
            if occupied {
                return Err(Error::ActiveDelegationExists {
                    case_id: row.case_id.clone(),
                });
            }
            tx.execute(
                &format!("INSERT INTO delegations ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
                params![
                    row.id.to_string(),
                    row.case_id,
                    row.delegator,
                    row.delegatee,
                    time::encode(row.created_at),
                    time::encode(row.expiry_at),
                    row.status.as_str(),
                    row.notes,
                ],
            )
            .map_err(|e| constraint_to_conflict(e, &row.case_id))?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Fetch one delegation by id.
    pub fn get(&self, id: DelegationId) -> Result<Option<Delegation>> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM delegations WHERE id = ?1"),
                [id.to_string()],
                RawRow::read,
            )
            .optional()?;
        raw.map(RawRow::decode).transpose()
    }

    /// The single `active` delegation for a case, if any.
    ///
    /// One indexed lookup; this sits on the hot path of every case request.
    pub fn active_for_case(&self, case_id: &str) -> Result<Option<Delegation>> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM delegations WHERE case_id = ?1 AND status = 'active'"),
                [case_id],
                RawRow::read,
            )
            .optional()?;
        raw.map(RawRow::decode).transpose()
    }

    /// Transition one `active` row to `revoked`.
    ///
    /// Returns whether this call changed the row. Zero rows affected means
    /// another writer (a racing sweep or revoke) already finalized it, which
    /// callers treat as success.
    pub fn mark_revoked(&self, id: DelegationId) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE delegations SET status = 'revoked' WHERE id = ?1 AND status = 'active'",
            [id.to_string()],
        )?;
        Ok(changed > 0)
    }

    /// Transition every time-expired `active` row to `expired`.
    ///
    /// Each row is converted with a `status = 'active'` conditional update,
    /// so a periodic tick and an on-demand sweep racing on the same row
    /// cannot both win; the loser's update affects zero rows and the row is
    /// simply not reported again. Returns the rows this call converted.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<Delegation>> {
        let tx = self.conn.unchecked_transaction()?;
        let due: Vec<RawRow> = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {COLUMNS} FROM delegations WHERE status = 'active' AND expiry_at <= ?1"
            ))?;
            let rows = stmt.query_map([time::encode(now)], RawRow::read)?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        let mut swept = Vec::with_capacity(due.len());
        for raw in due {
            let changed = tx.execute(
                "UPDATE delegations SET status = 'expired' WHERE id = ?1 AND status = 'active'",
                [&raw.id],
            )?;
            if changed == 1 {
                let mut delegation = raw.decode()?;
                delegation.status = DelegationStatus::Expired;
                swept.push(delegation);
            }
        }
        tx.commit()?;
        Ok(swept)
    }

    /// Page through delegations visible in `scope`, newest first.
    pub fn list(&self, scope: &ListScope, limit: u32, offset: u32) -> Result<Vec<Delegation>> {
        let (sql, binds): (String, Vec<&dyn rusqlite::ToSql>) = match scope {
            ListScope::All => (
                format!(
                    "SELECT {COLUMNS} FROM delegations ORDER BY created_at DESC LIMIT ?1 OFFSET ?2"
                ),
                vec![&limit, &offset],
            ),
            ListScope::Members(members) => {
                if members.is_empty() {
                    return Ok(Vec::new());
                }
                let marks = vec!["?"; members.len()].join(", ");
                let sql = format!(
                    "SELECT {COLUMNS} FROM delegations \
                     WHERE delegator IN ({marks}) OR delegatee IN ({marks}) \
                     ORDER BY created_at DESC LIMIT ? OFFSET ?"
                );
                let mut binds: Vec<&dyn rusqlite::ToSql> = Vec::new();
                binds.extend(members.iter().map(|m| m as &dyn rusqlite::ToSql));
                binds.extend(members.iter().map(|m| m as &dyn rusqlite::ToSql));
                binds.push(&limit);
                binds.push(&offset);
                (sql, binds)
            }
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(binds.as_slice(), RawRow::read)?;
        let raw: Vec<RawRow> = rows.collect::<rusqlite::Result<_>>()?;
        raw.into_iter().map(RawRow::decode).collect()
    }
}

fn constraint_to_conflict(e: rusqlite::Error, case_id: &str) -> Error {
    match &e {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::ActiveDelegationExists {
                case_id: case_id.to_string(),
            }
        }
        _ => Error::Database(e),
    }
}

/// A delegation row as stored, before timestamp/status decoding.
struct RawRow {
    id: String,
    case_id: String,
    delegator: String,
    delegatee: String,
    created_at: String,
    expiry_at: String,
    status: String,
    notes: Option<String>,
}

impl RawRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            case_id: row.get(1)?,
            delegator: row.get(2)?,
            delegatee: row.get(3)?,
            created_at: row.get(4)?,
            expiry_at: row.get(5)?,
            status: row.get(6)?,
            notes: row.get(7)?,
        })
    }

    fn decode(self) -> Result<Delegation> {
        let id = self
            .id
            .parse()
            .map_err(|e| Error::Corrupt(format!("bad delegation id {:?}: {e}", self.id)))?;
        Ok(Delegation {
            id: DelegationId(id),
            case_id: self.case_id,
            delegator: self.delegator,
            delegatee: self.delegatee,
            created_at: time::decode(&self.created_at)?,
            expiry_at: time::decode(&self.expiry_at)?,
            status: DelegationStatus::parse(&self.status)?,
            notes: self.notes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn delegation(case: &str, from: &str, to: &str, expires_in: Duration) -> Delegation {
        Delegation::new(case, from, to, Utc::now() + expires_in, None)
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let store = DelegationStore::in_memory().unwrap();
        store
            .insert_batch(&[delegation("C-1", "E1", "E2", Duration::hours(1))])
            .unwrap();

        // Second batch: C-2 is fine, C-1 conflicts. Nothing may land.
        let batch = [
            delegation("C-2", "E1", "E2", Duration::hours(1)),
            delegation("C-1", "E1", "E3", Duration::hours(1)),
        ];
        let err = store.insert_batch(&batch).unwrap_err();
        assert!(matches!(
            err,
            Error::ActiveDelegationExists { ref case_id } if case_id == "C-1"
        ));
        assert!(store.active_for_case("C-2").unwrap().is_none());
    }

    #[test]
    fn active_lookup_finds_only_active_rows() {
        let store = DelegationStore::in_memory().unwrap();
        let row = delegation("C-7", "E1", "E2", Duration::hours(1));
        store.insert_batch(std::slice::from_ref(&row)).unwrap();

        assert_eq!(store.active_for_case("C-7").unwrap().unwrap().id, row.id);
        assert!(store.mark_revoked(row.id).unwrap());
        assert!(store.active_for_case("C-7").unwrap().is_none());
        assert_eq!(
            store.get(row.id).unwrap().unwrap().status,
            DelegationStatus::Revoked
        );
    }

    #[test]
    fn revoke_loses_to_prior_terminal_transition() {
        let store = DelegationStore::in_memory().unwrap();
        let row = delegation("C-9", "E1", "E2", Duration::hours(1));
        store.insert_batch(std::slice::from_ref(&row)).unwrap();

        assert!(store.mark_revoked(row.id).unwrap());
        // Second conditional update affects zero rows.
        assert!(!store.mark_revoked(row.id).unwrap());
    }

    #[test]
    fn sweep_converts_due_rows_once() {
        let store = DelegationStore::in_memory().unwrap();
        let due = delegation("C-1", "E1", "E2", Duration::seconds(-1));
        let live = delegation("C-2", "E1", "E3", Duration::hours(1));
        store.insert_batch(&[due.clone(), live]).unwrap();

        let swept = store.sweep_expired(Utc::now()).unwrap();
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].id, due.id);
        assert_eq!(swept[0].status, DelegationStatus::Expired);

        // Already converted; an immediate second pass reports nothing.
        assert!(store.sweep_expired(Utc::now()).unwrap().is_empty());
        assert!(store.active_for_case("C-2").unwrap().is_some());
    }

    #[test]
    fn sweep_never_touches_revoked_rows() {
        let store = DelegationStore::in_memory().unwrap();
        let row = delegation("C-4", "E1", "E2", Duration::seconds(-5));
        store.insert_batch(std::slice::from_ref(&row)).unwrap();
        store.mark_revoked(row.id).unwrap();

        assert!(store.sweep_expired(Utc::now()).unwrap().is_empty());
        assert_eq!(
            store.get(row.id).unwrap().unwrap().status,
            DelegationStatus::Revoked
        );
    }

    #[test]
    fn terminal_rows_free_the_case_for_new_delegations() {
        let store = DelegationStore::in_memory().unwrap();
        let first = delegation("C-5", "E1", "E2", Duration::hours(1));
        store.insert_batch(std::slice::from_ref(&first)).unwrap();
        store.mark_revoked(first.id).unwrap();

        store
            .insert_batch(&[delegation("C-5", "E1", "E3", Duration::hours(1))])
            .unwrap();
    }

    #[test]
    fn list_scopes_to_members() {
        let store = DelegationStore::in_memory().unwrap();
        store
            .insert_batch(&[
                delegation("C-1", "E1", "E2", Duration::hours(1)),
                delegation("C-2", "E3", "E4", Duration::hours(1)),
            ])
            .unwrap();

        let all = store.list(&ListScope::All, 50, 0).unwrap();
        assert_eq!(all.len(), 2);

        let scope = ListScope::Members(vec!["E2".to_string()]);
        let mine = store.list(&scope, 50, 0).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].case_id, "C-1");

        let none = store.list(&ListScope::Members(Vec::new()), 50, 0).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("delegations.db");
        let row = delegation("C-1", "E1", "E2", Duration::hours(1));
        {
            let store = DelegationStore::open(&path).unwrap();
            store.insert_batch(std::slice::from_ref(&row)).unwrap();
        }
        let store = DelegationStore::open(&path).unwrap();
        let loaded = store.get(row.id).unwrap().unwrap();
        assert_eq!(loaded.case_id, row.case_id);
        assert_eq!(loaded.status, DelegationStatus::Active);
        // Timestamps round-trip at microsecond precision.
        assert_eq!(
            loaded.expiry_at.timestamp_micros(),
            row.expiry_at.timestamp_micros()
        );
    }
}
