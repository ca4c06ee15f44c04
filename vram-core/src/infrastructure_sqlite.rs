//! SQLite-backed RegistryStore implementation.
//! Keeps the registry across coordinator restarts.
//!
//! Enable with the `sqlite` feature flag:
//! ```toml
//! vram-core = { path = "../vram-core", features = ["sqlite"] }
//! ```

use rusqlite::{params, Connection};
use std::sync::Mutex;

use crate::error::StoreError;
use crate::infrastructure::{CollaboratorRecord, LeaseRecord, RegistryStore};
use crate::types::Priority;

/// A persistent registry store backed by SQLite.
///
/// Uses WAL mode. The connection sits behind a mutex so the store can be
/// shared with the async server.
pub struct SqliteRegistryStore {
    conn: Mutex<Connection>,
    path: String,
}

impl SqliteRegistryStore {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS collaborators (
                name        TEXT PRIMARY KEY,
                callback    TEXT,
                priority    TEXT NOT NULL DEFAULT 'medium',
                position    INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS leases (
                collaborator TEXT NOT NULL,
                resource     TEXT NOT NULL,
                amount       INTEGER NOT NULL,
                loaded       INTEGER NOT NULL DEFAULT 1,
                position     INTEGER NOT NULL,
                PRIMARY KEY (collaborator, resource)
            );
            CREATE INDEX IF NOT EXISTS idx_leases_collaborator ON leases(collaborator);",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_string(),
        })
    }

    fn parse_priority(s: &str) -> Priority {
        Priority::from_name(s).unwrap_or_default()
    }
}

impl RegistryStore for SqliteRegistryStore {
    fn load(&self) -> Result<Vec<CollaboratorRecord>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;

        let mut records = Vec::new();
        {
            let mut stmt = conn.prepare(
                "SELECT name, callback, priority FROM collaborators ORDER BY position",
            )?;
            let rows = stmt.query_map([], |row| {
                let priority: String = row.get(2)?;
                Ok(CollaboratorRecord {
                    name: row.get(0)?,
                    callback: row.get(1)?,
                    priority: Self::parse_priority(&priority),
                    leases: Vec::new(),
                })
            })?;
            for row in rows {
                records.push(row?);
            }
        }

        let mut stmt = conn.prepare(
            "SELECT resource, amount, loaded FROM leases WHERE collaborator = ?1 ORDER BY position",
        )?;
        for record in &mut records {
            let rows = stmt.query_map(params![record.name], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)? != 0,
                ))
            })?;
            for row in rows {
                let (resource, amount, loaded) = row?;
                let amount = u64::try_from(amount).map_err(|_| StoreError::AmountOutOfRange {
                    resource: resource.clone(),
                    amount: amount.into(),
                })?;
                record.leases.push(LeaseRecord {
                    resource,
                    amount,
                    loaded,
                });
            }
        }

        Ok(records)
    }

    fn save(&mut self, records: &[CollaboratorRecord]) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM leases", [])?;
        tx.execute("DELETE FROM collaborators", [])?;

        for (position, record) in records.iter().enumerate() {
            tx.execute(
                "INSERT INTO collaborators (name, callback, priority, position) VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.name,
                    record.callback,
                    record.priority.to_string(),
                    position as i64
                ],
            )?;
            for (lease_pos, lease) in record.leases.iter().enumerate() {
                // An early return drops `tx`, rolling the snapshot back
                let amount = i64::try_from(lease.amount).map_err(|_| StoreError::AmountOutOfRange {
                    resource: lease.resource.clone(),
                    amount: lease.amount.into(),
                })?;
                tx.execute(
                    "INSERT INTO leases (collaborator, resource, amount, loaded, position)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        record.name,
                        lease.resource,
                        amount,
                        lease.loaded as i64,
                        lease_pos as i64
                    ],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite ({})", self.path)
    }
}
