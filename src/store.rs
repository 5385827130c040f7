//! Run record store.
//!
//! A single SQLite table of completed runs, plus a reactive view: the full
//! newest-first result set is republished through a watch channel after every
//! mutating operation, so the presentation layer always renders the latest
//! history without polling the database.

use std::path::Path;

use rusqlite::{params, Connection};
use thiserror::Error;
use tokio::sync::watch;

use crate::model::{NewRun, Run};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// DDL for a fresh database. `IF NOT EXISTS` keeps it idempotent; databases
/// created before `distance_in_meters` existed are upgraded in
/// `migrate_schema`.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS run_history_table (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    date               TEXT NOT NULL,
    duration           TEXT NOT NULL,      -- "MM:SS:CC"
    shuttles           INTEGER NOT NULL,
    distance_in_meters REAL NOT NULL DEFAULT 0.0
);
"#;

/// Store of completed runs. Insert and delete only; records are never
/// updated in place.
pub struct RunStore {
    conn: Connection,
    publisher: watch::Sender<Vec<Run>>,
}

impl RunStore {
    /// Open (or create) the database at `path`, creating parent directories
    /// as needed.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_conn(Connection::open(path)?)
    }

    /// In-memory database, used by tests.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::from_conn(Connection::open_in_memory()?)
    }

    fn from_conn(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL)?;
        migrate_schema(&conn)?;
        let (publisher, _) = watch::channel(Vec::new());
        let store = Self { conn, publisher };
        store.republish()?;
        Ok(store)
    }

    /// Live newest-first view of all records. The value is replaced after
    /// every insert or delete.
    pub fn observe(&self) -> watch::Receiver<Vec<Run>> {
        self.publisher.subscribe()
    }

    /// Append a record; the store assigns the next ascending id.
    pub fn insert(&self, run: &NewRun) -> Result<Run, StoreError> {
        self.conn.execute(
            "INSERT INTO run_history_table (date, duration, shuttles, distance_in_meters)
             VALUES (?1, ?2, ?3, ?4)",
            params![run.date, run.duration, run.shuttles, run.distance_in_meters],
        )?;
        let id = self.conn.last_insert_rowid();
        self.republish()?;
        Ok(Run {
            id,
            date: run.date.clone(),
            duration: run.duration.clone(),
            shuttles: run.shuttles,
            distance_in_meters: run.distance_in_meters,
        })
    }

    /// All records, most recently inserted first.
    pub fn all_runs(&self) -> Result<Vec<Run>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, duration, shuttles, distance_in_meters
             FROM run_history_table ORDER BY id DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Run {
                id: row.get(0)?,
                date: row.get(1)?,
                duration: row.get(2)?,
                shuttles: row.get(3)?,
                distance_in_meters: row.get(4)?,
            })
        })?;

        let mut runs = Vec::new();
        for r in rows {
            runs.push(r?);
        }
        Ok(runs)
    }

    /// Remove the record with the given id. Returns whether a row was
    /// actually deleted.
    pub fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let n = self
            .conn
            .execute("DELETE FROM run_history_table WHERE id = ?1", params![id])?;
        self.republish()?;
        Ok(n > 0)
    }

    fn republish(&self) -> Result<(), StoreError> {
        let runs = self.all_runs()?;
        self.publisher.send_replace(runs);
        Ok(())
    }
}

/// Additive migration for databases predating the distance column. Old rows
/// read back with distance 0.0.
fn migrate_schema(conn: &Connection) -> Result<(), StoreError> {
    let has_distance = conn
        .prepare("SELECT distance_in_meters FROM run_history_table LIMIT 0")
        .is_ok();
    if !has_distance {
        conn.execute_batch(
            "ALTER TABLE run_history_table ADD COLUMN distance_in_meters REAL NOT NULL DEFAULT 0.0;",
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(duration: &str, shuttles: u32) -> NewRun {
        NewRun {
            date: "01/08/2026".into(),
            duration: duration.into(),
            shuttles,
            distance_in_meters: 42.5,
        }
    }

    #[test]
    fn insert_assigns_ascending_ids() {
        let store = RunStore::in_memory().unwrap();
        let a = store.insert(&sample("00:10:00", 1)).unwrap();
        let b = store.insert(&sample("00:20:00", 2)).unwrap();
        assert!(b.id > a.id);
    }

    #[test]
    fn all_runs_is_newest_first() {
        let store = RunStore::in_memory().unwrap();
        store.insert(&sample("00:10:00", 1)).unwrap();
        store.insert(&sample("00:20:00", 2)).unwrap();
        store.insert(&sample("00:30:00", 3)).unwrap();

        let runs = store.all_runs().unwrap();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].shuttles, 3);
        assert_eq!(runs[2].shuttles, 1);
    }

    #[test]
    fn delete_removes_exactly_one_record() {
        let store = RunStore::in_memory().unwrap();
        store.insert(&sample("00:10:00", 1)).unwrap();
        let victim = store.insert(&sample("00:20:00", 2)).unwrap();
        store.insert(&sample("00:30:00", 3)).unwrap();

        assert!(store.delete(victim.id).unwrap());
        let runs = store.all_runs().unwrap();
        assert_eq!(runs.len(), 2);
        assert!(runs.iter().all(|r| r.id != victim.id));

        // Deleting again is a no-op.
        assert!(!store.delete(victim.id).unwrap());
        assert_eq!(store.all_runs().unwrap().len(), 2);
    }

    #[test]
    fn observer_sees_inserts_and_deletes() {
        let store = RunStore::in_memory().unwrap();
        let rx = store.observe();
        assert!(rx.borrow().is_empty());

        let run = store.insert(&sample("00:10:00", 1)).unwrap();
        assert_eq!(rx.borrow().len(), 1);
        assert_eq!(rx.borrow()[0].id, run.id);

        store.delete(run.id).unwrap();
        assert!(rx.borrow().is_empty());
    }

    #[test]
    fn opens_database_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("runs.db");
        {
            let store = RunStore::open(&path).unwrap();
            store.insert(&sample("00:10:00", 5)).unwrap();
        }
        let store = RunStore::open(&path).unwrap();
        let runs = store.all_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].shuttles, 5);
    }

    #[test]
    fn migrates_table_without_distance_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.db");

        // v1 layout: no distance_in_meters column.
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE run_history_table (
                    id       INTEGER PRIMARY KEY AUTOINCREMENT,
                    date     TEXT NOT NULL,
                    duration TEXT NOT NULL,
                    shuttles INTEGER NOT NULL
                 );
                 INSERT INTO run_history_table (date, duration, shuttles)
                 VALUES ('01/01/2025', '01:02:03', 7);",
            )
            .unwrap();
        }

        let store = RunStore::open(&path).unwrap();
        let runs = store.all_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].shuttles, 7);
        assert_eq!(runs[0].distance_in_meters, 0.0);

        // New inserts carry a real distance.
        store.insert(&sample("00:10:00", 1)).unwrap();
        let runs = store.all_runs().unwrap();
        assert_eq!(runs[0].distance_in_meters, 42.5);
    }
}
