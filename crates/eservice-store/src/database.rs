//! The store handle: one SQLite connection plus its change feed.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation.  It also owns the sending
//! half of the change feed: every helper that commits a write announces the
//! touched collection with [`Change`] once the write is durable.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use eservice_shared::constants::CHANGE_FEED_CAPACITY;
use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::changes::Change;
use crate::error::{Result, StoreError};
use crate::migrations;

/// Wrapper around a [`rusqlite::Connection`] plus its change feed.
pub struct Database {
    conn: Connection,
    changes: broadcast::Sender<Change>,
}

impl Database {
    /// Open the marketplace database in the platform data directory.
    ///
    /// Locations:
    /// - Linux:   `~/.local/share/eservice/eservice.db`
    /// - macOS:   `~/Library/Application Support/com.eservice.eservice/eservice.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\eservice\eservice\data\eservice.db`
    pub fn new() -> Result<Self> {
        let project_dirs =
            ProjectDirs::from("com", "eservice", "eservice").ok_or(StoreError::NoDataDir)?;

        let data_dir = project_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        let db_path = data_dir.join("eservice.db");

        tracing::info!(path = %db_path.display(), "opening database");

        Self::open_at(&db_path)
    }

    /// Open a database file at `path`, creating it and any missing parent
    /// directories.  Migrations run before this returns.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run_migrations(&conn)?;

        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);

        Ok(Self { conn, changes })
    }

    /// Replace the change feed with one of a different capacity.
    ///
    /// Must be called before anyone subscribes; existing receivers keep
    /// listening to the old feed and will see it close.
    pub fn with_change_capacity(mut self, capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        self.changes = changes;
        self
    }

    /// Subscribe to committed-write notifications.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }

    /// Announce a committed write.  Having no subscribers is not an error.
    pub(crate) fn notify(&self, change: Change) {
        let listeners = self.changes.send(change).unwrap_or(0);
        tracing::trace!(?change, listeners, "change published");
    }

    /// Raw connection access.
    ///
    /// Callers should prefer the typed helpers; writes made through the raw
    /// connection are not announced on the change feed.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Raw mutable connection access, for transactions.
    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Path of the database file, if it is file-backed.
    pub fn path(&self) -> Option<PathBuf> {
        self.conn.path().map(PathBuf::from)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Fresh database in a temp dir.  Keep the `TempDir` alive for the test.
    pub(crate) fn temp_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).expect("should open");
        (dir, db)
    }

    #[test]
    fn open_round_trip() {
        let (_dir, db) = temp_db();
        assert!(db.path().is_some());
    }

    #[test]
    fn open_creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("store.db");
        Database::open_at(&path).expect("should open");
        assert!(path.exists());
    }

    #[test]
    fn notify_reaches_subscribers() {
        let (_dir, db) = temp_db();
        let mut rx = db.subscribe_changes();
        db.notify(Change::Requests);
        assert_eq!(rx.try_recv().unwrap(), Change::Requests);
    }

    #[test]
    fn notify_without_subscribers_is_silent() {
        let (_dir, db) = temp_db();
        db.notify(Change::Profiles);
    }

    #[test]
    fn reopening_keeps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("again.db");
        drop(Database::open_at(&path).unwrap());
        let db = Database::open_at(&path).unwrap();
        let version: u32 = db
            .conn()
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, migrations::CURRENT_VERSION);
    }
}
