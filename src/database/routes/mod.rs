//! Route database storage
//!
//! The route database holds the routing-table snapshot (`bgp` table) that an
//! external loader keeps up to date. Periscope opens it read-only and only
//! checks that the `bgp` table exists.

mod table;

pub use table::{IpVersion, RouteEntry, RouteTableRepository};

use crate::database::core::{DatabaseConn, SchemaManager, SchemaStatus};
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

/// Route database handle (SQLite backend)
///
/// `RouteDatabase` wraps one SQLite connection and hands out the route table
/// repository. Connections are not `Sync`; open one per unit of work via
/// [`RouteStore::open`].
pub struct RouteDatabase {
    db: DatabaseConn,
}

impl RouteDatabase {
    /// Open an existing route database read-only
    ///
    /// Fails when the file does not exist or has no `bgp` table.
    pub fn open(path: &str) -> Result<Self> {
        let db = DatabaseConn::open_path(path)?;
        match SchemaManager::new(&db.conn).check_status()? {
            SchemaStatus::Ready => Ok(Self { db }),
            SchemaStatus::MissingRouteTable => Err(anyhow!(
                "Route database at '{}' has no bgp table",
                path
            )),
        }
    }

    /// Create an in-memory route database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let db = DatabaseConn::open_in_memory()?;
        SchemaManager::new(&db.conn).initialize()?;
        Ok(Self { db })
    }

    /// Get the route table repository
    pub fn routes(&self) -> RouteTableRepository<'_> {
        RouteTableRepository::new(&self.db.conn)
    }

    /// Get the underlying database connection (for advanced queries)
    pub fn connection(&self) -> &rusqlite::Connection {
        &self.db.conn
    }
}

/// Cloneable handle on the route database location
///
/// Every request handler and refresh task opens its own connection from the
/// store and finishes its database work before awaiting anything.
#[derive(Debug, Clone)]
pub struct RouteStore {
    path: PathBuf,
}

impl RouteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a fresh connection to the route database
    pub fn open(&self) -> Result<RouteDatabase> {
        RouteDatabase::open(&self.path.to_string_lossy())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{route, test_store};
    use super::*;

    fn table_names(conn: &rusqlite::Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn test_open_in_memory() {
        let db = RouteDatabase::open_in_memory().unwrap();
        assert!(db.routes().is_empty());
    }

    #[test]
    fn test_store_opens_independent_connections() {
        let (_dir, store) = test_store(&[route("10.0.0.0/8", Some(100), Some(200))]);

        let first = store.open().unwrap();
        let second = store.open().unwrap();
        assert_eq!(first.routes().count().unwrap(), 1);
        assert_eq!(second.routes().count().unwrap(), 1);
    }

    #[test]
    fn test_open_leaves_loader_database_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loader.sqlite3");

        // A loader that created only the route table, without indexes
        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute(crate::database::SchemaDefinitions::BGP_TABLE, [])
                .unwrap();
            conn.execute(
                "INSERT INTO bgp (prefix, ip_version) VALUES ('10.0.0.0/8', 4)",
                [],
            )
            .unwrap();
        }

        let db = RouteStore::new(&path).open().unwrap();
        assert_eq!(db.routes().count().unwrap(), 1);
        drop(db);

        let conn = rusqlite::Connection::open(&path).unwrap();
        assert_eq!(table_names(&conn), vec!["bgp".to_string()]);
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "delete");
        let indexes: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name LIKE 'idx_bgp_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(indexes, 0);
    }

    #[test]
    fn test_open_missing_file_does_not_create_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.sqlite3");

        assert!(RouteStore::new(&path).open().is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_open_without_route_table_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.sqlite3");
        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE other (id INTEGER);").unwrap();
        }

        let err = RouteStore::new(&path).open().err().unwrap();
        assert!(err.to_string().contains("no bgp table"));

        let conn = rusqlite::Connection::open(&path).unwrap();
        assert_eq!(table_names(&conn), vec!["other".to_string()]);
    }
}
