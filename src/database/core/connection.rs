//! Database connection management
//!
//! This module provides the SQLite connection wrapper used by the route store.

use anyhow::{anyhow, Result};
use rusqlite::{Connection, OpenFlags};
use std::time::Duration;

/// How long a reader waits on a lock held by the external table loader
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Core database connection wrapper
///
/// `DatabaseConn` provides a thin wrapper around SQLite connections.
/// File databases belong to the external table loader and are always
/// opened read-only; in-memory databases are writable so tests and
/// fixtures can build a table.
pub struct DatabaseConn {
    pub conn: Connection,
}

impl DatabaseConn {
    /// Open a database at the specified path
    ///
    /// If the path is `None`, an in-memory database is created.
    pub fn open(path: Option<&str>) -> Result<Self> {
        let conn = match path {
            Some(p) => Connection::open_with_flags(
                p,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(|e| anyhow!("Failed to open database at '{}': {}", p, e))?,
            None => Connection::open_in_memory()
                .map_err(|e| anyhow!("Failed to create in-memory database: {}", e))?,
        };

        let db = DatabaseConn { conn };
        db.configure()?;
        Ok(db)
    }

    /// Open an existing database file read-only (convenience method)
    pub fn open_path(path: &str) -> Result<Self> {
        Self::open(Some(path))
    }

    /// Create an in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::open(None)
    }

    /// Configure connection-local settings; nothing here is persisted to the file
    fn configure(&self) -> Result<()> {
        self.conn
            .busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| anyhow!("Failed to set busy timeout: {}", e))?;

        // Full-table scans benefit from a larger page cache (~100MB)
        self.conn
            .execute("PRAGMA cache_size=100000", [])
            .map_err(|e| anyhow!("Failed to set cache size: {}", e))?;

        self.conn
            .execute("PRAGMA temp_store=MEMORY", [])
            .map_err(|e| anyhow!("Failed to set temp store: {}", e))?;

        Ok(())
    }
}
