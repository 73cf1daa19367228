//! Database schema management
//!
//! The route table is written by an external loader and periscope never
//! alters a loader database. [`SchemaManager::check_status`] is the only
//! check run against one; [`SchemaManager::initialize`] exists for in-memory
//! databases and test fixtures.

use anyhow::{anyhow, Result};
use rusqlite::Connection;

/// Schema definitions for the route database
pub struct SchemaDefinitions;

impl SchemaDefinitions {
    /// SQL for creating the routing-table snapshot
    ///
    /// `as_path` and `communities` hold JSON arrays.
    pub const BGP_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS bgp (
            prefix TEXT PRIMARY KEY,
            ip_version INTEGER NOT NULL,
            origin_as INTEGER,
            next_hop_asn INTEGER,
            nexthop TEXT NOT NULL DEFAULT '',
            as_path TEXT,
            communities TEXT NOT NULL DEFAULT '[]',
            med INTEGER NOT NULL DEFAULT 0,
            local_pref INTEGER NOT NULL DEFAULT 0,
            timestamp INTEGER NOT NULL DEFAULT 0
        );
    "#;

    /// SQL for creating route table indexes
    pub const BGP_INDEXES: &'static [&'static str] = &[
        "CREATE INDEX IF NOT EXISTS idx_bgp_next_hop_asn ON bgp(next_hop_asn)",
        "CREATE INDEX IF NOT EXISTS idx_bgp_origin_as ON bgp(origin_as)",
        "CREATE INDEX IF NOT EXISTS idx_bgp_ip_version ON bgp(ip_version)",
    ];
}

/// Schema manager for the route database
pub struct SchemaManager<'a> {
    conn: &'a Connection,
}

impl<'a> SchemaManager<'a> {
    /// Create a new schema manager for the given connection
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create the route table and its indexes if they don't exist
    pub fn initialize(&self) -> Result<()> {
        self.conn
            .execute(SchemaDefinitions::BGP_TABLE, [])
            .map_err(|e| anyhow!("Failed to create bgp table: {}", e))?;

        for index_sql in SchemaDefinitions::BGP_INDEXES {
            self.conn
                .execute(index_sql, [])
                .map_err(|e| anyhow!("Failed to create bgp index: {}", e))?;
        }

        Ok(())
    }

    /// Check whether the route table is present
    pub fn check_status(&self) -> Result<SchemaStatus> {
        if self.table_exists("bgp")? {
            Ok(SchemaStatus::Ready)
        } else {
            Ok(SchemaStatus::MissingRouteTable)
        }
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        let exists: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [table],
                |row| row.get(0),
            )
            .map_err(|e| anyhow!("Failed to read sqlite_master: {}", e))?;
        Ok(exists > 0)
    }
}

/// Status of the database schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaStatus {
    /// The `bgp` table exists and can be queried
    Ready,

    /// The loader has not created the `bgp` table
    MissingRouteTable,
}
