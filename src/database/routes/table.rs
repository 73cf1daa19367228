//! Route table repository
//!
//! Read-only, typed access to the `bgp` routing-table snapshot. The table is
//! filled by an external loader; this repository only ever issues `SELECT`s.
//!
//! # Query Modes
//!
//! - **Exact match**: the entry stored under a canonical prefix string
//! - **Filtered scans**: by origin AS, by next-hop AS, by free-text search
//! - **Distinct values**: peers, next-hop addresses

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

const ROUTE_COLUMNS: &str = "prefix, ip_version, origin_as, next_hop_asn, nexthop, as_path, \
                             communities, med, local_pref, timestamp";

/// IP address family of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    /// Numeric version as stored in the `ip_version` column
    pub fn as_u8(self) -> u8 {
        match self {
            IpVersion::V4 => 4,
            IpVersion::V6 => 6,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            4 => Some(IpVersion::V4),
            6 => Some(IpVersion::V6),
            _ => None,
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IPv{}", self.as_u8())
    }
}

/// One routing-table entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Canonical CIDR string, unique within the snapshot
    pub prefix: String,
    /// 4 or 6
    pub ip_version: u8,
    /// Originating AS, if known
    pub origin_as: Option<u32>,
    /// AS of the peer that advertised the route, if known
    pub next_hop_asn: Option<u32>,
    /// Next-hop IP address
    pub nexthop: String,
    /// AS path, origin last
    pub as_path: Option<Vec<u32>>,
    /// BGP community strings, e.g. "3701:370"
    pub communities: Vec<String>,
    pub med: i64,
    pub local_pref: i64,
    /// Unix epoch seconds of the last update
    pub timestamp: i64,
}

impl RouteEntry {
    /// Mask length parsed from the prefix string
    pub fn mask_len(&self) -> Option<u8> {
        self.prefix.split_once('/')?.1.parse().ok()
    }

    pub fn version(&self) -> Option<IpVersion> {
        IpVersion::from_u8(self.ip_version)
    }

    /// Number of distinct ASNs on the path (prepending collapsed)
    pub fn distinct_path_len(&self) -> usize {
        self.as_path
            .as_ref()
            .map(|path| path.iter().collect::<BTreeSet<_>>().len())
            .unwrap_or(0)
    }

    pub fn has_community(&self, community: &str) -> bool {
        self.communities.iter().any(|c| c == community)
    }

    pub fn path_contains(&self, asn: u32) -> bool {
        self.as_path
            .as_ref()
            .map(|path| path.contains(&asn))
            .unwrap_or(false)
    }
}

/// Decode a row selected with [`ROUTE_COLUMNS`]
///
/// Only the prefix is required. Any other column holding a value of the wrong
/// type is read as absent, and JSON columns that fail to decode are read as
/// absent too, so one malformed row never fails a whole scan.
fn route_from_row(row: &Row<'_>) -> rusqlite::Result<RouteEntry> {
    let as_path: Option<String> = row.get(5).ok().flatten();
    let communities: Option<String> = row.get(6).ok().flatten();

    Ok(RouteEntry {
        prefix: row.get(0)?,
        ip_version: row
            .get::<_, Option<i64>>(1)
            .ok()
            .flatten()
            .and_then(|v| u8::try_from(v).ok())
            .unwrap_or(0),
        origin_as: row.get::<_, Option<u32>>(2).ok().flatten(),
        next_hop_asn: row.get::<_, Option<u32>>(3).ok().flatten(),
        nexthop: row
            .get::<_, Option<String>>(4)
            .ok()
            .flatten()
            .unwrap_or_default(),
        as_path: as_path.and_then(|s| serde_json::from_str(&s).ok()),
        communities: communities
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        med: row.get::<_, Option<i64>>(7).ok().flatten().unwrap_or(0),
        local_pref: row.get::<_, Option<i64>>(8).ok().flatten().unwrap_or(0),
        timestamp: row.get::<_, Option<i64>>(9).ok().flatten().unwrap_or(0),
    })
}

/// Whether a row error comes from a value of the wrong type rather than from SQLite
fn is_decode_error(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::IntegralValueOutOfRange(..)
    )
}

/// Repository for routing-table queries
pub struct RouteTableRepository<'a> {
    conn: &'a Connection,
}

impl<'a> RouteTableRepository<'a> {
    /// Create a new route table repository
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Total number of entries
    pub fn count(&self) -> Result<u64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM bgp", [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to count routes: {}", e))
    }

    /// Check if the table holds no entries
    pub fn is_empty(&self) -> bool {
        self.count().unwrap_or(0) == 0
    }

    /// Exact match on the stored prefix string
    pub fn find_by_prefix(&self, prefix: &str) -> Result<Option<RouteEntry>> {
        let sql = format!("SELECT {} FROM bgp WHERE prefix = ?1", ROUTE_COLUMNS);
        match self.conn.query_row(&sql, [prefix], route_from_row) {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(anyhow!("Failed to look up prefix {}: {}", prefix, e)),
        }
    }

    /// Every entry, in storage order
    pub fn scan_all(&self) -> Result<Vec<RouteEntry>> {
        let sql = format!("SELECT {} FROM bgp ORDER BY rowid", ROUTE_COLUMNS);
        self.query_routes(&sql, [])
    }

    /// Entries originated by `origin_as`; `None` selects entries without a known origin
    pub fn find_by_origin(&self, origin_as: Option<u32>) -> Result<Vec<RouteEntry>> {
        let sql = format!(
            "SELECT {} FROM bgp WHERE origin_as IS ?1 ORDER BY rowid",
            ROUTE_COLUMNS
        );
        self.query_routes(&sql, params![origin_as])
    }

    /// Free-text search: next-hop AS equal to `number`, or `pattern` found in the prefix
    pub fn search(&self, number: Option<u32>, pattern: &str) -> Result<Vec<RouteEntry>> {
        let sql = format!(
            "SELECT {} FROM bgp
             WHERE next_hop_asn = ?1 OR (?2 <> '' AND instr(prefix, ?2) > 0)
             ORDER BY rowid",
            ROUTE_COLUMNS
        );
        self.query_routes(&sql, params![number, pattern])
    }

    /// Number of entries for an address family
    pub fn count_by_version(&self, version: IpVersion) -> Result<u64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM bgp WHERE ip_version = ?1",
                [version.as_u8()],
                |row| row.get(0),
            )
            .map_err(|e| anyhow!("Failed to count {} routes: {}", version, e))
    }

    /// Number of entries advertised by a peer, optionally restricted to one family
    pub fn count_by_next_hop_asn(
        &self,
        asn: Option<u32>,
        version: Option<IpVersion>,
    ) -> Result<u64> {
        let result = match version {
            Some(v) => self.conn.query_row(
                "SELECT COUNT(*) FROM bgp WHERE next_hop_asn IS ?1 AND ip_version = ?2",
                params![asn, v.as_u8()],
                |row| row.get(0),
            ),
            None => self.conn.query_row(
                "SELECT COUNT(*) FROM bgp WHERE next_hop_asn IS ?1",
                params![asn],
                |row| row.get(0),
            ),
        };
        result.map_err(|e| anyhow!("Failed to count routes by next-hop AS: {}", e))
    }

    /// Number of entries originated by `origin_as`
    pub fn count_by_origin(&self, origin_as: Option<u32>) -> Result<u64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM bgp WHERE origin_as IS ?1",
                params![origin_as],
                |row| row.get(0),
            )
            .map_err(|e| anyhow!("Failed to count routes by origin: {}", e))
    }

    /// Distinct next-hop ASNs (including the unknown peer), in first-seen order
    pub fn distinct_next_hop_asns(&self) -> Result<Vec<Option<u32>>> {
        let mut stmt = self.conn.prepare(
            "SELECT next_hop_asn FROM bgp GROUP BY next_hop_asn ORDER BY MIN(rowid)",
        )?;
        // Groups whose value is not an ASN are not peers
        let rows = stmt.query_map([], |row| Ok(row.get::<_, Option<u32>>(0).ok()))?;

        let mut results = Vec::new();
        for row in rows {
            match row? {
                Some(asn) => results.push(asn),
                None => debug!("Skipping next_hop_asn group that is not an ASN"),
            }
        }
        Ok(results)
    }

    /// Whether `asn` appears as a next-hop AS anywhere in the table
    pub fn is_peer(&self, asn: u32) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM bgp WHERE next_hop_asn = ?1)",
                [asn],
                |row| row.get(0),
            )
            .map_err(|e| anyhow!("Failed to check peer AS{}: {}", asn, e))
    }

    /// Distinct next-hop addresses
    pub fn distinct_nexthops(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT nexthop FROM bgp ORDER BY nexthop")?;
        let rows = stmt.query_map([], |row| Ok(row.get::<_, String>(0).ok()))?;

        let mut results = Vec::new();
        for row in rows {
            results.extend(row?);
        }
        Ok(results)
    }

    /// Distinct next-hop addresses used by one peer
    pub fn distinct_nexthops_for_peer(&self, asn: Option<u32>) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT nexthop FROM bgp WHERE next_hop_asn IS ?1 ORDER BY nexthop",
        )?;
        let rows = stmt.query_map(params![asn], |row| Ok(row.get::<_, String>(0).ok()))?;

        let mut results = Vec::new();
        for row in rows {
            results.extend(row?);
        }
        Ok(results)
    }

    /// Prefixes whose AS path passes through `asn`
    pub fn transit_prefixes(&self, asn: u32) -> Result<Vec<String>> {
        Ok(self
            .scan_all()?
            .into_iter()
            .filter(|entry| entry.path_contains(asn))
            .map(|entry| entry.prefix)
            .collect())
    }

    fn query_routes<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<RouteEntry>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| anyhow!("Failed to prepare route query: {}", e))?;
        let rows = stmt
            .query_map(params, route_from_row)
            .map_err(|e| anyhow!("Failed to query routes: {}", e))?;

        let mut results = Vec::new();
        for row in rows {
            match row {
                Ok(entry) => results.push(entry),
                Err(e) if is_decode_error(&e) => debug!("Skipping undecodable route row: {}", e),
                Err(e) => return Err(anyhow!("Failed to read route row: {}", e)),
            }
        }
        Ok(results)
    }
}
