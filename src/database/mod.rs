//! Database module
//!
//! This module provides all database functionality for periscope, organized into:
//!
//! - **core**: Core database infrastructure (SQLite connections, schema management)
//! - **routes**: The routing-table snapshot and its read-only repository
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/           # Foundation
//! │   ├── connection  # SQLite DatabaseConn wrapper
//! │   └── schema      # Route table definition and presence check
//! │
//! └── routes/         # Routing-table snapshot
//!     └── table       # RouteEntry and RouteTableRepository
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use periscope::database::RouteStore;
//!
//! let store = RouteStore::new("/var/lib/periscope/routes.sqlite3");
//! let db = store.open()?;
//!
//! if let Some(entry) = db.routes().find_by_prefix("203.0.113.0/24")? {
//!     println!("{} via AS{:?}", entry.prefix, entry.next_hop_asn);
//! }
//! ```

pub mod core;
pub mod routes;

// SQLite connection and schema management
pub use core::{DatabaseConn, SchemaDefinitions, SchemaManager, SchemaStatus};

// Route table
pub use routes::{IpVersion, RouteDatabase, RouteEntry, RouteStore, RouteTableRepository};

