#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Periscope - A BGP looking glass
//!
//! Periscope answers questions about a routing-table snapshot kept in SQLite
//! by an external loader: which route covers an address (longest-prefix
//! match), what a peer or an origin AS announces, and aggregate statistics
//! such as table sizes, CIDR distribution, community usage and top peers.
//! It can be used as both a command-line application and a library.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | `database` | Route store access only | `rusqlite`, `ipnet` |
//! | `lens` | Lookups, naming and statistics | `tokio`, `trust-dns-resolver` |
//! | `display` | Table formatting with `tabled` | `tabled` |
//! | `cli` | CLI binary with the HTTP API | All above + `clap`, `axum` |
//!
//! ```toml
//! # Route lookups and statistics without the CLI
//! periscope = { version = "0.3", default-features = false, features = ["lens"] }
//!
//! # Default (CLI binary)
//! periscope = "0.3"
//! ```
//!
//! # Architecture
//!
//! - **[`database`]**: SQLite connection, schema checks and the route table repository
//! - **`lens`**: High-level operations (feature-gated)
//!   - `names`: AS names and reverse DNS, degrading to `(DNS Error)`
//!   - `lookup`: Longest-prefix match, search, per-ASN listings
//!   - `stats`: Aggregates, their cache and the two refresh cadences
//! - **[`config`]**: Configuration management
//! - **`server`**: HTTP API (requires `cli`)
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use periscope::database::RouteStore;
//! use periscope::lens::lookup::PrefixResolver;
//!
//! let db = RouteStore::new("/var/lib/periscope/routes.sqlite3").open()?;
//! match PrefixResolver::new(&db).resolve("203.0.113.7") {
//!     Some(route) => println!("{} via AS{:?}", route.prefix, route.next_hop_asn),
//!     None => println!("no covering route"),
//! }
//! ```

pub mod config;

#[cfg(feature = "database")]
pub mod database;

// Lens module - feature gated
#[cfg(feature = "lens")]
pub mod lens;

// Server module - requires CLI feature
#[cfg(feature = "cli")]
pub mod server;

// =============================================================================
// Configuration (always available)
// =============================================================================

pub use config::{format_size, DataSourceStatus, PeriscopeConfig, RouteDatabaseInfo};

#[cfg(feature = "database")]
pub use config::get_database_info;

// =============================================================================
// Database Module
// =============================================================================

#[cfg(feature = "database")]
pub use database::{IpVersion, RouteDatabase, RouteEntry, RouteStore, RouteTableRepository};

// =============================================================================
// Lens Module
// =============================================================================

#[cfg(feature = "lens")]
pub use lens::utils::OutputFormat;

// =============================================================================
// Server Module (HTTP API) - requires "cli" feature
// =============================================================================

#[cfg(feature = "cli")]
pub use server::{create_axum_router, serve, start_server, ApiError, ServerConfig, ServerState};
