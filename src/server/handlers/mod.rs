//! HTTP route handlers
//!
//! Handlers are organized by resource:
//!
//! - `ip` - Longest-prefix match of one address (`/bgp/api/v1.0/ip/:ip`)
//! - `search` - Free-text route search (`/search/:query`)
//! - `stats` - Cached statistics and the peer list (`/bgp/api/v1.0/stats`, `/peers`)
//! - `asn` - Per-AS origin and transit listings (`/bgp/api/v1.0/asn/:asn[/transit]`)

pub mod asn;
pub mod ip;
pub mod search;
pub mod stats;

// Re-export all handlers for convenience
pub use asn::{asn_handler, transit_handler};
pub use ip::ip_handler;
pub use search::search_handler;
pub use stats::{peers_handler, stats_handler};
