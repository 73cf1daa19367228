//! Lens module
//!
//! This module provides high-level "lens" abstractions that combine the route
//! store with name resolution and output shaping. Lenses are shared by the CLI
//! and the HTTP API.
//!
//! | Lens | Purpose |
//! |------|---------|
//! | `NameResolver` | AS names (Cymru TXT) and next-hop PTR names |
//! | `LookupLens` | Longest-prefix match, search, per-ASN listings |
//! | `StatsLens` | Aggregate statistics, cached and refreshed in the background |
//!
//! # Architecture
//!
//! Each lens module exports:
//! - A **Lens struct** - the main entry point for all operations
//! - **Output types** - serializable result shapes
//!
//! Database work happens on a connection opened per operation and always
//! completes before any DNS query is awaited.
//!
//! # Usage
//!
//! ```rust,ignore
//! use periscope::lens::lookup::LookupLens;
//! use periscope::lens::names::{NameResolver, SystemDns};
//! use periscope::lens::stats::{StatsCache, StatsLens};
//! ```

// =============================================================================
// Utility module
// =============================================================================
pub mod utils;

// =============================================================================
// Lenses
// =============================================================================

// NameResolver - AS and reverse DNS naming
pub mod names;

// LookupLens - point queries over the route table
pub mod lookup;

// StatsLens - aggregate statistics and their refresh schedule
pub mod stats;
