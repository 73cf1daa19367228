//! Route lookup lens module
//!
//! This module provides the point queries of the looking glass:
//! - Longest-prefix match of an address (`PrefixResolver`)
//! - Free-text search over next-hop ASNs and prefixes
//! - Per-ASN origin and transit listings
//!
//! Database work always completes before any name resolution is awaited, so
//! no SQLite connection is held across an `.await`.
//!
//! # Example
//!
//! ```rust,ignore
//! use periscope::database::RouteStore;
//! use periscope::lens::lookup::LookupLens;
//!
//! let lens = LookupLens::new(RouteStore::new("routes.sqlite3"), names);
//! if let Some(route) = lens.lookup("203.0.113.7").await {
//!     println!("{} originated by AS{} ({})", route.prefix, route.origin_as, route.name);
//! }
//! ```

use crate::database::{RouteDatabase, RouteEntry, RouteStore, RouteTableRepository};
use crate::lens::names::{AsName, NameResolver, ReverseName};
use crate::lens::utils::format_timestamp;
use anyhow::{anyhow, Result};
use futures::stream::{self, StreamExt};
use ipnet::IpNet;
use serde::Serialize;
use std::net::IpAddr;
use tracing::{debug, warn};

/// Maximum number of reverse lookups in flight for one listing
const REVERSE_DNS_CONCURRENCY: usize = 8;

// =============================================================================
// Prefix resolution
// =============================================================================

/// Find the most specific stored prefix covering `ip`
///
/// Tries the supernets of `ip` from the host route outwards (`/32 … /0`,
/// `/128 … /0`) and returns the first one `lookup` knows. A malformed address
/// or a failing lookup ends the search with `None`.
pub fn longest_match<F>(ip: &str, mut lookup: F) -> Option<RouteEntry>
where
    F: FnMut(&str) -> Result<Option<RouteEntry>>,
{
    let addr: IpAddr = match ip.trim().parse() {
        Ok(addr) => addr,
        Err(_) => {
            debug!("Not resolving malformed address {:?}", ip);
            return None;
        }
    };

    let max_len: u8 = match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    };

    for len in (0..=max_len).rev() {
        let network = match IpNet::new(addr, len) {
            Ok(net) => net.trunc(),
            Err(e) => {
                warn!("Invalid candidate prefix {}/{}: {}", addr, len, e);
                return None;
            }
        };

        match lookup(&network.to_string()) {
            Ok(Some(entry)) => return Some(entry),
            Ok(None) => {}
            Err(e) => {
                warn!("Prefix lookup for {} aborted at {}: {}", addr, network, e);
                return None;
            }
        }
    }

    debug!("No covering prefix for {}", addr);
    None
}

/// Longest-prefix-match resolver over the route table
pub struct PrefixResolver<'a> {
    routes: RouteTableRepository<'a>,
}

impl<'a> PrefixResolver<'a> {
    pub fn new(db: &'a RouteDatabase) -> Self {
        Self { routes: db.routes() }
    }

    /// The route whose prefix most specifically covers `ip`, if any
    pub fn resolve(&self, ip: &str) -> Option<RouteEntry> {
        longest_match(ip, |prefix| self.routes.find_by_prefix(prefix))
    }
}

// =============================================================================
// Types
// =============================================================================

/// A route as presented by point lookups
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteView {
    pub prefix: String,
    pub origin_as: u32,
    pub nexthop: String,
    pub next_hop_asn: u32,
    pub as_path: Option<Vec<u32>>,
    pub med: i64,
    pub local_pref: i64,
    pub communities: Vec<String>,
    /// Last update, `YYYY-MM-DD HH:MM:SS UTC`
    pub updated: String,
    /// Name of the origin AS
    pub name: AsName,
}

impl RouteView {
    pub fn new(entry: RouteEntry, default_asn: u32, name: AsName) -> Self {
        Self {
            updated: format_timestamp(entry.timestamp),
            origin_as: entry.origin_as.unwrap_or(default_asn),
            next_hop_asn: entry.next_hop_asn.unwrap_or(default_asn),
            prefix: entry.prefix,
            nexthop: entry.nexthop,
            as_path: entry.as_path,
            med: entry.med,
            local_pref: entry.local_pref,
            communities: entry.communities,
            name,
        }
    }
}

/// Result of a free-text search
///
/// A query that is itself a covered address yields that single route;
/// anything else yields `{"prefixes": [...]}`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SearchOutcome {
    Route(RouteView),
    Prefixes { prefixes: Vec<RouteView> },
}

/// A prefix originated by the queried AS
#[derive(Debug, Clone, Serialize)]
pub struct OriginPrefix {
    pub prefix: String,
    pub origin_as: u32,
    pub nexthop_ip: String,
    pub nexthop_ip_dns: ReverseName,
    pub nexthop_asn: u32,
    pub as_path: Option<Vec<u32>>,
    pub updated: String,
    pub name: AsName,
}

/// Everything known about one AS as an origin
#[derive(Debug, Clone, Serialize)]
pub struct AsnDetail {
    pub asn: u32,
    pub name: AsName,
    pub origin_prefix_count: usize,
    pub is_peer: bool,
    pub origin_prefix_list: Vec<OriginPrefix>,
}

/// Prefixes whose AS path passes through one AS
#[derive(Debug, Clone, Serialize)]
pub struct TransitDetail {
    pub asn: u32,
    pub name: AsName,
    pub transit_prefix_count: usize,
    pub transit_prefix_list: Vec<String>,
}

/// Split a search query into its numeric token and its match pattern
///
/// The last whitespace-separated integer token is matched against next-hop
/// ASNs; the whole lower-cased query is matched against prefixes.
pub fn parse_search_query(query: &str) -> (Option<u32>, String) {
    let number = query
        .split_whitespace()
        .filter_map(|token| token.parse::<u32>().ok())
        .last();
    (number, query.trim().to_lowercase())
}

// =============================================================================
// Lens
// =============================================================================

/// Lookup lens for point queries
///
/// Opens its own connection per query, so one lens can be shared across
/// request workers.
#[derive(Clone)]
pub struct LookupLens {
    store: RouteStore,
    names: NameResolver,
}

impl LookupLens {
    pub fn new(store: RouteStore, names: NameResolver) -> Self {
        Self { store, names }
    }

    fn default_asn(&self) -> u32 {
        self.names.default_asn()
    }

    /// Table key for an AS number: the default ASN stands for "unknown"
    fn asn_key(&self, asn: u32) -> Option<u32> {
        if asn == self.default_asn() {
            None
        } else {
            Some(asn)
        }
    }

    /// Longest-prefix match of `ip`; `None` when nothing covers it
    pub async fn lookup(&self, ip: &str) -> Option<RouteView> {
        let entry = {
            let db = match self.store.open() {
                Ok(db) => db,
                Err(e) => {
                    warn!("Route lookup for {} failed: {}", ip, e);
                    return None;
                }
            };
            PrefixResolver::new(&db).resolve(ip)
        }?;

        let name = self.names.asn_name(entry.origin_as).await;
        Some(RouteView::new(entry, self.default_asn(), name))
    }

    /// Free-text search by next-hop ASN or prefix substring
    pub async fn search(&self, query: &str) -> Result<SearchOutcome> {
        let (number, pattern) = parse_search_query(query);

        if let Some(route) = self.lookup(&pattern).await {
            return Ok(SearchOutcome::Route(route));
        }

        let entries = {
            let db = self.store.open()?;
            let routes = db.routes();
            routes.search(number, &pattern)?
        };

        let prefixes = self.views(entries).await;
        Ok(SearchOutcome::Prefixes { prefixes })
    }

    /// Prefixes originated by `asn`, with next-hop PTR names
    pub async fn asn_detail(&self, asn: u32) -> Result<AsnDetail> {
        let (entries, is_peer) = {
            let db = self.store.open()?;
            let routes = db.routes();
            (
                routes.find_by_origin(self.asn_key(asn))?,
                routes.is_peer(asn)?,
            )
        };

        let name = self.names.asn_name(Some(asn)).await;
        let default_asn = self.default_asn();

        let origin_prefix_list: Vec<OriginPrefix> = stream::iter(entries)
            .map(|entry| {
                let name = name.clone();
                async move {
                    let nexthop_ip_dns = self.names.reverse_dns(&entry.nexthop).await;
                    OriginPrefix {
                        updated: format_timestamp(entry.timestamp),
                        origin_as: entry.origin_as.unwrap_or(default_asn),
                        nexthop_asn: entry.next_hop_asn.unwrap_or(default_asn),
                        prefix: entry.prefix,
                        nexthop_ip: entry.nexthop,
                        nexthop_ip_dns,
                        as_path: entry.as_path,
                        name,
                    }
                }
            })
            .buffered(REVERSE_DNS_CONCURRENCY)
            .collect()
            .await;

        Ok(AsnDetail {
            asn,
            name,
            origin_prefix_count: origin_prefix_list.len(),
            is_peer,
            origin_prefix_list,
        })
    }

    /// Prefixes whose AS path contains `asn`
    pub async fn transit(&self, asn: u32) -> Result<TransitDetail> {
        let prefixes = {
            let db = self
                .store
                .open()
                .map_err(|e| anyhow!("Failed to open route database: {}", e))?;
            let routes = db.routes();
            routes.transit_prefixes(asn)?
        };

        Ok(TransitDetail {
            asn,
            name: self.names.asn_name(Some(asn)).await,
            transit_prefix_count: prefixes.len(),
            transit_prefix_list: prefixes,
        })
    }

    /// Attach origin names to entries, resolving each origin once
    async fn views(&self, entries: Vec<RouteEntry>) -> Vec<RouteView> {
        let default_asn = self.default_asn();
        let names = self
            .names
            .asn_names(entries.iter().map(|e| e.origin_as.unwrap_or(default_asn)))
            .await;

        entries
            .into_iter()
            .map(|entry| {
                let origin = entry.origin_as.unwrap_or(default_asn);
                let name = names.get(&origin).cloned().unwrap_or(AsName::Unavailable);
                RouteView::new(entry, default_asn, name)
            })
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::routes::fixtures::{route, test_database, test_store};
    use crate::lens::names::fake::{resolver, FakeDns};

    fn lens(entries: &[RouteEntry]) -> (tempfile::TempDir, LookupLens) {
        let (dir, store) = test_store(entries);
        let (names, _) = resolver(
            FakeDns::new()
                .with_as_name(13335, "CLOUDFLARENET")
                .with_as_name(3701, "NERONET")
                .with_ptr("198.51.100.1", "core1.example.net."),
            3701,
        );
        (dir, LookupLens::new(store, names))
    }

    #[test]
    fn test_candidate_order_is_outward() {
        let mut candidates = Vec::new();
        let result = longest_match("203.0.113.7", |prefix| {
            candidates.push(prefix.to_string());
            Ok(None)
        });

        assert!(result.is_none());
        assert_eq!(candidates.len(), 33);
        assert_eq!(candidates[0], "203.0.113.7/32");
        assert_eq!(candidates[1], "203.0.113.6/31");
        assert_eq!(candidates[8], "203.0.113.0/24");
        assert_eq!(candidates[32], "0.0.0.0/0");
    }

    #[test]
    fn test_ipv6_candidate_range() {
        let mut candidates = Vec::new();
        longest_match("2001:db8::1", |prefix| {
            candidates.push(prefix.to_string());
            Ok(None)
        });

        assert_eq!(candidates.len(), 129);
        assert_eq!(candidates[0], "2001:db8::1/128");
        assert_eq!(candidates[96], "2001:db8::/32");
        assert_eq!(candidates[128], "::/0");
    }

    #[test]
    fn test_most_specific_prefix_wins() {
        let db = test_database(&[
            route("10.0.0.0/8", Some(100), Some(200)),
            route("10.1.0.0/16", Some(101), Some(200)),
            route("10.1.2.0/24", Some(102), Some(200)),
        ]);
        let resolver = PrefixResolver::new(&db);

        assert_eq!(resolver.resolve("10.1.2.3").unwrap().prefix, "10.1.2.0/24");
        assert_eq!(resolver.resolve("10.1.3.3").unwrap().prefix, "10.1.0.0/16");
        assert_eq!(resolver.resolve("10.200.0.1").unwrap().prefix, "10.0.0.0/8");
        assert!(resolver.resolve("192.0.2.1").is_none());
    }

    #[test]
    fn test_default_route_and_ipv6() {
        let db = test_database(&[
            route("0.0.0.0/0", None, Some(200)),
            route("2001:db8::/32", Some(300), Some(200)),
        ]);
        let resolver = PrefixResolver::new(&db);

        assert_eq!(resolver.resolve("192.0.2.1").unwrap().prefix, "0.0.0.0/0");
        assert_eq!(
            resolver.resolve("2001:db8:1::1").unwrap().prefix,
            "2001:db8::/32"
        );
        assert!(resolver.resolve("2001:db9::1").is_none());
    }

    #[test]
    fn test_malformed_input_and_errors_are_not_found() {
        let db = test_database(&[route("10.0.0.0/8", Some(100), Some(200))]);
        let resolver = PrefixResolver::new(&db);
        assert!(resolver.resolve("not-an-ip").is_none());
        assert!(resolver.resolve("10.0.0.0/8").is_none());
        assert!(resolver.resolve("").is_none());

        let mut calls = 0;
        let result = longest_match("10.0.0.1", |_| {
            calls += 1;
            Err(anyhow!("database is locked"))
        });
        assert!(result.is_none());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_parse_search_query() {
        assert_eq!(parse_search_query("13335"), (Some(13335), "13335".to_string()));
        assert_eq!(
            parse_search_query("AS 174 3356"),
            (Some(3356), "as 174 3356".to_string())
        );
        assert_eq!(parse_search_query("2001:DB8::"), (None, "2001:db8::".to_string()));
    }

    #[tokio::test]
    async fn test_lookup_view() {
        let mut entry = route("1.1.1.0/24", Some(13335), None);
        entry.as_path = Some(vec![174, 13335]);
        let (_dir, lens) = lens(&[entry]);

        let view = lens.lookup("1.1.1.1").await.unwrap();
        assert_eq!(view.prefix, "1.1.1.0/24");
        assert_eq!(view.origin_as, 13335);
        assert_eq!(view.next_hop_asn, 3701);
        assert_eq!(view.updated, "2023-11-14 22:13:20 UTC");
        assert_eq!(view.name.to_string(), "CLOUDFLARENET");

        assert!(lens.lookup("8.8.8.8").await.is_none());
    }

    #[tokio::test]
    async fn test_lookup_without_database_is_not_found() {
        let (names, _) = resolver(FakeDns::new(), 3701);
        let lens = LookupLens::new(RouteStore::new("/nonexistent/dir/routes.sqlite3"), names);
        assert!(lens.lookup("10.0.0.1").await.is_none());
    }

    #[tokio::test]
    async fn test_search() {
        let (_dir, lens) = lens(&[
            route("1.1.1.0/24", Some(13335), Some(13335)),
            route("192.168.0.0/16", None, Some(64512)),
            route("192.168.1.0/24", None, Some(174)),
        ]);

        match lens.search("1.1.1.1").await.unwrap() {
            SearchOutcome::Route(view) => assert_eq!(view.prefix, "1.1.1.0/24"),
            other => panic!("expected a single route, got {:?}", other),
        }

        match lens.search("192.168").await.unwrap() {
            SearchOutcome::Prefixes { prefixes } => {
                assert_eq!(prefixes.len(), 2);
                assert_eq!(prefixes[0].name.to_string(), "NERONET");
            }
            other => panic!("expected a prefix list, got {:?}", other),
        }

        let json = serde_json::to_value(lens.search("174").await.unwrap()).unwrap();
        assert_eq!(json["prefixes"].as_array().unwrap().len(), 1);
        assert_eq!(json["prefixes"][0]["prefix"], "192.168.1.0/24");
    }

    #[tokio::test]
    async fn test_asn_detail() {
        let (_dir, lens) = lens(&[
            route("1.1.1.0/24", Some(13335), Some(13335)),
            route("1.0.0.0/24", Some(13335), Some(174)),
            route("203.0.113.0/24", None, Some(174)),
        ]);

        let detail = lens.asn_detail(13335).await.unwrap();
        assert_eq!(detail.origin_prefix_count, 2);
        assert!(detail.is_peer);
        assert_eq!(
            detail.origin_prefix_list[0].nexthop_ip_dns.to_string(),
            "core1.example.net"
        );

        // The default ASN lists routes without a known origin
        let own = lens.asn_detail(3701).await.unwrap();
        assert_eq!(own.origin_prefix_count, 1);
        assert_eq!(own.origin_prefix_list[0].origin_as, 3701);
        assert!(!own.is_peer);
    }

    #[tokio::test]
    async fn test_transit() {
        let mut a = route("10.0.0.0/8", Some(300), Some(100));
        a.as_path = Some(vec![100, 200, 300]);
        let mut b = route("10.1.0.0/16", Some(400), Some(100));
        b.as_path = Some(vec![100, 400]);
        let (_dir, lens) = lens(&[a, b, route("10.2.0.0/16", None, None)]);

        let transit = lens.transit(200).await.unwrap();
        assert_eq!(transit.transit_prefix_count, 1);
        assert_eq!(transit.transit_prefix_list, vec!["10.0.0.0/8"]);
        assert_eq!(lens.transit(100).await.unwrap().transit_prefix_count, 2);
    }
}
