//! Statistics output types

use crate::lens::names::AsName;
use crate::lens::utils::format_timestamp;
use serde::Serialize;

/// Prefix count of one peer, as listed in the top-N table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopPeer {
    pub asn: u32,
    pub count: u64,
    pub name: AsName,
}

/// Per-ASN prefix counts, used for both the peer and the customer lists
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AsnSummary {
    pub asn: u32,
    pub name: AsName,
    pub ipv4_count: u64,
    pub ipv6_count: u64,
}

/// Number of prefixes with one mask length in one address family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CidrCount {
    pub mask: u8,
    pub count: u64,
    pub ip_version: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommunityCount {
    pub community: String,
    pub count: u64,
}

/// A peer with its next hops and origin/transit profile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerDetail {
    pub asn: u32,
    pub name: AsName,
    pub next_hop_ips: Vec<String>,
    pub origin_prefix_count: u64,
    pub nexthop_prefix_count: u64,
    /// More prefixes are received through this peer than it originates
    pub transit_provider: bool,
}

/// Metrics refreshed on the fast cadence
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FastStats {
    pub peer_count: u64,
    pub ipv4_table_size: u64,
    pub ipv6_table_size: u64,
    pub nexthop_ip_count: u64,
    pub customer_count: u64,
    pub customer_ipv4_prefixes: u64,
    pub customer_ipv6_prefixes: u64,
    /// Epoch seconds of the refresh that produced these values
    #[serde(skip)]
    pub computed_at: Option<i64>,
}

/// Metrics refreshed on the slow cadence
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlowStats {
    pub avg_as_path_length: f64,
    pub top_n_peers: Vec<TopPeer>,
    pub cidr_breakdown: Vec<CidrCount>,
    pub communities: Vec<CommunityCount>,
    pub peers: Vec<AsnSummary>,
    pub customers: Vec<AsnSummary>,
    #[serde(skip)]
    pub computed_at: Option<i64>,
}

/// The aggregate statistics document served to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub peer_count: u64,
    pub ipv4_table_size: u64,
    pub ipv6_table_size: u64,
    pub nexthop_ip_count: u64,
    pub avg_as_path_length: f64,
    pub top_n_peers: Vec<TopPeer>,
    pub cidr_breakdown: Vec<CidrCount>,
    pub communities: Vec<CommunityCount>,
    pub peers: Vec<AsnSummary>,
    pub customers: Vec<AsnSummary>,
    pub customer_count: u64,
    pub customer_ipv4_prefixes: u64,
    pub customer_ipv6_prefixes: u64,
    /// Time of the most recent refresh of either half
    pub timestamp: String,
}

impl StatsSnapshot {
    /// Combine the two halves; `fallback_time` is used before any refresh completed
    pub fn combine(fast: &FastStats, slow: &SlowStats, fallback_time: i64) -> Self {
        let latest = fast
            .computed_at
            .into_iter()
            .chain(slow.computed_at)
            .max()
            .unwrap_or(fallback_time);

        Self {
            peer_count: fast.peer_count,
            ipv4_table_size: fast.ipv4_table_size,
            ipv6_table_size: fast.ipv6_table_size,
            nexthop_ip_count: fast.nexthop_ip_count,
            avg_as_path_length: slow.avg_as_path_length,
            top_n_peers: slow.top_n_peers.clone(),
            cidr_breakdown: slow.cidr_breakdown.clone(),
            communities: slow.communities.clone(),
            peers: slow.peers.clone(),
            customers: slow.customers.clone(),
            customer_count: fast.customer_count,
            customer_ipv4_prefixes: fast.customer_ipv4_prefixes,
            customer_ipv6_prefixes: fast.customer_ipv6_prefixes,
            timestamp: format_timestamp(latest),
        }
    }
}
