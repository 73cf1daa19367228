//! Statistics lens module
//!
//! This module provides the aggregate side of the looking glass:
//!
//! - `StatsAggregator`: synchronous metrics over one route table connection
//! - `StatsLens`: computes the fast and slow halves off the async runtime and
//!   attaches AS names
//! - `StatsCache`: the published halves, swapped atomically
//! - `RefreshScheduler`: two periodic tasks keeping the cache current
//!
//! # Example
//!
//! ```rust,ignore
//! use periscope::lens::stats::{RefreshScheduler, StatsCache, StatsLens, StatsSettings};
//! use std::sync::Arc;
//!
//! let lens = StatsLens::new(store, names, StatsSettings::from_config(&config));
//! let cache = Arc::new(StatsCache::new());
//! let handle = RefreshScheduler::from_config(lens, cache.clone(), &config).spawn();
//!
//! let snapshot = cache.snapshot();
//! println!("{} peers, {} IPv4 prefixes", snapshot.peer_count, snapshot.ipv4_table_size);
//! ```

mod aggregate;
mod cache;
mod types;

pub use aggregate::{AsnTally, CustomerTallies, PeerTally, PeerUsage, StatsAggregator};
pub use cache::{RefreshHandle, RefreshScheduler, StatsCache};
pub use types::{
    AsnSummary, CidrCount, CommunityCount, FastStats, PeerDetail, SlowStats, StatsSnapshot,
    TopPeer,
};

use crate::config::PeriscopeConfig;
use crate::database::{IpVersion, RouteStore};
use crate::lens::names::{AsName, NameResolver};
use anyhow::{anyhow, Result};
use chrono::Utc;
use std::collections::HashMap;
use tracing::debug;

/// Parameters of the statistics computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSettings {
    pub default_asn: u32,
    pub customer_community: String,
    pub top_peers: usize,
}

impl StatsSettings {
    pub fn from_config(config: &PeriscopeConfig) -> Self {
        Self {
            default_asn: config.default_asn,
            customer_community: config.customer_community.clone(),
            top_peers: config.top_peers,
        }
    }
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self::from_config(&PeriscopeConfig::default())
    }
}

/// Slow-cadence metrics before names are attached
struct SlowTallies {
    avg_as_path_length: f64,
    top_peers: Vec<PeerTally>,
    cidr_breakdown: Vec<CidrCount>,
    communities: Vec<CommunityCount>,
    peers: Vec<AsnTally>,
    customers: Vec<AsnTally>,
}

/// Statistics lens
///
/// Each computation opens its own connection on a blocking thread and
/// finishes all database work before names are resolved.
#[derive(Clone)]
pub struct StatsLens {
    store: RouteStore,
    names: NameResolver,
    settings: StatsSettings,
}

impl StatsLens {
    pub fn new(store: RouteStore, names: NameResolver, settings: StatsSettings) -> Self {
        Self {
            store,
            names,
            settings,
        }
    }

    /// Run `work` against a fresh aggregator on the blocking pool
    async fn with_aggregator<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&StatsAggregator<'_>, &StatsSettings) -> Result<T> + Send + 'static,
    {
        let store = self.store.clone();
        let settings = self.settings.clone();

        tokio::task::spawn_blocking(move || {
            let db = store.open()?;
            let aggregator = StatsAggregator::new(db.routes(), settings.default_asn);
            work(&aggregator, &settings)
        })
        .await
        .map_err(|e| anyhow!("Statistics task failed: {}", e))?
    }

    /// Compute the fast half: counts and customer totals
    pub async fn fast(&self) -> Result<FastStats> {
        let stats = self
            .with_aggregator(|agg, settings| {
                let customers = agg.customers(&settings.customer_community)?;
                Ok(FastStats {
                    peer_count: agg.peer_count()?,
                    ipv4_table_size: agg.prefix_count(IpVersion::V4)?,
                    ipv6_table_size: agg.prefix_count(IpVersion::V6)?,
                    nexthop_ip_count: agg.nexthop_ip_count()?,
                    customer_count: customers.customers.len() as u64,
                    customer_ipv4_prefixes: customers.ipv4_total,
                    customer_ipv6_prefixes: customers.ipv6_total,
                    computed_at: Some(Utc::now().timestamp()),
                })
            })
            .await?;

        debug!(
            "Fast statistics: {} peers, {} IPv4 / {} IPv6 prefixes",
            stats.peer_count, stats.ipv4_table_size, stats.ipv6_table_size
        );
        Ok(stats)
    }

    /// Compute the slow half: breakdowns and named peer lists
    pub async fn slow(&self) -> Result<SlowStats> {
        let tallies = self
            .with_aggregator(|agg, settings| {
                Ok(SlowTallies {
                    avg_as_path_length: agg.avg_as_path_length()?,
                    top_peers: agg.top_peers(settings.top_peers)?,
                    cidr_breakdown: agg.cidr_breakdown()?,
                    communities: agg.communities_count()?,
                    peers: agg.peers()?,
                    customers: agg.customers(&settings.customer_community)?.customers,
                })
            })
            .await?;

        let names = self
            .names
            .asn_names(
                tallies
                    .top_peers
                    .iter()
                    .map(|p| p.asn)
                    .chain(tallies.peers.iter().map(|p| p.asn))
                    .chain(tallies.customers.iter().map(|c| c.asn)),
            )
            .await;

        let stats = SlowStats {
            avg_as_path_length: tallies.avg_as_path_length,
            top_n_peers: tallies
                .top_peers
                .iter()
                .map(|p| TopPeer {
                    asn: p.asn,
                    count: p.count,
                    name: name_of(&names, p.asn),
                })
                .collect(),
            cidr_breakdown: tallies.cidr_breakdown,
            communities: tallies.communities,
            peers: summaries(&tallies.peers, &names),
            customers: summaries(&tallies.customers, &names),
            computed_at: Some(Utc::now().timestamp()),
        };

        debug!(
            "Slow statistics: {} peers, {} customers, {} communities",
            stats.peers.len(),
            stats.customers.len(),
            stats.communities.len()
        );
        Ok(stats)
    }

    /// Compute both halves inline
    pub async fn snapshot(&self) -> Result<StatsSnapshot> {
        let (fast, slow) = tokio::try_join!(self.fast(), self.slow())?;
        Ok(StatsSnapshot::combine(&fast, &slow, Utc::now().timestamp()))
    }

    /// Every peer with its next hops and origin/transit profile
    pub async fn peer_details(&self) -> Result<Vec<PeerDetail>> {
        let usage = self.with_aggregator(|agg, _| agg.peer_usage()).await?;
        let names = self.names.asn_names(usage.iter().map(|u| u.asn)).await;

        Ok(usage
            .into_iter()
            .map(|u| PeerDetail {
                name: name_of(&names, u.asn),
                transit_provider: u.nexthop_prefix_count > u.origin_prefix_count,
                asn: u.asn,
                next_hop_ips: u.next_hop_ips,
                origin_prefix_count: u.origin_prefix_count,
                nexthop_prefix_count: u.nexthop_prefix_count,
            })
            .collect())
    }
}

fn name_of(names: &HashMap<u32, AsName>, asn: u32) -> AsName {
    names.get(&asn).cloned().unwrap_or(AsName::Unavailable)
}

fn summaries(tallies: &[AsnTally], names: &HashMap<u32, AsName>) -> Vec<AsnSummary> {
    tallies
        .iter()
        .map(|t| AsnSummary {
            asn: t.asn,
            name: name_of(names, t.asn),
            ipv4_count: t.ipv4_count,
            ipv6_count: t.ipv6_count,
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::database::routes::fixtures::test_store;
    use crate::database::RouteEntry;
    use crate::lens::names::fake::{resolver, FakeDns};

    /// A lens over a temporary route table with a fake DNS backend
    pub fn test_lens(entries: &[RouteEntry]) -> (tempfile::TempDir, StatsLens) {
        let (dir, store) = test_store(entries);
        let (names, _) = resolver(
            FakeDns::new()
                .with_as_name(174, "COGENT-174")
                .with_as_name(3701, "NERONET"),
            3701,
        );
        (dir, StatsLens::new(store, names, StatsSettings::default()))
    }
}
