//! Statistics computed from route table scans
//!
//! Every metric runs its own query or scan, so one malformed entry only
//! affects the metric that cannot interpret it. Results here carry AS numbers
//! only; names are attached by the lens once the database work is done.

use super::types::{CidrCount, CommunityCount};
use crate::database::{IpVersion, RouteTableRepository};
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Prefix count of one peer (unknown peer reported as the default ASN)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerTally {
    pub asn: u32,
    pub count: u64,
}

/// Per-family prefix counts of one next-hop ASN
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsnTally {
    pub asn: u32,
    pub ipv4_count: u64,
    pub ipv6_count: u64,
}

/// Customer ASNs with the prefix totals across all of them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerTallies {
    pub customers: Vec<AsnTally>,
    pub ipv4_total: u64,
    pub ipv6_total: u64,
}

/// Origin/transit profile of one peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerUsage {
    pub asn: u32,
    pub next_hop_ips: Vec<String>,
    pub origin_prefix_count: u64,
    pub nexthop_prefix_count: u64,
}

/// Computes aggregate metrics over the route table
pub struct StatsAggregator<'a> {
    routes: RouteTableRepository<'a>,
    default_asn: u32,
}

impl<'a> StatsAggregator<'a> {
    pub fn new(routes: RouteTableRepository<'a>, default_asn: u32) -> Self {
        Self {
            routes,
            default_asn,
        }
    }

    /// Number of distinct known next-hop ASNs
    pub fn peer_count(&self) -> Result<u64> {
        let peers = self.routes.distinct_next_hop_asns()?;
        Ok(peers.iter().filter(|asn| asn.is_some()).count() as u64)
    }

    pub fn prefix_count(&self, version: IpVersion) -> Result<u64> {
        self.routes.count_by_version(version)
    }

    /// Number of distinct next-hop addresses
    pub fn nexthop_ip_count(&self) -> Result<u64> {
        Ok(self.routes.distinct_nexthops()?.len() as u64)
    }

    /// Mean number of distinct ASNs per AS path, rounded to 3 decimals
    ///
    /// Entries without a path count as length 0. An empty table yields 0.0.
    pub fn avg_as_path_length(&self) -> Result<f64> {
        let entries = self.routes.scan_all()?;
        if entries.is_empty() {
            return Ok(0.0);
        }

        let total: usize = entries.iter().map(|e| e.distinct_path_len()).sum();
        let avg = total as f64 / entries.len() as f64;
        Ok((avg * 1000.0).round() / 1000.0)
    }

    /// Prefix count of every peer, in first-seen order
    ///
    /// The unknown peer is tallied apart from the default ASN and only takes
    /// its number when reported.
    fn peer_tallies(&self) -> Result<Vec<PeerTally>> {
        let mut tallies: Vec<(Option<u32>, u64)> = Vec::new();
        let mut index: HashMap<Option<u32>, usize> = HashMap::new();

        for entry in self.routes.scan_all()? {
            let asn = entry.next_hop_asn;
            match index.get(&asn) {
                Some(&i) => tallies[i].1 += 1,
                None => {
                    index.insert(asn, tallies.len());
                    tallies.push((asn, 1));
                }
            }
        }

        Ok(tallies
            .into_iter()
            .map(|(asn, count)| PeerTally {
                asn: asn.unwrap_or(self.default_asn),
                count,
            })
            .collect())
    }

    /// The `n` peers with the most prefixes
    ///
    /// Peers with equal counts keep the order in which the scan first met them.
    pub fn top_peers(&self, n: usize) -> Result<Vec<PeerTally>> {
        let mut tallies = self.peer_tallies()?;
        tallies.sort_by(|a, b| b.count.cmp(&a.count));
        tallies.truncate(n);
        Ok(tallies)
    }

    /// Prefix counts per mask length, IPv4 first, masks ascending
    pub fn cidr_breakdown(&self) -> Result<Vec<CidrCount>> {
        let mut counts: BTreeMap<(u8, u8), u64> = BTreeMap::new();

        for entry in self.routes.scan_all()? {
            let (Some(version), Some(mask)) = (entry.version(), entry.mask_len()) else {
                continue;
            };
            *counts.entry((version.as_u8(), mask)).or_insert(0) += 1;
        }

        Ok(counts
            .into_iter()
            .map(|((ip_version, mask), count)| CidrCount {
                mask,
                count,
                ip_version,
            })
            .collect())
    }

    /// For each distinct community, the entries with a community containing it
    ///
    /// Matching is by substring, so `"3701:37"` also counts entries tagged
    /// `"3701:370"`. Clients rely on these numbers as they are.
    pub fn communities_count(&self) -> Result<Vec<CommunityCount>> {
        let entries = self.routes.scan_all()?;
        let distinct: BTreeSet<&str> = entries
            .iter()
            .flat_map(|e| e.communities.iter().map(String::as_str))
            .collect();

        Ok(distinct
            .into_iter()
            .map(|community| CommunityCount {
                community: community.to_string(),
                count: entries
                    .iter()
                    .filter(|e| e.communities.iter().any(|c| c.contains(community)))
                    .count() as u64,
            })
            .collect())
    }

    /// Per-family counts of every next-hop ASN, keyed by the stored value
    fn version_tallies(&self) -> Result<HashMap<Option<u32>, (u64, u64)>> {
        let mut tallies: HashMap<Option<u32>, (u64, u64)> = HashMap::new();
        for entry in self.routes.scan_all()? {
            let slot = tallies.entry(entry.next_hop_asn).or_insert((0, 0));
            match entry.version() {
                Some(IpVersion::V4) => slot.0 += 1,
                Some(IpVersion::V6) => slot.1 += 1,
                None => {}
            }
        }
        Ok(tallies)
    }

    fn summarize<I>(&self, asns: I, tallies: &HashMap<Option<u32>, (u64, u64)>) -> Vec<AsnTally>
    where
        I: IntoIterator<Item = Option<u32>>,
    {
        let mut summary: Vec<AsnTally> = asns
            .into_iter()
            .map(|asn| {
                let (ipv4_count, ipv6_count) = tallies.get(&asn).copied().unwrap_or((0, 0));
                AsnTally {
                    asn: asn.unwrap_or(self.default_asn),
                    ipv4_count,
                    ipv6_count,
                }
            })
            .collect();
        summary.sort_by_key(|t| t.asn);
        summary
    }

    /// Prefix counts of every peer, ordered by ASN
    pub fn peers(&self) -> Result<Vec<AsnTally>> {
        let tallies = self.version_tallies()?;
        let asns: Vec<Option<u32>> = tallies.keys().copied().collect();
        Ok(self.summarize(asns, &tallies))
    }

    /// Peers that advertise at least one route tagged with `marker`
    ///
    /// Counts cover all routes of a customer ASN, tagged or not.
    pub fn customers(&self, marker: &str) -> Result<CustomerTallies> {
        let tallies = self.version_tallies()?;
        let customer_asns: BTreeSet<Option<u32>> = self
            .routes
            .scan_all()?
            .into_iter()
            .filter(|e| e.has_community(marker))
            .map(|e| e.next_hop_asn)
            .collect();

        let customers = self.summarize(customer_asns, &tallies);
        Ok(CustomerTallies {
            ipv4_total: customers.iter().map(|c| c.ipv4_count).sum(),
            ipv6_total: customers.iter().map(|c| c.ipv6_count).sum(),
            customers,
        })
    }

    /// Next hops and origin/transit counts of every peer, in first-seen order
    ///
    /// The unknown peer is reported as the default ASN, and its origin count
    /// is the number of routes originated by the default ASN.
    pub fn peer_usage(&self) -> Result<Vec<PeerUsage>> {
        let mut usage = Vec::new();
        for asn in self.routes.distinct_next_hop_asns()? {
            usage.push(PeerUsage {
                asn: asn.unwrap_or(self.default_asn),
                next_hop_ips: self.routes.distinct_nexthops_for_peer(asn)?,
                origin_prefix_count: self
                    .routes
                    .count_by_origin(Some(asn.unwrap_or(self.default_asn)))?,
                nexthop_prefix_count: self.routes.count_by_next_hop_asn(asn, None)?,
            });
        }
        Ok(usage)
    }
}
