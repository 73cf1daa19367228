//! Name resolution lens module
//!
//! This module provides the `NameResolver`, which turns AS numbers into
//! registry names (via Team Cymru's `asn.cymru.com` TXT zone) and next-hop
//! addresses into PTR names. Both lookups are infallible: a failed query
//! degrades to the `(DNS Error)` sentinel instead of an error.
//!
//! The DNS transport sits behind the [`DnsBackend`] trait so the resolver can
//! be exercised without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use periscope::lens::names::{NameResolver, SystemDns};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let names = NameResolver::new(Arc::new(SystemDns::new(Duration::from_secs(5))), 3701);
//!
//! println!("{}", names.asn_name(Some(13335)).await);   // "CLOUDFLARENET"
//! println!("{}", names.asn_name(Some(64512)).await);   // "RFC6996 - Private Use ASN"
//! println!("{}", names.reverse_dns("1.1.1.1").await);  // "one.one.one.one"
//! ```

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Serialize, Serializer};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::net::IpAddr;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Name reported for ASNs reserved for private use (RFC 6996)
pub const PRIVATE_ASN_NAME: &str = "RFC6996 - Private Use ASN";

/// Sentinel reported whenever a DNS-backed name cannot be produced
pub const DNS_ERROR: &str = "(DNS Error)";

/// 16-bit private-use ASN range
pub const PRIVATE_ASN_RANGE: RangeInclusive<u32> = 64512..=65534;

/// Maximum number of name queries in flight during bulk resolution
const BULK_CONCURRENCY: usize = 8;

// =============================================================================
// Types
// =============================================================================

/// Outcome of an AS-number-to-name lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsName {
    Resolved(String),
    PrivateUse,
    Unavailable,
}

impl AsName {
    pub fn as_str(&self) -> &str {
        match self {
            AsName::Resolved(name) => name.as_str(),
            AsName::PrivateUse => PRIVATE_ASN_NAME,
            AsName::Unavailable => DNS_ERROR,
        }
    }
}

impl fmt::Display for AsName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AsName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Outcome of a reverse (PTR) lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReverseName {
    Resolved(String),
    Unavailable,
}

impl ReverseName {
    pub fn as_str(&self) -> &str {
        match self {
            ReverseName::Resolved(name) => name.as_str(),
            ReverseName::Unavailable => DNS_ERROR,
        }
    }
}

impl fmt::Display for ReverseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ReverseName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// =============================================================================
// DNS transport
// =============================================================================

/// Raw DNS queries used by the name resolver
#[async_trait]
pub trait DnsBackend: Send + Sync {
    /// TXT records for `name`, each record's strings concatenated
    async fn txt(&self, name: &str) -> Result<Vec<String>>;

    /// PTR names for `ip`, as returned by the server (with the root label)
    async fn ptr(&self, ip: IpAddr) -> Result<Vec<String>>;
}

/// DNS backend using the system resolver configuration
pub struct SystemDns {
    resolver: TokioAsyncResolver,
}

impl SystemDns {
    pub fn new(timeout: Duration) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 1;
        opts.cache_size = 1024;
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), opts),
        }
    }
}

#[async_trait]
impl DnsBackend for SystemDns {
    async fn txt(&self, name: &str) -> Result<Vec<String>> {
        let lookup = self
            .resolver
            .txt_lookup(name)
            .await
            .map_err(|e| anyhow!("TXT lookup for {} failed: {}", name, e))?;

        Ok(lookup
            .iter()
            .map(|txt| {
                txt.txt_data()
                    .iter()
                    .map(|part| String::from_utf8_lossy(part).into_owned())
                    .collect::<String>()
            })
            .collect())
    }

    async fn ptr(&self, ip: IpAddr) -> Result<Vec<String>> {
        let lookup = self
            .resolver
            .reverse_lookup(ip)
            .await
            .map_err(|e| anyhow!("PTR lookup for {} failed: {}", ip, e))?;

        Ok(lookup.iter().map(|name| name.to_string()).collect())
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Whether `asn` lies in the 16-bit private-use range
pub fn is_private_asn(asn: u32) -> bool {
    PRIVATE_ASN_RANGE.contains(&asn)
}

/// Extract the AS name from a Cymru TXT record
///
/// Records look like `13335 | US | arin | 2010-07-14 | CLOUDFLARENET, US`;
/// the name is the last `|` field up to its first comma.
fn parse_cymru_record(record: &str) -> Option<String> {
    let last_field = record.rsplit('|').next()?;
    let name = last_field.split(',').next()?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// AS-number and address naming with DNS-failure degradation
#[derive(Clone)]
pub struct NameResolver {
    backend: Arc<dyn DnsBackend>,
    default_asn: u32,
}

impl NameResolver {
    /// Create a resolver; `default_asn` stands in for unknown ASNs
    pub fn new(backend: Arc<dyn DnsBackend>, default_asn: u32) -> Self {
        Self {
            backend,
            default_asn,
        }
    }

    pub fn default_asn(&self) -> u32 {
        self.default_asn
    }

    /// Name of an AS; `None` names the default ASN
    pub async fn asn_name(&self, asn: Option<u32>) -> AsName {
        let asn = asn.unwrap_or(self.default_asn);
        if is_private_asn(asn) {
            return AsName::PrivateUse;
        }

        let query = format!("as{}.asn.cymru.com", asn);
        match self.backend.txt(&query).await {
            Ok(records) => match records.first().and_then(|r| parse_cymru_record(r)) {
                Some(name) => AsName::Resolved(name),
                None => {
                    warn!("Malformed or missing AS name record for AS{}", asn);
                    AsName::Unavailable
                }
            },
            Err(e) => {
                warn!("AS name lookup for AS{} failed: {}", asn, e);
                AsName::Unavailable
            }
        }
    }

    /// PTR name of an address with the trailing root label stripped
    pub async fn reverse_dns(&self, ip: &str) -> ReverseName {
        let addr: IpAddr = match ip.trim().parse() {
            Ok(addr) => addr,
            Err(_) => {
                debug!("Not reverse-resolving malformed address {:?}", ip);
                return ReverseName::Unavailable;
            }
        };

        match self.backend.ptr(addr).await {
            Ok(names) => match names.first() {
                Some(name) => {
                    let name = name.strip_suffix('.').unwrap_or(name.as_str());
                    ReverseName::Resolved(name.to_string())
                }
                None => ReverseName::Unavailable,
            },
            Err(e) => {
                warn!("Reverse lookup for {} failed: {}", addr, e);
                ReverseName::Unavailable
            }
        }
    }

    /// Resolve many ASNs at once, each distinct ASN queried a single time
    pub async fn asn_names<I>(&self, asns: I) -> HashMap<u32, AsName>
    where
        I: IntoIterator<Item = u32>,
    {
        let unique: BTreeSet<u32> = asns.into_iter().collect();
        stream::iter(unique)
            .map(|asn| async move { (asn, self.asn_name(Some(asn)).await) })
            .buffer_unordered(BULK_CONCURRENCY)
            .collect()
            .await
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory DNS backend for tests

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    pub struct FakeDns {
        txt: HashMap<String, String>,
        ptr: HashMap<IpAddr, String>,
        calls: AtomicUsize,
    }

    impl FakeDns {
        pub fn new() -> Self {
            Self::default()
        }

        /// Register a Cymru record for `asn`
        pub fn with_as_name(mut self, asn: u32, name: &str) -> Self {
            self.txt.insert(
                format!("as{}.asn.cymru.com", asn),
                format!("{} | US | arin | 2001-01-01 | {}, US", asn, name),
            );
            self
        }

        pub fn with_txt(mut self, query: &str, record: &str) -> Self {
            self.txt.insert(query.to_string(), record.to_string());
            self
        }

        pub fn with_ptr(mut self, ip: &str, name: &str) -> Self {
            if let Ok(addr) = ip.parse() {
                self.ptr.insert(addr, name.to_string());
            }
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DnsBackend for FakeDns {
        async fn txt(&self, name: &str) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.txt
                .get(name)
                .map(|r| vec![r.clone()])
                .ok_or_else(|| anyhow!("NXDOMAIN {}", name))
        }

        async fn ptr(&self, ip: IpAddr) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.ptr
                .get(&ip)
                .map(|n| vec![n.clone()])
                .ok_or_else(|| anyhow!("no PTR for {}", ip))
        }
    }

    /// Resolver over a fake backend, keeping a handle for call inspection
    pub fn resolver(dns: FakeDns, default_asn: u32) -> (NameResolver, Arc<FakeDns>) {
        let dns = Arc::new(dns);
        (NameResolver::new(dns.clone(), default_asn), dns)
    }
}

#[cfg(test)]
mod tests {
    use super::fake::{resolver, FakeDns};
    use super::*;

    #[test]
    fn test_parse_cymru_record() {
        assert_eq!(
            parse_cymru_record("13335 | US | arin | 2010-07-14 | CLOUDFLARENET, US"),
            Some("CLOUDFLARENET".to_string())
        );
        assert_eq!(
            parse_cymru_record("3701 | US | arin | 1994-02-17 | NERONET - Network for Education and Research in Oregon (NERO), US"),
            Some("NERONET - Network for Education and Research in Oregon (NERO)".to_string())
        );
        assert_eq!(parse_cymru_record("  | "), None);
    }

    #[tokio::test]
    async fn test_asn_name_resolved() {
        let (names, _) = resolver(FakeDns::new().with_as_name(13335, "CLOUDFLARENET"), 3701);
        let name = names.asn_name(Some(13335)).await;
        assert_eq!(name, AsName::Resolved("CLOUDFLARENET".to_string()));
        assert_eq!(name.to_string(), "CLOUDFLARENET");
    }

    #[tokio::test]
    async fn test_absent_asn_uses_default() {
        let (names, _) = resolver(FakeDns::new().with_as_name(3701, "NERONET"), 3701);
        assert_eq!(names.asn_name(None).await, names.asn_name(Some(3701)).await);
    }

    #[tokio::test]
    async fn test_private_asn_skips_dns() {
        let (names, dns) = resolver(FakeDns::new(), 3701);

        for asn in [64512, 65000, 65534] {
            assert_eq!(names.asn_name(Some(asn)).await, AsName::PrivateUse);
        }
        assert_eq!(dns.calls(), 0);
        assert_eq!(AsName::PrivateUse.to_string(), PRIVATE_ASN_NAME);

        // Just outside the range goes to DNS
        names.asn_name(Some(65535)).await;
        names.asn_name(Some(64511)).await;
        assert_eq!(dns.calls(), 2);
    }

    #[tokio::test]
    async fn test_dns_failures_degrade_to_sentinel() {
        let (names, _) = resolver(
            FakeDns::new().with_txt("as64496.asn.cymru.com", " | "),
            3701,
        );

        assert_eq!(names.asn_name(Some(64496)).await, AsName::Unavailable);
        assert_eq!(names.asn_name(Some(174)).await.to_string(), DNS_ERROR);
    }

    #[tokio::test]
    async fn test_reverse_dns() {
        let (names, dns) = resolver(
            FakeDns::new().with_ptr("1.1.1.1", "one.one.one.one."),
            3701,
        );

        assert_eq!(
            names.reverse_dns("1.1.1.1").await,
            ReverseName::Resolved("one.one.one.one".to_string())
        );
        assert_eq!(names.reverse_dns("8.8.8.8").await.to_string(), DNS_ERROR);
        assert_eq!(names.reverse_dns("not-an-ip").await, ReverseName::Unavailable);
        assert_eq!(dns.calls(), 2);
    }

    #[tokio::test]
    async fn test_asn_names_deduplicates() {
        let (names, dns) = resolver(
            FakeDns::new()
                .with_as_name(174, "COGENT-174")
                .with_as_name(13335, "CLOUDFLARENET"),
            3701,
        );

        let resolved = names.asn_names([174, 13335, 174, 64512]).await;
        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[&174].as_str(), "COGENT-174");
        assert_eq!(resolved[&64512], AsName::PrivateUse);
        assert_eq!(dns.calls(), 2);
    }

    #[test]
    fn test_names_serialize_as_strings() {
        let json = serde_json::to_string(&vec![
            AsName::Resolved("CLOUDFLARENET".to_string()),
            AsName::Unavailable,
        ])
        .unwrap();
        assert_eq!(json, r#"["CLOUDFLARENET","(DNS Error)"]"#);
    }
}
