use periscope::lens::stats::{AsnSummary, StatsSnapshot};
use periscope::lens::utils::{truncate_name, OutputFormat, DEFAULT_NAME_MAX_LEN};
use periscope::PeriscopeConfig;
use tabled::Tabled;

#[derive(Tabled)]
struct MetricRow {
    metric: &'static str,
    value: String,
}

#[derive(Tabled)]
struct TopPeerRow {
    asn: u32,
    name: String,
    prefixes: u64,
}

#[derive(Tabled)]
struct CidrRow {
    version: String,
    mask: u8,
    prefixes: u64,
}

#[derive(Tabled)]
struct CommunityRow {
    community: String,
    routes: u64,
}

#[derive(Tabled)]
struct AsnCountRow {
    asn: u32,
    name: String,
    ipv4: u64,
    ipv6: u64,
}

fn asn_rows(list: &[AsnSummary]) -> Vec<AsnCountRow> {
    list.iter()
        .map(|entry| AsnCountRow {
            asn: entry.asn,
            name: truncate_name(entry.name.as_str(), DEFAULT_NAME_MAX_LEN),
            ipv4: entry.ipv4_count,
            ipv6: entry.ipv6_count,
        })
        .collect()
}

fn metric_rows(snapshot: &StatsSnapshot) -> Vec<MetricRow> {
    let metrics: [(&'static str, String); 10] = [
        ("peers", snapshot.peer_count.to_string()),
        ("ipv4 prefixes", snapshot.ipv4_table_size.to_string()),
        ("ipv6 prefixes", snapshot.ipv6_table_size.to_string()),
        ("next-hop IPs", snapshot.nexthop_ip_count.to_string()),
        (
            "avg AS path length",
            format!("{:.2}", snapshot.avg_as_path_length),
        ),
        ("customers", snapshot.customer_count.to_string()),
        (
            "customer ipv4 prefixes",
            snapshot.customer_ipv4_prefixes.to_string(),
        ),
        (
            "customer ipv6 prefixes",
            snapshot.customer_ipv6_prefixes.to_string(),
        ),
        ("communities", snapshot.communities.len().to_string()),
        ("computed", snapshot.timestamp.clone()),
    ];
    metrics
        .into_iter()
        .map(|(metric, value)| MetricRow { metric, value })
        .collect()
}

pub async fn run(config: &PeriscopeConfig, output_format: OutputFormat) {
    let lens = super::stats_lens(config);
    eprintln!("Computing statistics from {}...", config.sqlite_path());
    let snapshot = match lens.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => super::fail("unable to compute statistics", e),
    };

    if output_format.is_json() {
        super::print_json(&snapshot, output_format);
        return;
    }

    super::print_rows(metric_rows(&snapshot), output_format);
    if output_format == OutputFormat::Psv {
        return;
    }

    println!("\nTop peers:");
    super::print_rows(
        snapshot
            .top_n_peers
            .iter()
            .map(|peer| TopPeerRow {
                asn: peer.asn,
                name: truncate_name(peer.name.as_str(), DEFAULT_NAME_MAX_LEN),
                prefixes: peer.count,
            })
            .collect::<Vec<_>>(),
        output_format,
    );

    println!("\nPrefix lengths:");
    super::print_rows(
        snapshot
            .cidr_breakdown
            .iter()
            .map(|cidr| CidrRow {
                version: format!("ipv{}", cidr.ip_version),
                mask: cidr.mask,
                prefixes: cidr.count,
            })
            .collect::<Vec<_>>(),
        output_format,
    );

    println!("\nCommunities:");
    super::print_rows(
        snapshot
            .communities
            .iter()
            .map(|c| CommunityRow {
                community: c.community.clone(),
                routes: c.count,
            })
            .collect::<Vec<_>>(),
        output_format,
    );

    println!("\nPeers:");
    super::print_rows(asn_rows(&snapshot.peers), output_format);

    if !snapshot.customers.is_empty() {
        println!("\nCustomers:");
        super::print_rows(asn_rows(&snapshot.customers), output_format);
    }
}
