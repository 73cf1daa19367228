use periscope::lens::utils::{truncate_name, OutputFormat, DEFAULT_NAME_MAX_LEN};
use periscope::PeriscopeConfig;
use tabled::Tabled;

#[derive(Tabled)]
struct PeerRow {
    asn: u32,
    name: String,
    next_hops: String,
    originated: u64,
    received: u64,
    transit: bool,
}

pub async fn run(config: &PeriscopeConfig, output_format: OutputFormat) {
    let lens = super::stats_lens(config);
    let peers = match lens.peer_details().await {
        Ok(peers) => peers,
        Err(e) => super::fail("unable to list peers", e),
    };

    let rows: Vec<PeerRow> = peers
        .iter()
        .map(|peer| PeerRow {
            asn: peer.asn,
            name: truncate_name(peer.name.as_str(), DEFAULT_NAME_MAX_LEN),
            next_hops: peer.next_hop_ips.join(" "),
            originated: peer.origin_prefix_count,
            received: peer.nexthop_prefix_count,
            transit: peer.transit_provider,
        })
        .collect();
    super::print_list(&peers, rows, output_format);
}
