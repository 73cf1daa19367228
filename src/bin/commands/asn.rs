use clap::Args;
use periscope::lens::utils::{truncate_name, OutputFormat, DEFAULT_NAME_MAX_LEN};
use periscope::PeriscopeConfig;
use tabled::Tabled;

/// Arguments for the Asn command
#[derive(Args)]
pub struct AsnArgs {
    /// AS number, with or without the "AS" prefix
    #[clap(name = "ASN", value_parser = parse_asn)]
    pub asn: u32,

    /// List the prefixes whose AS path passes through the AS instead
    #[clap(short, long)]
    pub transit: bool,
}

fn parse_asn(raw: &str) -> Result<u32, String> {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("AS")
        .or_else(|| trimmed.strip_prefix("as"))
        .unwrap_or(trimmed)
        .parse::<u32>()
        .map_err(|_| format!("invalid ASN: {}", raw))
}

#[derive(Tabled)]
struct OriginRow {
    prefix: String,
    next_hop: String,
    next_hop_dns: String,
    next_hop_asn: u32,
    as_path: String,
    updated: String,
}

#[derive(Tabled)]
struct TransitRow {
    prefix: String,
}

pub async fn run(config: &PeriscopeConfig, args: AsnArgs, output_format: OutputFormat) {
    let AsnArgs { asn, transit } = args;
    let lens = super::lookup_lens(config);

    if transit {
        let detail = match lens.transit(asn).await {
            Ok(detail) => detail,
            Err(e) => super::fail("transit lookup failed", e),
        };
        if output_format.is_json() {
            super::print_json(&detail, output_format);
            return;
        }
        if output_format.is_table() {
            println!(
                "AS{} ({}): {} transit prefixes",
                detail.asn,
                truncate_name(detail.name.as_str(), DEFAULT_NAME_MAX_LEN),
                detail.transit_prefix_count
            );
        }
        let rows = detail
            .transit_prefix_list
            .iter()
            .map(|prefix| TransitRow {
                prefix: prefix.clone(),
            })
            .collect::<Vec<_>>();
        super::print_rows(rows, output_format);
        return;
    }

    let detail = match lens.asn_detail(asn).await {
        Ok(detail) => detail,
        Err(e) => super::fail("ASN lookup failed", e),
    };
    if output_format.is_json() {
        super::print_json(&detail, output_format);
        return;
    }
    if output_format.is_table() {
        println!(
            "AS{} ({}): {} originated prefixes{}",
            detail.asn,
            truncate_name(detail.name.as_str(), DEFAULT_NAME_MAX_LEN),
            detail.origin_prefix_count,
            if detail.is_peer { ", peer" } else { "" }
        );
    }
    let rows = detail
        .origin_prefix_list
        .iter()
        .map(|item| OriginRow {
            prefix: item.prefix.clone(),
            next_hop: item.nexthop_ip.clone(),
            next_hop_dns: item.nexthop_ip_dns.to_string(),
            next_hop_asn: item.nexthop_asn,
            as_path: item
                .as_path
                .as_ref()
                .map(|path| {
                    path.iter()
                        .map(|asn| asn.to_string())
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_default(),
            updated: item.updated.clone(),
        })
        .collect::<Vec<_>>();
    super::print_rows(rows, output_format);
}
