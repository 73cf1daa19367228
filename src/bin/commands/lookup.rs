use clap::Args;
use periscope::lens::lookup::RouteView;
use periscope::lens::utils::OutputFormat;
use periscope::PeriscopeConfig;
use tabled::Tabled;

/// Arguments for the Lookup command
#[derive(Args)]
pub struct LookupArgs {
    /// IPv4 or IPv6 address to resolve
    #[clap(name = "IP")]
    pub ip: String,
}

#[derive(Tabled)]
pub(crate) struct RouteRow {
    prefix: String,
    origin: u32,
    next_hop: String,
    next_hop_asn: u32,
    as_path: String,
    local_pref: i64,
    med: i64,
    communities: String,
    updated: String,
    name: String,
}

impl From<&RouteView> for RouteRow {
    fn from(route: &RouteView) -> Self {
        RouteRow {
            prefix: route.prefix.clone(),
            origin: route.origin_as,
            next_hop: route.nexthop.clone(),
            next_hop_asn: route.next_hop_asn,
            as_path: route
                .as_path
                .as_ref()
                .map(|path| {
                    path.iter()
                        .map(|asn| asn.to_string())
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_default(),
            local_pref: route.local_pref,
            med: route.med,
            communities: route.communities.join(" "),
            updated: route.updated.clone(),
            name: route.name.to_string(),
        }
    }
}

pub async fn run(config: &PeriscopeConfig, args: LookupArgs, output_format: OutputFormat) {
    let LookupArgs { ip } = args;

    let lens = super::lookup_lens(config);
    match lens.lookup(&ip).await {
        Some(route) => {
            if output_format.is_json() {
                super::print_json(&route, output_format);
            } else {
                super::print_rows(vec![RouteRow::from(&route)], output_format);
            }
        }
        None => {
            if output_format.is_json() {
                println!("{{}}");
            } else {
                eprintln!("No route covers {}", ip);
            }
        }
    }
}
