use clap::Args;
use periscope::lens::utils::OutputFormat;
use periscope::{format_size, get_database_info, PeriscopeConfig, RouteDatabaseInfo};
use serde::Serialize;

/// Arguments for the Config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Print an empty configuration file template instead
    #[clap(long)]
    pub template: bool,
}

#[derive(Debug, Serialize)]
struct ConfigInfo {
    config_file: String,
    data_dir: String,
    default_asn: u32,
    customer_community: String,
    fast_refresh_secs: u64,
    slow_refresh_secs: u64,
    top_peers: usize,
    dns_timeout_secs: u64,
    listen: String,
    database: RouteDatabaseInfo,
}

pub fn run(config: &PeriscopeConfig, args: ConfigArgs, output_format: OutputFormat) {
    if args.template {
        print!("{}", PeriscopeConfig::template());
        return;
    }

    let info = ConfigInfo {
        config_file: PeriscopeConfig::config_file_path(),
        data_dir: config.data_dir.clone(),
        default_asn: config.default_asn,
        customer_community: config.customer_community.clone(),
        fast_refresh_secs: config.fast_refresh_secs,
        slow_refresh_secs: config.slow_refresh_secs,
        top_peers: config.top_peers,
        dns_timeout_secs: config.dns_timeout_secs,
        listen: format!("{}:{}", config.address, config.port),
        database: get_database_info(config),
    };

    if output_format.is_json() {
        super::print_json(&info, output_format);
        return;
    }

    // Table, Markdown, and PSV all use the same human-readable format
    println!("Periscope Configuration");
    println!("=======================\n");
    println!("  Config file:        {}", info.config_file);
    println!("{}", indent(&config.summary()));
    println!();

    let db = &info.database;
    println!("Route Database:");
    println!("  Path:               {}", db.path);
    println!("  Status:             {}", db.status);
    if let Some(size) = db.size_bytes {
        println!("  Size:               {}", format_size(size));
    }
    if let Some(count) = db.route_count {
        println!("  Routes:             {}", count);
    }
    if let (Some(v4), Some(v6)) = (db.ipv4_count, db.ipv6_count) {
        println!("  IPv4 / IPv6:        {} / {}", v4, v6);
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}
