pub mod asn;
pub mod config;
pub mod lookup;
pub mod peers;
pub mod search;
pub mod serve;
pub mod stats;

use periscope::database::RouteStore;
use periscope::lens::lookup::LookupLens;
use periscope::lens::names::{NameResolver, SystemDns};
use periscope::lens::stats::{StatsLens, StatsSettings};
use periscope::lens::utils::OutputFormat;
use periscope::PeriscopeConfig;
use serde::Serialize;
use std::sync::Arc;
use tabled::settings::Style;
use tabled::{Table, Tabled};

pub(crate) fn name_resolver(config: &PeriscopeConfig) -> NameResolver {
    NameResolver::new(
        Arc::new(SystemDns::new(config.dns_timeout())),
        config.default_asn,
    )
}

pub(crate) fn lookup_lens(config: &PeriscopeConfig) -> LookupLens {
    LookupLens::new(RouteStore::new(config.sqlite_path()), name_resolver(config))
}

pub(crate) fn stats_lens(config: &PeriscopeConfig) -> StatsLens {
    StatsLens::new(
        RouteStore::new(config.sqlite_path()),
        name_resolver(config),
        StatsSettings::from_config(config),
    )
}

/// Print a single serializable value in one of the JSON formats
pub(crate) fn print_json<T: Serialize>(value: &T, format: OutputFormat) {
    let result = match format {
        OutputFormat::JsonPretty => serde_json::to_string_pretty(value),
        _ => serde_json::to_string(value),
    };
    match result {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("ERROR: Failed to serialize to JSON: {}", e),
    }
}

/// Print a list: JSON formats serialize `items`, the others render `rows`
pub(crate) fn print_list<T: Serialize, R: Tabled>(
    items: &[T],
    rows: Vec<R>,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json | OutputFormat::JsonPretty => print_json(&items, format),
        OutputFormat::JsonLine => {
            for item in items {
                print_json(item, format);
            }
        }
        _ => print_rows(rows, format),
    }
}

/// Render rows as a rounded table, a markdown table or pipe-separated values
pub(crate) fn print_rows<R: Tabled>(rows: Vec<R>, format: OutputFormat) {
    match format {
        OutputFormat::Markdown => println!("{}", Table::new(rows).with(Style::markdown())),
        OutputFormat::Psv => {
            println!("{}", R::headers().join("|"));
            for row in &rows {
                println!("{}", row.fields().join("|"));
            }
        }
        _ => println!("{}", Table::new(rows).with(Style::rounded())),
    }
}

pub(crate) fn fail(context: &str, e: impl std::fmt::Display) -> ! {
    eprintln!("ERROR: {}: {}", context, e);
    std::process::exit(1);
}
