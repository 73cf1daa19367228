use super::lookup::RouteRow;
use clap::Args;
use periscope::lens::lookup::SearchOutcome;
use periscope::lens::utils::OutputFormat;
use periscope::PeriscopeConfig;

/// Arguments for the Search command
#[derive(Args)]
pub struct SearchArgs {
    /// An IP address, a next-hop ASN, or part of a prefix (e.g. "2001:db8")
    #[clap(name = "QUERY", required = true)]
    pub query: Vec<String>,
}

pub async fn run(config: &PeriscopeConfig, args: SearchArgs, output_format: OutputFormat) {
    let query = args.query.join(" ");

    let lens = super::lookup_lens(config);
    let outcome = match lens.search(&query).await {
        Ok(outcome) => outcome,
        Err(e) => super::fail("search failed", e),
    };

    match &outcome {
        SearchOutcome::Route(route) => {
            if output_format.is_json() {
                super::print_json(&outcome, output_format);
            } else {
                super::print_rows(vec![RouteRow::from(route)], output_format);
            }
        }
        SearchOutcome::Prefixes { prefixes } => {
            if prefixes.is_empty() && !output_format.is_json() {
                eprintln!("No routes match '{}'", query);
                return;
            }
            match output_format {
                OutputFormat::Json | OutputFormat::JsonPretty => {
                    super::print_json(&outcome, output_format)
                }
                _ => super::print_list(
                    prefixes,
                    prefixes.iter().map(RouteRow::from).collect::<Vec<_>>(),
                    output_format,
                ),
            }
        }
    }
}
