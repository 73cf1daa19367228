use clap::{Parser, Subcommand};
use periscope::lens::utils::OutputFormat;
use periscope::PeriscopeConfig;
use tracing::Level;

mod commands;

use commands::asn::AsnArgs;
use commands::config::ConfigArgs;
use commands::lookup::LookupArgs;
use commands::search::SearchArgs;
use commands::serve::ServeArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.periscope/periscope.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long, global = true)]
    debug: bool,

    /// Output format: table (default), markdown, json, json-pretty, json-line, psv
    #[clap(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API with periodic statistics refresh
    Serve(ServeArgs),

    /// Longest-prefix match of an IP address against the route table
    Lookup(LookupArgs),

    /// Search routes by address, next-hop ASN or prefix text
    Search(SearchArgs),

    /// Compute aggregate routing-table statistics once
    Stats,

    /// List peers with their next hops and transit profile
    Peers,

    /// Show the routes originated or transited by an AS
    Asn(AsnArgs),

    /// Show configuration and route database status
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.debug {
        Level::DEBUG
    } else if matches!(cli.command, Commands::Serve(_)) {
        Level::INFO
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = match PeriscopeConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: unable to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let format = cli.format;
    match cli.command {
        Commands::Serve(args) => commands::serve::run(config, args).await,
        Commands::Lookup(args) => commands::lookup::run(&config, args, format).await,
        Commands::Search(args) => commands::search::run(&config, args, format).await,
        Commands::Stats => commands::stats::run(&config, format).await,
        Commands::Peers => commands::peers::run(&config, format).await,
        Commands::Asn(args) => commands::asn::run(&config, args, format).await,
        Commands::Config(args) => commands::config::run(&config, args, format),
    }
}
