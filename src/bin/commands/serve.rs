use clap::Args;
use periscope::PeriscopeConfig;

/// Arguments for the Serve command
#[derive(Args)]
pub struct ServeArgs {
    /// Address to bind to (overrides the configuration file)
    #[clap(short, long)]
    pub address: Option<String>,

    /// Port to listen on (overrides the configuration file)
    #[clap(short, long)]
    pub port: Option<u16>,
}

pub async fn run(mut config: PeriscopeConfig, args: ServeArgs) {
    let ServeArgs { address, port } = args;
    if let Some(address) = address {
        config.address = address;
    }
    if let Some(port) = port {
        config.port = port;
    }

    tracing::info!("Route database: {}", config.sqlite_path());
    if !std::path::Path::new(&config.sqlite_path()).exists() {
        tracing::warn!(
            "Route database {} does not exist yet; lookups fail until the loader creates it",
            config.sqlite_path()
        );
    }

    if let Err(e) = periscope::serve(&config).await {
        super::fail("server error", e);
    }
}
