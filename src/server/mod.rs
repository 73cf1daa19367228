//! HTTP API server for periscope
//!
//! This module serves the looking-glass JSON API over axum.
//!
//! # Architecture
//!
//! - `error` - API error type and error codes
//! - `handlers` - Route handlers, one module per resource
//!
//! Point lookups go through [`LookupLens`]; `/bgp/api/v1.0/stats` only reads
//! the [`StatsCache`] kept current by the [`RefreshScheduler`] started in
//! [`serve`].
//!
//! # Routes
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /health` | `OK` |
//! | `GET /bgp/api/v1.0/ip/:ip` | covering route, or `{}` |
//! | `GET /search/:query` | covering route, or `{"prefixes": [...]}` |
//! | `GET /bgp/api/v1.0/stats` | cached aggregate statistics |
//! | `GET /bgp/api/v1.0/peers` | `{"peers": [...]}` |
//! | `GET /bgp/api/v1.0/asn/:asn` | routes originated by an AS |
//! | `GET /bgp/api/v1.0/asn/:asn/transit` | prefixes routed through an AS |
//!
//! # Usage
//!
//! ```rust,ignore
//! use periscope::config::PeriscopeConfig;
//! use periscope::server::serve;
//!
//! let config = PeriscopeConfig::new(&None)?;
//! serve(&config).await?;
//! ```

pub mod error;
pub mod handlers;

pub use error::{ApiError, ApiResult, ErrorCode};

use crate::config::PeriscopeConfig;
use crate::database::RouteStore;
use crate::lens::lookup::LookupLens;
use crate::lens::names::{NameResolver, SystemDns};
use crate::lens::stats::{RefreshScheduler, StatsCache, StatsLens, StatsSettings};
use axum::{routing::get, Router as AxumRouter};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

// =============================================================================
// Server Configuration
// =============================================================================

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub address: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn from_config(config: &PeriscopeConfig) -> Self {
        Self {
            address: config.address.clone(),
            port: config.port,
        }
    }

    /// Set the address
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Get the full bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

// =============================================================================
// Server State
// =============================================================================

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    /// Point lookups
    pub lookup: LookupLens,

    /// On-request aggregate queries (peers detail)
    pub stats: StatsLens,

    /// Statistics published by the refresh scheduler
    pub cache: Arc<StatsCache>,
}

impl ServerState {
    pub fn new(
        store: RouteStore,
        names: NameResolver,
        settings: StatsSettings,
        cache: Arc<StatsCache>,
    ) -> Self {
        Self {
            lookup: LookupLens::new(store.clone(), names.clone()),
            stats: StatsLens::new(store, names, settings),
            cache,
        }
    }

    /// State over the configured route database and the system resolver
    pub fn from_config(config: &PeriscopeConfig) -> Self {
        let store = RouteStore::new(config.sqlite_path());
        let names = NameResolver::new(
            Arc::new(SystemDns::new(config.dns_timeout())),
            config.default_asn,
        );
        Self::new(
            store,
            names,
            StatsSettings::from_config(config),
            Arc::new(StatsCache::new()),
        )
    }
}

// =============================================================================
// Axum Router Creation
// =============================================================================

/// Create the Axum router for the HTTP API
pub fn create_axum_router(state: ServerState) -> AxumRouter {
    use handlers::*;

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    AxumRouter::new()
        .route("/health", get(health_handler))
        .route("/search/:query", get(search_handler))
        .route("/bgp/api/v1.0/ip/:ip", get(ip_handler))
        .route("/bgp/api/v1.0/stats", get(stats_handler))
        .route("/bgp/api/v1.0/peers", get(peers_handler))
        .route("/bgp/api/v1.0/asn/:asn", get(asn_handler))
        .route("/bgp/api/v1.0/asn/:asn/transit", get(transit_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check handler
async fn health_handler() -> &'static str {
    "OK"
}

// =============================================================================
// Server Startup
// =============================================================================

/// Serve the API until `shutdown` is cancelled
pub async fn start_server(
    state: ServerState,
    config: ServerConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = create_axum_router(state);

    let bind_address = config.bind_address();
    tracing::info!("Starting HTTP server on {}", bind_address);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Run the looking glass: statistics refresh plus the HTTP API
///
/// Returns after Ctrl-C, once the server and both refresh loops have stopped.
pub async fn serve(config: &PeriscopeConfig) -> anyhow::Result<()> {
    let state = ServerState::from_config(config);
    let refresh = RefreshScheduler::from_config(state.stats.clone(), state.cache.clone(), config)
        .spawn();
    let shutdown = refresh.cancellation_token();

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown requested");
                signal.cancel();
            }
            Err(e) => tracing::warn!("Unable to listen for shutdown signal: {}", e),
        }
    });

    let result = start_server(state, ServerConfig::from_config(config), shutdown.clone()).await;
    shutdown.cancel();
    refresh.shutdown().await;
    result
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::database::routes::fixtures::test_store;
    use crate::database::RouteEntry;
    use crate::lens::names::fake::{resolver, FakeDns};

    /// Server state over a temporary route table with a fake DNS backend
    pub fn test_state(entries: &[RouteEntry]) -> (tempfile::TempDir, ServerState) {
        let (dir, store) = test_store(entries);
        let (names, _) = resolver(
            FakeDns::new()
                .with_as_name(13335, "CLOUDFLARENET")
                .with_as_name(174, "COGENT-174")
                .with_as_name(3701, "NERONET")
                .with_ptr("198.51.100.1", "core1.example.net."),
            3701,
        );
        let state = ServerState::new(
            store,
            names,
            StatsSettings::default(),
            Arc::new(StatsCache::new()),
        );
        (dir, state)
    }
}
