//! Statistics handlers

use crate::lens::stats::{PeerDetail, StatsSnapshot};
use crate::server::{ApiResult, ServerState};
use axum::extract::State;
use axum::Json;
use serde::Serialize;

/// `GET /bgp/api/v1.0/stats`
///
/// Served from the cache; never triggers a computation.
pub async fn stats_handler(State(state): State<ServerState>) -> Json<StatsSnapshot> {
    Json(state.cache.snapshot())
}

/// Response for the peers listing
#[derive(Debug, Clone, Serialize)]
pub struct PeersResponse {
    pub peers: Vec<PeerDetail>,
}

/// `GET /bgp/api/v1.0/peers`
pub async fn peers_handler(State(state): State<ServerState>) -> ApiResult<Json<PeersResponse>> {
    let peers = state.stats.peer_details().await?;
    Ok(Json(PeersResponse { peers }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::routes::fixtures::route;
    use crate::lens::stats::FastStats;
    use crate::server::fixtures::test_state;

    #[tokio::test]
    async fn test_stats_served_from_cache() {
        let (_dir, state) = test_state(&[route("10.0.0.0/8", None, Some(174))]);

        // Nothing published yet: defaults, not a fresh computation
        let Json(before) = stats_handler(State(state.clone())).await;
        assert_eq!(before.peer_count, 0);
        assert_eq!(before.ipv4_table_size, 0);

        state.cache.publish_fast(FastStats {
            peer_count: 7,
            ipv4_table_size: 900_000,
            computed_at: Some(1_700_000_000),
            ..Default::default()
        });

        let Json(after) = stats_handler(State(state)).await;
        assert_eq!(after.peer_count, 7);
        assert_eq!(after.ipv4_table_size, 900_000);
        assert_eq!(after.timestamp, "2023-11-14 22:13:20 UTC");
    }

    #[tokio::test]
    async fn test_peers() {
        let (_dir, state) = test_state(&[
            route("10.0.0.0/8", Some(13335), Some(174)),
            route("10.1.0.0/16", Some(174), Some(174)),
            route("10.2.0.0/16", Some(3701), None),
        ]);

        let Json(response) = peers_handler(State(state)).await.unwrap();
        let body = serde_json::to_value(&response).unwrap();
        let cogent = &body["peers"][0];
        assert_eq!(cogent["asn"], 174);
        assert_eq!(cogent["name"], "COGENT-174");
        assert_eq!(cogent["next_hop_ips"], serde_json::json!(["198.51.100.1"]));
        assert_eq!(cogent["origin_prefix_count"], 1);
        assert_eq!(cogent["nexthop_prefix_count"], 2);
        assert_eq!(cogent["transit_provider"], true);

        let own = &body["peers"][1];
        assert_eq!(own["asn"], 3701);
        assert_eq!(own["origin_prefix_count"], 1);
        assert_eq!(own["transit_provider"], false);
    }
}
