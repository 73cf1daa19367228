//! Point lookup handler

use crate::server::ServerState;
use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

/// `GET /bgp/api/v1.0/ip/:ip`
///
/// Responds with the most specific covering route, or `{}` when the address
/// is malformed or nothing covers it.
pub async fn ip_handler(State(state): State<ServerState>, Path(ip): Path<String>) -> Json<Value> {
    match state.lookup.lookup(&ip).await {
        Some(route) => Json(serde_json::to_value(route).unwrap_or_else(|_| json!({}))),
        None => Json(json!({})),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::routes::fixtures::route;
    use crate::server::fixtures::test_state;

    #[tokio::test]
    async fn test_ip_found() {
        let mut entry = route("1.1.1.0/24", Some(13335), Some(174));
        entry.as_path = Some(vec![174, 13335]);
        entry.communities = vec!["174:21000".to_string()];
        let (_dir, state) = test_state(&[entry]);

        let Json(body) = ip_handler(State(state), Path("1.1.1.1".to_string())).await;
        assert_eq!(body["prefix"], "1.1.1.0/24");
        assert_eq!(body["origin_as"], 13335);
        assert_eq!(body["next_hop_asn"], 174);
        assert_eq!(body["nexthop"], "198.51.100.1");
        assert_eq!(body["as_path"], json!([174, 13335]));
        assert_eq!(body["communities"], json!(["174:21000"]));
        assert_eq!(body["local_pref"], 100);
        assert_eq!(body["med"], 0);
        assert_eq!(body["updated"], "2023-11-14 22:13:20 UTC");
        assert_eq!(body["name"], "CLOUDFLARENET");
    }

    #[tokio::test]
    async fn test_ip_not_found_is_empty_object() {
        let (_dir, state) = test_state(&[route("10.0.0.0/8", None, None)]);

        let Json(miss) = ip_handler(State(state.clone()), Path("192.0.2.1".to_string())).await;
        assert_eq!(miss, json!({}));

        let Json(malformed) = ip_handler(State(state), Path("999.1.1.1".to_string())).await;
        assert_eq!(malformed, json!({}));
    }
}
