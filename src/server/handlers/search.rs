//! Free-text search handler

use crate::lens::lookup::SearchOutcome;
use crate::server::{ApiResult, ServerState};
use axum::extract::{Path, State};
use axum::Json;

/// `GET /search/:query`
///
/// A query naming a covered address returns that route; anything else
/// returns `{"prefixes": [...]}` matching the next-hop ASN or the prefix text.
pub async fn search_handler(
    State(state): State<ServerState>,
    Path(query): Path<String>,
) -> ApiResult<Json<SearchOutcome>> {
    let outcome = state.lookup.search(&query).await?;
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::routes::fixtures::route;
    use crate::server::fixtures::test_state;
    use crate::server::ErrorCode;

    #[tokio::test]
    async fn test_search_single_route() {
        let (_dir, state) = test_state(&[route("1.1.1.0/24", Some(13335), Some(174))]);

        let Json(outcome) = search_handler(State(state), Path("1.1.1.1".to_string()))
            .await
            .unwrap();
        let body = serde_json::to_value(outcome).unwrap();
        assert_eq!(body["prefix"], "1.1.1.0/24");
        assert!(body.get("prefixes").is_none());
    }

    #[tokio::test]
    async fn test_search_prefix_list() {
        let (_dir, state) = test_state(&[
            route("2001:db8::/32", None, Some(174)),
            route("2001:db8:1::/48", None, Some(13335)),
            route("10.0.0.0/8", None, Some(174)),
        ]);

        // Upper-case input matches the stored lower-case prefixes
        let Json(outcome) = search_handler(State(state.clone()), Path("2001:DB8".to_string()))
            .await
            .unwrap();
        let body = serde_json::to_value(outcome).unwrap();
        assert_eq!(body["prefixes"].as_array().unwrap().len(), 2);

        let Json(outcome) = search_handler(State(state), Path("174".to_string()))
            .await
            .unwrap();
        let body = serde_json::to_value(outcome).unwrap();
        let prefixes: Vec<&str> = body["prefixes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["prefix"].as_str().unwrap())
            .collect();
        assert_eq!(prefixes, vec!["2001:db8::/32", "10.0.0.0/8"]);
    }

    #[tokio::test]
    async fn test_search_without_database() {
        let (dir, state) = test_state(&[]);
        drop(dir);

        let err = search_handler(State(state), Path("example".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::OperationFailed);
    }
}
