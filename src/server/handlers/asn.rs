//! Per-AS handlers

use crate::lens::lookup::{AsnDetail, TransitDetail};
use crate::server::{ApiError, ApiResult, ServerState};
use axum::extract::{Path, State};
use axum::Json;

fn parse_asn(raw: &str) -> ApiResult<u32> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("AS")
        .or_else(|| trimmed.strip_prefix("as"))
        .unwrap_or(trimmed);
    digits
        .parse::<u32>()
        .map_err(|_| ApiError::invalid_params(format!("Invalid ASN: {}", raw)))
}

/// `GET /bgp/api/v1.0/asn/:asn`
///
/// Routes originated by the AS. The default ASN lists the routes without a
/// known origin.
pub async fn asn_handler(
    State(state): State<ServerState>,
    Path(asn): Path<String>,
) -> ApiResult<Json<AsnDetail>> {
    let asn = parse_asn(&asn)?;
    Ok(Json(state.lookup.asn_detail(asn).await?))
}

/// `GET /bgp/api/v1.0/asn/:asn/transit`
pub async fn transit_handler(
    State(state): State<ServerState>,
    Path(asn): Path<String>,
) -> ApiResult<Json<TransitDetail>> {
    let asn = parse_asn(&asn)?;
    Ok(Json(state.lookup.transit(asn).await?))
}
