//! Consumption estimate endpoint.
//!
//! Exposes the estimator on its own so clients can preview the battery
//! consumption of a load before building a flight.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::error::ApiResult;
use crate::state::SharedState;

/// Query parameters for the estimate endpoint.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct EstimateQuery {
    /// Total package weight in kilograms.
    #[param(example = 4.0)]
    pub weight_kg: f64,

    /// Whether the pilot is flagged as VIP.
    #[serde(default)]
    #[param(example = false)]
    pub vip: bool,
}

/// Estimated battery consumption for a load.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "weight_kg": 4.0,
    "vip": false,
    "consumption_percent": 45.0
}))]
pub struct EstimateResponse {
    /// Weight the estimate was computed for.
    pub weight_kg: f64,

    /// VIP flag the estimate was computed for.
    pub vip: bool,

    /// Estimated battery consumption in percent.
    pub consumption_percent: f64,
}

/// Estimate battery consumption.
#[utoipa::path(
    get,
    path = "/api/estimate",
    tag = "estimate",
    operation_id = "estimateConsumption",
    summary = "Estimate battery consumption for a load",
    description = "Uses the coefficients from the `[consumption]` configuration \
        section. Negative weights are rejected.",
    params(EstimateQuery),
    responses(
        (status = 200, description = "Estimate computed", body = EstimateResponse),
        (status = 400, description = "Negative or non-finite weight")
    )
)]
pub async fn get_estimate(
    State(state): State<SharedState>,
    Query(query): Query<EstimateQuery>,
) -> ApiResult<Json<EstimateResponse>> {
    let state_guard = state.read().await;

    let consumption_percent = state_guard.store.estimate(query.weight_kg, query.vip)?;

    Ok(Json(EstimateResponse {
        weight_kg: query.weight_kg,
        vip: query.vip,
        consumption_percent,
    }))
}
