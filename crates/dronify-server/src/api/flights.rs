//! Flight API endpoints.
//!
//! Besides plain CRUD, flights expose package assignment and the three
//! lifecycle actions. The actions are also available in batch form through
//! `POST /api/flights/transition`, which applies to every listed flight or to
//! none of them.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use dronify_core::{
    Flight, FlightId, FlightStatus, FlightUpdate, NewFlight, PackageId, RecordStore, Transition,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Creates the flights router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_flights).post(create_flight))
        .route("/transition", post(transition_flights))
        .route("/{id}", get(get_flight).put(update_flight))
        .route(
            "/{id}/packages/{package_id}",
            put(attach_package).delete(detach_package),
        )
        .route("/{id}/prepare", post(prepare_flight))
        .route("/{id}/unlock", post(unlock_flight))
        .route("/{id}/finalize", post(finalize_flight))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// A flight with its lifecycle state and attached packages.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FlightResponse {
    /// The flight record.
    #[serde(flatten)]
    pub flight: Flight,

    /// Lifecycle state derived from `prepared` and `realized`.
    pub status: FlightStatus,

    /// Packages assigned to the flight.
    pub package_ids: Vec<PackageId>,
}

/// Batch lifecycle request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "flight_ids": ["0190f0c4-8c6e-7d3a-9b7e-2f6a1c3d4e5f"],
    "transition": "prepare"
}))]
pub struct TransitionRequest {
    /// Flights to update.
    pub flight_ids: Vec<FlightId>,

    /// Action to apply to each of them.
    pub transition: Transition,
}

fn flight_response(store: &RecordStore, flight: &Flight) -> ApiResult<FlightResponse> {
    let package_ids = store
        .flight_packages(flight.id)?
        .into_iter()
        .map(|package| package.id)
        .collect();

    Ok(FlightResponse {
        flight: flight.clone(),
        status: flight.status(),
        package_ids,
    })
}

// ============================================================================
// CRUD
// ============================================================================

/// List all flights.
#[utoipa::path(
    get,
    path = "/api/flights",
    tag = "flights",
    operation_id = "listFlights",
    summary = "List flights",
    responses(
        (status = 200, description = "Flights in creation order", body = Vec<FlightResponse>)
    )
)]
pub async fn list_flights(State(state): State<SharedState>) -> ApiResult<Json<Vec<FlightResponse>>> {
    let state_guard = state.read().await;
    let store = &state_guard.store;

    let flights = store
        .flights()
        .into_iter()
        .map(|flight| flight_response(store, flight))
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(flights))
}

/// Create a flight.
#[utoipa::path(
    post,
    path = "/api/flights",
    tag = "flights",
    operation_id = "createFlight",
    summary = "Create a flight",
    description = "Creates a draft flight. The code (`YYMMDDHHMMSS`) and the name \
        (`YYYYMMDD_Vuelo`) default to the current time. Packages listed in \
        `package_ids` are attached in the same write.",
    request_body = NewFlight,
    responses(
        (status = 201, description = "Flight created", body = FlightResponse),
        (status = 400, description = "Invalid name"),
        (status = 404, description = "Unknown drone, pilot or package"),
        (status = 409, description = "A package is already on another flight"),
        (status = 422, description = "Pilot is not flagged as a pilot")
    )
)]
pub async fn create_flight(
    State(state): State<SharedState>,
    Json(request): Json<NewFlight>,
) -> ApiResult<(StatusCode, Json<FlightResponse>)> {
    let mut state_guard = state.write().await;

    let flight = state_guard.store.create_flight(request)?;
    let response = flight_response(&state_guard.store, &flight)?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Get a flight.
#[utoipa::path(
    get,
    path = "/api/flights/{id}",
    tag = "flights",
    operation_id = "getFlight",
    summary = "Get a flight",
    params(("id" = uuid::Uuid, Path, description = "Flight identifier")),
    responses(
        (status = 200, description = "Flight found", body = FlightResponse),
        (status = 404, description = "Unknown flight")
    )
)]
pub async fn get_flight(
    State(state): State<SharedState>,
    Path(id): Path<FlightId>,
) -> ApiResult<Json<FlightResponse>> {
    let state_guard = state.read().await;
    let flight = state_guard.store.flight(id)?;
    Ok(Json(flight_response(&state_guard.store, flight)?))
}

/// Update a flight.
#[utoipa::path(
    put,
    path = "/api/flights/{id}",
    tag = "flights",
    operation_id = "updateFlight",
    summary = "Update a flight",
    description = "Changing the pilot refreshes the consumption estimate. The code \
        is read-only.",
    params(("id" = uuid::Uuid, Path, description = "Flight identifier")),
    request_body = FlightUpdate,
    responses(
        (status = 200, description = "Flight updated", body = FlightResponse),
        (status = 400, description = "Invalid value"),
        (status = 404, description = "Unknown flight, drone or pilot"),
        (status = 409, description = "Read-only field changed"),
        (status = 422, description = "Pilot is not flagged as a pilot")
    )
)]
pub async fn update_flight(
    State(state): State<SharedState>,
    Path(id): Path<FlightId>,
    Json(request): Json<FlightUpdate>,
) -> ApiResult<Json<FlightResponse>> {
    let mut state_guard = state.write().await;

    let flight = state_guard.store.update_flight(id, request)?;
    Ok(Json(flight_response(&state_guard.store, &flight)?))
}

// ============================================================================
// Package assignment
// ============================================================================

/// Attach a package to a flight.
#[utoipa::path(
    put,
    path = "/api/flights/{id}/packages/{package_id}",
    tag = "flights",
    operation_id = "attachPackage",
    summary = "Attach a package to a flight",
    params(
        ("id" = uuid::Uuid, Path, description = "Flight identifier"),
        ("package_id" = uuid::Uuid, Path, description = "Package identifier")
    ),
    responses(
        (status = 200, description = "Package attached", body = FlightResponse),
        (status = 404, description = "Unknown flight or package"),
        (status = 409, description = "Package is already on another flight")
    )
)]
pub async fn attach_package(
    State(state): State<SharedState>,
    Path((id, package_id)): Path<(FlightId, PackageId)>,
) -> ApiResult<Json<FlightResponse>> {
    let mut state_guard = state.write().await;

    let flight = state_guard.store.attach_package(id, package_id)?;
    Ok(Json(flight_response(&state_guard.store, &flight)?))
}

/// Detach a package from a flight.
#[utoipa::path(
    delete,
    path = "/api/flights/{id}/packages/{package_id}",
    tag = "flights",
    operation_id = "detachPackage",
    summary = "Detach a package from a flight",
    params(
        ("id" = uuid::Uuid, Path, description = "Flight identifier"),
        ("package_id" = uuid::Uuid, Path, description = "Package identifier")
    ),
    responses(
        (status = 200, description = "Package detached", body = FlightResponse),
        (status = 404, description = "Unknown flight or package"),
        (status = 422, description = "Package is not on this flight")
    )
)]
pub async fn detach_package(
    State(state): State<SharedState>,
    Path((id, package_id)): Path<(FlightId, PackageId)>,
) -> ApiResult<Json<FlightResponse>> {
    let mut state_guard = state.write().await;

    let flight = state_guard.store.detach_package(id, package_id)?;
    Ok(Json(flight_response(&state_guard.store, &flight)?))
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Mark a flight as prepared.
#[utoipa::path(
    post,
    path = "/api/flights/{id}/prepare",
    tag = "flights",
    operation_id = "prepareFlight",
    summary = "Prepare a flight",
    params(("id" = uuid::Uuid, Path, description = "Flight identifier")),
    responses(
        (status = 200, description = "Flight prepared", body = FlightResponse),
        (status = 404, description = "Unknown flight")
    )
)]
pub async fn prepare_flight(
    State(state): State<SharedState>,
    Path(id): Path<FlightId>,
) -> ApiResult<Json<FlightResponse>> {
    let mut state_guard = state.write().await;

    let flight = state_guard.store.prepare_flight(id)?;
    Ok(Json(flight_response(&state_guard.store, &flight)?))
}

/// Clear a flight's prepared flag.
#[utoipa::path(
    post,
    path = "/api/flights/{id}/unlock",
    tag = "flights",
    operation_id = "unlockFlight",
    summary = "Unlock a flight",
    description = "Clears `prepared`. Allowed in every state, including after \
        the flight was finalized.",
    params(("id" = uuid::Uuid, Path, description = "Flight identifier")),
    responses(
        (status = 200, description = "Flight unlocked", body = FlightResponse),
        (status = 404, description = "Unknown flight")
    )
)]
pub async fn unlock_flight(
    State(state): State<SharedState>,
    Path(id): Path<FlightId>,
) -> ApiResult<Json<FlightResponse>> {
    let mut state_guard = state.write().await;

    let flight = state_guard.store.unlock_flight(id)?;
    Ok(Json(flight_response(&state_guard.store, &flight)?))
}

/// Mark a flight as realized.
#[utoipa::path(
    post,
    path = "/api/flights/{id}/finalize",
    tag = "flights",
    operation_id = "finalizeFlight",
    summary = "Finalize a flight",
    params(("id" = uuid::Uuid, Path, description = "Flight identifier")),
    responses(
        (status = 200, description = "Flight finalized", body = FlightResponse),
        (status = 404, description = "Unknown flight")
    )
)]
pub async fn finalize_flight(
    State(state): State<SharedState>,
    Path(id): Path<FlightId>,
) -> ApiResult<Json<FlightResponse>> {
    let mut state_guard = state.write().await;

    let flight = state_guard.store.finalize_flight(id)?;
    Ok(Json(flight_response(&state_guard.store, &flight)?))
}

/// Apply a lifecycle action to several flights.
#[utoipa::path(
    post,
    path = "/api/flights/transition",
    tag = "flights",
    operation_id = "transitionFlights",
    summary = "Apply a lifecycle action to several flights",
    description = "All listed flights are updated, or none is if any id is unknown.",
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Flights updated", body = Vec<FlightResponse>),
        (status = 400, description = "Empty flight list"),
        (status = 404, description = "Unknown flight")
    )
)]
pub async fn transition_flights(
    State(state): State<SharedState>,
    Json(request): Json<TransitionRequest>,
) -> ApiResult<Json<Vec<FlightResponse>>> {
    if request.flight_ids.is_empty() {
        return Err(ApiError::BadRequest {
            error_code: "invalid_input".to_string(),
            message: "flight_ids must not be empty".to_string(),
        });
    }

    let mut state_guard = state.write().await;

    let flights = state_guard
        .store
        .transition(&request.flight_ids, request.transition)?;
    let store = &state_guard.store;
    let responses = flights
        .iter()
        .map(|flight| flight_response(store, flight))
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(responses))
}
