//! Drone API endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use dronify_core::{ContactId, Drone, DroneId, DroneUpdate, NewDrone, RecordStore};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::contacts::{contact_response, ContactResponse};
use crate::api::error::ApiResult;
use crate::state::SharedState;

/// Creates the drones router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_drones).post(create_drone))
        .route("/{id}", get(get_drone).put(update_drone))
        .route("/{id}/pilots", get(list_authorized_pilots))
}

/// A drone together with the contacts authorized to pilot it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DroneResponse {
    /// The drone record.
    #[serde(flatten)]
    pub drone: Drone,

    /// Contacts authorized to pilot the drone.
    pub authorized_pilot_ids: Vec<ContactId>,
}

pub(crate) fn drone_response(store: &RecordStore, drone: &Drone) -> ApiResult<DroneResponse> {
    let authorized_pilot_ids = store
        .authorized_pilots(drone.id)?
        .into_iter()
        .map(|contact| contact.id)
        .collect();

    Ok(DroneResponse {
        drone: drone.clone(),
        authorized_pilot_ids,
    })
}

/// List all drones.
#[utoipa::path(
    get,
    path = "/api/drones",
    tag = "drones",
    operation_id = "listDrones",
    summary = "List drones",
    responses(
        (status = 200, description = "Drones in creation order", body = Vec<DroneResponse>)
    )
)]
pub async fn list_drones(State(state): State<SharedState>) -> ApiResult<Json<Vec<DroneResponse>>> {
    let state_guard = state.read().await;
    let store = &state_guard.store;

    let drones = store
        .drones()
        .into_iter()
        .map(|drone| drone_response(store, drone))
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(drones))
}

/// Register a drone.
#[utoipa::path(
    post,
    path = "/api/drones",
    tag = "drones",
    operation_id = "createDrone",
    summary = "Register a drone",
    description = "Battery defaults to 100 % and status to `available`.",
    request_body = NewDrone,
    responses(
        (status = 201, description = "Drone created", body = DroneResponse),
        (status = 400, description = "Invalid name, capacity or battery level")
    )
)]
pub async fn create_drone(
    State(state): State<SharedState>,
    Json(request): Json<NewDrone>,
) -> ApiResult<(StatusCode, Json<DroneResponse>)> {
    let mut state_guard = state.write().await;

    let drone = state_guard.store.create_drone(request)?;
    let response = drone_response(&state_guard.store, &drone)?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Get a drone.
#[utoipa::path(
    get,
    path = "/api/drones/{id}",
    tag = "drones",
    operation_id = "getDrone",
    summary = "Get a drone",
    params(("id" = uuid::Uuid, Path, description = "Drone identifier")),
    responses(
        (status = 200, description = "Drone found", body = DroneResponse),
        (status = 404, description = "Unknown drone")
    )
)]
pub async fn get_drone(
    State(state): State<SharedState>,
    Path(id): Path<DroneId>,
) -> ApiResult<Json<DroneResponse>> {
    let state_guard = state.read().await;
    let drone = state_guard.store.drone(id)?;
    Ok(Json(drone_response(&state_guard.store, drone)?))
}

/// Update a drone.
#[utoipa::path(
    put,
    path = "/api/drones/{id}",
    tag = "drones",
    operation_id = "updateDrone",
    summary = "Update a drone",
    params(("id" = uuid::Uuid, Path, description = "Drone identifier")),
    request_body = DroneUpdate,
    responses(
        (status = 200, description = "Drone updated", body = DroneResponse),
        (status = 400, description = "Invalid value"),
        (status = 404, description = "Unknown drone")
    )
)]
pub async fn update_drone(
    State(state): State<SharedState>,
    Path(id): Path<DroneId>,
    Json(request): Json<DroneUpdate>,
) -> ApiResult<Json<DroneResponse>> {
    let mut state_guard = state.write().await;

    let drone = state_guard.store.update_drone(id, request)?;
    Ok(Json(drone_response(&state_guard.store, &drone)?))
}

/// List the contacts authorized to pilot a drone.
#[utoipa::path(
    get,
    path = "/api/drones/{id}/pilots",
    tag = "drones",
    operation_id = "listAuthorizedPilots",
    summary = "List contacts authorized to pilot a drone",
    params(("id" = uuid::Uuid, Path, description = "Drone identifier")),
    responses(
        (status = 200, description = "Authorized pilots", body = Vec<ContactResponse>),
        (status = 404, description = "Unknown drone")
    )
)]
pub async fn list_authorized_pilots(
    State(state): State<SharedState>,
    Path(id): Path<DroneId>,
) -> ApiResult<Json<Vec<ContactResponse>>> {
    let state_guard = state.read().await;
    let store = &state_guard.store;

    let pilots = store
        .authorized_pilots(id)?
        .into_iter()
        .map(|contact| contact_response(store, contact))
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(pilots))
}
