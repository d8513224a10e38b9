//! Contact API endpoints.
//!
//! Contacts are customers (who own packages) and pilots (who fly them).
//! A pilot must always carry a license number; writes that break this rule
//! are rejected with `400 validation_error`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use dronify_core::{Contact, ContactId, ContactUpdate, DroneId, NewContact, RecordStore};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::drones::DroneResponse;
use crate::api::error::ApiResult;
use crate::state::SharedState;

/// Creates the contacts router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_contacts).post(create_contact))
        .route("/{id}", get(get_contact).put(update_contact))
        .route("/{id}/drones", get(list_authorized_drones))
        .route(
            "/{id}/drones/{drone_id}",
            put(authorize_drone).delete(revoke_drone),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// A contact together with the drones they may pilot.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContactResponse {
    /// The contact record.
    #[serde(flatten)]
    pub contact: Contact,

    /// Drones the contact is authorized to pilot.
    pub authorized_drone_ids: Vec<DroneId>,
}

/// Result of an authorization change.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "changed": true }))]
pub struct AuthorizationResponse {
    /// `false` when the authorization was already in the requested state.
    pub changed: bool,
}

pub(crate) fn contact_response(
    store: &RecordStore,
    contact: &Contact,
) -> ApiResult<ContactResponse> {
    let authorized_drone_ids = store
        .authorized_drones(contact.id)?
        .into_iter()
        .map(|drone| drone.id)
        .collect();

    Ok(ContactResponse {
        contact: contact.clone(),
        authorized_drone_ids,
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// List all contacts.
#[utoipa::path(
    get,
    path = "/api/contacts",
    tag = "contacts",
    operation_id = "listContacts",
    summary = "List contacts",
    responses(
        (status = 200, description = "Contacts in creation order", body = Vec<ContactResponse>)
    )
)]
pub async fn list_contacts(
    State(state): State<SharedState>,
) -> ApiResult<Json<Vec<ContactResponse>>> {
    let state_guard = state.read().await;
    let store = &state_guard.store;

    let contacts = store
        .contacts()
        .into_iter()
        .map(|contact| contact_response(store, contact))
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(contacts))
}

/// Create a contact.
#[utoipa::path(
    post,
    path = "/api/contacts",
    tag = "contacts",
    operation_id = "createContact",
    summary = "Create a contact",
    description = "Creates a customer and/or pilot. Pilots require a license number.",
    request_body = NewContact,
    responses(
        (status = 201, description = "Contact created", body = ContactResponse),
        (status = 400, description = "Validation failed (e.g. license required)")
    )
)]
pub async fn create_contact(
    State(state): State<SharedState>,
    Json(request): Json<NewContact>,
) -> ApiResult<(StatusCode, Json<ContactResponse>)> {
    let mut state_guard = state.write().await;

    let contact = state_guard.store.create_contact(request)?;
    let response = contact_response(&state_guard.store, &contact)?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Get a contact.
#[utoipa::path(
    get,
    path = "/api/contacts/{id}",
    tag = "contacts",
    operation_id = "getContact",
    summary = "Get a contact",
    params(("id" = uuid::Uuid, Path, description = "Contact identifier")),
    responses(
        (status = 200, description = "Contact found", body = ContactResponse),
        (status = 404, description = "Unknown contact", body = crate::api::error::ErrorResponse)
    )
)]
pub async fn get_contact(
    State(state): State<SharedState>,
    Path(id): Path<ContactId>,
) -> ApiResult<Json<ContactResponse>> {
    let state_guard = state.read().await;
    let contact = state_guard.store.contact(id)?;
    Ok(Json(contact_response(&state_guard.store, contact)?))
}

/// Update a contact.
#[utoipa::path(
    put,
    path = "/api/contacts/{id}",
    tag = "contacts",
    operation_id = "updateContact",
    summary = "Update a contact",
    description = "Applies a partial update. Changing the VIP flag refreshes the \
        consumption estimate of every flight the contact pilots. An empty \
        license number clears the license.",
    params(("id" = uuid::Uuid, Path, description = "Contact identifier")),
    request_body = ContactUpdate,
    responses(
        (status = 200, description = "Contact updated", body = ContactResponse),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Unknown contact")
    )
)]
pub async fn update_contact(
    State(state): State<SharedState>,
    Path(id): Path<ContactId>,
    Json(request): Json<ContactUpdate>,
) -> ApiResult<Json<ContactResponse>> {
    let mut state_guard = state.write().await;

    let contact = state_guard.store.update_contact(id, request)?;
    Ok(Json(contact_response(&state_guard.store, &contact)?))
}

/// List the drones a contact may pilot.
#[utoipa::path(
    get,
    path = "/api/contacts/{id}/drones",
    tag = "contacts",
    operation_id = "listAuthorizedDrones",
    summary = "List drones a contact is authorized to pilot",
    params(("id" = uuid::Uuid, Path, description = "Contact identifier")),
    responses(
        (status = 200, description = "Authorized drones", body = Vec<DroneResponse>),
        (status = 404, description = "Unknown contact")
    )
)]
pub async fn list_authorized_drones(
    State(state): State<SharedState>,
    Path(id): Path<ContactId>,
) -> ApiResult<Json<Vec<DroneResponse>>> {
    let state_guard = state.read().await;
    let store = &state_guard.store;

    let drones = store
        .authorized_drones(id)?
        .into_iter()
        .map(|drone| crate::api::drones::drone_response(store, drone))
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(drones))
}

/// Authorize a contact to pilot a drone.
#[utoipa::path(
    put,
    path = "/api/contacts/{id}/drones/{drone_id}",
    tag = "contacts",
    operation_id = "authorizeDrone",
    summary = "Authorize a contact to pilot a drone",
    params(
        ("id" = uuid::Uuid, Path, description = "Contact identifier"),
        ("drone_id" = uuid::Uuid, Path, description = "Drone identifier")
    ),
    responses(
        (status = 200, description = "Authorization recorded", body = AuthorizationResponse),
        (status = 404, description = "Unknown contact or drone")
    )
)]
pub async fn authorize_drone(
    State(state): State<SharedState>,
    Path((id, drone_id)): Path<(ContactId, DroneId)>,
) -> ApiResult<Json<AuthorizationResponse>> {
    let mut state_guard = state.write().await;
    let changed = state_guard.store.authorize_pilot(id, drone_id)?;
    Ok(Json(AuthorizationResponse { changed }))
}

/// Withdraw a pilot authorization.
#[utoipa::path(
    delete,
    path = "/api/contacts/{id}/drones/{drone_id}",
    tag = "contacts",
    operation_id = "revokeDrone",
    summary = "Revoke a contact's authorization to pilot a drone",
    params(
        ("id" = uuid::Uuid, Path, description = "Contact identifier"),
        ("drone_id" = uuid::Uuid, Path, description = "Drone identifier")
    ),
    responses(
        (status = 200, description = "Authorization removed", body = AuthorizationResponse),
        (status = 404, description = "Unknown contact or drone")
    )
)]
pub async fn revoke_drone(
    State(state): State<SharedState>,
    Path((id, drone_id)): Path<(ContactId, DroneId)>,
) -> ApiResult<Json<AuthorizationResponse>> {
    let mut state_guard = state.write().await;
    let changed = state_guard.store.revoke_pilot(id, drone_id)?;
    Ok(Json(AuthorizationResponse { changed }))
}
