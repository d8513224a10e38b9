//! Package API endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use dronify_core::{NewPackage, Package, PackageId, PackageUpdate, RecordStore};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::ApiResult;
use crate::state::SharedState;

/// Creates the packages router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_packages).post(create_package))
        .route("/{id}", get(get_package).put(update_package))
}

/// A package with the name of the drone carrying it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PackageResponse {
    /// The package record.
    #[serde(flatten)]
    pub package: Package,

    /// Drone of the flight the package is assigned to, if any.
    #[schema(example = "Condor-1")]
    pub drone_name: Option<String>,
}

fn package_response(store: &RecordStore, package: &Package) -> ApiResult<PackageResponse> {
    let drone_name = store.package_drone_name(package.id)?.map(str::to_string);
    Ok(PackageResponse {
        package: package.clone(),
        drone_name,
    })
}

/// List all packages.
#[utoipa::path(
    get,
    path = "/api/packages",
    tag = "packages",
    operation_id = "listPackages",
    summary = "List packages",
    responses(
        (status = 200, description = "Packages in creation order", body = Vec<PackageResponse>)
    )
)]
pub async fn list_packages(
    State(state): State<SharedState>,
) -> ApiResult<Json<Vec<PackageResponse>>> {
    let state_guard = state.read().await;
    let store = &state_guard.store;

    let packages = store
        .packages()
        .into_iter()
        .map(|package| package_response(store, package))
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(packages))
}

/// Create a package.
#[utoipa::path(
    post,
    path = "/api/packages",
    tag = "packages",
    operation_id = "createPackage",
    summary = "Create a package",
    description = "When no code is supplied one is generated from the current \
        time (`YYYYMMDDHHMMSS`). Supplying `flight_id` attaches the package and \
        refreshes that flight's weight and consumption.",
    request_body = NewPackage,
    responses(
        (status = 201, description = "Package created", body = PackageResponse),
        (status = 400, description = "Invalid description or weight"),
        (status = 404, description = "Unknown customer or flight"),
        (status = 422, description = "Owner is not a customer")
    )
)]
pub async fn create_package(
    State(state): State<SharedState>,
    Json(request): Json<NewPackage>,
) -> ApiResult<(StatusCode, Json<PackageResponse>)> {
    let mut state_guard = state.write().await;

    let package = state_guard.store.create_package(request)?;
    let response = package_response(&state_guard.store, &package)?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Get a package.
#[utoipa::path(
    get,
    path = "/api/packages/{id}",
    tag = "packages",
    operation_id = "getPackage",
    summary = "Get a package",
    params(("id" = uuid::Uuid, Path, description = "Package identifier")),
    responses(
        (status = 200, description = "Package found", body = PackageResponse),
        (status = 404, description = "Unknown package")
    )
)]
pub async fn get_package(
    State(state): State<SharedState>,
    Path(id): Path<PackageId>,
) -> ApiResult<Json<PackageResponse>> {
    let state_guard = state.read().await;
    let package = state_guard.store.package(id)?;
    Ok(Json(package_response(&state_guard.store, package)?))
}

/// Update a package.
#[utoipa::path(
    put,
    path = "/api/packages/{id}",
    tag = "packages",
    operation_id = "updatePackage",
    summary = "Update a package",
    description = "Changing the weight refreshes the assigned flight's totals. \
        The code and an existing flight assignment are read-only.",
    params(("id" = uuid::Uuid, Path, description = "Package identifier")),
    request_body = PackageUpdate,
    responses(
        (status = 200, description = "Package updated", body = PackageResponse),
        (status = 400, description = "Invalid value"),
        (status = 404, description = "Unknown package"),
        (status = 409, description = "Read-only field changed")
    )
)]
pub async fn update_package(
    State(state): State<SharedState>,
    Path(id): Path<PackageId>,
    Json(request): Json<PackageUpdate>,
) -> ApiResult<Json<PackageResponse>> {
    let mut state_guard = state.write().await;

    let package = state_guard.store.update_package(id, request)?;
    Ok(Json(package_response(&state_guard.store, &package)?))
}
