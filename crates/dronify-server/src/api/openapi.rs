//! OpenAPI specification generation for the dronify API.
//!
//! The document is served at `/api/openapi.json` and written to disk by the
//! `gen-openapi` binary for client generation.

use axum::Json;
use dronify_core::{
    Contact, ContactUpdate, Drone, DroneStatus, DroneUpdate, Flight, FlightStatus, FlightUpdate,
    NewContact, NewDrone, NewFlight, NewPackage, Package, PackageUpdate, Transition,
};
use utoipa::OpenApi;

use super::contacts::{AuthorizationResponse, ContactResponse};
use super::drones::DroneResponse;
use super::error::ErrorResponse;
use super::estimate::EstimateResponse;
use super::flights::{FlightResponse, TransitionRequest};
use super::health::HealthResponse;
use super::packages::PackageResponse;

/// Serve the OpenAPI specification as JSON.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Returns the OpenAPI specification as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

/// Main OpenAPI document structure for dronify.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "dronify API",
        version = "0.1.0",
        description = r#"
# dronify API

dronify manages a drone-delivery operation.

## Overview

- **Contacts** are customers (who own packages) and pilots (who must hold a license).
- **Drones** carry packages; pilots are authorized per drone.
- **Packages** are assigned to at most one flight.
- **Flights** combine a drone, a pilot and packages. Their total weight and
  battery consumption estimate are kept up to date on every write.

## Flight lifecycle

`prepare`, `unlock` and `finalize` set or clear the `prepared` and `realized`
flags without preconditions. The resulting `status` is one of `draft`,
`prepared`, `completed` or `reopened`.

## Codes

Package codes (`YYYYMMDDHHMMSS`) and flight codes (`YYMMDDHHMMSS`) are
generated from the configured timezone when not supplied and never change.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local dronify server")
    ),
    tags(
        (name = "system", description = "Health checks"),
        (name = "contacts", description = "Customers, pilots and pilot authorizations"),
        (name = "drones", description = "Drone fleet"),
        (name = "packages", description = "Packages and their flight assignment"),
        (name = "flights", description = "Flights, package assignment and lifecycle actions"),
        (name = "estimate", description = "Battery consumption estimates")
    ),
    paths(
        super::health::health_check,
        super::estimate::get_estimate,
        // Contacts
        super::contacts::list_contacts,
        super::contacts::create_contact,
        super::contacts::get_contact,
        super::contacts::update_contact,
        super::contacts::list_authorized_drones,
        super::contacts::authorize_drone,
        super::contacts::revoke_drone,
        // Drones
        super::drones::list_drones,
        super::drones::create_drone,
        super::drones::get_drone,
        super::drones::update_drone,
        super::drones::list_authorized_pilots,
        // Packages
        super::packages::list_packages,
        super::packages::create_package,
        super::packages::get_package,
        super::packages::update_package,
        // Flights
        super::flights::list_flights,
        super::flights::create_flight,
        super::flights::get_flight,
        super::flights::update_flight,
        super::flights::attach_package,
        super::flights::detach_package,
        super::flights::prepare_flight,
        super::flights::unlock_flight,
        super::flights::finalize_flight,
        super::flights::transition_flights,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            EstimateResponse,
            // Contacts
            Contact,
            NewContact,
            ContactUpdate,
            ContactResponse,
            AuthorizationResponse,
            // Drones
            Drone,
            DroneStatus,
            NewDrone,
            DroneUpdate,
            DroneResponse,
            // Packages
            Package,
            NewPackage,
            PackageUpdate,
            PackageResponse,
            // Flights
            Flight,
            FlightStatus,
            NewFlight,
            FlightUpdate,
            FlightResponse,
            Transition,
            TransitionRequest,
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generation() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "dronify API");
        assert!(spec.paths.paths.contains_key("/api/flights/{id}/prepare"));
        assert!(spec.paths.paths.contains_key("/api/contacts/{id}/drones/{drone_id}"));
    }

    #[test]
    fn test_openapi_json_serialization() {
        let json = get_openapi_json().unwrap();
        assert!(json.contains("\"openapi\":"));
        assert!(json.contains("\"dronify API\""));
        assert!(json.contains("FlightResponse"));
    }
}
