//! Record types and write payloads shared across the application.
//!
//! Records are what the store holds; `New*` payloads create them and
//! `*Update` payloads carry a partial update where `None` means "leave as is".

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::lifecycle::FlightStatus;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh, time-ordered identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

record_id!(
    /// Identifier of a [`Contact`].
    ContactId
);
record_id!(
    /// Identifier of a [`Drone`].
    DroneId
);
record_id!(
    /// Identifier of a [`Package`].
    PackageId
);
record_id!(
    /// Identifier of a [`Flight`].
    FlightId
);

// =============================================================================
// CONTACTS
// =============================================================================

/// A person who may be a customer, a VIP customer and/or a licensed pilot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Contact {
    /// Record identifier.
    pub id: ContactId,

    /// Display name.
    #[schema(example = "Lucía Pérez")]
    pub name: String,

    /// Whether the contact can own packages.
    pub is_customer: bool,

    /// VIP classification, affects the consumption estimate of flights they pilot.
    pub is_vip: bool,

    /// Whether the contact can pilot flights.
    pub is_pilot: bool,

    /// Pilot license number. Required when `is_pilot` is set.
    #[schema(example = "UAS-ES-000123")]
    pub license_number: Option<String>,
}

impl Contact {
    /// License number, treating blank strings as absent.
    #[must_use]
    pub fn license(&self) -> Option<&str> {
        self.license_number
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Payload to create a contact.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(default)]
pub struct NewContact {
    /// Display name.
    #[schema(example = "Lucía Pérez")]
    pub name: String,
    /// Whether the contact can own packages.
    pub is_customer: bool,
    /// VIP classification.
    pub is_vip: bool,
    /// Whether the contact can pilot flights.
    pub is_pilot: bool,
    /// Pilot license number.
    pub license_number: Option<String>,
}

/// Partial update of a contact.
///
/// An empty `license_number` clears the license.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(default)]
pub struct ContactUpdate {
    /// New display name.
    pub name: Option<String>,
    /// New customer flag.
    pub is_customer: Option<bool>,
    /// New VIP flag.
    pub is_vip: Option<bool>,
    /// New pilot flag.
    pub is_pilot: Option<bool>,
    /// New license number.
    pub license_number: Option<String>,
}

impl ContactUpdate {
    /// Whether the update touches the fields covered by the pilot license rule.
    #[must_use]
    pub const fn touches_pilot_license(&self) -> bool {
        self.is_pilot.is_some() || self.license_number.is_some()
    }
}

// =============================================================================
// DRONES
// =============================================================================

/// Operational status of a drone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DroneStatus {
    /// Ready to be assigned.
    #[default]
    Available,
    /// Currently flying.
    InFlight,
    /// In the workshop.
    InMaintenance,
}

/// Default battery level of a new drone.
pub const FULL_BATTERY_PERCENT: u8 = 100;

/// A delivery drone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Drone {
    /// Record identifier.
    pub id: DroneId,

    /// Drone name.
    #[schema(example = "Halcón-01")]
    pub name: String,

    /// Maximum payload in kilograms.
    #[schema(example = 5.0)]
    pub max_capacity_kg: f64,

    /// Battery level (0-100).
    #[schema(example = 100, maximum = 100)]
    pub battery_percent: u8,

    /// Operational status.
    pub status: DroneStatus,
}

/// Payload to create a drone.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct NewDrone {
    /// Drone name.
    pub name: String,
    /// Maximum payload in kilograms.
    pub max_capacity_kg: f64,
    /// Battery level, defaults to 100.
    #[serde(default)]
    pub battery_percent: Option<u8>,
    /// Status, defaults to available.
    #[serde(default)]
    pub status: Option<DroneStatus>,
}

/// Partial update of a drone.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(default)]
pub struct DroneUpdate {
    /// New name.
    pub name: Option<String>,
    /// New maximum payload.
    pub max_capacity_kg: Option<f64>,
    /// New battery level.
    pub battery_percent: Option<u8>,
    /// New status.
    pub status: Option<DroneStatus>,
}

// =============================================================================
// PACKAGES
// =============================================================================

/// A shippable item owned by a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Package {
    /// Record identifier.
    pub id: PackageId,

    /// Package code, immutable once assigned.
    #[schema(example = "20240301102030")]
    pub code: String,

    /// What is being shipped.
    #[schema(example = "Medical supplies")]
    pub description: String,

    /// Weight in kilograms.
    #[schema(example = 2.5)]
    pub weight_kg: f64,

    /// Owning customer.
    pub customer_id: ContactId,

    /// Flight the package is assigned to.
    pub flight_id: Option<FlightId>,
}

/// Payload to create a package.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct NewPackage {
    /// Explicit code; generated from the clock when absent.
    #[serde(default)]
    pub code: Option<String>,
    /// What is being shipped.
    pub description: String,
    /// Weight in kilograms.
    pub weight_kg: f64,
    /// Owning customer.
    pub customer_id: ContactId,
    /// Flight to attach the package to.
    #[serde(default)]
    pub flight_id: Option<FlightId>,
}

/// Partial update of a package.
///
/// `code` and `flight_id` are accepted only when they leave the stored value
/// unchanged, or fill in a flight that was not yet assigned.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(default)]
pub struct PackageUpdate {
    /// Code (read-only).
    pub code: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New weight.
    pub weight_kg: Option<f64>,
    /// New owning customer.
    pub customer_id: Option<ContactId>,
    /// Flight assignment (read-only once set).
    pub flight_id: Option<FlightId>,
}

// =============================================================================
// FLIGHTS
// =============================================================================

/// A delivery operation combining one drone, one pilot and a set of packages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Flight {
    /// Record identifier.
    pub id: FlightId,

    /// Flight code, immutable once assigned.
    #[schema(example = "240301102030")]
    pub code: String,

    /// Flight name.
    #[schema(example = "20240301_Vuelo")]
    pub name: String,

    /// Drone flying the packages.
    pub drone_id: DroneId,

    /// Pilot in charge.
    pub pilot_id: ContactId,

    /// Set by the prepare action, cleared by unlock.
    pub prepared: bool,

    /// Set by the finalize action.
    pub realized: bool,

    /// Sum of the attached packages' weights.
    #[schema(example = 4.0)]
    pub total_weight_kg: f64,

    /// Estimated battery consumption in percent.
    #[schema(example = 45.0)]
    pub consumption_percent: f64,
}

impl Flight {
    /// Lifecycle state derived from the `prepared` and `realized` flags.
    #[must_use]
    pub const fn status(&self) -> FlightStatus {
        FlightStatus::from_flags(self.prepared, self.realized)
    }
}

/// Payload to create a flight.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct NewFlight {
    /// Explicit code; generated from the clock when absent.
    #[serde(default)]
    pub code: Option<String>,
    /// Explicit name; defaults to a date-stamped label.
    #[serde(default)]
    pub name: Option<String>,
    /// Drone flying the packages.
    pub drone_id: DroneId,
    /// Pilot in charge.
    pub pilot_id: ContactId,
    /// Packages to attach on creation.
    #[serde(default)]
    pub package_ids: Vec<PackageId>,
}

/// Partial update of a flight.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(default)]
pub struct FlightUpdate {
    /// Code (read-only).
    pub code: Option<String>,
    /// New name.
    pub name: Option<String>,
    /// New drone.
    pub drone_id: Option<DroneId>,
    /// New pilot.
    pub pilot_id: Option<ContactId>,
}
