//! Write-time validation of records.
//!
//! Validators run on the staged copy of a record before the store commits a
//! write. A failing validator rejects the whole write.

use crate::error::{DronifyError, Result};
use crate::types::{Contact, Drone, Flight, Package};

/// Message of the pilot license rule.
pub const LICENSE_REQUIRED: &str = "license required";

/// A pilot must carry a non-blank license number.
///
/// # Errors
///
/// Returns [`DronifyError::Validation`] with [`LICENSE_REQUIRED`].
pub fn validate_pilot_license(contact: &Contact) -> Result<()> {
    if contact.is_pilot && contact.license().is_none() {
        return Err(DronifyError::Validation(LICENSE_REQUIRED.to_string()));
    }
    Ok(())
}

/// Field-level checks of a contact other than the license rule.
///
/// # Errors
///
/// Returns [`DronifyError::Validation`] if the name is blank.
pub fn validate_contact(contact: &Contact) -> Result<()> {
    require_text("contact", "name", &contact.name)
}

/// Field-level checks of a drone.
///
/// # Errors
///
/// Returns [`DronifyError::Validation`] for a blank name and
/// [`DronifyError::InvalidInput`] for a bad capacity or battery level.
pub fn validate_drone(drone: &Drone) -> Result<()> {
    require_text("drone", "name", &drone.name)?;
    require_non_negative("max_capacity_kg", drone.max_capacity_kg)?;
    if drone.battery_percent > 100 {
        return Err(DronifyError::InvalidInput(format!(
            "battery_percent must be between 0 and 100 (got {})",
            drone.battery_percent
        )));
    }
    Ok(())
}

/// Check a package against its owning customer.
///
/// # Errors
///
/// Returns [`DronifyError::Validation`] for a blank description,
/// [`DronifyError::InvalidInput`] for a bad weight and
/// [`DronifyError::ReferenceViolation`] if the owner is not a customer.
pub fn validate_package(package: &Package, customer: &Contact) -> Result<()> {
    require_text("package", "description", &package.description)?;
    require_non_negative("weight_kg", package.weight_kg)?;
    if !customer.is_customer {
        return Err(DronifyError::ReferenceViolation(format!(
            "package owner {} is not a customer",
            customer.id
        )));
    }
    Ok(())
}

/// Check a flight against its pilot.
///
/// # Errors
///
/// Returns [`DronifyError::Validation`] for a blank name and
/// [`DronifyError::ReferenceViolation`] if the pilot is not flagged as pilot.
pub fn validate_flight(flight: &Flight, pilot: &Contact) -> Result<()> {
    require_text("flight", "name", &flight.name)?;
    if !pilot.is_pilot {
        return Err(DronifyError::ReferenceViolation(format!(
            "flight pilot {} is not a pilot",
            pilot.id
        )));
    }
    Ok(())
}

fn require_text(entity: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DronifyError::Validation(format!(
            "{entity} {field} is required"
        )));
    }
    Ok(())
}

fn require_non_negative(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(DronifyError::InvalidInput(format!(
            "{field} must be a non-negative number (got {value})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContactId, DroneId, DroneStatus, FlightId, PackageId};

    fn contact(is_pilot: bool, license: Option<&str>) -> Contact {
        Contact {
            id: ContactId::generate(),
            name: "Marta".to_string(),
            is_customer: true,
            is_vip: false,
            is_pilot,
            license_number: license.map(str::to_string),
        }
    }

    #[test]
    fn test_pilot_without_license_rejected() {
        for license in [None, Some(""), Some("  ")] {
            let err = validate_pilot_license(&contact(true, license)).unwrap_err();
            assert!(
                matches!(&err, DronifyError::Validation(msg) if msg == LICENSE_REQUIRED),
                "unexpected error: {err:?}"
            );
        }
    }

    #[test]
    fn test_pilot_with_license_accepted() {
        assert!(validate_pilot_license(&contact(true, Some("LIC-42"))).is_ok());
    }

    #[test]
    fn test_non_pilot_license_optional() {
        assert!(validate_pilot_license(&contact(false, None)).is_ok());
        assert!(validate_pilot_license(&contact(false, Some(""))).is_ok());
        assert!(validate_pilot_license(&contact(false, Some("LIC-1"))).is_ok());
    }

    #[test]
    fn test_contact_requires_name() {
        let mut c = contact(false, None);
        c.name = " ".to_string();
        assert!(validate_contact(&c).is_err());
    }

    #[test]
    fn test_drone_checks() {
        let mut drone = Drone {
            id: DroneId::generate(),
            name: "D-1".to_string(),
            max_capacity_kg: 5.0,
            battery_percent: 100,
            status: DroneStatus::Available,
        };
        assert!(validate_drone(&drone).is_ok());

        drone.battery_percent = 101;
        assert!(matches!(
            validate_drone(&drone),
            Err(DronifyError::InvalidInput(_))
        ));

        drone.battery_percent = 50;
        drone.max_capacity_kg = -1.0;
        assert!(validate_drone(&drone).is_err());
    }

    #[test]
    fn test_package_owner_must_be_customer() {
        let mut owner = contact(false, None);
        let package = Package {
            id: PackageId::generate(),
            code: "20240301102030".to_string(),
            description: "Parts".to_string(),
            weight_kg: 1.0,
            customer_id: owner.id,
            flight_id: None,
        };
        assert!(validate_package(&package, &owner).is_ok());

        owner.is_customer = false;
        assert!(matches!(
            validate_package(&package, &owner),
            Err(DronifyError::ReferenceViolation(_))
        ));
    }

    #[test]
    fn test_package_rejects_negative_weight() {
        let owner = contact(false, None);
        let package = Package {
            id: PackageId::generate(),
            code: "c".to_string(),
            description: "Parts".to_string(),
            weight_kg: -2.0,
            customer_id: owner.id,
            flight_id: None,
        };
        assert!(matches!(
            validate_package(&package, &owner),
            Err(DronifyError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_flight_pilot_must_be_pilot() {
        let pilot = contact(false, None);
        let flight = Flight {
            id: FlightId::generate(),
            code: "240301102030".to_string(),
            name: "20240301_Vuelo".to_string(),
            drone_id: DroneId::generate(),
            pilot_id: pilot.id,
            prepared: false,
            realized: false,
            total_weight_kg: 0.0,
            consumption_percent: 0.0,
        };
        assert!(matches!(
            validate_flight(&flight, &pilot),
            Err(DronifyError::ReferenceViolation(_))
        ));
    }
}
