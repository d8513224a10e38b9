//! Flight weight aggregation.

use crate::types::{FlightId, Package};

/// Sum of the weights of `packages`. An empty set weighs 0 kg.
pub fn total_weight<'a>(packages: impl IntoIterator<Item = &'a Package>) -> f64 {
    packages.into_iter().map(|p| p.weight_kg).sum()
}

/// Packages currently attached to `flight`.
pub fn attached_to<'a>(
    flight: FlightId,
    packages: impl IntoIterator<Item = &'a Package>,
) -> impl Iterator<Item = &'a Package> {
    packages
        .into_iter()
        .filter(move |p| p.flight_id == Some(flight))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContactId, PackageId};

    fn package(weight_kg: f64, flight_id: Option<FlightId>) -> Package {
        Package {
            id: PackageId::generate(),
            code: "20240301102030".to_string(),
            description: "Box".to_string(),
            weight_kg,
            customer_id: ContactId::generate(),
            flight_id,
        }
    }

    #[test]
    fn test_empty_set_weighs_zero() {
        assert!(total_weight(std::iter::empty()).abs() < f64::EPSILON);
    }

    #[test]
    fn test_sums_attached_packages_only() {
        let flight = FlightId::generate();
        let other = FlightId::generate();
        let packages = vec![
            package(2.5, Some(flight)),
            package(1.5, Some(flight)),
            package(9.0, Some(other)),
            package(3.0, None),
        ];

        let total = total_weight(attached_to(flight, &packages));
        assert!((total - 4.0).abs() < f64::EPSILON);
        assert_eq!(attached_to(other, &packages).count(), 1);
    }
}
