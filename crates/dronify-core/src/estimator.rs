//! Battery consumption estimate for a flight.
//!
//! The estimate is a pure function of the flight's total package weight and
//! whether the pilot is flagged as VIP:
//!
//! ```text
//! consumption = (base_percent + percent_per_kg * weight_kg) * (vip ? vip_factor : 1.0)
//! ```
//!
//! Coefficients are part of the configuration (`[consumption]` section).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{DronifyError, Result};

/// Coefficients of the consumption estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ConsumptionModel {
    /// Battery percentage spent by an unloaded flight.
    #[schema(example = 5.0)]
    pub base_percent: f64,

    /// Additional battery percentage per kilogram carried.
    #[schema(example = 10.0)]
    pub percent_per_kg: f64,

    /// Multiplier applied when the pilot is flagged as VIP.
    #[schema(example = 1.2)]
    pub vip_factor: f64,
}

impl Default for ConsumptionModel {
    fn default() -> Self {
        Self {
            base_percent: 5.0,
            percent_per_kg: 10.0,
            vip_factor: 1.2,
        }
    }
}

impl ConsumptionModel {
    /// Estimated battery consumption (percent) for a flight.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::InvalidInput`] if `total_weight_kg` is negative
    /// or not finite.
    pub fn estimate(&self, total_weight_kg: f64, pilot_is_vip: bool) -> Result<f64> {
        if !total_weight_kg.is_finite() || total_weight_kg < 0.0 {
            return Err(DronifyError::InvalidInput(format!(
                "total weight must be a non-negative number of kg (got {total_weight_kg})"
            )));
        }

        let consumption = self.percent_per_kg.mul_add(total_weight_kg, self.base_percent);
        if pilot_is_vip {
            Ok(consumption * self.vip_factor)
        } else {
            Ok(consumption)
        }
    }
}

/// [`ConsumptionModel::estimate`] with the default coefficients.
///
/// # Errors
///
/// Returns [`DronifyError::InvalidInput`] for negative or non-finite weight.
pub fn estimate(total_weight_kg: f64, pilot_is_vip: bool) -> Result<f64> {
    ConsumptionModel::default().estimate(total_weight_kg, pilot_is_vip)
}
