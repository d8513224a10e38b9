//! Flight lifecycle transitions.
//!
//! A flight carries two independent flags, `prepared` and `realized`. The
//! transitions below set or clear them without any precondition:
//!
//! | transition | effect             |
//! |------------|--------------------|
//! | prepare    | `prepared = true`  |
//! | unlock     | `prepared = false` |
//! | finalize   | `realized = true`  |
//!
//! Because nothing gates them, the pair `(prepared = false, realized = true)`
//! is reachable, either by unlocking a completed flight or by finalizing a
//! draft. It is reported as [`FlightStatus::Reopened`].

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::Flight;

/// Lifecycle state derived from a flight's flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FlightStatus {
    /// Neither prepared nor realized. Every new flight starts here.
    Draft,
    /// Prepared, not yet realized.
    Prepared,
    /// Prepared and realized.
    Completed,
    /// Realized while the prepared flag is cleared.
    Reopened,
}

impl FlightStatus {
    /// Map the `(prepared, realized)` flag pair to a state.
    #[must_use]
    pub const fn from_flags(prepared: bool, realized: bool) -> Self {
        match (prepared, realized) {
            (false, false) => Self::Draft,
            (true, false) => Self::Prepared,
            (true, true) => Self::Completed,
            (false, true) => Self::Reopened,
        }
    }
}

/// One of the three flight actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Set `prepared`.
    Prepare,
    /// Clear `prepared`.
    Unlock,
    /// Set `realized`.
    Finalize,
}

impl Transition {
    /// Apply the transition, returning `true` if a flag actually changed.
    pub fn apply(self, flight: &mut Flight) -> bool {
        let before = (flight.prepared, flight.realized);
        match self {
            Self::Prepare => flight.prepared = true,
            Self::Unlock => flight.prepared = false,
            Self::Finalize => flight.realized = true,
        }
        before != (flight.prepared, flight.realized)
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Prepare => "prepare",
            Self::Unlock => "unlock",
            Self::Finalize => "finalize",
        })
    }
}

/// Mark the flight as prepared.
pub fn prepare(flight: &mut Flight) -> bool {
    Transition::Prepare.apply(flight)
}

/// Clear the prepared flag, whatever the current state.
pub fn unlock(flight: &mut Flight) -> bool {
    Transition::Unlock.apply(flight)
}

/// Mark the flight as realized.
pub fn finalize(flight: &mut Flight) -> bool {
    Transition::Finalize.apply(flight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContactId, DroneId, FlightId};

    fn draft() -> Flight {
        Flight {
            id: FlightId::generate(),
            code: "240301102030".to_string(),
            name: "20240301_Vuelo".to_string(),
            drone_id: DroneId::generate(),
            pilot_id: ContactId::generate(),
            prepared: false,
            realized: false,
            total_weight_kg: 0.0,
            consumption_percent: 0.0,
        }
    }

    #[test]
    fn test_new_flight_is_draft() {
        assert_eq!(draft().status(), FlightStatus::Draft);
    }

    #[test]
    fn test_prepare_then_finalize() {
        let mut flight = draft();
        assert!(prepare(&mut flight));
        assert_eq!(flight.status(), FlightStatus::Prepared);
        assert!(finalize(&mut flight));
        assert_eq!(flight.status(), FlightStatus::Completed);
    }

    #[test]
    fn test_prepare_is_idempotent() {
        let mut once = draft();
        prepare(&mut once);
        let mut twice = once.clone();
        assert!(!prepare(&mut twice));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut once = draft();
        finalize(&mut once);
        let mut twice = once.clone();
        assert!(!finalize(&mut twice));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unlock_completed_flight_keeps_realized() {
        let mut flight = draft();
        prepare(&mut flight);
        finalize(&mut flight);

        assert!(unlock(&mut flight));
        assert!(!flight.prepared);
        assert!(flight.realized);
        assert_eq!(flight.status(), FlightStatus::Reopened);
    }

    #[test]
    fn test_finalize_draft_skips_prepare() {
        let mut flight = draft();
        finalize(&mut flight);
        assert_eq!((flight.prepared, flight.realized), (false, true));
    }

    #[test]
    fn test_unlock_draft_is_noop() {
        let mut flight = draft();
        assert!(!unlock(&mut flight));
        assert_eq!(flight.status(), FlightStatus::Draft);
    }

    #[test]
    fn test_transition_display() {
        assert_eq!(Transition::Finalize.to_string(), "finalize");
    }
}
