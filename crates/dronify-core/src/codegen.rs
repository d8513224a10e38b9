//! Timestamp-derived record codes and default names.
//!
//! Codes are only generated when the caller supplies none, and are never
//! rewritten afterwards. Two records created within the same second get the
//! same code; nothing here enforces uniqueness.
//!
//! Package codes carry the full four-digit year while flight codes carry two
//! digits, so the two formats differ in length (14 vs 12 digits).

use std::fmt;

use chrono::{NaiveDateTime, Utc};
use chrono_tz::Tz;

/// `strftime` format of package codes (`20240301102030`).
pub const PACKAGE_CODE_FORMAT: &str = "%Y%m%d%H%M%S";

/// `strftime` format of flight codes (`240301102030`).
pub const FLIGHT_CODE_FORMAT: &str = "%y%m%d%H%M%S";

/// `strftime` format of the default flight name (`20240301_Vuelo`).
pub const FLIGHT_NAME_FORMAT: &str = "%Y%m%d_Vuelo";

/// Code for a package created at `now`.
#[must_use]
pub fn package_code(now: NaiveDateTime) -> String {
    now.format(PACKAGE_CODE_FORMAT).to_string()
}

/// Code for a flight created at `now`.
#[must_use]
pub fn flight_code(now: NaiveDateTime) -> String {
    now.format(FLIGHT_CODE_FORMAT).to_string()
}

/// Name given to a flight created at `now` without an explicit name.
#[must_use]
pub fn default_flight_name(now: NaiveDateTime) -> String {
    now.format(FLIGHT_NAME_FORMAT).to_string()
}

/// Keep a caller-supplied code verbatim, or generate one.
///
/// Only a missing or empty code is replaced.
pub fn code_or_generate(
    supplied: Option<String>,
    now: NaiveDateTime,
    generate: fn(NaiveDateTime) -> String,
) -> String {
    match supplied {
        Some(code) if !code.is_empty() => code,
        _ => generate(now),
    }
}

/// Source of the local wall-clock time used to stamp new records.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current local date and time.
    fn now(&self) -> NaiveDateTime;
}

/// Reads the system clock in a fixed timezone.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    /// Clock reporting wall-clock time in `tz`.
    #[must_use]
    pub const fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(chrono_tz::UTC)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.tz).naive_local()
    }
}

/// Always reports the same instant. Useful for deterministic codes.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
