//! # dronify-core
//!
//! Core business logic for the dronify drone-delivery operator.
//!
//! This crate provides:
//! - Contact, drone, package and flight records with write-time validation
//! - Flight weight aggregation and battery consumption estimates
//! - The flight lifecycle (prepare / unlock / finalize)
//! - Timestamp-derived record codes
//! - An in-memory transactional store that keeps derived fields up to date
//!
//! ## Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`estimator`] - Consumption estimate from weight and pilot VIP status
//! - [`aggregator`] - Total package weight of a flight
//! - [`validators`] - Record-validity rules run before a write commits
//! - [`lifecycle`] - Flight state flags and transitions
//! - [`codegen`] - Package/flight codes and the clock they are stamped from
//! - [`dependencies`] - Derived-field dependency graph
//! - [`store`] - Transactional record store tying the above together
//! - [`config`] - Application configuration loading and validation
//! - [`error`] - Errors returned by the record store
//! - [`types`] - Records, identifiers and write payloads

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod aggregator;
pub mod codegen;
pub mod config;
pub mod dependencies;
pub mod error;
pub mod estimator;
pub mod lifecycle;
pub mod store;
pub mod types;
pub mod validators;

// Re-export primary types for convenience
pub use codegen::{Clock, FixedClock, SystemClock};
pub use crate::config::{
    default_config_path, is_valid_timezone_format, ConfigError, ConfigResult, DronifyConfig,
    ServerConfig, SystemConfig,
};
pub use dependencies::{DependencyGraph, Field};
pub use error::{DronifyError, Result};
pub use estimator::{estimate, ConsumptionModel};
pub use lifecycle::{FlightStatus, Transition};
pub use store::RecordStore;
pub use types::{
    Contact, ContactId, ContactUpdate, Drone, DroneId, DroneStatus, DroneUpdate, Flight,
    FlightId, FlightUpdate, NewContact, NewDrone, NewFlight, NewPackage, Package, PackageId,
    PackageUpdate,
};
