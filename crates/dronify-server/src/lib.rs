//! # dronify-server
//!
//! HTTP server library for the dronify drone-delivery operator.
//!
//! This library provides the API handlers and state management for dronify.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod state;
