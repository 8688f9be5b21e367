//! Core types for the softstep simulator.
//!
//! This crate provides the foundational, behavior-free types shared by the
//! rest of the workspace:
//!
//! - [`SimError`] - everything that can go wrong at the simulator boundary
//! - [`SimulatorConfig`] - timestep, substep count, integrator options
//!
//! These types are **pure data**: no physics, no integration, no logging.

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod config;
mod error;

pub use config::SimulatorConfig;
pub use error::SimError;
