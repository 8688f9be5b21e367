//! Compliant-contact rigid-body simulation core.
//!
//! Two integrators advance an articulated system's generalized state
//! `(q, v, dv)` while resolving spring–damper contact forces at registered
//! sites:
//!
//! - [`EulerSimulator`] — semi-implicit (symplectic) Euler; contact forces
//!   evaluated once per substep and applied through `Jᵀf`.
//! - [`ExponentialSimulator`] — integrates the linearized contact dynamics
//!   analytically over each substep via a matrix exponential, and enforces
//!   friction-cone constraints on the resulting average force.
//!
//! # Quick start
//!
//! ```
//! use nalgebra::DVector;
//! use softstep_contact::{ContactParams, HalfSpace};
//! use softstep_core::ExponentialSimulator;
//! use softstep_dynamics::Model;
//! use softstep_types::SimulatorConfig;
//!
//! let model = Model::point_mass_3d(1.0);
//! let mut sim = ExponentialSimulator::new(model, SimulatorConfig::new(1e-3, 1)).unwrap();
//! sim.add_contact_point("tip", 0, true);
//! sim.add_object(Box::new(HalfSpace::ground(ContactParams::default())));
//!
//! let q = DVector::from_row_slice(&[0.0, 0.0, 0.1]);
//! let v = DVector::zeros(3);
//! sim.reset_state(&q, &v, true).unwrap();
//!
//! let tau = DVector::zeros(3);
//! for _ in 0..100 {
//!     sim.step(&tau).unwrap();
//! }
//! assert!(sim.q()[2] < 0.1); // falling toward the plane
//! ```
//!
//! # Contracts
//!
//! - `step` before `reset_state` fails with `NotReset`.
//! - After `step` returns, kinematics and per-contact `v`, `f` are
//!   consistent with the final `(q, v, dv)`.
//! - After `reset_state`, the inner loop allocates only when the number of
//!   active contacts changes.

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn, clippy::similar_names)]

mod euler;
mod exponential;
mod state;

pub use euler::EulerSimulator;
pub use exponential::ExponentialSimulator;

// Re-export the vocabulary the public API speaks.
pub use softstep_contact::{
    ContactBox, ContactObject, ContactParams, ContactPoint, ContactRegistry, FrictionCone,
    HalfSpace, Sphere,
};
pub use softstep_dynamics::{Data, JointType, Model};
pub use softstep_types::{SimError, SimulatorConfig};
