//! Contact layer for the softstep simulator.
//!
//! Provides the per-frame contact state ([`ContactPoint`]), the compliant
//! environment objects ([`HalfSpace`], [`Sphere`], [`ContactBox`] behind the
//! [`ContactObject`] trait), the Coulomb [`FrictionCone`], and the
//! [`ContactRegistry`] that maintains the active set with sticky
//! point-to-object bindings.
//!
//! The force law is a linear spring–damper in the object's local
//! tangent–tangent–normal frame (see [`ContactParams`]); unilateral points
//! never pull.

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod friction;
mod object;
mod params;
mod point;
mod registry;

pub use friction::FrictionCone;
pub use object::{ContactBox, ContactObject, HalfSpace, Sphere};
pub use params::ContactParams;
pub use point::ContactPoint;
pub use registry::ContactRegistry;
