//! Data struct definition and reset.
//!
//! [`Data`] is the dynamic simulation state: generalized coordinates and
//! every quantity computed from them. It is the mutable counterpart to
//! [`Model`](crate::Model) — created once via `model.make_data()` with all
//! arrays pre-allocated, so the per-step pipeline never touches the heap.
//!
//! # Key invariant
//!
//! `qpos` and `qvel` are the only state variables; everything else (`xpos`,
//! `cvel`, `qm`, ...) is computed from them by
//! [`compute_all_terms`](crate::compute_all_terms).

use nalgebra::{DMatrix, DVector, Matrix3, Matrix6, UnitQuaternion, Vector3};

use crate::Model;
use crate::spatial::SpatialVector;

/// Dynamic simulation state.
///
/// All arrays pre-allocated — no heap allocation during stepping.
#[derive(Debug, Clone)]
pub struct Data {
    // ==================== Generalized coordinates ====================
    /// Joint positions (length `nq`), includes quaternion components.
    pub qpos: DVector<f64>,
    /// Joint velocities (length `nv`).
    pub qvel: DVector<f64>,
    /// Joint accelerations (length `nv`), set by forward dynamics.
    pub qacc: DVector<f64>,

    // ==================== Computed body states (FK outputs) ====================
    /// Body positions in world frame (length `nbody`).
    pub xpos: Vec<Vector3<f64>>,
    /// Body orientations in world frame (length `nbody`).
    pub xquat: Vec<UnitQuaternion<f64>>,
    /// Body rotation matrices, cached (length `nbody`).
    pub xmat: Vec<Matrix3<f64>>,
    /// Body inertial-frame (COM) positions in world frame (length `nbody`).
    pub xipos: Vec<Vector3<f64>>,
    /// Body inertial-frame rotations (length `nbody`).
    pub ximat: Vec<Matrix3<f64>>,
    /// Site positions in world frame (length `nsite`).
    pub site_xpos: Vec<Vector3<f64>>,

    // ==================== Spatial quantities (world origin reference) ====================
    /// Per-body spatial inertia about the world origin (length `nbody`).
    pub cinert: Vec<Matrix6<f64>>,
    /// Composite (subtree) spatial inertia, filled by CRBA (length `nbody`).
    pub crb_inertia: Vec<Matrix6<f64>>,
    /// Per-DOF world-aligned motion subspace columns (length `nv`).
    pub cdof: Vec<SpatialVector>,
    /// Body spatial velocities (length `nbody`).
    pub cvel: Vec<SpatialVector>,
    /// Velocity-product (bias) accelerations, zero joint acceleration
    /// (length `nbody`).
    pub cacc_bias: Vec<SpatialVector>,
    /// RNE backward-pass force accumulator (length `nbody`).
    pub cfrc_bias: Vec<SpatialVector>,
    /// Full spatial accelerations from second-order FK (length `nbody`).
    pub cacc: Vec<SpatialVector>,

    // ==================== Joint-space dynamics ====================
    /// Joint-space mass matrix (`nv` × `nv`).
    pub qm: DMatrix<f64>,
    /// In-place Cholesky factor buffer for `qm` (`nv` × `nv`).
    pub qm_factor: DMatrix<f64>,
    /// Bias forces: Coriolis + centrifugal + gravity (length `nv`).
    pub qfrc_bias: DVector<f64>,
    /// Explicit inverse mass matrix (`nv` × `nv`), filled by
    /// [`compute_minverse`](crate::compute_minverse).
    pub minv: DMatrix<f64>,

    // ==================== Scratch ====================
    /// General nv-length scratch vector.
    pub scratch: DVector<f64>,
}

impl Model {
    /// Allocate a [`Data`] for this model with all arrays sized up front.
    #[must_use]
    pub fn make_data(&self) -> Data {
        let nbody = self.nbody;
        let nv = self.nv;
        let mut data = Data {
            qpos: self.qpos0.clone(),
            qvel: DVector::zeros(nv),
            qacc: DVector::zeros(nv),
            xpos: vec![Vector3::zeros(); nbody],
            xquat: vec![UnitQuaternion::identity(); nbody],
            xmat: vec![Matrix3::identity(); nbody],
            xipos: vec![Vector3::zeros(); nbody],
            ximat: vec![Matrix3::identity(); nbody],
            site_xpos: vec![Vector3::zeros(); self.nsite],
            cinert: vec![Matrix6::zeros(); nbody],
            crb_inertia: vec![Matrix6::zeros(); nbody],
            cdof: vec![SpatialVector::zeros(); nv],
            cvel: vec![SpatialVector::zeros(); nbody],
            cacc_bias: vec![SpatialVector::zeros(); nbody],
            cfrc_bias: vec![SpatialVector::zeros(); nbody],
            cacc: vec![SpatialVector::zeros(); nbody],
            qm: DMatrix::zeros(nv, nv),
            qm_factor: DMatrix::zeros(nv, nv),
            qfrc_bias: DVector::zeros(nv),
            minv: DMatrix::zeros(nv, nv),
            scratch: DVector::zeros(nv),
        };
        crate::compute_all_terms(self, &mut data);
        data
    }
}

impl Data {
    /// Reset to the model's default configuration with zero velocity.
    pub fn reset(&mut self, model: &Model) {
        self.qpos.copy_from(&model.qpos0);
        self.qvel.fill(0.0);
        self.qacc.fill(0.0);
        crate::compute_all_terms(model, self);
    }

    /// Kinetic energy `½ vᵀ M v` using the current mass matrix.
    ///
    /// Valid after [`compute_all_terms`](crate::compute_all_terms).
    #[must_use]
    pub fn kinetic_energy(&mut self) -> f64 {
        self.scratch.gemv(1.0, &self.qm, &self.qvel, 0.0);
        0.5 * self.scratch.dot(&self.qvel)
    }
}
