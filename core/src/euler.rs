//! Semi-implicit Euler simulator with explicit contact forces.

use nalgebra::DVector;

use softstep_contact::ContactObject;
use softstep_contact::ContactPoint;
use softstep_dynamics::Model;
use softstep_types::{SimError, SimulatorConfig};

use crate::state::SimulatorState;

/// Simulator advancing with symplectic Euler substeps; contact forces are
/// evaluated once per substep from the compliance law and folded into the
/// generalized torque through the contact Jacobians.
#[derive(Debug)]
pub struct EulerSimulator {
    st: SimulatorState,
}

impl EulerSimulator {
    /// Create a simulator for `model`.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidConfig`] for an unusable configuration.
    pub fn new(model: Model, cfg: SimulatorConfig) -> Result<Self, SimError> {
        Ok(Self {
            st: SimulatorState::new(model, cfg)?,
        })
    }

    /// Register a contact point at `site_id`. Call before the first step.
    pub fn add_contact_point(
        &mut self,
        name: impl Into<String>,
        site_id: usize,
        unilateral: bool,
    ) -> usize {
        self.st.registry.add_point(name, site_id, unilateral)
    }

    /// Register an environment object.
    pub fn add_object(&mut self, object: Box<dyn ContactObject>) -> usize {
        self.st.registry.add_object(object)
    }

    /// Enable diagonal viscous joint friction.
    ///
    /// # Errors
    ///
    /// [`SimError::DimensionMismatch`] when `friction` is not `nv`-long.
    pub fn set_joint_friction(&mut self, friction: DVector<f64>) -> Result<(), SimError> {
        self.st.set_joint_friction(friction)
    }

    /// Set `(q, v)`, refresh kinematics and contacts, and arm the simulator.
    ///
    /// # Errors
    ///
    /// [`SimError::DimensionMismatch`] when `q` or `v` disagree with the
    /// model.
    pub fn reset_state(
        &mut self,
        q: &DVector<f64>,
        v: &DVector<f64>,
        reset_contacts: bool,
    ) -> Result<(), SimError> {
        self.st.set_state(q, v, reset_contacts)?;
        self.refresh_contacts();
        self.st.reset_flag = true;
        Ok(())
    }

    /// Advance one outer step (`n_substeps` substeps).
    ///
    /// On return, kinematics and per-contact `v`, `f` are consistent with
    /// the final `(q, v, dv)`.
    ///
    /// # Errors
    ///
    /// [`SimError::NotReset`] before `reset_state`;
    /// [`SimError::DimensionMismatch`] for a mis-sized torque;
    /// [`SimError::NumericalFailure`] from the factorization.
    pub fn step(&mut self, tau: &DVector<f64>) -> Result<(), SimError> {
        self.st.check_step(tau)?;
        for _ in 0..self.st.cfg.n_substeps {
            self.st.tau += tau;
            softstep_dynamics::forward_dynamics(&self.st.model, &mut self.st.data, &self.st.tau)?;
            self.st.symplectic_advance();
            self.refresh_contacts();
        }
        Ok(())
    }

    /// Refresh kinematics, the active set, and the torque accumulator with
    /// the compliance forces of every active contact.
    fn refresh_contacts(&mut self) {
        self.st.refresh_kinematics();
        self.st.registry.detect();
        self.st.rebuild_tau();

        let SimulatorState {
            model,
            data,
            registry,
            tau,
            ..
        } = &mut self.st;
        let (points, objects) = registry.points_and_objects();
        for cp in points.iter_mut() {
            if !cp.active {
                continue;
            }
            let Some(obj_idx) = cp.object else { continue };
            cp.v = softstep_dynamics::site_velocity(model, data, cp.site_id);
            objects[obj_idx].contact_force(cp);
            softstep_dynamics::apply_site_force(model, data, cp.site_id, &cp.f, tau);
        }
    }

    /// Configuration observer.
    #[must_use]
    pub fn config(&self) -> &SimulatorConfig {
        &self.st.cfg
    }

    /// Model observer.
    #[must_use]
    pub fn model(&self) -> &Model {
        &self.st.model
    }

    /// Configuration `q` (read-only).
    #[must_use]
    pub fn q(&self) -> &DVector<f64> {
        &self.st.data.qpos
    }

    /// Velocity `v` (read-only).
    #[must_use]
    pub fn v(&self) -> &DVector<f64> {
        &self.st.data.qvel
    }

    /// Acceleration `dv` (read-only).
    #[must_use]
    pub fn dv(&self) -> &DVector<f64> {
        &self.st.data.qacc
    }

    /// One registered contact point.
    #[must_use]
    pub fn contact(&self, index: usize) -> &ContactPoint {
        self.st.registry.point(index)
    }

    /// All registered contact points.
    #[must_use]
    pub fn contacts(&self) -> &[ContactPoint] {
        self.st.registry.points()
    }

    /// Number of active contacts.
    #[must_use]
    pub fn nactive(&self) -> usize {
        self.st.registry.nactive()
    }

    /// Kinetic energy `½ vᵀ M v` at the current state.
    #[must_use]
    pub fn kinetic_energy(&mut self) -> f64 {
        self.st.data.kinetic_energy()
    }
}
