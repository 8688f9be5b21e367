//! State and bookkeeping shared by both simulators.

use nalgebra::{DMatrix, DVector};

use softstep_contact::ContactRegistry;
use softstep_dynamics::{Data, Model};
use softstep_types::{SimError, SimulatorConfig};

/// Generalized state, contact registry, and scratch buffers common to the
/// Euler and exponential simulators.
///
/// `data.qpos` / `data.qvel` / `data.qacc` are the authoritative `(q, v, dv)`
/// of the facade; `tau` is the torque accumulator rebuilt once per substep.
#[derive(Debug)]
pub(crate) struct SimulatorState {
    pub model: Model,
    pub data: Data,
    pub cfg: SimulatorConfig,
    /// Substep duration `dt / n_substeps`.
    pub sub_dt: f64,
    /// Torque accumulator (joint friction, and for Euler the contact
    /// forces), rebuilt during each post-substep refresh.
    pub tau: DVector<f64>,
    /// Mean velocity buffer used for the position update.
    pub v_mean: DVector<f64>,
    /// Output buffer for the manifold integration (length `nq`).
    pub q_next: DVector<f64>,
    /// Diagonal viscous joint friction, when enabled.
    pub joint_friction: Option<DVector<f64>>,
    /// Contact points and environment objects.
    pub registry: ContactRegistry,
    /// Per-site Jacobian scratch (3 × nv).
    pub jac: DMatrix<f64>,
    /// Set by `reset_state`; `step` refuses to run before it.
    pub reset_flag: bool,
}

impl SimulatorState {
    pub fn new(model: Model, cfg: SimulatorConfig) -> Result<Self, SimError> {
        cfg.validate()?;
        let data = model.make_data();
        let nv = model.nv;
        let nq = model.nq;
        let sub_dt = cfg.sub_dt();
        Ok(Self {
            model,
            data,
            cfg,
            sub_dt,
            tau: DVector::zeros(nv),
            v_mean: DVector::zeros(nv),
            q_next: DVector::zeros(nq),
            joint_friction: None,
            registry: ContactRegistry::new(),
            jac: DMatrix::zeros(3, nv),
            reset_flag: false,
        })
    }

    /// Install diagonal viscous joint friction.
    pub fn set_joint_friction(&mut self, friction: DVector<f64>) -> Result<(), SimError> {
        if friction.len() != self.model.nv {
            return Err(SimError::dim("joint_friction", self.model.nv, friction.len()));
        }
        self.joint_friction = Some(friction);
        Ok(())
    }

    /// Overwrite `(q, v)`, optionally clearing all contact state.
    pub fn set_state(
        &mut self,
        q: &DVector<f64>,
        v: &DVector<f64>,
        reset_contacts: bool,
    ) -> Result<(), SimError> {
        if q.len() != self.model.nq {
            return Err(SimError::dim("q", self.model.nq, q.len()));
        }
        if v.len() != self.model.nv {
            return Err(SimError::dim("v", self.model.nv, v.len()));
        }
        self.data.qpos.copy_from(q);
        self.data.qvel.copy_from(v);
        self.data.qacc.fill(0.0);
        if reset_contacts {
            self.registry.reset_points();
        }
        Ok(())
    }

    /// Check a user torque vector.
    pub fn check_step(&self, tau: &DVector<f64>) -> Result<(), SimError> {
        if !self.reset_flag {
            return Err(SimError::NotReset);
        }
        if tau.len() != self.model.nv {
            return Err(SimError::dim("tau", self.model.nv, tau.len()));
        }
        Ok(())
    }

    /// Recompute kinematics/dynamics terms and pull the contact points'
    /// world positions from the site FK.
    pub fn refresh_kinematics(&mut self) {
        softstep_dynamics::compute_all_terms(&self.model, &mut self.data);
        softstep_dynamics::forward_acceleration(&self.model, &mut self.data);
        for cp in self.registry.points_mut() {
            cp.x = self.data.site_xpos[cp.site_id];
        }
    }

    /// Start a fresh torque accumulator: zero, minus viscous joint friction.
    pub fn rebuild_tau(&mut self) {
        self.tau.fill(0.0);
        if let Some(friction) = &self.joint_friction {
            for i in 0..self.model.nv {
                self.tau[i] -= friction[i] * self.data.qvel[i];
            }
        }
    }

    /// Advance `(q, v)` by one symplectic Euler substep from the current
    /// `qacc`: `v̄ = v + ½h·dv`, `q ⊞= v̄·h`, `v += h·dv`.
    pub fn symplectic_advance(&mut self) {
        let h = self.sub_dt;
        self.v_mean.copy_from(&self.data.qvel);
        self.v_mean.axpy(0.5 * h, &self.data.qacc, 1.0);
        self.v_mean *= h;
        softstep_dynamics::integrate(&self.model, &self.data.qpos, &self.v_mean, &mut self.q_next);
        self.data.qpos.copy_from(&self.q_next);
        let data = &mut self.data;
        let (qvel, qacc) = (&mut data.qvel, &data.qacc);
        qvel.axpy(h, qacc, 1.0);
    }
}
