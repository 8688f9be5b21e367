//! Exponential simulator: analytic integration of the linearized
//! spring–damper contact dynamics over each substep.
//!
//! Over one substep the stacked contact coordinate `x = [p; ṗ]` obeys the
//! LTI system
//!
//! ```text
//! ẋ = A x + a,   A = [ 0    I ]     a = [ 0 ]
//!                    [ -ΥK -ΥB ]        [ b ]
//! ```
//!
//! with `Υ = Jc M⁻¹ Jcᵀ` the operational-space inverse inertia and
//! `b = Jc M⁻¹ (τ − h) + J̇c v + Υ K p0`. The integrals of `x` over the
//! substep come from the matrix-exponential utility; the time-averaged
//! contact force is checked against each contact's friction cone, and a
//! violation switches the substep to *saturated* mode where the projected
//! force is held constant instead.
//!
//! All dense blocks are sized to the current number of active contacts and
//! rebuilt only when that number changes, so steady-state substeps never
//! allocate.

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use tracing::debug;

use softstep_contact::{ContactObject, ContactPoint, FrictionCone};
use softstep_dynamics::Model;
use softstep_expm::ExpIntegrator;
use softstep_types::{SimError, SimulatorConfig};

use crate::state::SimulatorState;

/// Dense work buffers sized to the active contact set (`nk = 3·nactive`).
#[derive(Debug)]
struct ExpoWorkspace {
    // Stacked per-contact vectors (length nk)
    f: DVector<f64>,
    p: DVector<f64>,
    p0: DVector<f64>,
    dp: DVector<f64>,
    djv: DVector<f64>,
    kp0: DVector<f64>,
    f_avg: DVector<f64>,
    fpr: DVector<f64>,
    b_vec: DVector<f64>,
    tmp_nk: DVector<f64>,

    // Stacked state vectors (length 2·nk)
    a_drift: DVector<f64>,
    x0: DVector<f64>,
    intx: DVector<f64>,
    int2x: DVector<f64>,

    // Dense blocks
    jc: DMatrix<f64>,      // nk × nv
    jc_t: DMatrix<f64>,    // nv × nk
    jminv: DMatrix<f64>,   // nk × nv
    upsilon: DMatrix<f64>, // nk × nk
    k_mat: DMatrix<f64>,   // nk × nk, block diagonal
    b_mat: DMatrix<f64>,   // nk × nk, block diagonal
    d_mat: DMatrix<f64>,   // nk × 2nk, [-K  -B]
    a_mat: DMatrix<f64>,   // 2nk × 2nk

    // nv-sized scratch (allocated once at construction)
    dv0: DVector<f64>,
    dv_bar: DVector<f64>,
    tmp_nv: DVector<f64>,
    tmp_nv2: DVector<f64>,

    // Per-active bookkeeping
    frames: Vec<Matrix3<f64>>,
    active_idx: Vec<usize>,
}

impl ExpoWorkspace {
    fn new(nv: usize) -> Self {
        Self {
            f: DVector::zeros(0),
            p: DVector::zeros(0),
            p0: DVector::zeros(0),
            dp: DVector::zeros(0),
            djv: DVector::zeros(0),
            kp0: DVector::zeros(0),
            f_avg: DVector::zeros(0),
            fpr: DVector::zeros(0),
            b_vec: DVector::zeros(0),
            tmp_nk: DVector::zeros(0),
            a_drift: DVector::zeros(0),
            x0: DVector::zeros(0),
            intx: DVector::zeros(0),
            int2x: DVector::zeros(0),
            jc: DMatrix::zeros(0, 0),
            jc_t: DMatrix::zeros(0, 0),
            jminv: DMatrix::zeros(0, 0),
            upsilon: DMatrix::zeros(0, 0),
            k_mat: DMatrix::zeros(0, 0),
            b_mat: DMatrix::zeros(0, 0),
            d_mat: DMatrix::zeros(0, 0),
            a_mat: DMatrix::zeros(0, 0),
            dv0: DVector::zeros(nv),
            dv_bar: DVector::zeros(nv),
            tmp_nv: DVector::zeros(nv),
            tmp_nv2: DVector::zeros(nv),
            frames: Vec::new(),
            active_idx: Vec::new(),
        }
    }

    /// Resize every active-set-dependent block and rebuild the constant
    /// identity block of `A`.
    fn resize(&mut self, nactive: usize, nv: usize) {
        let nk = 3 * nactive;

        for v in [
            &mut self.f,
            &mut self.p,
            &mut self.p0,
            &mut self.dp,
            &mut self.djv,
            &mut self.kp0,
            &mut self.f_avg,
            &mut self.fpr,
            &mut self.b_vec,
            &mut self.tmp_nk,
        ] {
            v.resize_vertically_mut(nk, 0.0);
            v.fill(0.0);
        }
        for v in [
            &mut self.a_drift,
            &mut self.x0,
            &mut self.intx,
            &mut self.int2x,
        ] {
            v.resize_vertically_mut(2 * nk, 0.0);
            v.fill(0.0);
        }

        self.jc.resize_mut(nk, nv, 0.0);
        self.jc_t.resize_mut(nv, nk, 0.0);
        self.jminv.resize_mut(nk, nv, 0.0);
        self.upsilon.resize_mut(nk, nk, 0.0);
        self.k_mat.resize_mut(nk, nk, 0.0);
        self.b_mat.resize_mut(nk, nk, 0.0);
        self.d_mat.resize_mut(nk, 2 * nk, 0.0);
        self.a_mat.resize_mut(2 * nk, 2 * nk, 0.0);
        for m in [
            &mut self.jc,
            &mut self.jc_t,
            &mut self.jminv,
            &mut self.upsilon,
            &mut self.k_mat,
            &mut self.b_mat,
            &mut self.d_mat,
            &mut self.a_mat,
        ] {
            m.fill(0.0);
        }
        // Constant upper-right identity block of A.
        for i in 0..nk {
            self.a_mat[(i, nk + i)] = 1.0;
        }

        self.frames.resize(nactive, Matrix3::identity());
        self.active_idx.resize(nactive, 0);
    }
}

/// Simulator advancing the linearized contact dynamics by matrix
/// exponentials, with friction-cone saturation on the average force.
#[derive(Debug)]
pub struct ExponentialSimulator {
    st: SimulatorState,
    ws: ExpoWorkspace,
    lti: ExpIntegrator,
    /// Active count the workspace is currently sized for.
    nalloc: usize,
    resize_count: u64,
    cone_flag: bool,
}

impl ExponentialSimulator {
    /// Create a simulator for `model`.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidConfig`] for an unusable configuration.
    pub fn new(model: Model, cfg: SimulatorConfig) -> Result<Self, SimError> {
        let nv = model.nv;
        Ok(Self {
            st: SimulatorState::new(model, cfg)?,
            ws: ExpoWorkspace::new(nv),
            lti: ExpIntegrator::new(),
            nalloc: 0,
            resize_count: 0,
            cone_flag: false,
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
    /// [`SimError::NotImplemented`] when a feature-gated backend is
    /// selected; [`SimError::DimensionMismatch`] for a mis-sized torque;
    /// [`SimError::NumericalFailure`] from the matrix-exponential backend
    /// or the factorization (not retried).
    pub fn step(&mut self, tau: &DVector<f64>) -> Result<(), SimError> {
        self.st.check_step(tau)?;
        if self.st.cfg.sparse_system {
            return Err(SimError::NotImplemented {
                feature: "sparse exponential backend",
            });
        }
        if self.st.cfg.invertible_system {
            return Err(SimError::NotImplemented {
                feature: "invertible-A exponential backend",
            });
        }

        for _ in 0..self.st.cfg.n_substeps {
            self.substep(tau)?;
        }
        Ok(())
    }

    fn substep(&mut self, tau: &DVector<f64>) -> Result<(), SimError> {
        self.st.tau += tau;

        if self.st.registry.nactive() > 0 {
            self.advance_with_contacts()?;
            if self.st.cfg.update_anchors && self.cone_flag {
                self.update_anchors();
            }
        } else {
            // No contacts: plain forward dynamics + symplectic Euler.
            softstep_dynamics::forward_dynamics(&self.st.model, &mut self.st.data, &self.st.tau)?;
            self.st.symplectic_advance();
        }

        self.refresh_contacts();
        Ok(())
    }

    /// One exponential substep with at least one active contact.
    fn advance_with_contacts(&mut self) -> Result<(), SimError> {
        let h = self.st.sub_dt;
        let nk = 3 * self.st.registry.nactive();

        softstep_dynamics::compute_minverse(&self.st.model, &mut self.st.data)?;

        let Self {
            st,
            ws,
            lti,
            cone_flag,
            ..
        } = self;

        // Operational-space quantities.
        ws.jminv.gemm(1.0, &ws.jc, &st.data.minv, 0.0);
        ws.upsilon.gemm(1.0, &ws.jminv, &ws.jc_t, 0.0);
        ws.kp0.gemv(1.0, &ws.k_mat, &ws.p0, 0.0);

        // tmp_nv = τ − h(q, v)
        ws.tmp_nv.copy_from(&st.tau);
        ws.tmp_nv -= &st.data.qfrc_bias;

        // dv0 = M⁻¹ (τ − h + Jcᵀ K p0)
        ws.tmp_nv2.copy_from(&ws.tmp_nv);
        ws.tmp_nv2.gemv(1.0, &ws.jc_t, &ws.kp0, 1.0);
        ws.dv0.gemv(1.0, &st.data.minv, &ws.tmp_nv2, 0.0);

        // b = Jc M⁻¹ (τ − h) + J̇c v + Υ K p0
        ws.b_vec.gemv(1.0, &ws.jminv, &ws.tmp_nv, 0.0);
        ws.b_vec += &ws.djv;
        ws.b_vec.gemv(1.0, &ws.upsilon, &ws.kp0, 1.0);

        // A = [0 I; -ΥK -ΥB]; the identity block is constant since resize.
        ws.a_mat
            .view_mut((nk, 0), (nk, nk))
            .gemm(-1.0, &ws.upsilon, &ws.k_mat, 0.0);
        ws.a_mat
            .view_mut((nk, nk), (nk, nk))
            .gemm(-1.0, &ws.upsilon, &ws.b_mat, 0.0);

        ws.a_drift.rows_mut(nk, nk).copy_from(&ws.b_vec);
        ws.x0.rows_mut(0, nk).copy_from(&ws.p);
        ws.x0.rows_mut(nk, nk).copy_from(&ws.dp);

        lti.integral_xt(&ws.a_mat, &ws.a_drift, &ws.x0, h, &mut ws.intx)?;

        // Average contact force over the substep: f_avg = K p0 + D·I₁/h.
        ws.f_avg.copy_from(&ws.kp0);
        ws.f_avg.gemv(1.0 / h, &ws.d_mat, &ws.intx, 1.0);

        // Friction-cone check on the average force.
        let was_saturated = *cone_flag;
        *cone_flag = check_friction_cone(ws, &mut st.registry);
        if *cone_flag != was_saturated {
            debug!(saturated = *cone_flag, "friction-cone mode switch");
        }

        if *cone_flag {
            // Saturated: hold the projected force constant over the substep.
            ws.tmp_nv2.copy_from(&ws.tmp_nv);
            ws.tmp_nv2.gemv(1.0, &ws.jc_t, &ws.fpr, 1.0);
            ws.dv_bar.gemv(1.0, &st.data.minv, &ws.tmp_nv2, 0.0);

            st.v_mean.copy_from(&st.data.qvel);
            st.v_mean.axpy(h, &ws.dv_bar, 1.0);
        } else {
            // Linear: advance by the exact LTI integrals.
            lti.double_integral_xt(&ws.a_mat, &ws.a_drift, &ws.x0, h, &mut ws.int2x)?;

            // dv̄ = dv0 + JMinvᵀ (D I₁)/h
            ws.tmp_nk.gemv(1.0 / h, &ws.d_mat, &ws.intx, 0.0);
            ws.dv_bar.copy_from(&ws.dv0);
            ws.dv_bar.gemv_tr(1.0, &ws.jminv, &ws.tmp_nk, 1.0);

            // v̄ = v + ½h dv0 + JMinvᵀ (D I₂)/h
            st.v_mean.copy_from(&st.data.qvel);
            st.v_mean.axpy(0.5 * h, &ws.dv0, 1.0);
            ws.tmp_nk.gemv(1.0 / h, &ws.d_mat, &ws.int2x, 0.0);
            st.v_mean.gemv_tr(1.0, &ws.jminv, &ws.tmp_nk, 1.0);
        }

        // v ← v + h dv̄,  q ← integrate(q, v̄ h),  dv ← dv̄.
        {
            let (qvel, dv_bar) = (&mut st.data.qvel, &ws.dv_bar);
            qvel.axpy(h, dv_bar, 1.0);
        }
        st.v_mean *= h;
        softstep_dynamics::integrate(&st.model, &st.data.qpos, &st.v_mean, &mut st.q_next);
        st.data.qpos.copy_from(&st.q_next);
        st.data.qacc.copy_from(&ws.dv_bar);

        Ok(())
    }

    /// Anchor-slip update: move the anchors of sliding contacts by the
    /// minimum-norm tangential shift that puts the spring force back on the
    /// cone boundary (closed form for block-diagonal K).
    fn update_anchors(&mut self) {
        let ws = &mut self.ws;
        let (points, objects) = self.st.registry.points_and_objects();
        for slot in 0..self.nalloc {
            let cp = &mut points[ws.active_idx[slot]];
            if !cp.friction_flag {
                continue;
            }
            let Some(obj_idx) = cp.object else { continue };
            let kt = objects[obj_idx].params().tangential_stiffness;
            if kt <= 0.0 {
                continue;
            }
            let rot = ws.frames[slot];
            let df_w = Vector3::new(
                ws.fpr[3 * slot] - ws.f_avg[3 * slot],
                ws.fpr[3 * slot + 1] - ws.f_avg[3 * slot + 1],
                ws.fpr[3 * slot + 2] - ws.f_avg[3 * slot + 2],
            );
            let mut df_l = rot.transpose() * df_w;
            df_l.z = 0.0; // normal anchor unchanged
            cp.x_start += rot * (df_l / kt);
        }
    }

    /// Refresh kinematics, detect contacts, resize on cardinality change,
    /// and populate the stacked contact blocks for the next substep.
    fn refresh_contacts(&mut self) {
        self.st.refresh_kinematics();
        let nactive = self.st.registry.detect();
        if nactive != self.nalloc {
            debug!(nactive, previous = self.nalloc, "contact workspace resize");
            self.ws.resize(nactive, self.st.model.nv);
            self.lti.resize(6 * nactive);
            self.nalloc = nactive;
            self.resize_count += 1;
        }
        self.st.rebuild_tau();
        self.fill_contact_blocks();
    }

    /// Populate `Jc`, `p`, `ṗ`, `p0`, `K`, `B`, `D`, `J̇v`, frames, and the
    /// instantaneous forces for every active contact, in registration order.
    fn fill_contact_blocks(&mut self) {
        let nactive = self.st.registry.nactive();
        if nactive == 0 {
            return;
        }
        let nk = 3 * nactive;
        let SimulatorState {
            model,
            data,
            registry,
            jac,
            ..
        } = &mut self.st;
        let ws = &mut self.ws;
        let (points, objects) = registry.points_and_objects();

        let mut slot = 0;
        for (idx, cp) in points.iter_mut().enumerate() {
            if !cp.active {
                continue;
            }
            let Some(obj_idx) = cp.object else { continue };
            let obj = &objects[obj_idx];

            cp.v = softstep_dynamics::site_velocity(model, data, cp.site_id);
            softstep_dynamics::site_jacobian_into(model, data, cp.site_id, jac);
            ws.jc.view_mut((3 * slot, 0), (3, model.nv)).copy_from(jac);
            ws.jc_t
                .view_mut((0, 3 * slot), (model.nv, 3))
                .tr_copy_from(jac);

            obj.contact_force(cp);

            let rot = obj.contact_frame(cp);
            let params = obj.params();
            let k_blk = rot
                * Matrix3::from_diagonal(&Vector3::new(
                    params.tangential_stiffness,
                    params.tangential_stiffness,
                    params.normal_stiffness,
                ))
                * rot.transpose();
            let b_blk = rot
                * Matrix3::from_diagonal(&Vector3::new(
                    params.tangential_damping,
                    params.tangential_damping,
                    params.normal_damping,
                ))
                * rot.transpose();

            let djv = softstep_dynamics::site_bias_acceleration(model, data, cp.site_id);
            for k in 0..3 {
                ws.p[3 * slot + k] = cp.x[k];
                ws.p0[3 * slot + k] = cp.x_start[k];
                ws.dp[3 * slot + k] = cp.v[k];
                ws.f[3 * slot + k] = cp.f[k];
                ws.djv[3 * slot + k] = djv[k];
            }
            for r in 0..3 {
                for c in 0..3 {
                    ws.k_mat[(3 * slot + r, 3 * slot + c)] = k_blk[(r, c)];
                    ws.b_mat[(3 * slot + r, 3 * slot + c)] = b_blk[(r, c)];
                    ws.d_mat[(3 * slot + r, 3 * slot + c)] = -k_blk[(r, c)];
                    ws.d_mat[(3 * slot + r, nk + 3 * slot + c)] = -b_blk[(r, c)];
                }
            }
            ws.frames[slot] = rot;
            ws.active_idx[slot] = idx;
            slot += 1;
        }
        debug_assert_eq!(slot, nactive);
    }

    // ==================== Observers ====================

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

    /// Whether the last substep saturated the friction cone.
    #[must_use]
    pub fn cone_violation(&self) -> bool {
        self.cone_flag
    }

    /// How many times the contact workspace has been resized.
    #[must_use]
    pub fn resize_count(&self) -> u64 {
        self.resize_count
    }

    /// Cone-projected average force of the contact at `point_index` during
    /// the last substep, if it was active.
    #[must_use]
    pub fn projected_force(&self, point_index: usize) -> Option<Vector3<f64>> {
        self.stacked_segment(&self.ws.fpr, point_index)
    }

    /// Time-averaged contact force of the contact at `point_index` during
    /// the last substep, if it was active.
    #[must_use]
    pub fn average_force(&self, point_index: usize) -> Option<Vector3<f64>> {
        self.stacked_segment(&self.ws.f_avg, point_index)
    }

    fn stacked_segment(&self, stacked: &DVector<f64>, point_index: usize) -> Option<Vector3<f64>> {
        (0..self.nalloc)
            .find(|&slot| self.ws.active_idx[slot] == point_index)
            .map(|slot| {
                Vector3::new(
                    stacked[3 * slot],
                    stacked[3 * slot + 1],
                    stacked[3 * slot + 2],
                )
            })
    }

    /// Kinetic energy `½ vᵀ M v` at the current state.
    #[must_use]
    pub fn kinetic_energy(&mut self) -> f64 {
        self.st.data.kinetic_energy()
    }
}

/// Check every active contact's average force against its friction cone.
///
/// In each contact's local frame: within the cone the force passes through
/// to `fpr`; a pulling normal zeroes it; otherwise the tangential part is
/// projected onto the cone boundary at the preserved direction. Any
/// violation flips the substep into saturated mode. A contact with μ = ∞
/// never triggers. Per-point `friction_flag` records the violation.
fn check_friction_cone(
    ws: &mut ExpoWorkspace,
    registry: &mut softstep_contact::ContactRegistry,
) -> bool {
    let mut any_violation = false;
    let nactive = ws.active_idx.len();
    let (points, objects) = registry.points_and_objects();

    for slot in 0..nactive {
        let cp = &mut points[ws.active_idx[slot]];
        let mu = match cp.object {
            Some(obj_idx) => objects[obj_idx].params().friction_coefficient,
            None => 0.0,
        };
        let rot = ws.frames[slot];
        let f_w = Vector3::new(
            ws.f_avg[3 * slot],
            ws.f_avg[3 * slot + 1],
            ws.f_avg[3 * slot + 2],
        );
        let f_l = rot.transpose() * f_w;

        let (fpr_l, violated) = if mu.is_infinite() {
            (f_l, false)
        } else {
            let cone = FrictionCone::new(mu);
            let f_t = (f_l.x * f_l.x + f_l.y * f_l.y).sqrt();
            if cone.contains(f_t, f_l.z) {
                (f_l, false)
            } else {
                (cone.project(f_l), true)
            }
        };
        cp.friction_flag = violated;
        any_violation |= violated;

        let fpr_w = rot * fpr_l;
        ws.fpr[3 * slot] = fpr_w.x;
        ws.fpr[3 * slot + 1] = fpr_w.y;
        ws.fpr[3 * slot + 2] = fpr_w.z;
    }
    any_violation
}
