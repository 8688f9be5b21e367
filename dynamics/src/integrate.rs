//! Configuration-manifold integration and forward dynamics.
//!
//! Position integration handles quaternion joints on the SO(3) manifold:
//! scalar addition for hinge/slide, exponential map for ball/free. After
//! integration quaternions are renormalized to prevent drift.

use nalgebra::{DVector, Quaternion, UnitQuaternion, Vector3};
use softstep_types::SimError;

use crate::data::Data;
use crate::factor::{cholesky_in_place, cholesky_inverse_into, cholesky_solve_in_place};
use crate::model::{JointType, Model};

/// Integrate a quaternion at `qpos[adr..adr+4]` (`[w,x,y,z]`) by the local
/// rotation vector `omega_dt`.
#[inline]
fn integrate_quaternion(out: &mut DVector<f64>, adr: usize, omega_dt: Vector3<f64>) {
    let angle = omega_dt.norm();
    if angle > 1e-10 {
        let axis = nalgebra::Unit::new_normalize(omega_dt);
        let dq = UnitQuaternion::from_axis_angle(&axis, angle);
        let q_old = UnitQuaternion::from_quaternion(Quaternion::new(
            out[adr],
            out[adr + 1],
            out[adr + 2],
            out[adr + 3],
        ));
        let q_new = q_old * dq;
        out[adr] = q_new.w;
        out[adr + 1] = q_new.i;
        out[adr + 2] = q_new.j;
        out[adr + 3] = q_new.k;
    }
}

/// Renormalize a quaternion at `qpos[adr..adr+4]`; degenerate values reset
/// to identity.
#[inline]
fn normalize_quaternion(out: &mut DVector<f64>, adr: usize) {
    let norm = (out[adr].powi(2)
        + out[adr + 1].powi(2)
        + out[adr + 2].powi(2)
        + out[adr + 3].powi(2))
    .sqrt();
    if norm > 1e-10 {
        out[adr] /= norm;
        out[adr + 1] /= norm;
        out[adr + 2] /= norm;
        out[adr + 3] /= norm;
    } else {
        out[adr] = 1.0;
        out[adr + 1] = 0.0;
        out[adr + 2] = 0.0;
        out[adr + 3] = 0.0;
    }
}

/// Manifold retraction: `out = qpos ⊞ dq` where `dq` is a displacement of
/// length `nv` (velocity times timestep).
///
/// `out` must be preallocated to length `nq`; aliasing with `qpos` is not
/// supported.
pub fn integrate(model: &Model, qpos: &DVector<f64>, dq: &DVector<f64>, out: &mut DVector<f64>) {
    debug_assert_eq!(qpos.len(), model.nq);
    debug_assert_eq!(dq.len(), model.nv);
    debug_assert_eq!(out.len(), model.nq);
    out.copy_from(qpos);

    for jnt_id in 0..model.njnt {
        let qadr = model.jnt_qpos_adr[jnt_id];
        let dadr = model.jnt_dof_adr[jnt_id];
        match model.jnt_type[jnt_id] {
            JointType::Hinge | JointType::Slide => {
                out[qadr] += dq[dadr];
            }
            JointType::Ball => {
                let omega_dt = Vector3::new(dq[dadr], dq[dadr + 1], dq[dadr + 2]);
                integrate_quaternion(out, qadr, omega_dt);
                normalize_quaternion(out, qadr);
            }
            JointType::Free => {
                out[qadr] += dq[dadr];
                out[qadr + 1] += dq[dadr + 1];
                out[qadr + 2] += dq[dadr + 2];
                let omega_dt = Vector3::new(dq[dadr + 3], dq[dadr + 4], dq[dadr + 5]);
                integrate_quaternion(out, qadr + 3, omega_dt);
                normalize_quaternion(out, qadr + 3);
            }
        }
    }
}

/// Forward dynamics: `qacc = M⁻¹ (τ − qfrc_bias)`.
///
/// Uses the CRBA mass matrix already in `data.qm` (run
/// [`compute_all_terms`](crate::compute_all_terms) first). Factors into the
/// preallocated `qm_factor` buffer; no heap allocation.
///
/// # Errors
///
/// [`SimError::NumericalFailure`] when the mass matrix is not positive
/// definite.
pub fn forward_dynamics(model: &Model, data: &mut Data, tau: &DVector<f64>) -> Result<(), SimError> {
    debug_assert_eq!(tau.len(), model.nv);
    data.qm_factor.copy_from(&data.qm);
    cholesky_in_place(&mut data.qm_factor)?;
    data.qacc.copy_from(tau);
    data.qacc -= &data.qfrc_bias;
    cholesky_solve_in_place(&data.qm_factor, &mut data.qacc);
    Ok(())
}

/// Explicit inverse mass matrix into `data.minv`.
///
/// # Errors
///
/// [`SimError::NumericalFailure`] when the mass matrix is not positive
/// definite.
pub fn compute_minverse(model: &Model, data: &mut Data) -> Result<(), SimError> {
    debug_assert_eq!(data.minv.nrows(), model.nv);
    data.qm_factor.copy_from(&data.qm);
    cholesky_in_place(&mut data.qm_factor)?;
    // Split borrows: factor and scratch are disjoint fields.
    let Data {
        qm_factor,
        minv,
        scratch,
        ..
    } = data;
    cholesky_inverse_into(qm_factor, minv, scratch);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::compute_all_terms;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    #[test]
    fn test_integrate_scalar_joints() {
        let model = Model::point_mass_3d(1.0);
        let qpos = DVector::from_row_slice(&[0.1, 0.2, 0.3]);
        let dq = DVector::from_row_slice(&[0.01, -0.02, 0.03]);
        let mut out = DVector::zeros(3);
        integrate(&model, &qpos, &dq, &mut out);
        assert_relative_eq!(out[0], 0.11, epsilon = 1e-12);
        assert_relative_eq!(out[1], 0.18, epsilon = 1e-12);
        assert_relative_eq!(out[2], 0.33, epsilon = 1e-12);
    }

    #[test]
    fn test_integrate_preserves_unit_quaternion() {
        let model = Model::free_body(1.0, Vector3::new(0.1, 0.1, 0.1));
        let mut qpos = model.qpos0.clone();
        let mut out = DVector::zeros(model.nq);
        let dq = DVector::from_row_slice(&[0.0, 0.0, 0.0, 0.3, -0.2, 0.5]);
        for _ in 0..100 {
            integrate(&model, &qpos, &dq, &mut out);
            qpos.copy_from(&out);
        }
        let norm = (qpos[3].powi(2) + qpos[4].powi(2) + qpos[5].powi(2) + qpos[6].powi(2)).sqrt();
        assert_relative_eq!(norm, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_free_fall_acceleration() {
        let model = Model::free_body(2.0, Vector3::new(0.1, 0.1, 0.1));
        let mut data = model.make_data();
        compute_all_terms(&model, &mut data);
        let tau = DVector::zeros(model.nv);
        forward_dynamics(&model, &mut data, &tau).unwrap();
        assert_relative_eq!(data.qacc[0], 0.0, epsilon = 1e-10);
        assert_relative_eq!(data.qacc[1], 0.0, epsilon = 1e-10);
        assert_relative_eq!(data.qacc[2], -9.81, epsilon = 1e-10);
        assert_relative_eq!(data.qacc[3], 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_pendulum_equilibrium_acceleration() {
        let model = Model::n_link_pendulum(2, 1.0, 1.0);
        let mut data = model.make_data();
        compute_all_terms(&model, &mut data);
        let tau = DVector::zeros(model.nv);
        forward_dynamics(&model, &mut data, &tau).unwrap();
        assert_relative_eq!(data.qacc[0], 0.0, epsilon = 1e-10);
        assert_relative_eq!(data.qacc[1], 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_minverse_times_m_is_identity() {
        let model = Model::n_link_pendulum(3, 0.8, 1.2);
        let mut data = model.make_data();
        data.qpos[0] = 0.4;
        data.qpos[1] = -0.9;
        data.qpos[2] = 0.2;
        compute_all_terms(&model, &mut data);
        compute_minverse(&model, &mut data).unwrap();
        let eye = &data.minv * &data.qm;
        assert_relative_eq!(eye, DMatrix::identity(3, 3), epsilon = 1e-9);
    }

    #[test]
    fn test_forward_dynamics_consistency_with_rne() {
        // M qacc + c = tau  =>  residual of the equation of motion is zero.
        let model = Model::n_link_pendulum(2, 1.0, 1.0);
        let mut data = model.make_data();
        data.qpos[0] = 0.5;
        data.qpos[1] = -0.2;
        data.qvel[0] = 1.0;
        data.qvel[1] = 0.7;
        compute_all_terms(&model, &mut data);
        let tau = DVector::from_row_slice(&[0.3, -0.6]);
        forward_dynamics(&model, &mut data, &tau).unwrap();

        let residual = &data.qm * &data.qacc + &data.qfrc_bias - &tau;
        assert!(residual.norm() < 1e-10, "residual = {}", residual.norm());
    }
}
