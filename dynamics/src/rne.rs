//! Recursive Newton-Euler for bias forces.
//!
//! Computes `qfrc_bias = c(q, q̇)` containing gravity, Coriolis, centrifugal,
//! and gyroscopic terms, for the equation of motion `M q̈ + c = τ`.
//!
//! Gravity enters through the base-acceleration trick: the computation runs
//! with a fictitious world acceleration of `-g`, which makes the backward
//! pass produce exactly the joint forces needed to hold the system still
//! under gravity. The velocity-product accelerations reuse `cacc_bias` from
//! the velocity stage.
//!
//! Reference: Featherstone, "Rigid Body Dynamics Algorithms", Chapter 5.

use nalgebra::Vector3;

use crate::data::Data;
use crate::model::Model;
use crate::spatial::{spatial, spatial_cross_force};

/// Recursive Newton-Euler: fill `data.qfrc_bias`.
///
/// Per body: `f = I·(a_bias + a₀) + v ×* (I·v)` with `a₀ = [0; -g]`,
/// then forces accumulate leaves-to-root and project through each DOF's
/// motion subspace column.
pub fn rne(model: &Model, data: &mut Data) {
    data.qfrc_bias.fill(0.0);
    if model.nv == 0 {
        return;
    }

    let a0 = spatial(Vector3::zeros(), -model.gravity);

    // Per-body bias forces.
    for body_id in 1..model.nbody {
        let inertia = &data.cinert[body_id];
        let v = data.cvel[body_id];
        let a = data.cacc_bias[body_id] + a0;

        let i_a = inertia * a;
        let i_v = inertia * v;
        let gyro = spatial_cross_force(v, i_v);

        data.cfrc_bias[body_id] = i_a + gyro;
    }
    data.cfrc_bias[0] = spatial(Vector3::zeros(), Vector3::zeros());

    // Accumulate leaves to root.
    for body_id in (1..model.nbody).rev() {
        let parent_id = model.body_parent[body_id];
        if parent_id != 0 {
            let child_force = data.cfrc_bias[body_id];
            data.cfrc_bias[parent_id] += child_force;
        }
    }

    // Project into joint space: τ_bias[dof] = cdof[dof]ᵀ f[body].
    for dof in 0..model.nv {
        let body_id = model.dof_body[dof];
        data.qfrc_bias[dof] = data.cdof[dof].dot(&data.cfrc_bias[body_id]);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::compute_all_terms;
    use crate::model::Model;
    use approx::assert_relative_eq;

    #[test]
    fn test_point_mass_gravity_bias() {
        // For a slide-z point mass: c = m*g (force needed to hold it still).
        let model = Model::point_mass_z(2.0);
        let mut data = model.make_data();
        compute_all_terms(&model, &mut data);
        assert_relative_eq!(data.qfrc_bias[0], 2.0 * 9.81, epsilon = 1e-10);
    }

    #[test]
    fn test_pendulum_gravity_torque() {
        // Horizontal pendulum: holding torque = m g L about the hinge.
        let (m, l) = (1.0, 1.0);
        let model = Model::n_link_pendulum(1, l, m);
        let mut data = model.make_data();
        data.qpos[0] = std::f64::consts::FRAC_PI_2;
        compute_all_terms(&model, &mut data);
        // Mass sits at (-L, 0, 0); gravity torque about +y axis is +m g L,
        // so the bias (holding) torque matches it.
        assert_relative_eq!(data.qfrc_bias[0].abs(), m * 9.81 * l, epsilon = 1e-9);
    }

    #[test]
    fn test_hanging_pendulum_zero_bias() {
        let model = Model::n_link_pendulum(2, 1.0, 1.0);
        let mut data = model.make_data();
        compute_all_terms(&model, &mut data);
        assert_relative_eq!(data.qfrc_bias[0], 0.0, epsilon = 1e-10);
        assert_relative_eq!(data.qfrc_bias[1], 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_no_velocity_no_bias_without_gravity() {
        let mut model = Model::n_link_pendulum(2, 1.0, 1.0);
        model.gravity = nalgebra::Vector3::zeros();
        let mut data = model.make_data();
        data.qpos[0] = 0.7;
        data.qpos[1] = -0.2;
        compute_all_terms(&model, &mut data);
        assert_relative_eq!(data.qfrc_bias[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(data.qfrc_bias[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_coriolis_power_identity() {
        // Skew symmetry of (Mdot - 2C) implies v'·c(q,v) = 1/2 v'·Mdot·v
        // when gravity is off; this pins the velocity-product terms without
        // committing to an angle convention.
        let mut model = Model::n_link_pendulum(2, 1.0, 1.0);
        model.gravity = nalgebra::Vector3::zeros();
        let mut data = model.make_data();
        data.qpos[0] = 0.4;
        data.qpos[1] = 0.6;
        data.qvel[0] = 1.3;
        data.qvel[1] = -0.8;
        compute_all_terms(&model, &mut data);
        let power = data.qvel.dot(&data.qfrc_bias);
        let qvel = data.qvel.clone();

        let eps = 1e-6;
        let qpos0 = data.qpos.clone();
        let dq_f: nalgebra::DVector<f64> = &qvel * eps;
        let mut q_f = nalgebra::DVector::zeros(model.nq);
        crate::integrate(&model, &qpos0, &dq_f, &mut q_f);
        data.qpos.copy_from(&q_f);
        compute_all_terms(&model, &mut data);
        let m_f = data.qm.clone();

        let dq_b: nalgebra::DVector<f64> = &qvel * -eps;
        let mut q_b = nalgebra::DVector::zeros(model.nq);
        crate::integrate(&model, &qpos0, &dq_b, &mut q_b);
        data.qpos.copy_from(&q_b);
        compute_all_terms(&model, &mut data);
        let m_b = data.qm.clone();

        let mdot = (m_f - m_b) / (2.0 * eps);
        let expected = 0.5 * qvel.dot(&(&mdot * &qvel));
        assert_relative_eq!(power, expected, epsilon = 1e-5);
    }
}
