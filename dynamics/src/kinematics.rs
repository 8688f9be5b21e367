//! Forward kinematics: position, velocity, and acceleration stages.
//!
//! Position FK traverses the tree root-to-leaf computing world poses, site
//! positions, and per-body spatial inertias. The velocity stage fills the
//! per-DOF motion subspace columns (`cdof`), body spatial velocities, and
//! the velocity-product (bias) accelerations. All spatial quantities are
//! referenced at the world origin (see [`crate::spatial`]).

use nalgebra::{Matrix6, Quaternion, UnitQuaternion, Vector3};

use crate::data::Data;
use crate::model::{JointType, Model};
use crate::spatial::{SpatialVector, body_spatial_inertia, spatial, spatial_cross_motion};

/// Position-stage forward kinematics: body poses, site positions, inertias.
pub fn forward_position(model: &Model, data: &mut Data) {
    data.xpos[0] = Vector3::zeros();
    data.xquat[0] = UnitQuaternion::identity();
    data.xmat[0] = nalgebra::Matrix3::identity();
    data.cinert[0] = Matrix6::zeros();

    // Bodies in order (parents before children).
    for body_id in 1..model.nbody {
        let parent_id = model.body_parent[body_id];

        let mut pos = data.xpos[parent_id];
        let mut quat = data.xquat[parent_id];

        // Body offset in the parent frame.
        pos += quat * model.body_pos[body_id];
        quat *= model.body_quat[body_id];

        // Apply each joint on this body.
        let jnt_start = model.body_jnt_adr[body_id];
        let jnt_end = jnt_start + model.body_jnt_num[body_id];
        for jnt_id in jnt_start..jnt_end {
            let qpos_adr = model.jnt_qpos_adr[jnt_id];
            match model.jnt_type[jnt_id] {
                JointType::Hinge => {
                    let angle = data.qpos[qpos_adr];
                    let world_anchor = pos + quat * model.jnt_pos[jnt_id];
                    let world_axis = quat * model.jnt_axis[jnt_id];
                    let rot = if let Some(unit_axis) = nalgebra::Unit::try_new(world_axis, 1e-10) {
                        UnitQuaternion::from_axis_angle(&unit_axis, angle)
                    } else {
                        UnitQuaternion::identity()
                    };
                    quat = rot * quat;
                    pos = world_anchor + rot * (pos - world_anchor);
                }
                JointType::Slide => {
                    let displacement = data.qpos[qpos_adr];
                    pos += quat * (model.jnt_axis[jnt_id] * displacement);
                }
                JointType::Ball => {
                    let q = UnitQuaternion::from_quaternion(Quaternion::new(
                        data.qpos[qpos_adr],
                        data.qpos[qpos_adr + 1],
                        data.qpos[qpos_adr + 2],
                        data.qpos[qpos_adr + 3],
                    ));
                    quat *= q;
                }
                JointType::Free => {
                    pos = Vector3::new(
                        data.qpos[qpos_adr],
                        data.qpos[qpos_adr + 1],
                        data.qpos[qpos_adr + 2],
                    );
                    quat = UnitQuaternion::from_quaternion(Quaternion::new(
                        data.qpos[qpos_adr + 3],
                        data.qpos[qpos_adr + 4],
                        data.qpos[qpos_adr + 5],
                        data.qpos[qpos_adr + 6],
                    ));
                }
            }
        }

        data.xpos[body_id] = pos;
        data.xquat[body_id] = quat;
        data.xmat[body_id] = quat.to_rotation_matrix().into_inner();
        data.xipos[body_id] = pos + quat * model.body_ipos[body_id];
        data.ximat[body_id] = (quat * model.body_iquat[body_id])
            .to_rotation_matrix()
            .into_inner();

        // Spatial inertia about the world origin (h = world COM position).
        data.cinert[body_id] = body_spatial_inertia(
            model.body_mass[body_id],
            model.body_inertia[body_id],
            &data.ximat[body_id],
            data.xipos[body_id],
        );
    }

    // Site positions.
    for site_id in 0..model.nsite {
        let body_id = model.site_body[site_id];
        data.site_xpos[site_id] =
            data.xpos[body_id] + data.xquat[body_id] * model.site_pos[site_id];
    }
}

/// Compute the world-aligned motion subspace column for one DOF.
///
/// Columns are spatial vectors referenced at the world origin:
/// `v(O) = ω × (O − anchor)` gives the linear part `anchor × ω`.
fn dof_motion_subspace(model: &Model, data: &Data, dof: usize) -> SpatialVector {
    let jnt_id = model.dof_jnt[dof];
    let body_id = model.jnt_body[jnt_id];
    let dof_in_jnt = dof - model.jnt_dof_adr[jnt_id];

    match model.jnt_type[jnt_id] {
        JointType::Hinge => {
            let axis = data.xquat[body_id] * model.jnt_axis[jnt_id];
            let anchor = data.xpos[body_id] + data.xquat[body_id] * model.jnt_pos[jnt_id];
            spatial(axis, anchor.cross(&axis))
        }
        JointType::Slide => {
            let axis = data.xquat[body_id] * model.jnt_axis[jnt_id];
            spatial(Vector3::zeros(), axis)
        }
        JointType::Ball => {
            let omega = data.xmat[body_id] * Vector3::ith(dof_in_jnt, 1.0);
            let anchor = data.xpos[body_id] + data.xquat[body_id] * model.jnt_pos[jnt_id];
            spatial(omega, anchor.cross(&omega))
        }
        JointType::Free => {
            if dof_in_jnt < 3 {
                spatial(Vector3::zeros(), Vector3::ith(dof_in_jnt, 1.0))
            } else {
                let omega = data.xmat[body_id] * Vector3::ith(dof_in_jnt - 3, 1.0);
                spatial(omega, data.xpos[body_id].cross(&omega))
            }
        }
    }
}

/// Velocity-stage kinematics: `cdof`, body velocities, bias accelerations.
///
/// With a common world-origin reference the propagation is pure addition:
/// `cvel[i] = cvel[parent] + Σ cdof·q̇`. The bias accelerations are the
/// velocity-product terms only (`cacc_bias[0] = 0`); gravity enters the bias
/// *forces* in RNE, not the accelerations, so `cacc_bias` doubles as the
/// source for the sites' `J̇·v`.
pub fn forward_velocity(model: &Model, data: &mut Data) {
    for dof in 0..model.nv {
        data.cdof[dof] = dof_motion_subspace(model, data, dof);
    }

    data.cvel[0] = SpatialVector::zeros();
    data.cacc_bias[0] = SpatialVector::zeros();

    for body_id in 1..model.nbody {
        let parent_id = model.body_parent[body_id];
        let mut vel = data.cvel[parent_id];
        let mut acc = data.cacc_bias[parent_id];

        let jnt_start = model.body_jnt_adr[body_id];
        let jnt_end = jnt_start + model.body_jnt_num[body_id];
        for jnt_id in jnt_start..jnt_end {
            let dof_adr = model.jnt_dof_adr[jnt_id];
            for d in 0..model.jnt_type[jnt_id].nv() {
                let vj = data.cdof[dof_adr + d] * data.qvel[dof_adr + d];
                // The subspace column moves with everything preceding it,
                // so the velocity product uses the accumulated velocity.
                acc += spatial_cross_motion(vel, vj);
                vel += vj;
            }
        }

        data.cvel[body_id] = vel;
        data.cacc_bias[body_id] = acc;
    }
}

/// Second-order FK: full spatial accelerations from the current `qacc`.
///
/// `cacc[i] = cacc[parent] + Σ (cdof·q̈ + v ×ₘ cdof·q̇)`. Observers read
/// site accelerations off these after a step.
pub fn forward_acceleration(model: &Model, data: &mut Data) {
    data.cacc[0] = SpatialVector::zeros();

    for body_id in 1..model.nbody {
        let parent_id = model.body_parent[body_id];
        let mut acc = data.cacc[parent_id];
        let mut vel = data.cvel[parent_id];

        let jnt_start = model.body_jnt_adr[body_id];
        let jnt_end = jnt_start + model.body_jnt_num[body_id];
        for jnt_id in jnt_start..jnt_end {
            let dof_adr = model.jnt_dof_adr[jnt_id];
            for d in 0..model.jnt_type[jnt_id].nv() {
                let vj = data.cdof[dof_adr + d] * data.qvel[dof_adr + d];
                acc += spatial_cross_motion(vel, vj);
                acc += data.cdof[dof_adr + d] * data.qacc[dof_adr + d];
                vel += vj;
            }
        }

        data.cacc[body_id] = acc;
    }
}

/// Run every term the simulators consume: position and velocity FK, the
/// mass matrix (CRBA), and the bias forces (RNE).
pub fn compute_all_terms(model: &Model, data: &mut Data) {
    forward_position(model, data);
    forward_velocity(model, data);
    crate::crba(model, data);
    crate::rne(model, data);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DVector;

    #[test]
    fn test_fk_point_mass_translation() {
        let model = Model::point_mass_3d(1.0);
        let mut data = model.make_data();
        data.qpos[0] = 0.5;
        data.qpos[1] = -0.25;
        data.qpos[2] = 2.0;
        forward_position(&model, &mut data);
        assert_relative_eq!(
            data.xpos[1],
            Vector3::new(0.5, -0.25, 2.0),
            epsilon = 1e-12
        );
        assert_relative_eq!(data.site_xpos[0], data.xpos[1], epsilon = 1e-12);
    }

    #[test]
    fn test_fk_pendulum_tip() {
        let model = Model::n_link_pendulum(1, 1.0, 1.0);
        let mut data = model.make_data();

        // Hanging straight down
        assert_relative_eq!(
            data.site_xpos[0],
            Vector3::new(0.0, 0.0, -1.0),
            epsilon = 1e-12
        );

        // Horizontal (rotated +90 deg about y: -z axis maps to -x... check sign)
        data.qpos[0] = std::f64::consts::FRAC_PI_2;
        forward_position(&model, &mut data);
        // Rotation about +y by +pi/2 maps (0,0,-1) to (-1,0,0)
        assert_relative_eq!(
            data.site_xpos[0],
            Vector3::new(-1.0, 0.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_site_velocity_matches_finite_difference() {
        let model = Model::n_link_pendulum(2, 0.8, 1.3);
        let mut data = model.make_data();
        data.qpos[0] = 0.4;
        data.qpos[1] = -0.7;
        data.qvel[0] = 0.9;
        data.qvel[1] = -1.1;
        compute_all_terms(&model, &mut data);
        let v_analytic = crate::site_velocity(&model, &data, 0);

        // Central difference on the site position.
        let eps = 1e-6;
        let mut qp = data.qpos.clone();
        let dq: DVector<f64> = &data.qvel * eps;
        let mut q_fwd = DVector::zeros(model.nq);
        crate::integrate(&model, &qp, &dq, &mut q_fwd);
        let dq_back: DVector<f64> = &data.qvel * -eps;
        let mut q_bwd = DVector::zeros(model.nq);
        crate::integrate(&model, &qp, &dq_back, &mut q_bwd);

        qp.copy_from(&q_fwd);
        data.qpos.copy_from(&qp);
        forward_position(&model, &mut data);
        let x_fwd = data.site_xpos[0];
        data.qpos.copy_from(&q_bwd);
        forward_position(&model, &mut data);
        let x_bwd = data.site_xpos[0];

        let v_fd = (x_fwd - x_bwd) / (2.0 * eps);
        assert_relative_eq!(v_analytic, v_fd, epsilon = 1e-6);
    }

    #[test]
    fn test_bias_acceleration_matches_finite_difference() {
        // J̇·v == d/dt (J v) at constant qvel, i.e. the change of the site
        // velocity when positions advance along qvel with qacc = 0.
        let model = Model::n_link_pendulum(2, 1.0, 1.0);
        let mut data = model.make_data();
        data.qpos[0] = 0.3;
        data.qpos[1] = 0.5;
        data.qvel[0] = 1.2;
        data.qvel[1] = -0.4;
        compute_all_terms(&model, &mut data);
        let djv = crate::site_bias_acceleration(&model, &data, 0);

        let eps = 1e-6;
        let qpos0 = data.qpos.clone();

        let dq_f: DVector<f64> = &data.qvel * eps;
        let mut q_f = DVector::zeros(model.nq);
        crate::integrate(&model, &qpos0, &dq_f, &mut q_f);
        data.qpos.copy_from(&q_f);
        compute_all_terms(&model, &mut data);
        let v_f = crate::site_velocity(&model, &data, 0);

        let dq_b: DVector<f64> = &data.qvel * -eps;
        let mut q_b = DVector::zeros(model.nq);
        crate::integrate(&model, &qpos0, &dq_b, &mut q_b);
        data.qpos.copy_from(&q_b);
        compute_all_terms(&model, &mut data);
        let v_b = crate::site_velocity(&model, &data, 0);

        let djv_fd = (v_f - v_b) / (2.0 * eps);
        assert_relative_eq!(djv, djv_fd, epsilon = 1e-5);
    }

    #[test]
    fn test_free_body_velocity() {
        let model = Model::free_body(1.0, Vector3::new(0.1, 0.1, 0.1));
        let mut data = model.make_data();
        data.qvel[0] = 1.0; // vx
        data.qvel[5] = 2.0; // wz (body frame == world frame here)
        compute_all_terms(&model, &mut data);
        let v = crate::site_velocity(&model, &data, 0);
        assert_relative_eq!(v, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
    }
}
