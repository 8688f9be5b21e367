//! Site Jacobians, force projection, and site velocity/acceleration queries.
//!
//! The Jacobian walks the kinematic chain from the site's body to the root,
//! accumulating per-joint columns. The force-projection routine performs the
//! same walk with `Jᵀ f` folded in, so no Jacobian is materialized.

use nalgebra::{DMatrix, DVector, Vector3};

use crate::data::Data;
use crate::model::{JointType, Model};
use crate::spatial::{angular, linear};

/// Write the 3×nv world-aligned linear Jacobian of `site_id` into `jac`.
///
/// `jac` must be preallocated to 3×nv; it is zeroed first.
///
/// Per joint type, the column(s) at the site point `p`:
///
/// | Joint | column |
/// |-------|--------|
/// | Hinge | `axis × (p − anchor)` |
/// | Slide | `axis` |
/// | Ball  | `(R·eᵢ) × (p − anchor)` |
/// | Free  | `eᵢ` (trans), `(R·eᵢ) × (p − xpos)` (rot) |
pub fn site_jacobian_into(model: &Model, data: &Data, site_id: usize, jac: &mut DMatrix<f64>) {
    debug_assert_eq!(jac.nrows(), 3);
    debug_assert_eq!(jac.ncols(), model.nv);
    jac.fill(0.0);

    let point = data.site_xpos[site_id];
    let mut current = model.site_body[site_id];
    while current != 0 {
        let jnt_start = model.body_jnt_adr[current];
        let jnt_end = jnt_start + model.body_jnt_num[current];

        for jnt_id in jnt_start..jnt_end {
            let dof = model.jnt_dof_adr[jnt_id];
            let jnt_body = model.jnt_body[jnt_id];

            match model.jnt_type[jnt_id] {
                JointType::Hinge => {
                    let axis = data.xquat[jnt_body] * model.jnt_axis[jnt_id];
                    let anchor =
                        data.xpos[jnt_body] + data.xquat[jnt_body] * model.jnt_pos[jnt_id];
                    let col = axis.cross(&(point - anchor));
                    for k in 0..3 {
                        jac[(k, dof)] += col[k];
                    }
                }
                JointType::Slide => {
                    let axis = data.xquat[jnt_body] * model.jnt_axis[jnt_id];
                    for k in 0..3 {
                        jac[(k, dof)] += axis[k];
                    }
                }
                JointType::Ball => {
                    let anchor =
                        data.xpos[jnt_body] + data.xquat[jnt_body] * model.jnt_pos[jnt_id];
                    let r = point - anchor;
                    for i in 0..3 {
                        let omega = data.xmat[jnt_body] * Vector3::ith(i, 1.0);
                        let col = omega.cross(&r);
                        for k in 0..3 {
                            jac[(k, dof + i)] += col[k];
                        }
                    }
                }
                JointType::Free => {
                    for i in 0..3 {
                        jac[(i, dof + i)] += 1.0;
                    }
                    let r = point - data.xpos[jnt_body];
                    for i in 0..3 {
                        let omega = data.xmat[jnt_body] * Vector3::ith(i, 1.0);
                        let col = omega.cross(&r);
                        for k in 0..3 {
                            jac[(k, dof + 3 + i)] += col[k];
                        }
                    }
                }
            }
        }
        current = model.body_parent[current];
    }
}

/// Accumulate `Jᵀ force` for a force applied at `site_id` into `qfrc`,
/// without materializing the Jacobian.
pub fn apply_site_force(
    model: &Model,
    data: &Data,
    site_id: usize,
    force: &Vector3<f64>,
    qfrc: &mut DVector<f64>,
) {
    let point = data.site_xpos[site_id];
    let mut current = model.site_body[site_id];
    while current != 0 {
        let jnt_start = model.body_jnt_adr[current];
        let jnt_end = jnt_start + model.body_jnt_num[current];

        for jnt_id in jnt_start..jnt_end {
            let dof = model.jnt_dof_adr[jnt_id];
            let jnt_body = model.jnt_body[jnt_id];

            match model.jnt_type[jnt_id] {
                JointType::Hinge => {
                    let axis = data.xquat[jnt_body] * model.jnt_axis[jnt_id];
                    let anchor =
                        data.xpos[jnt_body] + data.xquat[jnt_body] * model.jnt_pos[jnt_id];
                    qfrc[dof] += axis.cross(&(point - anchor)).dot(force);
                }
                JointType::Slide => {
                    let axis = data.xquat[jnt_body] * model.jnt_axis[jnt_id];
                    qfrc[dof] += axis.dot(force);
                }
                JointType::Ball => {
                    let anchor =
                        data.xpos[jnt_body] + data.xquat[jnt_body] * model.jnt_pos[jnt_id];
                    let r = point - anchor;
                    for i in 0..3 {
                        let omega = data.xmat[jnt_body] * Vector3::ith(i, 1.0);
                        qfrc[dof + i] += omega.cross(&r).dot(force);
                    }
                }
                JointType::Free => {
                    qfrc[dof] += force[0];
                    qfrc[dof + 1] += force[1];
                    qfrc[dof + 2] += force[2];
                    let r = point - data.xpos[jnt_body];
                    for i in 0..3 {
                        let omega = data.xmat[jnt_body] * Vector3::ith(i, 1.0);
                        qfrc[dof + 3 + i] += omega.cross(&r).dot(force);
                    }
                }
            }
        }
        current = model.body_parent[current];
    }
}

/// World-frame linear velocity of a site: `v(p) = v(O) + ω × p`.
#[must_use]
pub fn site_velocity(model: &Model, data: &Data, site_id: usize) -> Vector3<f64> {
    let body = model.site_body[site_id];
    let cvel = &data.cvel[body];
    linear(cvel) + angular(cvel).cross(&data.site_xpos[site_id])
}

/// Classical linear acceleration of a site under zero joint acceleration —
/// exactly the `J̇·v` term of the contact linearization.
///
/// Transports the body's velocity-product spatial acceleration to the site
/// and adds the `ω × v` classical correction.
#[must_use]
pub fn site_bias_acceleration(model: &Model, data: &Data, site_id: usize) -> Vector3<f64> {
    let body = model.site_body[site_id];
    let p = data.site_xpos[site_id];
    let a = &data.cacc_bias[body];
    let a_lin = linear(a) + angular(a).cross(&p);
    let v_site = site_velocity(model, data, site_id);
    a_lin + angular(&data.cvel[body]).cross(&v_site)
}

/// Classical linear acceleration of a site from the full second-order FK.
///
/// Valid after [`forward_acceleration`](crate::forward_acceleration).
#[must_use]
pub fn site_acceleration(model: &Model, data: &Data, site_id: usize) -> Vector3<f64> {
    let body = model.site_body[site_id];
    let p = data.site_xpos[site_id];
    let a = &data.cacc[body];
    let a_lin = linear(a) + angular(a).cross(&p);
    let v_site = site_velocity(model, data, site_id);
    a_lin + angular(&data.cvel[body]).cross(&v_site)
}
