//! Spatial algebra utilities for 6D motion and force vectors.
//!
//! Convention: spatial vectors are `[angular(0..3); linear(3..6)]`, expressed
//! in world coordinates and referenced at the **world origin**. Using one
//! fixed reference point for the whole tree means velocities, accelerations,
//! and inertias combine by plain addition — no inter-body transport terms.
//! Functions here are pure math, no pipeline state.

use nalgebra::{Matrix3, Matrix6, Vector3, Vector6};

/// 6D spatial vector: [angular (3), linear (3)].
///
/// Motion vectors: [ω, v]. Force vectors: [τ, f].
pub type SpatialVector = Vector6<f64>;

/// Build a spatial vector from angular and linear parts.
#[inline]
#[must_use]
pub fn spatial(angular: Vector3<f64>, linear: Vector3<f64>) -> SpatialVector {
    SpatialVector::new(
        angular.x, angular.y, angular.z, linear.x, linear.y, linear.z,
    )
}

/// Angular (top 3) component.
#[inline]
#[must_use]
pub fn angular(v: &SpatialVector) -> Vector3<f64> {
    Vector3::new(v[0], v[1], v[2])
}

/// Linear (bottom 3) component.
#[inline]
#[must_use]
pub fn linear(v: &SpatialVector) -> Vector3<f64> {
    Vector3::new(v[3], v[4], v[5])
}

/// Spatial cross product for motion vectors: v ×ₘ s.
#[inline]
#[must_use]
pub fn spatial_cross_motion(v: SpatialVector, s: SpatialVector) -> SpatialVector {
    let w = angular(&v);
    let v_lin = linear(&v);
    let s_ang = angular(&s);
    let s_lin = linear(&s);

    spatial(w.cross(&s_ang), w.cross(&s_lin) + v_lin.cross(&s_ang))
}

/// Spatial cross product for force vectors: v ×* f.
#[inline]
#[must_use]
pub fn spatial_cross_force(v: SpatialVector, f: SpatialVector) -> SpatialVector {
    let w = angular(&v);
    let v_lin = linear(&v);
    let f_ang = angular(&f);
    let f_lin = linear(&f);

    spatial(w.cross(&f_ang) + v_lin.cross(&f_lin), w.cross(&f_lin))
}

/// Compute a body's 6×6 spatial inertia about the world origin.
///
/// * `mass` - body mass
/// * `inertia_diag` - diagonal inertia in the body's principal frame
/// * `i_mat` - rotation from inertial frame to world (3×3)
/// * `h` - world-frame COM position (COM offset from the world origin)
///
/// ```text
/// I = [I_rot + m*(h·h*E - h⊗h),  m*[h]×  ]
///     [m*[h]×ᵀ,                  m*E     ]
/// ```
#[must_use]
pub fn body_spatial_inertia(
    mass: f64,
    inertia_diag: Vector3<f64>,
    i_mat: &Matrix3<f64>,
    h: Vector3<f64>,
) -> Matrix6<f64> {
    // Rotational inertia in world frame: R * diag(I) * R^T
    let mut i_rot: Matrix3<f64> = Matrix3::zeros();
    for row in 0..3 {
        for col in 0..3 {
            i_rot[(row, col)] = i_mat[(row, 0)] * inertia_diag[0] * i_mat[(col, 0)]
                + i_mat[(row, 1)] * inertia_diag[1] * i_mat[(col, 1)]
                + i_mat[(row, 2)] * inertia_diag[2] * i_mat[(col, 2)];
        }
    }

    let mut out = Matrix6::zeros();

    // Upper-left 3x3: rotational inertia about the origin (parallel axis)
    let h_dot_h = h.dot(&h);
    for row in 0..3 {
        for col in 0..3 {
            let delta = if row == col { 1.0 } else { 0.0 };
            out[(row, col)] = i_rot[(row, col)] + mass * (h_dot_h * delta - h[row] * h[col]);
        }
    }

    // Lower-right 3x3: mass
    out[(3, 3)] = mass;
    out[(4, 4)] = mass;
    out[(5, 5)] = mass;

    // Coupling blocks: m*[h]× and its transpose
    let mh = h * mass;
    out[(0, 4)] = -mh.z;
    out[(0, 5)] = mh.y;
    out[(1, 3)] = mh.z;
    out[(1, 5)] = -mh.x;
    out[(2, 3)] = -mh.y;
    out[(2, 4)] = mh.x;

    out[(4, 0)] = -mh.z;
    out[(5, 0)] = mh.y;
    out[(3, 1)] = mh.z;
    out[(5, 1)] = -mh.x;
    out[(3, 2)] = -mh.y;
    out[(4, 2)] = mh.x;

    out
}
