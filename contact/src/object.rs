//! Environment objects with compliant contact models.
//!
//! Each object combines an analytic penetration predicate with the linear
//! spring–damper force law. Forces are computed in the object's local
//! tangent–tangent–normal frame and rotated to world, so anisotropic
//! stiffness behaves correctly on curved and tilted surfaces.

use nalgebra::{Matrix3, Unit, Vector3};

use crate::params::ContactParams;
use crate::point::ContactPoint;

/// A rigid environment object a contact point can interact with.
///
/// Objects are few and long-lived; dynamic dispatch through the registry is
/// fine. Implementors supply the penetration predicate, the contact frame,
/// and their compliance parameters; the force law itself is shared.
pub trait ContactObject: std::fmt::Debug {
    /// Test whether `cp.x` penetrates the object.
    ///
    /// On the inactive→active transition (`cp.active` still false) the
    /// anchor `cp.x_start` is set to the surface projection of `cp.x`, so
    /// the spring starts at zero deformation.
    fn check_contact(&self, cp: &mut ContactPoint) -> bool;

    /// World←local rotation of the contact frame at `cp`.
    ///
    /// Columns are `[t1, t2, n]` with `n` the outward surface normal.
    fn contact_frame(&self, cp: &ContactPoint) -> Matrix3<f64>;

    /// Compliance parameters.
    fn params(&self) -> &ContactParams;

    /// Evaluate the spring–damper law and write `cp.f` (world frame).
    ///
    /// `f_local = -K (p - p0) - B ṗ` with `K = diag(kt, kt, kn)`,
    /// `B = diag(bt, bt, bn)`. For unilateral points a tensile normal
    /// zeroes the whole force: no adhesion, and no friction without load.
    fn contact_force(&self, cp: &mut ContactPoint) {
        let rot = self.contact_frame(cp);
        let p = self.params();

        let dp = rot.transpose() * (cp.x - cp.x_start);
        let v = rot.transpose() * cp.v;

        let mut f_local = Vector3::new(
            -p.tangential_stiffness * dp.x - p.tangential_damping * v.x,
            -p.tangential_stiffness * dp.y - p.tangential_damping * v.y,
            -p.normal_stiffness * dp.z - p.normal_damping * v.z,
        );
        if cp.unilateral && f_local.z <= 0.0 {
            f_local.fill(0.0);
        }
        cp.f = rot * f_local;
    }
}

/// Build an orthonormal tangent basis for a unit normal.
fn tangent_basis(n: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let helper = if n.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let t1 = n.cross(&helper).normalize();
    let t2 = n.cross(&t1);
    (t1, t2)
}

/// Half-space `{x : n·x ≤ offset}` is solid; contact when the point is on
/// the penetrating side.
#[derive(Debug, Clone)]
pub struct HalfSpace {
    normal: Unit<Vector3<f64>>,
    offset: f64,
    frame: Matrix3<f64>,
    params: ContactParams,
}

impl HalfSpace {
    /// Create a half-space with outward unit `normal` and plane offset
    /// `n·x = offset`.
    #[must_use]
    pub fn new(normal: Unit<Vector3<f64>>, offset: f64, params: ContactParams) -> Self {
        let (t1, t2) = tangent_basis(&normal);
        let frame = Matrix3::from_columns(&[t1, t2, *normal]);
        Self {
            normal,
            offset,
            frame,
            params,
        }
    }

    /// Horizontal ground plane `z = 0` with +z normal.
    #[must_use]
    pub fn ground(params: ContactParams) -> Self {
        Self::new(Vector3::z_axis(), 0.0, params)
    }

    /// Signed distance above the surface.
    #[must_use]
    pub fn height(&self, x: &Vector3<f64>) -> f64 {
        self.normal.dot(x) - self.offset
    }
}

impl ContactObject for HalfSpace {
    fn check_contact(&self, cp: &mut ContactPoint) -> bool {
        let h = self.height(&cp.x);
        if h > 0.0 {
            return false;
        }
        if !cp.active {
            cp.x_start = cp.x - h * self.normal.into_inner();
        }
        true
    }

    fn contact_frame(&self, _cp: &ContactPoint) -> Matrix3<f64> {
        self.frame
    }

    fn params(&self) -> &ContactParams {
        &self.params
    }
}

/// Solid sphere.
#[derive(Debug, Clone)]
pub struct Sphere {
    center: Vector3<f64>,
    radius: f64,
    params: ContactParams,
}

impl Sphere {
    /// Create a sphere at `center` with `radius`.
    #[must_use]
    pub fn new(center: Vector3<f64>, radius: f64, params: ContactParams) -> Self {
        Self {
            center,
            radius,
            params,
        }
    }

    fn outward_normal(&self, x: &Vector3<f64>) -> Vector3<f64> {
        let d = x - self.center;
        let norm = d.norm();
        if norm < 1e-12 {
            Vector3::z()
        } else {
            d / norm
        }
    }
}

impl ContactObject for Sphere {
    fn check_contact(&self, cp: &mut ContactPoint) -> bool {
        let d = (cp.x - self.center).norm();
        if d >= self.radius {
            return false;
        }
        if !cp.active {
            let n = self.outward_normal(&cp.x);
            cp.x_start = self.center + self.radius * n;
        }
        true
    }

    fn contact_frame(&self, cp: &ContactPoint) -> Matrix3<f64> {
        let n = self.outward_normal(&cp.x);
        let (t1, t2) = tangent_basis(&n);
        Matrix3::from_columns(&[t1, t2, n])
    }

    fn params(&self) -> &ContactParams {
        &self.params
    }
}

/// Solid axis-aligned box.
#[derive(Debug, Clone)]
pub struct ContactBox {
    center: Vector3<f64>,
    half_extents: Vector3<f64>,
    params: ContactParams,
}

impl ContactBox {
    /// Create a box at `center` with the given half extents.
    #[must_use]
    pub fn new(center: Vector3<f64>, half_extents: Vector3<f64>, params: ContactParams) -> Self {
        Self {
            center,
            half_extents,
            params,
        }
    }

    /// Index of the face nearest to an interior point, and its signed gap.
    fn nearest_face(&self, x: &Vector3<f64>) -> (usize, f64) {
        let d = x - self.center;
        let mut best = 0;
        let mut best_gap = f64::INFINITY;
        for axis in 0..3 {
            let gap = self.half_extents[axis] - d[axis].abs();
            if gap < best_gap {
                best_gap = gap;
                best = axis;
            }
        }
        (best, best_gap)
    }

    fn face_normal(&self, x: &Vector3<f64>, axis: usize) -> Vector3<f64> {
        let d = x - self.center;
        let sign = if d[axis] >= 0.0 { 1.0 } else { -1.0 };
        Vector3::ith(axis, sign)
    }
}

impl ContactObject for ContactBox {
    fn check_contact(&self, cp: &mut ContactPoint) -> bool {
        let d = cp.x - self.center;
        for axis in 0..3 {
            if d[axis].abs() >= self.half_extents[axis] {
                return false;
            }
        }
        if !cp.active {
            let (axis, gap) = self.nearest_face(&cp.x);
            let n = self.face_normal(&cp.x, axis);
            cp.x_start = cp.x + gap * n;
        }
        true
    }

    fn contact_frame(&self, cp: &ContactPoint) -> Matrix3<f64> {
        let (axis, _) = self.nearest_face(&cp.x);
        let n = self.face_normal(&cp.x, axis);
        let (t1, t2) = tangent_basis(&n);
        Matrix3::from_columns(&[t1, t2, n])
    }

    fn params(&self) -> &ContactParams {
        &self.params
    }
}
