//! Per-frame contact state.

use nalgebra::Vector3;

/// State of one registered contact point.
///
/// A contact point is pinned to a site of the kinematic model. While active
/// it is bound to exactly one environment object through `object` (an index
/// into the registry — never an owning pointer), and its `x_start` anchor
/// marks where the compliance spring is planted.
#[derive(Debug, Clone)]
pub struct ContactPoint {
    /// Display name.
    pub name: String,
    /// Site in the kinematic model this point tracks.
    pub site_id: usize,
    /// Unilateral contacts cannot pull.
    pub unilateral: bool,
    /// Whether the point currently penetrates an object.
    pub active: bool,
    /// Index of the bound object while active.
    pub object: Option<usize>,
    /// Current world position of the site origin.
    pub x: Vector3<f64>,
    /// World-frame linear velocity at the site.
    pub v: Vector3<f64>,
    /// Anchor: where the compliance spring is attached. Set when the
    /// contact activates, frozen while sticking, moved only by the
    /// anchor-slip update.
    pub x_start: Vector3<f64>,
    /// Latest contact force exerted on the body (world frame).
    pub f: Vector3<f64>,
    /// Set when the last substep violated the friction cone.
    pub friction_flag: bool,
}

impl ContactPoint {
    /// Create an inactive contact point for `site_id`.
    #[must_use]
    pub fn new(name: impl Into<String>, site_id: usize, unilateral: bool) -> Self {
        Self {
            name: name.into(),
            site_id,
            unilateral,
            active: false,
            object: None,
            x: Vector3::zeros(),
            v: Vector3::zeros(),
            x_start: Vector3::zeros(),
            f: Vector3::zeros(),
            friction_flag: false,
        }
    }

    /// Deactivate: unbind, zero the force, clear the slip flag.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.object = None;
        self.f.fill(0.0);
        self.friction_flag = false;
    }

    /// Clear all transient state (used by `reset_state(_, _, true)`).
    pub fn clear(&mut self) {
        self.deactivate();
        self.v.fill(0.0);
        self.x_start.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_inactive() {
        let cp = ContactPoint::new("foot", 3, true);
        assert!(!cp.active);
        assert!(cp.object.is_none());
        assert_eq!(cp.site_id, 3);
        assert!(cp.unilateral);
    }

    #[test]
    fn test_deactivate_clears_force_and_flag() {
        let mut cp = ContactPoint::new("foot", 0, true);
        cp.active = true;
        cp.object = Some(1);
        cp.f = Vector3::new(1.0, 2.0, 3.0);
        cp.friction_flag = true;
        cp.deactivate();
        assert!(!cp.active);
        assert!(cp.object.is_none());
        assert_eq!(cp.f.norm(), 0.0);
        assert!(!cp.friction_flag);
    }
}
