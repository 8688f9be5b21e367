//! Contact registry: owns points and objects, maintains the active set.

use crate::object::ContactObject;
use crate::point::ContactPoint;

/// Registry of contact points and environment objects.
///
/// Detection keeps a sticky binding: an active point re-queries only its
/// bound object, and binds to at most one object at a time. Inactive (or
/// just-deactivated) points scan all objects in registration order and bind
/// to the first that reports contact, so contact ordering is deterministic.
#[derive(Debug, Default)]
pub struct ContactRegistry {
    points: Vec<ContactPoint>,
    objects: Vec<Box<dyn ContactObject>>,
    nactive: usize,
}

impl ContactRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a contact point. Returns its handle.
    pub fn add_point(
        &mut self,
        name: impl Into<String>,
        site_id: usize,
        unilateral: bool,
    ) -> usize {
        self.points.push(ContactPoint::new(name, site_id, unilateral));
        self.points.len() - 1
    }

    /// Register an environment object. Returns its handle.
    pub fn add_object(&mut self, object: Box<dyn ContactObject>) -> usize {
        self.objects.push(object);
        self.objects.len() - 1
    }

    /// Number of registered points.
    #[must_use]
    pub fn n_points(&self) -> usize {
        self.points.len()
    }

    /// Number of active contacts after the last [`detect`](Self::detect).
    #[must_use]
    pub fn nactive(&self) -> usize {
        self.nactive
    }

    /// Registered points (read-only).
    #[must_use]
    pub fn points(&self) -> &[ContactPoint] {
        &self.points
    }

    /// Registered points (mutable; the simulator refreshes `x`/`v`).
    pub fn points_mut(&mut self) -> &mut [ContactPoint] {
        &mut self.points
    }

    /// One registered point.
    #[must_use]
    pub fn point(&self, index: usize) -> &ContactPoint {
        &self.points[index]
    }

    /// One registered object.
    #[must_use]
    pub fn object(&self, index: usize) -> &dyn ContactObject {
        self.objects[index].as_ref()
    }

    /// Split access: points mutably, objects read-only.
    pub fn points_and_objects(&mut self) -> (&mut [ContactPoint], &[Box<dyn ContactObject>]) {
        (&mut self.points, &self.objects)
    }

    /// Clear transient contact state on every point.
    pub fn reset_points(&mut self) {
        for cp in &mut self.points {
            cp.clear();
        }
        self.nactive = 0;
    }

    /// Refresh the active set from the points' current world positions.
    ///
    /// Caller must have updated `points[i].x` first. Returns the number of
    /// active contacts.
    pub fn detect(&mut self) -> usize {
        let mut count = 0;
        let Self {
            points, objects, ..
        } = self;

        for cp in points.iter_mut() {
            if cp.active {
                let still_touching = match cp.object {
                    Some(idx) => objects[idx].check_contact(cp),
                    None => false,
                };
                if still_touching {
                    // Single object per point: no need to scan further.
                    count += 1;
                    continue;
                }
                cp.deactivate();
            }

            for (idx, obj) in objects.iter().enumerate() {
                if obj.check_contact(cp) {
                    cp.active = true;
                    cp.object = Some(idx);
                    count += 1;
                    break;
                }
            }
        }
        self.nactive = count;
        count
    }
}
