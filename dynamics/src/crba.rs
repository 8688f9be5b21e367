//! Composite Rigid Body Algorithm for the joint-space mass matrix.
//!
//! Builds `qm` from per-body spatial inertias. Because every spatial
//! quantity is referenced at the world origin, composite inertias combine by
//! plain addition and the ancestor walk needs no force shifts.
//!
//! Reference: Featherstone, "Rigid Body Dynamics Algorithms", Chapter 6.

use crate::data::Data;
use crate::model::Model;

/// Composite Rigid Body Algorithm: fill `data.qm`.
///
/// 1. Initialize composite inertias from the per-body spatial inertias.
/// 2. Backward pass: `Ic[parent] += Ic[child]`.
/// 3. For each DOF, walk the `dof_parent` chain:
///    `M[i,i] = cdofᵢ·(Ic·cdofᵢ)`, `M[j,i] = cdofⱼ·(Ic·cdofᵢ)`.
pub fn crba(model: &Model, data: &mut Data) {
    data.qm.fill(0.0);
    if model.nv == 0 {
        return;
    }

    // Phase 1: start composites from individual body inertias.
    for body_id in 0..model.nbody {
        data.crb_inertia[body_id] = data.cinert[body_id];
    }

    // Phase 2: accumulate subtree inertias, leaves to root.
    for body_id in (1..model.nbody).rev() {
        let parent_id = model.body_parent[body_id];
        if parent_id != 0 {
            let child = data.crb_inertia[body_id];
            data.crb_inertia[parent_id] += child;
        }
    }

    // Phase 3: per-DOF ancestor walk.
    for i in 0..model.nv {
        let body_i = model.dof_body[i];
        let buf = data.crb_inertia[body_i] * data.cdof[i];

        data.qm[(i, i)] = data.cdof[i].dot(&buf);

        let mut j = model.dof_parent[i];
        while let Some(dof_j) = j {
            let m_ji = data.cdof[dof_j].dot(&buf);
            data.qm[(dof_j, i)] = m_ji;
            data.qm[(i, dof_j)] = m_ji;
            j = model.dof_parent[dof_j];
        }
    }
}
