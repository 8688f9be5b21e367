//! Model struct definition and builder methods.
//!
//! [`Model`] is the static, immutable description of the simulated system:
//! kinematic tree, joint definitions, sites, and gravity. It is built once
//! (by the factory constructors or the `add_*` methods) and shared read-only
//! across all pipeline stages.
//!
//! # Memory layout
//!
//! Arrays are indexed by their respective IDs:
//! - `body_*` arrays indexed by `body_id` (0 = world)
//! - `jnt_*` arrays indexed by `joint_id`
//! - `dof_*` arrays indexed by `dof_id` (velocity dimension index)
//! - `site_*` arrays indexed by `site_id`

use nalgebra::{DVector, UnitQuaternion, Vector3};

/// Joint type. Determines the qpos/qvel footprint and motion subspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointType {
    /// 1-DOF rotation about an axis fixed in the body frame.
    Hinge,
    /// 1-DOF translation along an axis fixed in the body frame.
    Slide,
    /// 3-DOF rotation, quaternion `[w, x, y, z]` in qpos.
    Ball,
    /// 6-DOF free joint, `[x, y, z, qw, qx, qy, qz]` in qpos.
    Free,
}

impl JointType {
    /// Number of qpos entries for this joint type.
    #[must_use]
    pub fn nq(self) -> usize {
        match self {
            Self::Hinge | Self::Slide => 1,
            Self::Ball => 4,
            Self::Free => 7,
        }
    }

    /// Number of qvel entries (DOFs) for this joint type.
    #[must_use]
    pub fn nv(self) -> usize {
        match self {
            Self::Hinge | Self::Slide => 1,
            Self::Ball => 3,
            Self::Free => 6,
        }
    }
}

/// Static model definition.
///
/// Immutable after construction. Contains the kinematic tree structure,
/// body properties, joint properties, site placements, and gravity.
#[derive(Debug, Clone)]
pub struct Model {
    /// Model name.
    pub name: String,

    // ==================== Dimensions ====================
    /// Number of generalized position coordinates (includes quaternions).
    pub nq: usize,
    /// Number of generalized velocity coordinates (DOFs).
    pub nv: usize,
    /// Number of bodies (including world body 0).
    pub nbody: usize,
    /// Number of joints.
    pub njnt: usize,
    /// Number of sites (frames contact points attach to).
    pub nsite: usize,

    // ==================== Body tree (indexed by body_id, 0 = world) ====================
    /// Parent body index (0 for bodies attached to the world).
    pub body_parent: Vec<usize>,
    /// First joint index for this body.
    pub body_jnt_adr: Vec<usize>,
    /// Number of joints attached to this body.
    pub body_jnt_num: Vec<usize>,
    /// Position offset from the parent frame to the body frame.
    pub body_pos: Vec<Vector3<f64>>,
    /// Orientation offset from the parent frame to the body frame.
    pub body_quat: Vec<UnitQuaternion<f64>>,
    /// Center-of-mass position in the body frame.
    pub body_ipos: Vec<Vector3<f64>>,
    /// Inertial frame orientation in the body frame.
    pub body_iquat: Vec<UnitQuaternion<f64>>,
    /// Body mass (kg).
    pub body_mass: Vec<f64>,
    /// Diagonal inertia in principal axes (`body_iquat` frame).
    pub body_inertia: Vec<Vector3<f64>>,
    /// Optional body names for lookup.
    pub body_name: Vec<Option<String>>,

    // ==================== Joints (indexed by jnt_id) ====================
    /// Joint type.
    pub jnt_type: Vec<JointType>,
    /// Body this joint belongs to (the child body).
    pub jnt_body: Vec<usize>,
    /// Start index in the qpos array.
    pub jnt_qpos_adr: Vec<usize>,
    /// Start index in qvel/qacc arrays.
    pub jnt_dof_adr: Vec<usize>,
    /// Joint anchor position in the body frame.
    pub jnt_pos: Vec<Vector3<f64>>,
    /// Joint axis for hinge/slide, in the body frame.
    pub jnt_axis: Vec<Vector3<f64>>,
    /// Optional joint names.
    pub jnt_name: Vec<Option<String>>,

    // ==================== DOFs (indexed by dof_id) ====================
    /// Body for this DOF.
    pub dof_body: Vec<usize>,
    /// Joint for this DOF.
    pub dof_jnt: Vec<usize>,
    /// Parent DOF in the kinematic tree (`None` for root DOFs).
    pub dof_parent: Vec<Option<usize>>,

    // ==================== Sites (indexed by site_id) ====================
    /// Body each site is attached to.
    pub site_body: Vec<usize>,
    /// Site position in the body frame.
    pub site_pos: Vec<Vector3<f64>>,
    /// Optional site names.
    pub site_name: Vec<Option<String>>,

    // ==================== Options ====================
    /// Gravity vector (world frame).
    pub gravity: Vector3<f64>,
    /// Default configuration (length `nq`).
    pub qpos0: DVector<f64>,
}

impl Model {
    /// Create an empty model containing only the world body.
    #[must_use]
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nq: 0,
            nv: 0,
            nbody: 1,
            njnt: 0,
            nsite: 0,
            body_parent: vec![0],
            body_jnt_adr: vec![0],
            body_jnt_num: vec![0],
            body_pos: vec![Vector3::zeros()],
            body_quat: vec![UnitQuaternion::identity()],
            body_ipos: vec![Vector3::zeros()],
            body_iquat: vec![UnitQuaternion::identity()],
            body_mass: vec![0.0],
            body_inertia: vec![Vector3::zeros()],
            body_name: vec![Some("world".to_string())],
            jnt_type: Vec::new(),
            jnt_body: Vec::new(),
            jnt_qpos_adr: Vec::new(),
            jnt_dof_adr: Vec::new(),
            jnt_pos: Vec::new(),
            jnt_axis: Vec::new(),
            jnt_name: Vec::new(),
            dof_body: Vec::new(),
            dof_jnt: Vec::new(),
            dof_parent: Vec::new(),
            site_body: Vec::new(),
            site_pos: Vec::new(),
            site_name: Vec::new(),
            gravity: Vector3::new(0.0, 0.0, -9.81),
            qpos0: DVector::zeros(0),
        }
    }

    /// Add a body under `parent`. Returns the new body id.
    #[allow(clippy::too_many_arguments)]
    pub fn add_body(
        &mut self,
        parent: usize,
        pos: Vector3<f64>,
        quat: UnitQuaternion<f64>,
        ipos: Vector3<f64>,
        mass: f64,
        inertia_diag: Vector3<f64>,
        name: impl Into<String>,
    ) -> usize {
        assert!(parent < self.nbody, "parent body out of range");
        let id = self.nbody;
        self.body_parent.push(parent);
        self.body_jnt_adr.push(self.njnt);
        self.body_jnt_num.push(0);
        self.body_pos.push(pos);
        self.body_quat.push(quat);
        self.body_ipos.push(ipos);
        self.body_iquat.push(UnitQuaternion::identity());
        self.body_mass.push(mass);
        self.body_inertia.push(inertia_diag);
        self.body_name.push(Some(name.into()));
        self.nbody += 1;
        id
    }

    /// Add a joint to `body`. Returns the new joint id.
    ///
    /// Joints of one body must be added consecutively, before any joint of a
    /// later body.
    pub fn add_joint(
        &mut self,
        body: usize,
        jtype: JointType,
        jnt_pos: Vector3<f64>,
        axis: Vector3<f64>,
        name: impl Into<String>,
    ) -> usize {
        assert!(body > 0 && body < self.nbody, "joint body out of range");
        assert_eq!(
            body,
            self.nbody - 1,
            "joints must be added to the most recently added body"
        );
        if self.body_jnt_num[body] == 0 {
            self.body_jnt_adr[body] = self.njnt;
        }
        self.body_jnt_num[body] += 1;

        let jnt_id = self.njnt;
        let qpos_adr = self.nq;
        let dof_adr = self.nv;

        self.jnt_type.push(jtype);
        self.jnt_body.push(body);
        self.jnt_qpos_adr.push(qpos_adr);
        self.jnt_dof_adr.push(dof_adr);
        self.jnt_pos.push(jnt_pos);
        self.jnt_axis.push(axis);
        self.jnt_name.push(Some(name.into()));
        self.njnt += 1;

        // DOF bookkeeping: chain each DOF to the previous DOF of the same
        // body, or to the last DOF of the nearest ancestor that has any.
        let mut parent_dof = self.last_dof_on_or_above(body);
        for i in 0..jtype.nv() {
            self.dof_body.push(body);
            self.dof_jnt.push(jnt_id);
            self.dof_parent.push(parent_dof);
            parent_dof = Some(dof_adr + i);
        }
        self.nv += jtype.nv();

        // Default qpos entries: zeros, with identity quaternions.
        let old_nq = self.nq;
        self.nq += jtype.nq();
        self.qpos0 = {
            let mut q = DVector::zeros(self.nq);
            q.rows_mut(0, old_nq).copy_from(&self.qpos0);
            q
        };
        match jtype {
            JointType::Ball => self.qpos0[qpos_adr] = 1.0,
            JointType::Free => {
                // Start the free body at its declared body offset.
                self.qpos0[qpos_adr] = self.body_pos[body].x;
                self.qpos0[qpos_adr + 1] = self.body_pos[body].y;
                self.qpos0[qpos_adr + 2] = self.body_pos[body].z;
                self.qpos0[qpos_adr + 3] = 1.0;
            }
            JointType::Hinge | JointType::Slide => {}
        }

        jnt_id
    }

    /// Add a site (a frame contact points can attach to). Returns the site id.
    pub fn add_site(
        &mut self,
        body: usize,
        pos: Vector3<f64>,
        name: impl Into<String>,
    ) -> usize {
        assert!(body < self.nbody, "site body out of range");
        let id = self.nsite;
        self.site_body.push(body);
        self.site_pos.push(pos);
        self.site_name.push(Some(name.into()));
        self.nsite += 1;
        id
    }

    /// Find the last DOF belonging to `body` or its nearest ancestor.
    fn last_dof_on_or_above(&self, body: usize) -> Option<usize> {
        let mut b = body;
        loop {
            let adr = self.body_jnt_adr[b];
            let num = self.body_jnt_num[b];
            if num > 0 {
                let last_jnt = adr + num - 1;
                let last_dof = self.jnt_dof_adr[last_jnt] + self.jnt_type[last_jnt].nv() - 1;
                return Some(last_dof);
            }
            if b == 0 {
                return None;
            }
            b = self.body_parent[b];
        }
    }

    /// Look up a site id by name.
    #[must_use]
    pub fn site_id(&self, name: &str) -> Option<usize> {
        self.site_name
            .iter()
            .position(|n| n.as_deref() == Some(name))
    }
}

// ==================== Factory constructors ====================

impl Model {
    /// Point mass on a single vertical slide joint (1 DOF along z).
    ///
    /// Site `"tip"` sits at the body origin.
    #[must_use]
    pub fn point_mass_z(mass: f64) -> Self {
        let mut model = Self::empty("point_mass_z");
        let body = model.add_body(
            0,
            Vector3::zeros(),
            UnitQuaternion::identity(),
            Vector3::zeros(),
            mass,
            Vector3::zeros(),
            "mass",
        );
        model.add_joint(body, JointType::Slide, Vector3::zeros(), Vector3::z(), "z");
        model.add_site(body, Vector3::zeros(), "tip");
        model
    }

    /// Point mass on three orthogonal slide joints (x, y, z).
    ///
    /// Site `"tip"` sits at the body origin.
    #[must_use]
    pub fn point_mass_3d(mass: f64) -> Self {
        let mut model = Self::empty("point_mass_3d");
        let body = model.add_body(
            0,
            Vector3::zeros(),
            UnitQuaternion::identity(),
            Vector3::zeros(),
            mass,
            Vector3::zeros(),
            "mass",
        );
        model.add_joint(body, JointType::Slide, Vector3::zeros(), Vector3::x(), "x");
        model.add_joint(body, JointType::Slide, Vector3::zeros(), Vector3::y(), "y");
        model.add_joint(body, JointType::Slide, Vector3::zeros(), Vector3::z(), "z");
        model.add_site(body, Vector3::zeros(), "tip");
        model
    }

    /// Serial n-link pendulum, hinges about the y axis, links hanging in -z.
    ///
    /// Each body frame sits at its pivot with a point mass at the link end
    /// (`body_ipos = (0, 0, -length)`). Site `"tip"` is at the end of the
    /// last link.
    ///
    /// # Panics
    /// Panics if `n` is 0.
    #[must_use]
    pub fn n_link_pendulum(n: usize, link_length: f64, link_mass: f64) -> Self {
        assert!(n >= 1, "n_link_pendulum requires at least 1 link");
        let mut model = Self::empty("n_link_pendulum");
        let mut parent = 0;
        for i in 0..n {
            let pos = if i == 0 {
                Vector3::zeros()
            } else {
                Vector3::new(0.0, 0.0, -link_length)
            };
            let body = model.add_body(
                parent,
                pos,
                UnitQuaternion::identity(),
                Vector3::new(0.0, 0.0, -link_length),
                link_mass,
                Vector3::new(1e-3, 1e-3, 1e-3),
                format!("link_{i}"),
            );
            model.add_joint(
                body,
                JointType::Hinge,
                Vector3::zeros(),
                Vector3::y(),
                format!("hinge_{i}"),
            );
            parent = body;
        }
        model.add_site(parent, Vector3::new(0.0, 0.0, -link_length), "tip");
        model
    }

    /// Single hinge about z with the mass offset radially (a flywheel).
    ///
    /// Gravity produces no torque about the joint axis, so the rotor spins
    /// freely; useful for friction-decay and energy-drift checks.
    #[must_use]
    pub fn rotor(mass: f64, radius: f64) -> Self {
        let mut model = Self::empty("rotor");
        let body = model.add_body(
            0,
            Vector3::zeros(),
            UnitQuaternion::identity(),
            Vector3::new(radius, 0.0, 0.0),
            mass,
            Vector3::zeros(),
            "wheel",
        );
        model.add_joint(body, JointType::Hinge, Vector3::zeros(), Vector3::z(), "spin");
        model.add_site(body, Vector3::new(radius, 0.0, 0.0), "rim");
        model
    }

    /// Free-floating body (6 DOF) with site `"tip"` at the body origin.
    #[must_use]
    pub fn free_body(mass: f64, inertia_diag: Vector3<f64>) -> Self {
        let mut model = Self::empty("free_body");
        let body = model.add_body(
            0,
            Vector3::zeros(),
            UnitQuaternion::identity(),
            Vector3::zeros(),
            mass,
            inertia_diag,
            "body",
        );
        model.add_joint(
            body,
            JointType::Free,
            Vector3::zeros(),
            Vector3::z(),
            "free",
        );
        model.add_site(body, Vector3::zeros(), "tip");
        model
    }
}
