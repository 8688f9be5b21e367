//! End-to-end simulation scenarios for both integrators.

#![allow(clippy::unwrap_used)]

use approx::assert_relative_eq;
use nalgebra::{DVector, Vector3};

use softstep_contact::{ContactParams, HalfSpace};
use softstep_core::{EulerSimulator, ExponentialSimulator};
use softstep_dynamics::Model;
use softstep_types::{SimError, SimulatorConfig};

const G: f64 = 9.81;

fn ground(kn: f64, bn: f64, mu: f64) -> Box<HalfSpace> {
    Box::new(HalfSpace::ground(
        ContactParams::default()
            .with_normal_stiffness(kn)
            .with_tangential_stiffness(kn)
            .with_normal_damping(bn)
            .with_tangential_damping(bn)
            .with_friction(mu),
    ))
}

// ---------------------------------------------------------------------------
// Scenario 1: free fall, no contact. Both integrators agree.
// ---------------------------------------------------------------------------

#[test]
fn free_fall_matches_closed_form_in_both_integrators() {
    let cfg = SimulatorConfig::new(1e-3, 1);
    let q0 = DVector::from_row_slice(&[1.0]);
    let v0 = DVector::zeros(1);
    let tau = DVector::zeros(1);

    let mut euler = EulerSimulator::new(Model::point_mass_z(1.0), cfg.clone()).unwrap();
    euler.reset_state(&q0, &v0, true).unwrap();
    let mut expo = ExponentialSimulator::new(Model::point_mass_z(1.0), cfg).unwrap();
    expo.reset_state(&q0, &v0, true).unwrap();

    for _ in 0..100 {
        euler.step(&tau).unwrap();
        expo.step(&tau).unwrap();
    }

    // Symplectic closed form: q = q0 - 1/2 g t^2, v = -g t (exact for the
    // midpoint position update).
    assert_relative_eq!(euler.q()[0], 1.0 - 0.5 * G * 0.01, epsilon = 1e-6);
    assert_relative_eq!(euler.v()[0], -G * 0.1, epsilon = 1e-6);

    // With no contacts the two integrators share the fallback path exactly.
    assert_relative_eq!(euler.q()[0], expo.q()[0], epsilon = 1e-12);
    assert_relative_eq!(euler.v()[0], expo.v()[0], epsilon = 1e-12);
}

// ---------------------------------------------------------------------------
// Scenario 2: static equilibrium on the plane (exponential).
// ---------------------------------------------------------------------------

#[test]
fn static_equilibrium_on_plane() {
    let model = Model::point_mass_z(1.0);
    let mut sim = ExponentialSimulator::new(model, SimulatorConfig::new(1e-3, 1)).unwrap();
    sim.add_contact_point("tip", 0, true);
    sim.add_object(ground(1e4, 10.0, 0.3));

    let q0 = DVector::zeros(1);
    let v0 = DVector::zeros(1);
    sim.reset_state(&q0, &v0, true).unwrap();
    assert_eq!(sim.nactive(), 1);

    let tau = DVector::zeros(1);
    for _ in 0..1000 {
        sim.step(&tau).unwrap();
    }

    assert!(sim.q()[0].abs() < 1e-3, "z = {}", sim.q()[0]);
    assert!(sim.v()[0].abs() < 1e-2, "zdot = {}", sim.v()[0]);
    assert!(sim.contact(0).active);
    assert_relative_eq!(sim.contact(0).f.z, G, epsilon = 0.02 * G);

    // Invariant: active => bound object and a defined anchor.
    assert!(sim.contact(0).object.is_some());
    assert!(sim.contact(0).x_start.norm() < 1.0);
}

// ---------------------------------------------------------------------------
// Scenario 3: stiff impact stays stable under the exponential integrator.
// ---------------------------------------------------------------------------

#[test]
fn stiff_impact_exponential_stable() {
    let model = Model::point_mass_z(1.0);
    let mut sim = ExponentialSimulator::new(model, SimulatorConfig::new(1e-3, 1)).unwrap();
    sim.add_contact_point("tip", 0, true);
    sim.add_object(ground(1e5, 20.0, f64::INFINITY));

    let q0 = DVector::from_row_slice(&[0.1]);
    let v0 = DVector::zeros(1);
    sim.reset_state(&q0, &v0, true).unwrap();

    // 5 s: the bounce cascade accumulates within ~3 s, then the mass rests.
    let tau = DVector::zeros(1);
    let mut min_z: f64 = 0.0;
    for _ in 0..5000 {
        sim.step(&tau).unwrap();
        assert!(sim.q()[0].is_finite() && sim.v()[0].is_finite());
        assert!(sim.v()[0].abs() < 10.0, "velocity blew up: {}", sim.v()[0]);
        min_z = min_z.min(sim.q()[0]);
    }

    // Stiff contact: penetration stays shallow (impact depth ~v/ω plus one
    // substep of detection lag), and the mass comes to rest near the surface.
    assert!(min_z > -8e-3, "tunnelled to {min_z}");
    assert!(sim.q()[0].abs() < 5e-3);
    assert!(sim.v()[0].abs() < 5e-2);
}

// ---------------------------------------------------------------------------
// Scenario 4: sliding with friction saturates the cone.
// ---------------------------------------------------------------------------

#[test]
fn sliding_saturates_friction_cone() {
    let mu = 0.3;
    let model = Model::point_mass_3d(1.0);
    let mut sim = ExponentialSimulator::new(model, SimulatorConfig::new(1e-3, 1)).unwrap();
    sim.add_contact_point("tip", 0, true);
    sim.add_object(ground(1e4, 100.0, mu));

    let q0 = DVector::zeros(3);
    let v0 = DVector::zeros(3);
    sim.reset_state(&q0, &v0, true).unwrap();

    // Horizontal push exceeding mu * m * g = 2.94 N.
    let tau = DVector::from_row_slice(&[5.0, 0.0, 0.0]);
    for _ in 0..1000 {
        sim.step(&tau).unwrap();
    }

    assert!(sim.cone_violation(), "cone never saturated");
    assert!(sim.contact(0).friction_flag);
    assert!(sim.v()[0] > 0.0, "mass should slide forward");

    // Projected force sits on the cone boundary: |f_t| = mu * f_n.
    let fpr = sim.projected_force(0).unwrap();
    let f_t = (fpr.x * fpr.x + fpr.y * fpr.y).sqrt();
    assert!(fpr.z > 0.0);
    assert_relative_eq!(f_t, mu * fpr.z, epsilon = 0.01 * mu * fpr.z);

    // Cone law holds for every active contact.
    for cp in sim.contacts() {
        if cp.active {
            let p = sim.projected_force(0).unwrap();
            let t = (p.x * p.x + p.y * p.y).sqrt();
            assert!(t <= mu * p.z.max(0.0) + 1e-9);
        }
    }
}

// ---------------------------------------------------------------------------
// Scenario 5: active-set change resizes exactly once.
// ---------------------------------------------------------------------------

#[test]
fn active_set_change_resizes_once() {
    let mut model = Model::point_mass_3d(1.0);
    model.add_site(1, Vector3::new(0.0, 0.0, 0.5), "upper");

    let mut sim = ExponentialSimulator::new(model, SimulatorConfig::new(1e-3, 1)).unwrap();
    sim.add_contact_point("lower", 0, true);
    sim.add_contact_point("upper", 1, true);
    // Overdamped landing: the point settles without rebounding, so the
    // active set changes exactly once.
    sim.add_object(ground(1e4, 400.0, 0.5));

    // Start just above the plane: no contact yet.
    let q0 = DVector::from_row_slice(&[0.0, 0.0, 0.02]);
    let v0 = DVector::zeros(3);
    sim.reset_state(&q0, &v0, true).unwrap();
    assert_eq!(sim.nactive(), 0);
    let resizes_before = sim.resize_count();

    let tau = DVector::zeros(3);
    for _ in 0..500 {
        sim.step(&tau).unwrap();
    }

    // The lower point touched down; the upper one never did.
    assert_eq!(sim.nactive(), 1);
    assert!(sim.contact(0).active);
    assert!(!sim.contact(1).active);
    assert_eq!(
        sim.resize_count(),
        resizes_before + 1,
        "workspace must resize exactly once for one activation"
    );

    // Inactive contact carries no force.
    assert_eq!(sim.contact(1).f.norm(), 0.0);
}

// ---------------------------------------------------------------------------
// Scenario 6: joint friction decay matches the exponential law.
// ---------------------------------------------------------------------------

#[test]
fn joint_friction_decay() {
    // Rotor with I = m r^2 = 1 about the hinge; gravity has no moment.
    let model = Model::rotor(1.0, 1.0);
    let mut sim = EulerSimulator::new(model, SimulatorConfig::new(1e-3, 1)).unwrap();
    sim.set_joint_friction(DVector::from_row_slice(&[0.5])).unwrap();

    let q0 = DVector::zeros(1);
    let v0 = DVector::from_row_slice(&[2.0]);
    sim.reset_state(&q0, &v0, true).unwrap();

    let tau = DVector::zeros(1);
    for _ in 0..1000 {
        sim.step(&tau).unwrap();
    }

    // v(t) = v0 exp(-b t / I) with b = 0.5, I = 1, t = 1.
    let expected = 2.0 * (-0.5_f64).exp();
    assert_relative_eq!(sim.v()[0], expected, epsilon = 2e-3);
}

// ---------------------------------------------------------------------------
// Exponential mode reproduces the analytic LTI trajectory.
// ---------------------------------------------------------------------------

#[test]
fn exponential_matches_analytic_spring_damper() {
    let (m, kn, bn) = (1.0, 1e4, 10.0);
    let model = Model::point_mass_z(m);
    let mut sim = ExponentialSimulator::new(model, SimulatorConfig::new(1e-3, 1)).unwrap();
    // Bilateral + infinite friction: the cone never engages and the system
    // stays exactly linear while penetrating.
    sim.add_contact_point("tip", 0, false);
    sim.add_object(ground(kn, bn, f64::INFINITY));

    // Rest offset is -m g / kn; start deeper so the oscillation never
    // leaves the surface.
    let z_eq = -m * G / kn;
    let z0 = 1.5 * z_eq;
    let q0 = DVector::from_row_slice(&[z0]);
    let v0 = DVector::zeros(1);
    sim.reset_state(&q0, &v0, true).unwrap();
    assert_eq!(sim.nactive(), 1);

    let tau = DVector::zeros(1);
    let steps = 50;
    for _ in 0..steps {
        sim.step(&tau).unwrap();
    }

    // Analytic damped oscillator about z_eq: anchor at 0, spring kn,
    // damper bn, constant load -m g.
    let t = 1e-3 * f64::from(steps);
    let a = bn / (2.0 * m);
    let wd = (kn / m - a * a).sqrt();
    let c1 = z0 - z_eq;
    let c2 = a * c1 / wd;
    let decay = (-a * t).exp();
    let z_ref = z_eq + decay * (c1 * (wd * t).cos() + c2 * (wd * t).sin());
    let v_ref = decay
        * ((-a * c1 + wd * c2) * (wd * t).cos() + (-a * c2 - wd * c1) * (wd * t).sin());

    assert!(sim.contact(0).active, "contact must stay active");
    assert_relative_eq!(sim.q()[0], z_ref, epsilon = 1e-10);
    assert_relative_eq!(sim.v()[0], v_ref, epsilon = 1e-8);
}

// ---------------------------------------------------------------------------
// Round-trips, invariants, energy, errors.
// ---------------------------------------------------------------------------

#[test]
fn reset_state_roundtrip() {
    let model = Model::point_mass_3d(1.0);
    let mut sim = ExponentialSimulator::new(model, SimulatorConfig::default()).unwrap();
    sim.add_contact_point("tip", 0, true);
    sim.add_object(ground(1e4, 10.0, 0.5));

    let q = DVector::from_row_slice(&[0.1, -0.2, 0.3]);
    let v = DVector::from_row_slice(&[1.0, 0.0, -1.0]);
    sim.reset_state(&q, &v, true).unwrap();
    assert!((sim.q() - &q).norm() < 1e-15);
    assert!((sim.v() - &v).norm() < 1e-15);
}

#[test]
fn unilateral_contact_above_plane_deactivates() {
    let model = Model::point_mass_z(1.0);
    let mut sim = ExponentialSimulator::new(model, SimulatorConfig::default()).unwrap();
    sim.add_contact_point("tip", 0, true);
    sim.add_object(ground(1e4, 10.0, 0.5));

    // Penetrating: active.
    let q = DVector::from_row_slice(&[-1e-4]);
    let v = DVector::zeros(1);
    sim.reset_state(&q, &v, true).unwrap();
    assert_eq!(sim.nactive(), 1);

    // Above the plane: inactive, no force.
    let q = DVector::from_row_slice(&[0.05]);
    sim.reset_state(&q, &v, false).unwrap();
    assert_eq!(sim.nactive(), 0);
    assert!(!sim.contact(0).active);
    assert_eq!(sim.contact(0).f.norm(), 0.0);
}

#[test]
fn euler_kinetic_energy_drift_bounded_without_gravity() {
    let mut model = Model::n_link_pendulum(2, 1.0, 1.0);
    model.gravity = Vector3::zeros();
    let mut sim = EulerSimulator::new(model, SimulatorConfig::new(1e-3, 1)).unwrap();

    let q0 = DVector::from_row_slice(&[0.3, -0.4]);
    let v0 = DVector::from_row_slice(&[1.0, 0.5]);
    sim.reset_state(&q0, &v0, true).unwrap();

    let e0 = sim.kinetic_energy();
    let tau = DVector::zeros(2);
    for _ in 0..1000 {
        sim.step(&tau).unwrap();
    }
    let e1 = sim.kinetic_energy();

    let drift = (e1 - e0).abs() / e0;
    assert!(drift < 0.01, "energy drift {:.3}% exceeds 1%", drift * 100.0);
}

#[test]
fn step_before_reset_fails() {
    let model = Model::point_mass_z(1.0);
    let mut sim = ExponentialSimulator::new(model, SimulatorConfig::default()).unwrap();
    let tau = DVector::zeros(1);
    assert_eq!(sim.step(&tau), Err(SimError::NotReset));

    let model = Model::point_mass_z(1.0);
    let mut euler = EulerSimulator::new(model, SimulatorConfig::default()).unwrap();
    assert_eq!(euler.step(&tau), Err(SimError::NotReset));
}

#[test]
fn dimension_mismatches_reported() {
    let model = Model::point_mass_3d(1.0);
    let mut sim = ExponentialSimulator::new(model, SimulatorConfig::default()).unwrap();

    let q_bad = DVector::zeros(2);
    let v = DVector::zeros(3);
    assert!(matches!(
        sim.reset_state(&q_bad, &v, true),
        Err(SimError::DimensionMismatch { what: "q", .. })
    ));

    let q = DVector::zeros(3);
    let v_bad = DVector::zeros(5);
    assert!(matches!(
        sim.reset_state(&q, &v_bad, true),
        Err(SimError::DimensionMismatch { what: "v", .. })
    ));

    sim.reset_state(&q, &v, true).unwrap();
    let tau_bad = DVector::zeros(1);
    assert!(matches!(
        sim.step(&tau_bad),
        Err(SimError::DimensionMismatch { what: "tau", .. })
    ));

    assert!(sim.set_joint_friction(DVector::zeros(7)).is_err());
}

#[test]
fn unbuilt_backends_are_not_silently_skipped() {
    let model = Model::point_mass_z(1.0);
    let mut cfg = SimulatorConfig::default();
    cfg.sparse_system = true;
    let mut sim = ExponentialSimulator::new(model, cfg).unwrap();
    let q = DVector::zeros(1);
    let v = DVector::zeros(1);
    sim.reset_state(&q, &v, true).unwrap();
    assert!(matches!(
        sim.step(&DVector::zeros(1)),
        Err(SimError::NotImplemented { .. })
    ));

    let model = Model::point_mass_z(1.0);
    let mut cfg = SimulatorConfig::default();
    cfg.invertible_system = true;
    let mut sim = ExponentialSimulator::new(model, cfg).unwrap();
    sim.reset_state(&q, &v, true).unwrap();
    assert!(matches!(
        sim.step(&DVector::zeros(1)),
        Err(SimError::NotImplemented { .. })
    ));
}

#[test]
fn anchor_slip_update_limits_tangential_deflection() {
    let mu = 0.3;
    let model = Model::point_mass_3d(1.0);
    let cfg = SimulatorConfig::new(1e-3, 1).with_anchor_update();
    let mut sim = ExponentialSimulator::new(model, cfg).unwrap();
    sim.add_contact_point("tip", 0, true);
    // Light tangential damping so the sliding force is spring-dominated.
    sim.add_object(Box::new(HalfSpace::ground(
        ContactParams::default()
            .with_normal_stiffness(1e4)
            .with_tangential_stiffness(1e4)
            .with_normal_damping(100.0)
            .with_tangential_damping(1.0)
            .with_friction(mu),
    )));

    let q0 = DVector::zeros(3);
    let v0 = DVector::zeros(3);
    sim.reset_state(&q0, &v0, true).unwrap();

    let tau = DVector::from_row_slice(&[5.0, 0.0, 0.0]);
    for _ in 0..1000 {
        sim.step(&tau).unwrap();
    }

    // With slipping anchors the spring never winds up: the anchor trails
    // the contact point so the tangential deflection stays bounded.
    let cp = sim.contact(0);
    let d = cp.x - cp.x_start;
    let lag = (d.x * d.x + d.y * d.y).sqrt();
    assert!(
        lag < 5e-3,
        "anchor should trail the sliding point, lag = {lag}"
    );
    assert!(sim.cone_violation());
}
