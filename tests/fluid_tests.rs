use glam::DVec2;
use pbd2d::fluids::{poly6_kernel, spiky_gradient};
use pbd2d::particle::{Particle, Phase};
use pbd2d::simulation::{Bounds, Simulation};
use pbd2d::{SimConfig, PARTICLE_DIAM};
use std::f64::consts::PI;

#[test]
fn test_poly6_kernel_peak_at_zero_distance() {
    let h = 3.0_f64;
    let result = poly6_kernel(0.0, h);
    // 4/(PI h^8) * h^6 = 4/(PI h^2)
    let peak = 4.0 / (PI * h * h);
    assert!(
        (result - peak).abs() < peak * 1e-12,
        "poly6(0, {h}) = {result}, expected {peak}"
    );
}

#[test]
fn test_poly6_kernel_vanishes_at_boundary() {
    let h = 3.0_f64;
    assert_eq!(poly6_kernel(h, h), 0.0, "poly6(h, h) should be 0.0");
    assert_eq!(poly6_kernel(h + 0.1, h), 0.0, "poly6 beyond h should be 0.0");
}

#[test]
fn test_poly6_kernel_monotonic_inside_support() {
    let h = 3.0_f64;
    let near = poly6_kernel(0.5, h);
    let far = poly6_kernel(2.5, h);
    assert!(near > far && far > 0.0, "poly6 should decay with distance");
}

#[test]
fn test_poly6_integrates_to_one() {
    // Radial quadrature of W over the disc of radius h; the kernel is
    // normalized, so particle density ~ number density.
    let h = 3.0_f64;
    let steps = 20_000;
    let dr = h / steps as f64;
    let mut integral = 0.0;
    for k in 0..steps {
        let r = (k as f64 + 0.5) * dr;
        integral += poly6_kernel(r, h) * 2.0 * PI * r * dr;
    }
    assert!(
        (integral - 1.0).abs() < 1e-3,
        "2D poly6 should integrate to 1 over its support, got {integral}"
    );
}

#[test]
fn test_spiky_gradient_zero_for_degenerate_distance() {
    let r = DVec2::new(1e-9, 0.0);
    assert_eq!(
        spiky_gradient(r, r.length(), 3.0),
        DVec2::ZERO,
        "near-zero separation must yield a zero gradient"
    );
}

#[test]
fn test_spiky_gradient_vanishes_at_boundary() {
    let h = 3.0_f64;
    let r = DVec2::new(h, 0.0);
    assert_eq!(spiky_gradient(r, h, h), DVec2::ZERO);
}

#[test]
fn test_spiky_gradient_points_toward_neighbor() {
    let h = 3.0_f64;
    let r = DVec2::new(1.0, 0.0);
    let grad = spiky_gradient(r, r.length(), h);
    // Negative coefficient: the gradient points from the particle toward
    // the neighbor it is measured against.
    assert!(grad.x < 0.0, "gradient x should be negative, got {}", grad.x);
    assert!(grad.y.abs() < 1e-12, "gradient y should be 0, got {}", grad.y);
}

// ---------------------------------------------------------------------------
// Density constraint behavior
// ---------------------------------------------------------------------------

fn fluid_block(sim: &mut Simulation, cols: usize, rows: usize, spacing: f64, origin: DVec2) {
    let mut verts = Vec::new();
    for i in 0..cols {
        for j in 0..rows {
            verts.push(Particle::new(
                origin + DVec2::new(i as f64 * spacing, j as f64 * spacing),
                1.0,
                Phase::Fluid,
            ));
        }
    }
    sim.create_fluid(verts, 2.0).expect("fluid construction");
}

/// Measured particle-number density at a fluid particle.
fn density_at(sim: &Simulation, i: usize, h: f64) -> f64 {
    let pos = sim.particles()[i].pos;
    sim.particles()
        .iter()
        .filter(|p| p.phase == Phase::Fluid)
        .map(|p| poly6_kernel((pos - p.pos).length(), h))
        .sum()
}

#[test]
fn test_overdense_cluster_expands() {
    let mut sim = Simulation::new(SimConfig::default());
    sim.set_bounds(Bounds::new(-50.0, 50.0, -50.0, 50.0));
    sim.set_gravity(DVec2::ZERO);

    // Much tighter than the rest spacing for rho_0 = 2.
    fluid_block(&mut sim, 5, 5, 0.3, DVec2::new(-0.6, -0.6));

    let spread_before: f64 = sim
        .particles()
        .iter()
        .map(|p| p.pos.length_squared())
        .sum::<f64>();
    for _ in 0..30 {
        sim.tick(1.0 / 60.0);
    }
    let spread_after: f64 = sim
        .particles()
        .iter()
        .map(|p| p.pos.length_squared())
        .sum::<f64>();

    assert!(
        spread_after > spread_before * 1.5,
        "overdense fluid should expand: spread {spread_before} -> {spread_after}"
    );
}

#[test]
fn test_fluid_rest_density_in_interior() {
    let mut sim = Simulation::new(SimConfig::default());
    sim.set_bounds(Bounds::new(-2.8, 2.8, -2.8, 20.0));

    // 8x8 block at the rest spacing of rho_0 = 2.
    fluid_block(&mut sim, 8, 8, 0.7, DVec2::new(-2.45, -2.45));
    assert_eq!(sim.num_particles(), 64);

    for _ in 0..300 {
        sim.tick(1.0 / 60.0);
    }

    let h = PARTICLE_DIAM * sim.config().smoothing_ratio;
    let centroid: DVec2 = sim
        .particles()
        .iter()
        .map(|p| p.pos)
        .sum::<DVec2>()
        / sim.num_particles() as f64;

    // Interior: particles near the centroid, away from the free surface.
    let mut interior = Vec::new();
    for i in 0..sim.num_particles() {
        if (sim.particles()[i].pos - centroid).length() < 1.2 {
            interior.push(density_at(&sim, i, h));
        }
    }
    assert!(!interior.is_empty(), "no interior particles found");

    let mean: f64 = interior.iter().sum::<f64>() / interior.len() as f64;
    let ratio = mean / 2.0;
    assert!(
        (0.9..=1.1).contains(&ratio),
        "interior density should sit within 10% of rest density, ratio {ratio}"
    );
}

#[test]
fn test_fluid_stays_in_bounds_and_finite() {
    let mut sim = Simulation::new(SimConfig::default());
    sim.set_bounds(Bounds::new(-2.8, 2.8, -2.8, 20.0));
    fluid_block(&mut sim, 8, 8, 0.7, DVec2::new(-2.45, -2.45));

    for _ in 0..120 {
        sim.tick(1.0 / 60.0);
    }

    // The density pass runs after the boundary projections within each
    // iteration, so settled fluid can carry a small residual penetration.
    let b = sim.boundaries();
    let tol = 0.05;
    for (i, p) in sim.particles().iter().enumerate() {
        assert!(
            p.pos.x.is_finite() && p.pos.y.is_finite(),
            "particle {i} position is not finite"
        );
        assert!(
            p.pos.x >= b.x_min - tol && p.pos.x <= b.x_max + tol,
            "particle {i} escaped in x: {}",
            p.pos.x
        );
        assert!(
            p.pos.y >= b.y_min - tol,
            "particle {i} fell through the floor: {}",
            p.pos.y
        );
    }
}

#[test]
fn test_isolated_gas_particle_feels_scaled_gravity() {
    let mut sim = Simulation::new(SimConfig::default());
    sim.set_bounds(Bounds::new(-50.0, 50.0, -50.0, 50.0));
    sim.create_gas(
        vec![Particle::new(DVec2::ZERO, 1.0, Phase::Gas)],
        0.75,
    )
    .expect("gas construction");

    let dt = 1.0 / 60.0;
    sim.tick(dt);

    // A lone member has no in-range neighbor gradients: its velocity is
    // pure scaled gravity.
    let expected = -9.8 * sim.config().alpha * dt;
    let v = sim.particles()[0].vel.y;
    assert!(
        (v - expected).abs() < 1e-12,
        "gas velocity {v}, expected {expected}"
    );
    assert_eq!(sim.particles()[0].phase, Phase::Gas);
}
