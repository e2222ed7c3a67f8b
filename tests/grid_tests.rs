use glam::DVec2;
use pbd2d::grid::UniformGrid;
use pbd2d::particle::{Particle, Phase};
use pbd2d::simulation::{Bounds, Simulation};
use pbd2d::{SimConfig, PARTICLE_DIAM};

#[test]
fn test_grid_finds_neighbors_in_adjacent_cells() {
    let mut grid = UniformGrid::new(PARTICLE_DIAM, 1024);
    let positions = vec![
        DVec2::new(0.1, 0.1),
        DVec2::new(0.9, 0.1), // next cell over, still a neighbor cell
        DVec2::new(7.0, 7.0), // far away
    ];
    grid.build(&positions);

    let mut found = Vec::new();
    grid.query_neighbors(positions[0], |j| found.push(j));
    found.sort_unstable();
    found.dedup();

    assert!(found.contains(&0), "query must include the home cell");
    assert!(found.contains(&1), "query must include adjacent cells");
    assert!(!found.contains(&2), "distant particles are not candidates");
}

#[test]
fn test_grid_rebuild_tracks_moving_particles() {
    let mut grid = UniformGrid::new(PARTICLE_DIAM, 1024);
    let mut positions = vec![DVec2::new(0.0, 0.0), DVec2::new(10.0, 10.0)];
    grid.build(&positions);

    let mut found = Vec::new();
    grid.query_neighbors(positions[0], |j| found.push(j));
    assert!(!found.contains(&1));

    positions[1] = DVec2::new(0.5, 0.5);
    grid.build(&positions);
    found.clear();
    grid.query_neighbors(positions[0], |j| found.push(j));
    assert!(found.contains(&1), "rebuild must pick up the new position");
}

/// The grid is a drop-in for the naive O(N^2) scan: one tick from the same
/// initial state must produce bit-identical results.
#[test]
fn test_grid_discovery_matches_naive_scan() {
    let run = |use_grid: bool| {
        let config = SimConfig {
            use_grid,
            ..SimConfig::default()
        };
        let mut sim = Simulation::new(config);
        sim.set_bounds(Bounds::new(-12.0, 12.0, 0.0, 100.0));

        // Deterministic, irregular cluster with plenty of overlaps.
        for k in 0..60 {
            let x = -6.0 + (k % 10) as f64 * 1.3 + (k as f64 * 0.37).sin() * 0.4;
            let y = 0.6 + (k / 10) as f64 * 0.9 + (k as f64 * 0.61).cos() * 0.3;
            let mut p = Particle::new(DVec2::new(x, y), 1.0, Phase::Granular);
            p.s_friction = 0.2;
            p.k_friction = 0.05;
            sim.add_particle(p);
        }

        for _ in 0..10 {
            sim.tick(1.0 / 60.0);
        }
        sim.particles()
            .iter()
            .map(|p| (p.pos.x, p.pos.y, p.vel.x, p.vel.y))
            .collect::<Vec<_>>()
    };

    assert_eq!(
        run(false),
        run(true),
        "grid discovery must generate the exact constraint set of the naive scan"
    );
}
