use glam::{DVec2, IVec2};
use log::trace;
use rand::{rngs::StdRng, SeedableRng};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::body::Body;
use crate::config::{SimConfig, SolverMode, EPSILON, PARTICLE_DIAM, PARTICLE_RAD};
use crate::constraints::{
    Axis, BoundaryConstraint, Constraint, ConstraintGroup, ContactConstraint,
    RigidContactConstraint,
};
use crate::grid::UniformGrid;
use crate::particle::{Particle, Phase};
use crate::solver::MatrixSolver;

/// Impulse magnitude applied by [`Simulation::mouse_pressed`].
const MOUSE_IMPULSE: f64 = 7.0;

/// Hash-table size for the optional discovery grid.
const GRID_TABLE_SIZE: usize = 4096;

/// Rectangular simulation domain.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Bounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Bounds {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new(-20.0, 20.0, 0.0, 1e6)
    }
}

pub(crate) type GroupMap = [Vec<Constraint>; ConstraintGroup::COUNT];

/// The unified particle simulation.
///
/// Owns the particle and body arrays; constraints hold indices into them,
/// never pointers, so the arrays may reallocate as scenes grow. Persistent
/// (standard and shape) constraints survive across ticks; contact and
/// stabilization constraints are rebuilt from scratch every tick and
/// dropped with the per-tick group map on every exit path.
pub struct Simulation {
    pub(crate) config: SimConfig,
    pub(crate) particles: Vec<Particle>,
    pub(crate) bodies: Vec<Body>,
    /// Persistent constraints by group, iterated in index order so runs are
    /// deterministic.
    pub(crate) globals: GroupMap,
    pub(crate) bounds: Bounds,
    pub(crate) gravity: DVec2,
    standard_solver: MatrixSolver,
    contact_solver: MatrixSolver,
    grid: UniformGrid,
    pub(crate) rng: StdRng,
    viewport: IVec2,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Self {
        Self::with_seed(config, 0)
    }

    /// Seeded construction: the RNG feeds fluid group tags and scene
    /// jitter, so equal seeds give bit-identical runs.
    pub fn with_seed(config: SimConfig, seed: u64) -> Self {
        Self {
            config,
            particles: Vec::new(),
            bodies: Vec::new(),
            globals: std::array::from_fn(|_| Vec::new()),
            bounds: Bounds::default(),
            gravity: DVec2::new(0.0, -9.8),
            standard_solver: MatrixSolver::new(),
            contact_solver: MatrixSolver::new(),
            grid: UniformGrid::new(PARTICLE_DIAM, GRID_TABLE_SIZE),
            rng: StdRng::seed_from_u64(seed),
            viewport: IVec2::ZERO,
        }
    }

    /// Remove every particle, body and persistent constraint.
    pub fn clear(&mut self) {
        self.particles.clear();
        self.bodies.clear();
        for group in &mut self.globals {
            group.clear();
        }
    }

    // ------------------------------------------------------------------
    // The tick pipeline
    // ------------------------------------------------------------------

    /// Advance the simulation by `dt` seconds (`dt > 0`).
    pub fn tick(&mut self, dt: f64) {
        assert!(dt > 0.0, "tick requires a positive dt, got {dt}");

        // (1) Gather persistent constraints into the per-tick group map.
        let mut groups = self.gather();

        // (2) Apply forces, predict positions, refresh mass scales.
        self.integrate(dt);

        // (3) Discover contacts and boundary crossings.
        self.discover_contacts(&mut groups);
        trace!(
            "tick: {} contact, {} stabilization constraints",
            groups[ConstraintGroup::Contact.index()].len(),
            groups[ConstraintGroup::Stabilization.index()].len(),
        );

        if self.config.solver_mode == SolverMode::Batched {
            self.contact_solver.setup_m(&self.particles, true);
            self.standard_solver.setup_m(&self.particles, false);
        }

        // (4) Pre-simulation penetration removal.
        if self.config.use_stabilization {
            self.stabilization_pass(&mut groups);
        }

        // (5) Main solver pass.
        self.main_pass(&mut groups);

        // (6) Recover velocities and commit positions.
        self.recover_velocities(dt);

        // (7) Ephemeral contact and stabilization constraints die with the
        // group map here; shape and standard constraints persist.
    }

    fn gather(&self) -> GroupMap {
        let mut groups: GroupMap = std::array::from_fn(|_| Vec::new());
        for (bi, body) in self.bodies.iter().enumerate() {
            match &body.shape {
                Constraint::Shape(_) => {
                    groups[ConstraintGroup::Shape.index()].push(body.shape.clone());
                }
                other => panic!("body {bi} shape slot holds a non-shape constraint: {other:?}"),
            }
        }
        for g in 0..ConstraintGroup::COUNT {
            groups[g].extend(self.globals[g].iter().cloned());
        }
        groups
    }

    fn integrate(&mut self, dt: f64) {
        let gravity = self.gravity;
        let alpha = self.config.alpha;
        let k = self.config.mass_scale_k;
        let step = move |p: &mut Particle| {
            if p.inv_mass == 0.0 {
                p.predicted = p.pos;
                return;
            }
            let g_eff = if p.phase == Phase::Gas {
                gravity * alpha
            } else {
                gravity
            };
            p.vel += dt * g_eff;
            p.predicted = p.guess(dt);
            p.scale_mass(k);
        };

        #[cfg(feature = "parallel")]
        self.particles.par_iter_mut().for_each(step);
        #[cfg(not(feature = "parallel"))]
        self.particles.iter_mut().for_each(step);
    }

    /// True when the pair can collide and currently overlaps.
    fn pair_overlaps(&self, i: usize, j: usize) -> bool {
        let p_i = &self.particles[i];
        let p_j = &self.particles[j];
        // Two immovables can never be separated.
        if p_i.inv_mass == 0.0 && p_j.inv_mass == 0.0 {
            return false;
        }
        // Members of the same rigid body are held together by its shape
        // constraint, not by contacts.
        if p_i.phase.is_solid() && p_j.phase.is_solid() && p_i.body == p_j.body && p_i.body != -1 {
            return false;
        }
        p_i.predicted.distance(p_j.predicted) < PARTICLE_DIAM - EPSILON
    }

    /// All overlapping pairs `(i, j)` with `i < j`, in scan order. The grid
    /// path collects and sorts candidates per particle so it yields exactly
    /// the pairs of the naive scan.
    fn overlapping_pairs(&mut self) -> Vec<(usize, usize)> {
        let n = self.particles.len();
        let mut pairs = Vec::new();
        if self.config.use_grid {
            let positions: Vec<DVec2> = self.particles.iter().map(|p| p.predicted).collect();
            self.grid.build(&positions);
            let mut candidates: Vec<usize> = Vec::new();
            for i in 0..n {
                candidates.clear();
                self.grid.query_neighbors(positions[i], |j| {
                    let j = j as usize;
                    if j > i {
                        candidates.push(j);
                    }
                });
                candidates.sort_unstable();
                candidates.dedup();
                for &j in &candidates {
                    if self.pair_overlaps(i, j) {
                        pairs.push((i, j));
                    }
                }
            }
        } else {
            for i in 0..n {
                for j in (i + 1)..n {
                    if self.pair_overlaps(i, j) {
                        pairs.push((i, j));
                    }
                }
            }
        }
        pairs
    }

    fn discover_contacts(&mut self, groups: &mut GroupMap) {
        let stab = self.config.use_stabilization;

        for (i, j) in self.overlapping_pairs() {
            let solid_i = self.particles[i].phase.is_solid();
            let solid_j = self.particles[j].phase.is_solid();
            if solid_i && solid_j {
                // Solid-solid contacts carry friction and SDF normals.
                groups[ConstraintGroup::Contact.index()]
                    .push(Constraint::RigidContact(RigidContactConstraint::new(i, j, false)));
                if stab {
                    groups[ConstraintGroup::Stabilization.index()]
                        .push(Constraint::RigidContact(RigidContactConstraint::new(i, j, true)));
                }
            } else if solid_i || solid_j {
                groups[ConstraintGroup::Contact.index()]
                    .push(Constraint::Contact(ContactConstraint::new(i, j)));
            }
            // Fluid/gas pairs are handled by their density constraints.
        }

        let bounds = self.bounds;
        for i in 0..self.particles.len() {
            let ep = self.particles[i].predicted;
            if ep.x < bounds.x_min + PARTICLE_RAD {
                push_boundary(groups, stab, i, bounds.x_min, Axis::X, true);
            } else if ep.x > bounds.x_max - PARTICLE_RAD {
                push_boundary(groups, stab, i, bounds.x_max, Axis::X, false);
            }
            if ep.y < bounds.y_min + PARTICLE_RAD {
                push_boundary(groups, stab, i, bounds.y_min, Axis::Y, true);
            } else if ep.y > bounds.y_max - PARTICLE_RAD {
                push_boundary(groups, stab, i, bounds.y_max, Axis::Y, false);
            }
        }
    }

    fn stabilization_pass(&mut self, groups: &mut GroupMap) {
        let stab = ConstraintGroup::Stabilization.index();
        match self.config.solver_mode {
            SolverMode::Iterative => {
                for _ in 0..self.config.stabilization_iterations {
                    for c in groups[stab].iter_mut() {
                        c.project(&mut self.particles, &mut self.bodies);
                    }
                }
            }
            SolverMode::Batched => {
                self.contact_solver
                    .setup_sizes(self.particles.len(), &groups[stab]);
                for _ in 0..self.config.stabilization_iterations {
                    if groups[stab].is_empty() {
                        break;
                    }
                    self.contact_solver.solve_and_update(
                        &mut self.particles,
                        &self.bodies,
                        &mut groups[stab],
                        true,
                    );
                }
            }
        }
    }

    fn main_pass(&mut self, groups: &mut GroupMap) {
        match self.config.solver_mode {
            SolverMode::Iterative => {
                for _ in 0..self.config.solver_iterations {
                    for g in ConstraintGroup::SOLVE_ORDER {
                        for c in groups[g.index()].iter_mut() {
                            c.project(&mut self.particles, &mut self.bodies);
                        }
                    }
                }
            }
            SolverMode::Batched => {
                let contact = ConstraintGroup::Contact.index();
                let standard = ConstraintGroup::Standard.index();
                let n = self.particles.len();
                self.contact_solver.setup_sizes(n, &groups[contact]);
                self.standard_solver.setup_sizes(n, &groups[standard]);

                for _ in 0..self.config.solver_iterations {
                    if !groups[contact].is_empty() {
                        self.contact_solver.solve_and_update(
                            &mut self.particles,
                            &self.bodies,
                            &mut groups[contact],
                            false,
                        );
                        // The batch handles the normal rows; Coulomb
                        // friction is projected as a post-pass.
                        for c in groups[contact].iter_mut() {
                            if let Constraint::RigidContact(rc) = c {
                                rc.project_friction(&mut self.particles, &self.bodies);
                            }
                        }
                    }
                    if !groups[standard].is_empty() {
                        self.standard_solver.solve_and_update(
                            &mut self.particles,
                            &self.bodies,
                            &mut groups[standard],
                            false,
                        );
                    }
                    for c in groups[ConstraintGroup::Shape.index()].iter_mut() {
                        c.project(&mut self.particles, &mut self.bodies);
                    }
                }
            }
        }
    }

    fn recover_velocities(&mut self, dt: f64) {
        let inv_dt = 1.0 / dt;
        let sleep_eps = self.config.sleep_eps;
        let step = move |p: &mut Particle| {
            if p.inv_mass == 0.0 {
                p.vel = DVec2::ZERO;
                return;
            }
            p.vel = (p.predicted - p.pos) * inv_dt;
            p.confirm_guess(sleep_eps);
        };

        #[cfg(feature = "parallel")]
        self.particles.par_iter_mut().for_each(step);
        #[cfg(not(feature = "parallel"))]
        self.particles.iter_mut().for_each(step);
    }

    // ------------------------------------------------------------------
    // Inbound interface
    // ------------------------------------------------------------------

    /// Kick every movable particle radially away from `point`.
    pub fn mouse_pressed(&mut self, point: DVec2) {
        for p in &mut self.particles {
            if p.inv_mass == 0.0 {
                continue;
            }
            let dir = p.pos - point;
            let len = dir.length();
            if len < EPSILON {
                continue;
            }
            p.vel += (MOUSE_IMPULSE / len) * dir;
        }
    }

    /// Record the viewport size. Does not affect the physical domain.
    pub fn resize(&mut self, dim: IVec2) {
        self.viewport = dim;
    }

    // ------------------------------------------------------------------
    // State access
    // ------------------------------------------------------------------

    pub fn add_particle(&mut self, particle: Particle) -> usize {
        self.particles.push(particle);
        self.particles.len() - 1
    }

    /// Append a persistent constraint to its native group.
    pub fn add_global(&mut self, constraint: Constraint) {
        let group = constraint.group();
        self.globals[group.index()].push(constraint);
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn bodies_mut(&mut self) -> &mut [Body] {
        &mut self.bodies
    }

    /// Persistent constraints, for renderers that draw them.
    pub fn globals(&self) -> impl Iterator<Item = &Constraint> {
        self.globals.iter().flatten()
    }

    pub fn boundaries(&self) -> Bounds {
        self.bounds
    }

    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
    }

    pub fn gravity(&self) -> DVec2 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: DVec2) {
        self.gravity = gravity;
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn viewport(&self) -> IVec2 {
        self.viewport
    }

    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    /// Total kinetic energy of the movable particles.
    pub fn kinetic_energy(&self) -> f64 {
        self.particles
            .iter()
            .filter(|p| p.inv_mass != 0.0)
            .map(|p| 0.5 * p.vel.length_squared() / p.inv_mass)
            .sum()
    }
}

fn push_boundary(
    groups: &mut GroupMap,
    stabilization: bool,
    index: usize,
    plane: f64,
    axis: Axis,
    is_min: bool,
) {
    groups[ConstraintGroup::Contact.index()].push(Constraint::Boundary(BoundaryConstraint::new(
        index, plane, axis, is_min, false,
    )));
    if stabilization {
        groups[ConstraintGroup::Stabilization.index()].push(Constraint::Boundary(
            BoundaryConstraint::new(index, plane, axis, is_min, true),
        ));
    }
}
