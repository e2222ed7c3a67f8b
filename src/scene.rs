use glam::DVec2;
use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::body::{Body, SdfData};
use crate::config::{PARTICLE_DIAM, PARTICLE_RAD};
use crate::constraints::{Constraint, DistanceConstraint, FluidConstraint, GasConstraint, ShapeConstraint};
use crate::particle::{Particle, Phase};
use crate::simulation::{Bounds, Simulation};

/// Demo scene tags accepted by [`Simulation::init`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Scene {
    Friction,
    Granular,
    Stacks,
    Wall,
    Pendulum,
    Fluid,
    FluidSolid,
    Gas,
}

/// Construction failures. These are programmer errors: the simulation is
/// left in a defined state, but the failed group was not added.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("rigid bodies must contain at least 2 particles, got {0}")]
    TooFewParticles(usize),
    #[error("a rigid body cannot contain a particle of infinite mass")]
    InfiniteMassInBody,
    #[error("a fluid or gas cannot contain a particle of infinite mass")]
    InfiniteMassInFluid,
    #[error("SDF table holds {sdf} entries for {particles} particles")]
    SdfLengthMismatch { sdf: usize, particles: usize },
}

impl Simulation {
    // ------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------

    /// Append a rigid body built from `verts`. Every particle becomes a
    /// solid member of a fresh body id; the body's shape constraint is
    /// created and attached here. Returns the body index.
    pub fn create_rigid_body(
        &mut self,
        verts: Vec<Particle>,
        sdf_data: Vec<SdfData>,
    ) -> Result<usize, SceneError> {
        if verts.len() < 2 {
            return Err(SceneError::TooFewParticles(verts.len()));
        }
        if verts.len() != sdf_data.len() {
            return Err(SceneError::SdfLengthMismatch {
                sdf: sdf_data.len(),
                particles: verts.len(),
            });
        }
        if verts.iter().any(|p| p.inv_mass == 0.0) {
            return Err(SceneError::InfiniteMassInBody);
        }

        let body_idx = self.bodies.len();
        let offset = self.particles.len();
        let mut total_mass = 0.0;
        let mut indices = Vec::with_capacity(verts.len());
        for (k, mut p) in verts.into_iter().enumerate() {
            p.body = body_idx as i32;
            p.phase = Phase::Solid;
            total_mass += 1.0 / p.inv_mass;
            indices.push(offset + k);
            self.particles.push(p);
        }

        let mut body = Body {
            particles: indices,
            sdf: sdf_data,
            com: DVec2::ZERO,
            rs: Vec::new(),
            inv_mass: 1.0 / total_mass,
            angle: 0.0,
            shape: Constraint::Shape(ShapeConstraint::new(body_idx)),
        };
        body.update_com(&self.particles, false);
        body.compute_rs(&self.particles);

        info!(
            "created rigid body {body_idx} with {} particles",
            body.particles.len()
        );
        self.bodies.push(body);
        Ok(body_idx)
    }

    /// Append a fluid group with the given rest density.
    pub fn create_fluid(&mut self, verts: Vec<Particle>, density: f64) -> Result<(), SceneError> {
        self.create_density_group(verts, density, false)
    }

    /// Append a gas group: the same density machinery with a lower rest
    /// density, and gravity scaled by `alpha` during integration.
    pub fn create_gas(&mut self, verts: Vec<Particle>, density: f64) -> Result<(), SceneError> {
        self.create_density_group(verts, density, true)
    }

    fn create_density_group(
        &mut self,
        verts: Vec<Particle>,
        density: f64,
        gas: bool,
    ) -> Result<(), SceneError> {
        if verts.iter().any(|p| p.inv_mass == 0.0) {
            return Err(SceneError::InfiniteMassInFluid);
        }

        // Opaque group tag; uniqueness is not required, collisions only
        // conflate groups for rendering.
        let tag = (self.rng.gen::<f64>() * 100.0) as i32;
        let offset = self.particles.len();
        let mut indices = Vec::with_capacity(verts.len());
        for (k, mut p) in verts.into_iter().enumerate() {
            p.phase = if gas { Phase::Gas } else { Phase::Fluid };
            p.body = tag;
            indices.push(offset + k);
            self.particles.push(p);
        }

        let h = PARTICLE_DIAM * self.config.smoothing_ratio;
        let count = indices.len();
        let constraint = if gas {
            Constraint::Gas(GasConstraint::new(density, indices, h))
        } else {
            Constraint::Fluid(FluidConstraint::new(density, indices, h))
        };
        info!(
            "created {} group of {count} particles, rest density {density}",
            if gas { "gas" } else { "fluid" },
        );
        self.add_global(constraint);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Presets
    // ------------------------------------------------------------------

    /// Rebuild the simulation as one of the demo scenes.
    pub fn init(&mut self, scene: Scene) -> Result<(), SceneError> {
        self.clear();
        self.gravity = DVec2::new(0.0, -9.8);

        match scene {
            Scene::Friction => self.init_friction()?,
            Scene::Granular => self.init_granular(),
            Scene::Stacks => self.init_stacks()?,
            Scene::Wall => self.init_wall()?,
            Scene::Pendulum => self.init_pendulum()?,
            Scene::Fluid => self.init_fluid()?,
            Scene::FluidSolid => self.init_fluid_solid()?,
            Scene::Gas => self.init_gas()?,
        }

        info!(
            "initialized scene {scene:?}: {} particles, {} bodies",
            self.particles.len(),
            self.bodies.len()
        );
        Ok(())
    }

    /// Single box sliding along the floor.
    fn init_friction(&mut self) -> Result<(), SceneError> {
        self.bounds = Bounds::new(-20.0, 20.0, 0.0, 1e6);

        let mut verts = Vec::new();
        for x in 0..3 {
            let x_val = PARTICLE_DIAM * (x as f64 - 1.0);
            for y in 0..2 {
                let y_val = (2 + y + 1) as f64 * PARTICLE_DIAM;
                let mut p = Particle::new(DVec2::new(x_val, y_val), 1.0, Phase::Solid);
                p.vel.x = 5.0;
                p.k_friction = 0.01;
                p.s_friction = 0.1;
                verts.push(p);
            }
        }
        self.create_rigid_body(verts, rect_sdf(3))?;
        Ok(())
    }

    /// Loose grains piling up, disturbed by a heavy fast intruder.
    fn init_granular(&mut self) {
        self.bounds = Bounds::new(-100.0, 100.0, -5.0, 1000.0);

        for i in -10..=10 {
            for j in 0..40 {
                let pos = DVec2::new(
                    i as f64 * (PARTICLE_DIAM + crate::config::EPSILON),
                    j as f64 * PARTICLE_DIAM + PARTICLE_RAD + self.bounds.y_min,
                );
                let mut p = Particle::new(pos, 1.0, Phase::Granular);
                p.s_friction = 0.1;
                p.k_friction = 0.02;
                self.add_particle(p);
            }
        }

        let mut jerk = Particle::new(DVec2::new(-5.51, 4.0), 100.0, Phase::Solid);
        jerk.vel.x = 10.0;
        self.add_particle(jerk);
    }

    /// Columns of stacked boxes.
    fn init_stacks(&mut self) -> Result<(), SceneError> {
        self.bounds = Bounds::new(-20.0, 20.0, 0.0, 1e6);

        let num_boxes = 8;
        let num_columns = 2_i32;
        for j in -num_columns..=num_columns {
            for i in (0..num_boxes).rev() {
                let mut verts = Vec::new();
                for x in 0..3 {
                    let x_val = (j * 4) as f64 + PARTICLE_DIAM * (x as f64 - 1.0);
                    for y in 0..2 {
                        let y_val = ((2 * i + 1) * 2 + y + 1) as f64 * PARTICLE_DIAM;
                        verts.push(Particle::new(DVec2::new(x_val, y_val), 1.0, Phase::Solid));
                    }
                }
                self.create_rigid_body(verts, rect_sdf(3))?;
            }
        }
        Ok(())
    }

    /// Brick wall with offset courses and high static friction.
    fn init_wall(&mut self) -> Result<(), SceneError> {
        self.bounds = Bounds::new(-20.0, 20.0, 0.0, 1e6);

        let height = 5;
        let width = 2_i32;
        let brick_cols = 6;
        for j in -width..=width {
            for i in (0..height).rev() {
                let mut verts = Vec::new();
                for x in 0..brick_cols {
                    // Alternate courses shift by a third of a brick so the
                    // joints never line up.
                    let shift = if i % 2 == 0 { 3.0 } else { -1.0 };
                    let x_val = j as f64
                        * (crate::config::EPSILON + brick_cols as f64 * PARTICLE_DIAM)
                        + PARTICLE_DIAM * x as f64
                        - shift * PARTICLE_RAD;
                    for y in 0..2 {
                        let y_val = (i as f64 * 2.0 + y as f64 + crate::config::EPSILON)
                            * PARTICLE_DIAM
                            + PARTICLE_RAD;
                        let mut p = Particle::new(DVec2::new(x_val, y_val), 1.0, Phase::Solid);
                        p.s_friction = 1.0;
                        p.k_friction = 0.09;
                        verts.push(p);
                    }
                }
                self.create_rigid_body(verts, rect_sdf(6))?;
            }
        }
        Ok(())
    }

    /// Chain of plates hanging from an immovable anchor by distance links.
    fn init_pendulum(&mut self) -> Result<(), SceneError> {
        self.bounds = Bounds::new(-10.0, 10.0, 0.0, 1e6);

        let chain_length = 3_i32;
        let anchor = DVec2::new(0.0, (chain_length * 3 + 6) as f64) * PARTICLE_DIAM
            + DVec2::new(0.0, 2.0);
        self.add_particle(Particle::new(anchor, 0.0, Phase::Solid));

        let sdf: Vec<SdfData> = [
            DVec2::new(-1.0, -1.0),
            DVec2::new(-1.0, 1.0),
            DVec2::new(0.0, -1.0),
            DVec2::new(0.0, 1.0),
            DVec2::new(1.0, -1.0),
            DVec2::new(1.0, 1.0),
        ]
        .iter()
        .map(|n| SdfData::new(n.normalize(), PARTICLE_RAD))
        .collect();

        let xs = [-1.0, -1.0, 0.0, 0.0, 1.0, 1.0];
        for i in (0..=chain_length).rev() {
            let mut verts = Vec::new();
            for (jj, &x) in xs.iter().enumerate() {
                let y = ((i + 1) * 3 + (jj as i32 % 2)) as f64 * PARTICLE_DIAM + 2.0;
                verts.push(Particle::new(
                    DVec2::new(x * PARTICLE_DIAM, y),
                    1.0,
                    Phase::Solid,
                ));
            }
            self.create_rigid_body(verts, sdf.clone())?;

            if i < chain_length {
                let base_prev = (1 + (chain_length - i - 1) * 6) as usize;
                let base_cur = base_prev + 6;
                let link_a = Constraint::Distance(DistanceConstraint::new(
                    base_cur + 1,
                    base_prev,
                    &self.particles,
                ));
                let link_b = Constraint::Distance(DistanceConstraint::new(
                    base_cur + 5,
                    base_prev + 4,
                    &self.particles,
                ));
                self.add_global(link_a);
                self.add_global(link_b);
            }
        }

        let link = Constraint::Distance(DistanceConstraint::new(0, 4, &self.particles));
        self.add_global(link);
        Ok(())
    }

    /// Two fluid columns of different rest densities.
    fn init_fluid(&mut self) -> Result<(), SceneError> {
        let scale = 4.0;
        let delta = 0.7;
        self.bounds = Bounds::new(-2.0 * scale, 2.0 * scale, -2.0 * scale, 10.0 * scale);

        let num = 2;
        for d in 0..num {
            let start = -2.0 * scale + 4.0 * scale * (d as f64 / num as f64);
            let verts =
                self.fill_block(start, start + 4.0 * scale / num as f64, -2.0 * scale, scale, delta, 0.0);
            self.create_fluid(verts, 1.0 + 1.5 * d as f64)?;
        }
        Ok(())
    }

    /// A pool with two light boxes dropped in.
    fn init_fluid_solid(&mut self) -> Result<(), SceneError> {
        let scale = 5.0;
        let delta = 0.7;
        self.bounds = Bounds::new(-2.0 * scale, 2.0 * scale, -2.0 * scale, 10.0 * scale);

        let verts = self.fill_block(-2.0 * scale, 2.0 * scale, -2.0 * scale, 2.0 * scale, delta, 0.0);
        self.create_fluid(verts, 1.75)?;

        for (x_off, mass) in [(-3.0, 0.5), (3.0, 0.2)] {
            let mut verts = Vec::new();
            for x in 0..5 {
                let x_val = PARTICLE_DIAM * (x as f64 - 2.0);
                for y in 0..2 {
                    let y_val = (2 + y + 1) as f64 * PARTICLE_DIAM;
                    verts.push(Particle::new(
                        DVec2::new(x_val + x_off, 15.0 + y_val),
                        mass,
                        Phase::Solid,
                    ));
                }
            }
            self.create_rigid_body(verts, rect_sdf(5))?;
        }
        Ok(())
    }

    /// Gas columns expanding under two fluid blocks.
    fn init_gas(&mut self) -> Result<(), SceneError> {
        let delta = 0.7;
        let scale = 2.0;
        self.bounds = Bounds::new(-2.0 * scale, 2.0 * scale, -2.0 * scale, 10.0 * scale);

        let num = 2;
        for d in 0..num {
            let start = -2.0 * scale + 4.0 * scale * (d as f64 / num as f64);
            let verts = self.fill_block(
                start,
                start + 4.0 * scale / num as f64,
                -2.0 * scale,
                2.0 * scale,
                delta,
                0.0,
            );
            self.create_gas(verts, 0.75 + 3.0 * d as f64)?;
        }

        let scale = 3.0;
        for d in 0..num {
            let start = -2.0 * scale + 4.0 * scale * (d as f64 / num as f64);
            let verts = self.fill_block(
                start,
                start + 4.0 * scale / num as f64,
                -2.0 * scale,
                2.0 * scale,
                delta,
                10.0,
            );
            self.create_fluid(verts, 4.0 + 0.75 * (d + 1) as f64)?;
        }
        Ok(())
    }

    /// Jittered block of unit-mass particles on a `delta` lattice.
    fn fill_block(
        &mut self,
        x0: f64,
        x1: f64,
        y0: f64,
        y1: f64,
        delta: f64,
        y_shift: f64,
    ) -> Vec<Particle> {
        let mut verts = Vec::new();
        let mut x = x0;
        while x < x1 {
            let mut y = y0;
            while y < y1 {
                let jitter = 0.2
                    * DVec2::new(
                        self.rng.gen::<f64>() - 0.5,
                        self.rng.gen::<f64>() - 0.5,
                    );
                verts.push(Particle::new(
                    DVec2::new(x, y + y_shift) + jitter,
                    1.0,
                    Phase::Fluid,
                ));
                y += delta;
            }
            x += delta;
        }
        verts
    }
}

/// SDF table for a `cols`-by-2 particle box, in x-major particle order:
/// diagonal corner samples at `sqrt(2)` radii, face samples elsewhere.
pub fn rect_sdf(cols: usize) -> Vec<SdfData> {
    let root2 = 2.0_f64.sqrt();
    let mut data = Vec::with_capacity(cols * 2);
    data.push(SdfData::new(
        DVec2::new(-1.0, -1.0).normalize(),
        PARTICLE_RAD * root2,
    ));
    data.push(SdfData::new(
        DVec2::new(-1.0, 1.0).normalize(),
        PARTICLE_RAD * root2,
    ));
    for _ in 0..cols.saturating_sub(2) {
        data.push(SdfData::new(DVec2::new(0.0, -1.0), PARTICLE_RAD));
        data.push(SdfData::new(DVec2::new(0.0, 1.0), PARTICLE_RAD));
    }
    data.push(SdfData::new(
        DVec2::new(1.0, -1.0).normalize(),
        PARTICLE_RAD * root2,
    ));
    data.push(SdfData::new(
        DVec2::new(1.0, 1.0).normalize(),
        PARTICLE_RAD * root2,
    ));
    data
}
