//! 2D unified position-based dynamics.
//!
//! Rigid bodies, granular piles, fluids and gases all live on a single
//! substrate of equal-radius circular particles; behavior emerges from the
//! constraints projected on them each tick. The driver predicts positions,
//! discovers contacts, optionally stabilizes pre-existing penetration, runs
//! a Gauss-Seidel or batched matrix solver over the constraint groups, and
//! recovers velocities from the projected positions.
//!
//! Reference: "Unified Particle Physics for Real-Time Applications",
//! Macklin et al., SIGGRAPH 2014
//!
//! Rendering, input handling and windowing are external: consumers read
//! particle positions and a read-only view of bodies through the accessors
//! on [`Simulation`].

pub mod body;
pub mod config;
pub mod constraints;
pub mod fluids;
pub mod grid;
pub mod particle;
pub mod scene;
pub mod simulation;
pub mod solver;

pub use body::{Body, SdfData};
pub use config::{SimConfig, SolverMode, EPSILON, PARTICLE_DIAM, PARTICLE_RAD};
pub use constraints::{Constraint, ConstraintGroup};
pub use particle::{Particle, Phase};
pub use scene::{Scene, SceneError};
pub use simulation::{Bounds, Simulation};
