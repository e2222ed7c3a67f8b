use serde::{Deserialize, Serialize};

/// Diameter shared by every particle in the system. All collision and
/// kernel radii derive from this.
pub const PARTICLE_DIAM: f64 = 1.0;

/// Particle radius, always half the diameter.
pub const PARTICLE_RAD: f64 = PARTICLE_DIAM / 2.0;

/// Contact slop and general degeneracy guard.
pub const EPSILON: f64 = 1e-6;

/// Projection strategy used for the contact and standard groups.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum SolverMode {
    /// Gauss-Seidel: walk each group's constraint list in order, projecting
    /// in place so later projections see earlier corrections.
    Iterative,
    /// Assemble and solve `J M^-1 J^T lambda = -C` per group per iteration.
    Batched,
}

/// Tuning knobs for the simulation, passed to the constructor.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SimConfig {
    /// Outer iterations of the main solver pass.
    pub solver_iterations: u32,
    /// Iterations of the pre-simulation penetration-removal pass.
    pub stabilization_iterations: u32,
    /// Enable the stabilization pass.
    pub use_stabilization: bool,
    pub solver_mode: SolverMode,
    /// Use the uniform grid for pair discovery. Off by default: the core is
    /// defined by the O(N^2) scan and the grid must generate the identical
    /// constraint set.
    pub use_grid: bool,
    /// Gravity scale applied to gas-phase particles (< 1).
    pub alpha: f64,
    /// Displacement threshold under which a particle is put to sleep.
    pub sleep_eps: f64,
    /// Exponent of the height-based mass scaling used by contact
    /// projections to keep tall stacks stable.
    pub mass_scale_k: f64,
    /// SPH smoothing radius as a multiple of `PARTICLE_DIAM`.
    pub smoothing_ratio: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            solver_iterations: 6,
            stabilization_iterations: 2,
            use_stabilization: true,
            solver_mode: SolverMode::Iterative,
            use_grid: false,
            alpha: 0.1,
            sleep_eps: 1e-4,
            mass_scale_k: 0.25,
            smoothing_ratio: 3.0,
        }
    }
}
