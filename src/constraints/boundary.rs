use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::config::PARTICLE_RAD;
use crate::particle::Particle;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
}

/// Unilateral half-plane constraint keeping a particle inside the domain.
///
/// Projects the particle out of the wall by `PARTICLE_RAD`. The
/// stabilization variant also writes the current position, removing
/// pre-existing penetration without injecting velocity.
#[derive(Clone, Copy, Debug)]
pub struct BoundaryConstraint {
    pub index: usize,
    /// Wall coordinate on `axis`.
    pub plane: f64,
    pub axis: Axis,
    /// Whether the wall is the lower bound of the axis.
    pub is_min: bool,
    pub stabilize: bool,
}

impl BoundaryConstraint {
    pub fn new(index: usize, plane: f64, axis: Axis, is_min: bool, stabilize: bool) -> Self {
        Self {
            index,
            plane,
            axis,
            is_min,
            stabilize,
        }
    }

    /// Signed clearance; negative when the particle is inside the wall.
    ///
    /// The stabilization variant measures the current position: its job is
    /// to remove penetration that already exists, not penetration the
    /// prediction is about to cause.
    fn violation(&self, particles: &[Particle]) -> f64 {
        let p = &particles[self.index];
        let point = if self.stabilize { p.pos } else { p.predicted };
        let coord = match self.axis {
            Axis::X => point.x,
            Axis::Y => point.y,
        };
        if self.is_min {
            coord - (self.plane + PARTICLE_RAD)
        } else {
            (self.plane - PARTICLE_RAD) - coord
        }
    }

    pub fn project(&self, particles: &mut [Particle]) {
        let c = self.violation(particles);
        if c >= 0.0 {
            return;
        }
        let p = &mut particles[self.index];
        if p.inv_mass == 0.0 {
            return;
        }
        // Push out along the wall normal by the full violation.
        let delta = if self.is_min { -c } else { c };
        match self.axis {
            Axis::X => {
                p.predicted.x += delta;
                if self.stabilize {
                    p.pos.x += delta;
                }
            }
            Axis::Y => {
                p.predicted.y += delta;
                if self.stabilize {
                    p.pos.y += delta;
                }
            }
        }
    }

    /// One Jacobian row when violated, none otherwise.
    pub fn assemble(
        &self,
        particles: &[Particle],
        jac: &mut DMatrix<f64>,
        cvals: &mut DVector<f64>,
        row: usize,
    ) -> usize {
        let c = self.violation(particles);
        if c >= 0.0 {
            return 0;
        }
        let col = match self.axis {
            Axis::X => 2 * self.index,
            Axis::Y => 2 * self.index + 1,
        };
        jac[(row, col)] = if self.is_min { 1.0 } else { -1.0 };
        cvals[row] = c;
        1
    }
}
