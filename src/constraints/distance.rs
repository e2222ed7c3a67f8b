use nalgebra::{DMatrix, DVector};

use crate::config::EPSILON;
use crate::particle::Particle;

/// Bilateral distance constraint between two particles.
///
/// Restores `|ep_i - ep_j| = rest`, splitting the correction by inverse
/// mass so both ends move toward each other when overstretched and apart
/// when compressed.
#[derive(Clone, Debug)]
pub struct DistanceConstraint {
    pub i: usize,
    pub j: usize,
    pub rest: f64,
}

impl DistanceConstraint {
    /// Capture the rest length from the particles' current positions.
    pub fn new(i: usize, j: usize, particles: &[Particle]) -> Self {
        Self {
            i,
            j,
            rest: (particles[i].pos - particles[j].pos).length(),
        }
    }

    pub fn with_rest(i: usize, j: usize, rest: f64) -> Self {
        Self { i, j, rest }
    }

    pub fn project(&self, particles: &mut [Particle]) {
        let w_i = particles[self.i].inv_mass;
        let w_j = particles[self.j].inv_mass;
        let w_sum = w_i + w_j;
        if w_sum == 0.0 {
            return;
        }

        let diff = particles[self.i].predicted - particles[self.j].predicted;
        let dist = diff.length();
        if dist < EPSILON {
            return;
        }

        let n = diff / dist;
        let correction = n * ((dist - self.rest) / w_sum);
        particles[self.i].predicted -= correction * w_i;
        particles[self.j].predicted += correction * w_j;
    }

    /// One Jacobian row: `C = |ep_i - ep_j| - rest`, gradient along the
    /// pair direction. Degenerate pairs contribute nothing.
    pub fn assemble(
        &self,
        particles: &[Particle],
        jac: &mut DMatrix<f64>,
        cvals: &mut DVector<f64>,
        row: usize,
    ) -> usize {
        let diff = particles[self.i].predicted - particles[self.j].predicted;
        let dist = diff.length();
        if dist < EPSILON {
            return 0;
        }
        let n = diff / dist;
        jac[(row, 2 * self.i)] = n.x;
        jac[(row, 2 * self.i + 1)] = n.y;
        jac[(row, 2 * self.j)] = -n.x;
        jac[(row, 2 * self.j + 1)] = -n.y;
        cvals[row] = dist - self.rest;
        1
    }
}
