use glam::{DMat2, DVec2};

use crate::body::Body;
use crate::config::EPSILON;
use crate::particle::Particle;

/// Total shape matching for one rigid body.
///
/// Finds the optimal translation + rotation mapping the body's rest offsets
/// onto the current predicted configuration and moves every member toward
/// its transformed rest position. The rotation comes from the closed-form
/// 2D polar decomposition of the covariance matrix,
/// `theta = atan2(A21 - A12, A11 + A22)`, which is exact and needs no SVD.
///
/// Reference: "Meshless Deformations Based on Shape Matching",
/// Mueller et al., 2005
#[derive(Clone, Copy, Debug)]
pub struct ShapeConstraint {
    /// Index of the body whose members this constraint matches.
    pub body: usize,
    /// Stiffness in `[0..1]`; 1.0 is fully rigid.
    pub stiffness: f64,
}

impl ShapeConstraint {
    pub fn new(body: usize) -> Self {
        Self {
            body,
            stiffness: 1.0,
        }
    }

    /// Project all members toward the matched configuration and refresh the
    /// body's center of mass and rotation.
    ///
    /// The mass-weighted center of mass is preserved: the rest offsets sum
    /// to zero, so moving members toward `com + R r_i` is translation-free
    /// in aggregate.
    pub fn project(&self, particles: &mut [Particle], bodies: &mut [Body]) {
        let body = &mut bodies[self.body];
        if body.particles.is_empty() {
            return;
        }

        // Current center of mass from predicted positions.
        let mut com = DVec2::ZERO;
        let mut total_mass = 0.0;
        for &idx in &body.particles {
            let mass = 1.0 / particles[idx].inv_mass;
            com += particles[idx].predicted * mass;
            total_mass += mass;
        }
        com /= total_mass;

        // Covariance A = sum m_i (ep_i - com) r_i^T, accumulated per entry.
        let mut a11 = 0.0;
        let mut a12 = 0.0;
        let mut a21 = 0.0;
        let mut a22 = 0.0;
        for (k, &idx) in body.particles.iter().enumerate() {
            let mass = 1.0 / particles[idx].inv_mass;
            let q = particles[idx].predicted - com;
            let r = body.rs[k];
            a11 += mass * q.x * r.x;
            a12 += mass * q.x * r.y;
            a21 += mass * q.y * r.x;
            a22 += mass * q.y * r.y;
        }

        // Degenerate covariance keeps the previous rotation.
        let sin_term = a21 - a12;
        let cos_term = a11 + a22;
        let angle = if sin_term.abs() + cos_term.abs() < EPSILON {
            body.angle
        } else {
            sin_term.atan2(cos_term)
        };
        let rot = DMat2::from_angle(angle);

        for (k, &idx) in body.particles.iter().enumerate() {
            let goal = com + rot * body.rs[k];
            let p = &mut particles[idx];
            p.predicted += (goal - p.predicted) * self.stiffness;
        }

        body.com = com;
        body.angle = angle;
    }
}
