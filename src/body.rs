use glam::{DMat2, DVec2};

use crate::constraints::Constraint;
use crate::particle::Particle;

/// Per-particle signed-distance-field sample of a rigid body's surface:
/// the surface gradient direction in the body's initial frame, and the
/// distance from the particle to the surface along it.
///
/// Rigid contacts rotate the stored direction by the body's current
/// shape-match rotation to recover a world-space contact normal that is
/// better than the naive pair direction.
#[derive(Clone, Copy, Debug)]
pub struct SdfData {
    pub normal: DVec2,
    pub distance: f64,
}

impl SdfData {
    pub fn new(normal: DVec2, distance: f64) -> Self {
        Self { normal, distance }
    }
}

/// Rigid aggregate over a set of particles.
///
/// The body does no integration of its own; its rigidity is enforced by the
/// owned shape-matching constraint, which also keeps `com` and `angle`
/// current. Constraints refer to particles and bodies by index, so the
/// owning arrays may reallocate freely.
#[derive(Clone, Debug)]
pub struct Body {
    /// Indices into the simulation's particle array.
    pub particles: Vec<usize>,
    /// SDF sample per member, parallel to `particles`.
    pub sdf: Vec<SdfData>,
    /// Current center of mass.
    pub com: DVec2,
    /// Initial-frame offsets from the center of mass, parallel to
    /// `particles`. Mass-weighted sum is zero by construction.
    pub rs: Vec<DVec2>,
    /// Inverse of the summed member mass.
    pub inv_mass: f64,
    /// Rotation recovered by the last shape match.
    pub angle: f64,
    /// Owned shape constraint. Must hold the `Constraint::Shape` variant;
    /// anything else is a core invariant violation.
    pub shape: Constraint,
}

impl Body {
    /// Recompute the mass-weighted center of mass from current or
    /// predicted member positions.
    pub fn update_com(&mut self, particles: &[Particle], predicted: bool) {
        let mut com = DVec2::ZERO;
        let mut total_mass = 0.0;
        for &idx in &self.particles {
            let p = &particles[idx];
            let mass = 1.0 / p.inv_mass;
            com += mass * if predicted { p.predicted } else { p.pos };
            total_mass += mass;
        }
        if total_mass > 0.0 {
            self.com = com / total_mass;
        }
    }

    /// Capture the initial-frame offsets `r_i = pos_i - com`.
    pub fn compute_rs(&mut self, particles: &[Particle]) {
        self.rs = self
            .particles
            .iter()
            .map(|&idx| particles[idx].pos - self.com)
            .collect();
    }

    /// SDF sample for a member particle, by simulation index.
    pub fn sdf_for(&self, particle: usize) -> Option<&SdfData> {
        self.particles
            .iter()
            .position(|&idx| idx == particle)
            .map(|k| &self.sdf[k])
    }

    /// Current shape-match rotation as a matrix.
    #[inline]
    pub fn rotation(&self) -> DMat2 {
        DMat2::from_angle(self.angle)
    }
}
