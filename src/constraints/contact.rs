use glam::DVec2;
use nalgebra::{DMatrix, DVector};

use crate::body::Body;
use crate::config::{EPSILON, PARTICLE_DIAM};
use crate::particle::Particle;

/// Frictionless unilateral contact enforcing `|ep_i - ep_j| >= PARTICLE_DIAM`.
///
/// Used when at least one of the pair is non-solid. Corrections are split by
/// the height-scaled inverse mass, like every contact-group constraint.
#[derive(Clone, Copy, Debug)]
pub struct ContactConstraint {
    pub i: usize,
    pub j: usize,
}

impl ContactConstraint {
    pub fn new(i: usize, j: usize) -> Self {
        Self { i, j }
    }

    pub fn project(&self, particles: &mut [Particle]) {
        let w_i = particles[self.i].contact_inv_mass();
        let w_j = particles[self.j].contact_inv_mass();
        let w_sum = w_i + w_j;
        if w_sum == 0.0 {
            return;
        }

        let diff = particles[self.i].predicted - particles[self.j].predicted;
        let dist = diff.length();
        if dist >= PARTICLE_DIAM || dist < EPSILON {
            return;
        }

        let n = diff / dist;
        let correction = n * ((PARTICLE_DIAM - dist) / w_sum);
        particles[self.i].predicted += correction * w_i;
        particles[self.j].predicted -= correction * w_j;
    }

    pub fn assemble(
        &self,
        particles: &[Particle],
        jac: &mut DMatrix<f64>,
        cvals: &mut DVector<f64>,
        row: usize,
    ) -> usize {
        let diff = particles[self.i].predicted - particles[self.j].predicted;
        let dist = diff.length();
        if dist >= PARTICLE_DIAM - EPSILON || dist < EPSILON {
            return 0;
        }
        let n = diff / dist;
        write_pair_row(jac, cvals, row, self.i, self.j, n, dist - PARTICLE_DIAM);
        1
    }
}

/// Solid-solid contact: unilateral non-penetration along an SDF-derived
/// normal plus Coulomb friction.
///
/// The normal comes from the rigid geometry when available: of the two
/// particles, the one with the smaller SDF distance (shallower inside its
/// body's surface) contributes its stored surface direction, rotated by the
/// body's current shape-match rotation. Loose grains fall back to the pair
/// direction.
#[derive(Clone, Copy, Debug)]
pub struct RigidContactConstraint {
    pub i: usize,
    pub j: usize,
    /// Stabilization copies apply only the normal correction, to both `pos`
    /// and `predicted`.
    pub stabilize: bool,
    /// Overlap captured by the last batched assembly; the friction
    /// post-pass needs it because the solve itself removes the penetration.
    last_overlap: f64,
}

impl RigidContactConstraint {
    pub fn new(i: usize, j: usize, stabilize: bool) -> Self {
        Self {
            i,
            j,
            stabilize,
            last_overlap: 0.0,
        }
    }

    fn body_of<'a>(particle: &Particle, bodies: &'a [Body]) -> Option<&'a Body> {
        if !particle.phase.is_solid() || particle.body < 0 {
            return None;
        }
        bodies.get(particle.body as usize)
    }

    /// World-space contact normal pointing from `i` toward `j`.
    fn contact_normal(&self, particles: &[Particle], bodies: &[Body], use_pos: bool) -> DVec2 {
        let p_i = &particles[self.i];
        let p_j = &particles[self.j];
        let pair = if use_pos {
            p_j.pos - p_i.pos
        } else {
            p_j.predicted - p_i.predicted
        };

        let sample = |p: &Particle, idx: usize| {
            Self::body_of(p, bodies)
                .and_then(|b| b.sdf_for(idx).map(|sdf| (b.rotation() * sdf.normal, sdf.distance)))
        };

        let mut n = match (sample(p_i, self.i), sample(p_j, self.j)) {
            (Some((n_i, d_i)), Some((n_j, d_j))) => {
                if d_i <= d_j {
                    n_i
                } else {
                    n_j
                }
            }
            (Some((n_i, _)), None) => n_i,
            (None, Some((n_j, _))) => n_j,
            (None, None) => pair.normalize_or(DVec2::Y),
        };
        if n.dot(pair) < 0.0 {
            n = -n;
        }
        n
    }

    pub fn project(&self, particles: &mut [Particle], bodies: &[Body]) {
        if self.stabilize {
            self.project_stabilize(particles, bodies);
            return;
        }

        let w_i = particles[self.i].contact_inv_mass();
        let w_j = particles[self.j].contact_inv_mass();
        let w_sum = w_i + w_j;
        if w_sum == 0.0 {
            return;
        }

        let diff = particles[self.i].predicted - particles[self.j].predicted;
        let dist = diff.length();
        if dist >= PARTICLE_DIAM {
            return;
        }

        let n = self.contact_normal(particles, bodies, false);
        let pen = PARTICLE_DIAM - dist;
        particles[self.i].predicted -= n * (pen * w_i / w_sum);
        particles[self.j].predicted += n * (pen * w_j / w_sum);

        self.apply_friction(particles, n, pen, w_i, w_j);
    }

    /// Remove penetration that already exists at the current positions,
    /// shifting `pos` and `predicted` together so no velocity is injected.
    /// Friction stays in the main pass.
    fn project_stabilize(&self, particles: &mut [Particle], bodies: &[Body]) {
        let w_i = particles[self.i].contact_inv_mass();
        let w_j = particles[self.j].contact_inv_mass();
        let w_sum = w_i + w_j;
        if w_sum == 0.0 {
            return;
        }

        let dist = (particles[self.i].pos - particles[self.j].pos).length();
        if dist >= PARTICLE_DIAM {
            return;
        }

        let n = self.contact_normal(particles, bodies, true);
        let pen = PARTICLE_DIAM - dist;
        let delta_i = -n * (pen * w_i / w_sum);
        let delta_j = n * (pen * w_j / w_sum);
        particles[self.i].pos += delta_i;
        particles[self.i].predicted += delta_i;
        particles[self.j].pos += delta_j;
        particles[self.j].predicted += delta_j;
    }

    /// Coulomb friction on the relative displacement accumulated this tick.
    ///
    /// Inside the static cone the tangential motion is cancelled entirely;
    /// outside it the correction is clamped to `mu_k * |dx_n|`.
    fn apply_friction(
        &self,
        particles: &mut [Particle],
        n: DVec2,
        dx_n: f64,
        w_i: f64,
        w_j: f64,
    ) {
        let p_i = &particles[self.i];
        let p_j = &particles[self.j];
        let rel = (p_i.predicted - p_i.pos) - (p_j.predicted - p_j.pos);
        let tangential = rel - n * rel.dot(n);
        let t_len = tangential.length();
        if t_len < EPSILON {
            return;
        }

        let mu_s = p_i.s_friction.max(p_j.s_friction);
        let mu_k = p_i.k_friction.max(p_j.k_friction);

        let correction = if t_len < mu_s * dx_n {
            tangential
        } else {
            tangential * (mu_k * dx_n / t_len).min(1.0)
        };

        let w_sum = w_i + w_j;
        particles[self.i].predicted -= correction * (w_i / w_sum);
        particles[self.j].predicted += correction * (w_j / w_sum);
    }

    /// Friction post-pass for the batched solver, which handles only the
    /// normal rows. The solve removed the penetration, so the Coulomb
    /// magnitude comes from the overlap captured during assembly.
    pub fn project_friction(&self, particles: &mut [Particle], bodies: &[Body]) {
        if self.last_overlap <= 0.0 {
            return;
        }
        let w_i = particles[self.i].contact_inv_mass();
        let w_j = particles[self.j].contact_inv_mass();
        if w_i + w_j == 0.0 {
            return;
        }
        let n = self.contact_normal(particles, bodies, false);
        self.apply_friction(particles, n, self.last_overlap, w_i, w_j);
    }

    pub fn assemble(
        &mut self,
        particles: &[Particle],
        bodies: &[Body],
        jac: &mut DMatrix<f64>,
        cvals: &mut DVector<f64>,
        row: usize,
    ) -> usize {
        // Stabilization rows measure the current positions, like the
        // iterative stabilization projection.
        let (a, b) = if self.stabilize {
            (particles[self.i].pos, particles[self.j].pos)
        } else {
            (particles[self.i].predicted, particles[self.j].predicted)
        };
        let dist = (a - b).length();
        if dist >= PARTICLE_DIAM - EPSILON {
            self.last_overlap = 0.0;
            return 0;
        }
        self.last_overlap = PARTICLE_DIAM - dist;
        // Gradient along the SDF normal, oriented j -> i like the pair
        // direction of a plain contact.
        let m = -self.contact_normal(particles, bodies, self.stabilize);
        write_pair_row(jac, cvals, row, self.i, self.j, m, dist - PARTICLE_DIAM);
        1
    }
}

fn write_pair_row(
    jac: &mut DMatrix<f64>,
    cvals: &mut DVector<f64>,
    row: usize,
    i: usize,
    j: usize,
    n: DVec2,
    c: f64,
) {
    jac[(row, 2 * i)] = n.x;
    jac[(row, 2 * i + 1)] = n.y;
    jac[(row, 2 * j)] = -n.x;
    jac[(row, 2 * j + 1)] = -n.y;
    cvals[row] = c;
}
