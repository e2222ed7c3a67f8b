use nalgebra::{DMatrix, DVector};

use crate::body::Body;
use crate::constraints::Constraint;
use crate::particle::Particle;

/// Ridge added to the system diagonal before factorization.
const REGULARIZATION: f64 = 1e-9;

/// Stronger ridge for the retry when the first factorization fails.
const FALLBACK_RIDGE: f64 = 1e-6;

/// Batched constraint projector.
///
/// Per pass: assemble the active Jacobian rows and constraint values at the
/// current predicted positions, solve the linearized system
/// `J M^-1 J^T lambda = -C` (SPD, Cholesky with a ridge), and apply
/// `delta_ep = M^-1 J^T lambda`.
///
/// Two instances are kept by the simulation because the contact and
/// standard groups differ in sparsity and need separately pre-sized
/// buffers; the contact instance captures the height-scaled inverse
/// masses.
pub struct MatrixSolver {
    /// Diagonal of `M^-1`, one entry per coordinate (2N).
    inv_mass: DVector<f64>,
    jac: DMatrix<f64>,
    cvals: DVector<f64>,
    n_particles: usize,
    max_rows: usize,
}

impl Default for MatrixSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MatrixSolver {
    pub fn new() -> Self {
        Self {
            inv_mass: DVector::zeros(0),
            jac: DMatrix::zeros(0, 0),
            cvals: DVector::zeros(0),
            n_particles: 0,
            max_rows: 0,
        }
    }

    /// Capture the diagonal inverse-mass matrix. The scaled variant divides
    /// by the per-particle mass scale, which is what the contact group
    /// projects with.
    pub fn setup_m(&mut self, particles: &[Particle], scaled: bool) {
        let n = particles.len();
        if self.inv_mass.len() != 2 * n {
            self.inv_mass = DVector::zeros(2 * n);
        }
        for (i, p) in particles.iter().enumerate() {
            let w = if scaled {
                p.contact_inv_mass()
            } else {
                p.inv_mass
            };
            self.inv_mass[2 * i] = w;
            self.inv_mass[2 * i + 1] = w;
        }
    }

    /// Re-validate scratch buffer sizes for a group. Reallocates only when
    /// the particle count or the group's maximum row count changed.
    pub fn setup_sizes(&mut self, n_particles: usize, constraints: &[Constraint]) {
        let max_rows: usize = constraints.iter().map(Constraint::max_rows).sum();
        if self.n_particles != n_particles || self.max_rows != max_rows {
            self.n_particles = n_particles;
            self.max_rows = max_rows;
            self.jac = DMatrix::zeros(max_rows, 2 * n_particles);
            self.cvals = DVector::zeros(max_rows);
        }
    }

    /// One projection pass over the group. In stabilize mode the solved
    /// displacement is applied to current positions as well as predicted
    /// ones.
    ///
    /// An empty or fully satisfied group is a no-op. A system that still
    /// fails to factor after ridge regularization is skipped for this pass;
    /// numerical degeneracy is absorbed, not reported.
    pub fn solve_and_update(
        &mut self,
        particles: &mut [Particle],
        bodies: &[Body],
        constraints: &mut [Constraint],
        stabilize: bool,
    ) {
        if constraints.is_empty() || self.max_rows == 0 {
            return;
        }

        self.jac.fill(0.0);
        let mut rows = 0;
        for c in constraints.iter_mut() {
            rows += c.assemble(particles, bodies, &mut self.jac, &mut self.cvals, rows);
        }
        if rows == 0 {
            return;
        }

        let jac = self.jac.rows(0, rows);

        // J scaled by M^-1 column-wise; A = (J M^-1) J^T.
        let mut jw = jac.clone_owned();
        for col in 0..2 * self.n_particles {
            let w = self.inv_mass[col];
            if w != 1.0 {
                let mut column = jw.column_mut(col);
                column *= w;
            }
        }
        let mut a = &jw * jac.transpose();
        for d in 0..rows {
            a[(d, d)] += REGULARIZATION;
        }
        let mut b = self.cvals.rows(0, rows).clone_owned();
        b.neg_mut();

        let lambda = match a.clone().cholesky() {
            Some(chol) => chol.solve(&b),
            None => {
                for d in 0..rows {
                    a[(d, d)] += FALLBACK_RIDGE;
                }
                match a.cholesky() {
                    Some(chol) => chol.solve(&b),
                    None => return,
                }
            }
        };

        // delta = M^-1 J^T lambda = (J M^-1)^T lambda.
        let delta = jw.transpose() * lambda;
        for (i, p) in particles.iter_mut().enumerate() {
            if p.inv_mass == 0.0 {
                continue;
            }
            let dx = delta[2 * i];
            let dy = delta[2 * i + 1];
            p.predicted.x += dx;
            p.predicted.y += dy;
            if stabilize {
                p.pos.x += dx;
                p.pos.y += dy;
            }
        }
    }
}
