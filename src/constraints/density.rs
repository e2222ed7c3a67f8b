use glam::DVec2;
use nalgebra::{DMatrix, DVector};

use crate::fluids::{poly6_kernel, spiky_gradient};
use crate::particle::Particle;

/// Relaxation parameter (epsilon) for the lambda denominator. Prevents
/// division by zero and controls constraint stiffness.
const RELAXATION: f64 = 1.0;

/// Tensile instability correction coefficient (k in the paper).
const TENSILE_K: f64 = 0.01;

/// Tensile instability correction exponent (n in the paper).
const TENSILE_N: i32 = 4;

/// Fraction of the smoothing radius used as the tensile reference distance.
const TENSILE_DQ_FACTOR: f64 = 0.3;

/// PBF density constraint over a group of liquid particles.
///
/// Reference: "Position Based Fluids", Macklin & Muller, SIGGRAPH 2013
///
/// Three phases per projection, all over the member list (cross-phase
/// coupling goes through contact constraints instead):
/// 1. Density per member via the poly6 kernel.
/// 2. Lambda (Lagrange multiplier) with epsilon relaxation.
/// 3. Position corrections with the tensile instability fix.
#[derive(Clone, Debug)]
pub struct FluidConstraint {
    pub rest_density: f64,
    /// Member indices into the simulation's particle array.
    pub particles: Vec<usize>,
    /// Smoothing radius captured at construction.
    pub h: f64,
    densities: Vec<f64>,
    lambdas: Vec<f64>,
    deltas: Vec<DVec2>,
}

impl FluidConstraint {
    pub fn new(rest_density: f64, particles: Vec<usize>, h: f64) -> Self {
        Self {
            rest_density,
            particles,
            h,
            densities: Vec::new(),
            lambdas: Vec::new(),
            deltas: Vec::new(),
        }
    }

    pub fn project(&mut self, particles: &mut [Particle]) {
        project_density(
            self.rest_density,
            self.h,
            &self.particles,
            &mut self.densities,
            &mut self.lambdas,
            &mut self.deltas,
            particles,
        );
    }

    pub fn assemble(
        &mut self,
        particles: &[Particle],
        jac: &mut DMatrix<f64>,
        cvals: &mut DVector<f64>,
        row: usize,
    ) -> usize {
        assemble_density(
            self.rest_density,
            self.h,
            &self.particles,
            &mut self.densities,
            particles,
            jac,
            cvals,
            row,
        )
    }
}

/// Density constraint for gas groups: the same machinery as
/// [`FluidConstraint`] with a lower rest density, which makes the group
/// expansive. Gravity on gas particles is scaled by `alpha` in the driver.
#[derive(Clone, Debug)]
pub struct GasConstraint {
    pub rest_density: f64,
    pub particles: Vec<usize>,
    pub h: f64,
    densities: Vec<f64>,
    lambdas: Vec<f64>,
    deltas: Vec<DVec2>,
}

impl GasConstraint {
    pub fn new(rest_density: f64, particles: Vec<usize>, h: f64) -> Self {
        Self {
            rest_density,
            particles,
            h,
            densities: Vec::new(),
            lambdas: Vec::new(),
            deltas: Vec::new(),
        }
    }

    pub fn project(&mut self, particles: &mut [Particle]) {
        project_density(
            self.rest_density,
            self.h,
            &self.particles,
            &mut self.densities,
            &mut self.lambdas,
            &mut self.deltas,
            particles,
        );
    }

    pub fn assemble(
        &mut self,
        particles: &[Particle],
        jac: &mut DMatrix<f64>,
        cvals: &mut DVector<f64>,
        row: usize,
    ) -> usize {
        assemble_density(
            self.rest_density,
            self.h,
            &self.particles,
            &mut self.densities,
            particles,
            jac,
            cvals,
            row,
        )
    }
}

/// Estimate densities for every member. Unit particle mass is assumed, as
/// the builders reject infinite-mass members and the presets use mass 1.
fn compute_densities(
    h: f64,
    indices: &[usize],
    densities: &mut Vec<f64>,
    particles: &[Particle],
) {
    let n = indices.len();
    densities.clear();
    densities.resize(n, 0.0);
    for (a, &ia) in indices.iter().enumerate() {
        let pos = particles[ia].predicted;
        let mut rho = 0.0;
        for &ib in indices {
            let r_len = (pos - particles[ib].predicted).length();
            if r_len < h {
                rho += poly6_kernel(r_len, h);
            }
        }
        densities[a] = rho;
    }
}

#[allow(clippy::too_many_arguments)]
fn project_density(
    rest_density: f64,
    h: f64,
    indices: &[usize],
    densities: &mut Vec<f64>,
    lambdas: &mut Vec<f64>,
    deltas: &mut Vec<DVec2>,
    particles: &mut [Particle],
) {
    let n = indices.len();
    if n == 0 {
        return;
    }
    let inv_rho0 = 1.0 / rest_density;
    let poly6_dq = poly6_kernel(TENSILE_DQ_FACTOR * h, h);

    compute_densities(h, indices, densities, particles);

    // Lambda per member.
    lambdas.clear();
    lambdas.resize(n, 0.0);
    for (a, &ia) in indices.iter().enumerate() {
        let pos = particles[ia].predicted;
        let c = densities[a] * inv_rho0 - 1.0;

        let mut grad_sum_sq = 0.0;
        let mut grad_self = DVec2::ZERO;
        for &ib in indices {
            if ib == ia {
                continue;
            }
            let r = pos - particles[ib].predicted;
            let r_len = r.length();
            if r_len < h {
                let grad = spiky_gradient(r, r_len, h) * inv_rho0;
                grad_sum_sq += grad.length_squared();
                grad_self += grad;
            }
        }
        grad_sum_sq += grad_self.length_squared();

        lambdas[a] = -c / (grad_sum_sq + RELAXATION);
    }

    // Corrections, staged so every member sees the same lambda state.
    deltas.clear();
    deltas.resize(n, DVec2::ZERO);
    for (a, &ia) in indices.iter().enumerate() {
        let pos = particles[ia].predicted;
        let mut delta = DVec2::ZERO;
        for (b, &ib) in indices.iter().enumerate() {
            if ib == ia {
                continue;
            }
            let r = pos - particles[ib].predicted;
            let r_len = r.length();
            if r_len >= h {
                continue;
            }
            let s_corr = -TENSILE_K * (poly6_kernel(r_len, h) / poly6_dq).powi(TENSILE_N);
            delta += (lambdas[a] + lambdas[b] + s_corr) * spiky_gradient(r, r_len, h);
        }
        deltas[a] = delta * inv_rho0;
    }

    for (a, &ia) in indices.iter().enumerate() {
        let p = &mut particles[ia];
        if p.inv_mass > 0.0 {
            p.predicted += deltas[a];
        }
    }
}

/// One Jacobian row per member: `C_a = rho_a / rho_0 - 1` with spiky
/// gradients toward every in-range neighbor. The tensile term is a
/// stabilizing perturbation, not a constraint, and is left out of the
/// linearization.
#[allow(clippy::too_many_arguments)]
fn assemble_density(
    rest_density: f64,
    h: f64,
    indices: &[usize],
    densities: &mut Vec<f64>,
    particles: &[Particle],
    jac: &mut DMatrix<f64>,
    cvals: &mut DVector<f64>,
    row: usize,
) -> usize {
    let n = indices.len();
    if n == 0 {
        return 0;
    }
    let inv_rho0 = 1.0 / rest_density;

    compute_densities(h, indices, densities, particles);

    for (a, &ia) in indices.iter().enumerate() {
        let r_idx = row + a;
        cvals[r_idx] = densities[a] * inv_rho0 - 1.0;

        let pos = particles[ia].predicted;
        let mut grad_self = DVec2::ZERO;
        for &ib in indices {
            if ib == ia {
                continue;
            }
            let r = pos - particles[ib].predicted;
            let r_len = r.length();
            if r_len >= h {
                continue;
            }
            let grad = spiky_gradient(r, r_len, h) * inv_rho0;
            jac[(r_idx, 2 * ib)] = -grad.x;
            jac[(r_idx, 2 * ib + 1)] = -grad.y;
            grad_self += grad;
        }
        jac[(r_idx, 2 * ia)] = grad_self.x;
        jac[(r_idx, 2 * ia + 1)] = grad_self.y;
    }
    n
}
