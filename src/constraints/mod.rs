pub mod boundary;
pub mod contact;
pub mod density;
pub mod distance;
pub mod shape_matching;

pub use boundary::{Axis, BoundaryConstraint};
pub use contact::{ContactConstraint, RigidContactConstraint};
pub use density::{FluidConstraint, GasConstraint};
pub use distance::DistanceConstraint;
pub use shape_matching::ShapeConstraint;

use nalgebra::{DMatrix, DVector};

use crate::body::Body;
use crate::particle::Particle;

/// Solve-order tag. Within an outer iteration the groups are solved
/// Contact, then Standard, then Shape; stacks settle before fluid density
/// relaxes before rigid shapes re-assert. Stabilization runs only in its
/// own pre-simulation pass.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ConstraintGroup {
    Contact = 0,
    Standard = 1,
    Shape = 2,
    Stabilization = 3,
}

impl ConstraintGroup {
    pub const COUNT: usize = 4;

    /// Main-pass order; observable through settling behavior.
    pub const SOLVE_ORDER: [ConstraintGroup; 3] = [
        ConstraintGroup::Contact,
        ConstraintGroup::Standard,
        ConstraintGroup::Shape,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// The closed constraint family. The set is stable, so a tagged variant
/// with `match` dispatch replaces virtual calls in the inner loop.
#[derive(Clone, Debug)]
pub enum Constraint {
    Distance(DistanceConstraint),
    Boundary(BoundaryConstraint),
    Contact(ContactConstraint),
    RigidContact(RigidContactConstraint),
    Shape(ShapeConstraint),
    Fluid(FluidConstraint),
    Gas(GasConstraint),
}

impl Constraint {
    pub fn group(&self) -> ConstraintGroup {
        match self {
            Constraint::Distance(_) | Constraint::Fluid(_) | Constraint::Gas(_) => {
                ConstraintGroup::Standard
            }
            Constraint::Boundary(c) => {
                if c.stabilize {
                    ConstraintGroup::Stabilization
                } else {
                    ConstraintGroup::Contact
                }
            }
            Constraint::Contact(_) => ConstraintGroup::Contact,
            Constraint::RigidContact(c) => {
                if c.stabilize {
                    ConstraintGroup::Stabilization
                } else {
                    ConstraintGroup::Contact
                }
            }
            Constraint::Shape(_) => ConstraintGroup::Shape,
        }
    }

    /// Mutate predicted positions toward feasibility. Projections respect
    /// inverse-mass weighting; an immovable particle receives no
    /// displacement.
    pub fn project(&mut self, particles: &mut [Particle], bodies: &mut [Body]) {
        match self {
            Constraint::Distance(c) => c.project(particles),
            Constraint::Boundary(c) => c.project(particles),
            Constraint::Contact(c) => c.project(particles),
            Constraint::RigidContact(c) => c.project(particles, bodies),
            Constraint::Shape(c) => c.project(particles, bodies),
            Constraint::Fluid(c) => c.project(particles),
            Constraint::Gas(c) => c.project(particles),
        }
    }

    /// Upper bound on the Jacobian rows this constraint can contribute to
    /// the batched solver. Shape constraints are always projected
    /// iteratively and contribute none.
    pub fn max_rows(&self) -> usize {
        match self {
            Constraint::Distance(_)
            | Constraint::Boundary(_)
            | Constraint::Contact(_)
            | Constraint::RigidContact(_) => 1,
            Constraint::Shape(_) => 0,
            Constraint::Fluid(c) => c.particles.len(),
            Constraint::Gas(c) => c.particles.len(),
        }
    }

    /// Write this constraint's active rows starting at `row`; returns the
    /// number written. Unilateral constraints contribute rows only while
    /// violated.
    pub fn assemble(
        &mut self,
        particles: &[Particle],
        bodies: &[Body],
        jac: &mut DMatrix<f64>,
        cvals: &mut DVector<f64>,
        row: usize,
    ) -> usize {
        match self {
            Constraint::Distance(c) => c.assemble(particles, jac, cvals, row),
            Constraint::Boundary(c) => c.assemble(particles, jac, cvals, row),
            Constraint::Contact(c) => c.assemble(particles, jac, cvals, row),
            Constraint::RigidContact(c) => c.assemble(particles, bodies, jac, cvals, row),
            Constraint::Shape(_) => 0,
            Constraint::Fluid(c) => c.assemble(particles, jac, cvals, row),
            Constraint::Gas(c) => c.assemble(particles, jac, cvals, row),
        }
    }
}
