use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Phase determines which constraints act on a particle.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Phase {
    Solid = 0,
    /// Density-constrained liquid.
    Fluid = 1,
    /// Low rest density, gravity scaled by `alpha`.
    Gas = 2,
    /// Loose solid grains; contacts behave exactly like `Solid`, with
    /// friction doing the piling.
    Granular = 3,
}

impl Phase {
    /// Solid for contact purposes. Granular particles collide and rub like
    /// any other solid; only their lack of a body sets them apart.
    #[inline]
    pub fn is_solid(self) -> bool {
        matches!(self, Phase::Solid | Phase::Granular)
    }
}

/// State carrier for one equal-radius circular particle.
///
/// `predicted` is the candidate position after integration but before
/// constraint projection; the solver mutates it in place and the driver
/// commits it back to `pos` at the end of the tick.
#[derive(Clone, Debug)]
pub struct Particle {
    pub pos: DVec2,
    pub predicted: DVec2,
    pub vel: DVec2,
    /// Inverse mass; 0 means immovable.
    pub inv_mass: f64,
    pub phase: Phase,
    /// Owning rigid body index, or an opaque group tag for fluid/gas
    /// particles. -1 means none.
    pub body: i32,
    pub s_friction: f64,
    pub k_friction: f64,
    /// Height-based mass multiplier, recomputed every tick by
    /// [`Particle::scale_mass`].
    pub mass_scale: f64,
    pub asleep: bool,
}

impl Particle {
    /// Create a particle at rest. A mass of 0 makes it immovable
    /// (`inv_mass = 0`).
    pub fn new(pos: DVec2, mass: f64, phase: Phase) -> Self {
        Self {
            pos,
            predicted: pos,
            vel: DVec2::ZERO,
            inv_mass: if mass == 0.0 { 0.0 } else { 1.0 / mass },
            phase,
            body: -1,
            s_friction: 0.0,
            k_friction: 0.0,
            mass_scale: 1.0,
            asleep: false,
        }
    }

    #[inline]
    pub fn is_immovable(&self) -> bool {
        self.inv_mass == 0.0
    }

    /// Predicted position before any projection. Immovables never move.
    #[inline]
    pub fn guess(&self, dt: f64) -> DVec2 {
        if self.inv_mass == 0.0 {
            self.pos
        } else {
            self.pos + dt * self.vel
        }
    }

    /// Recompute the stack mass scale `exp(-k * height)`.
    ///
    /// The scale multiplies *mass*, so contact projections divide
    /// `inv_mass` by it; particles lower in a stack end up with more
    /// effective mass and resist displacement more. The exponent is clamped
    /// so extreme domains cannot overflow.
    #[inline]
    pub fn scale_mass(&mut self, k: f64) {
        self.mass_scale = (-k * self.predicted.y).clamp(-30.0, 30.0).exp();
    }

    /// Effective inverse mass seen by contact constraints.
    #[inline]
    pub fn contact_inv_mass(&self) -> f64 {
        self.inv_mass / self.mass_scale
    }

    /// Commit the predicted position, or sleep.
    ///
    /// A particle that barely moved this tick is put to sleep: velocity
    /// zeroed, position kept. Any larger displacement wakes it.
    pub fn confirm_guess(&mut self, sleep_eps: f64) {
        if (self.predicted - self.pos).length() < sleep_eps {
            self.vel = DVec2::ZERO;
            self.asleep = true;
        } else {
            self.pos = self.predicted;
            self.asleep = false;
        }
    }
}
