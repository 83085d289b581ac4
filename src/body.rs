use ultraviolet::Vec2;

/// A point mass with a collision radius.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Body {
    /// Position vector.
    pub pos: Vec2,
    /// Velocity vector.
    pub vel: Vec2,
    /// Acceleration from the last attract phase.
    pub acc: Vec2,
    /// Mass of the body.
    pub mass: f32,
    /// Collision radius of the body.
    pub radius: f32,
}

impl Default for Body {
    fn default() -> Self {
        Self::new(Vec2::zero(), Vec2::zero(), 1.0, 1.0)
    }
}

impl Body {
    /// Creates a new Body with the given properties.
    /// Initial acceleration is zero.
    pub fn new(pos: Vec2, vel: Vec2, mass: f32, radius: f32) -> Self {
        Self {
            pos,
            vel,
            acc: Vec2::zero(),
            mass,
            radius,
        }
    }

    /// Creates a body whose radius follows its mass (`radius = cbrt(mass)`),
    /// the sizing used for externally spawned bodies.
    pub fn with_mass(pos: Vec2, vel: Vec2, mass: f32) -> Self {
        Self::new(pos, vel, mass, mass.cbrt())
    }

    /// Advances velocity then position by `dt` (semi-implicit Euler).
    pub fn update(&mut self, dt: f32) {
        self.vel += self.acc * dt;
        self.pos += self.vel * dt;
    }

    /// Linear momentum `m * v`.
    pub fn momentum(&self) -> Vec2 {
        self.vel * self.mass
    }
}
