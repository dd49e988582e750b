// The single controlled player body.

use glam::Vec2;

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    /// Bottom-left corner in world coordinates.
    pub position: Vec2,

    /// Input-derived velocity in tiles per second.
    pub velocity: Vec2,

    /// Speed modifier applied on top of the input velocity.
    pub movement_multiplier: f32,

    /// Edge length; fixed for the lifetime of the player.
    size: f32,
}

impl Player {
    pub fn new(position: Vec2, size: f32) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            movement_multiplier: 1.0,
            size,
        }
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn center(&self) -> Vec2 {
        self.position + Vec2::splat(self.size / 2.0)
    }

    /// Velocity the physics body should move with this sub-step.
    pub fn body_velocity(&self) -> Vec2 {
        self.velocity * self.movement_multiplier
    }

    /// Stores the integrated body position; the body origin is centered.
    pub fn set_from_body(&mut self, body_center: Vec2) {
        self.position = body_center - Vec2::splat(self.size / 2.0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerSnapshot {
    pub x: f32,
    pub y: f32,
}

impl From<&Player> for PlayerSnapshot {
    fn from(p: &Player) -> Self {
        Self {
            x: p.position.x,
            y: p.position.y,
        }
    }
}
