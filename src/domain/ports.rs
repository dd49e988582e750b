use glam::Vec2;

/// Opaque handle to a body owned by a [`PhysicsBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u64);

/// Description of a square collider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyShape {
    pub half_extent: f32,
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
}

impl BodyShape {
    pub fn tile() -> Self {
        Self {
            half_extent: 0.5,
            density: 0.0,
            friction: 0.0,
            restitution: 0.0,
        }
    }
}

// Port for the rigid-body engine driven by the fixed-step simulation.
pub trait PhysicsBackend {
    /// Dynamic body with locked rotation, centered at `center`.
    fn create_dynamic_body(&mut self, center: Vec2, shape: BodyShape) -> BodyId;
    /// Static body; sensors report contacts but never collide.
    fn create_static_body(&mut self, center: Vec2, shape: BodyShape, sensor: bool) -> BodyId;
    fn remove_body(&mut self, body: BodyId);
    fn set_velocity(&mut self, body: BodyId, velocity: Vec2);
    fn set_position(&mut self, body: BodyId, center: Vec2);
    fn apply_impulse(&mut self, body: BodyId, impulse: Vec2);
    fn position(&self, body: BodyId) -> Option<Vec2>;
    /// Advances the integrator by exactly `dt` seconds.
    fn step(&mut self, dt: f32);
    /// Pairs currently overlapping (sensors) or in active contact (solids).
    fn touching_pairs(&self) -> Vec<(BodyId, BodyId)>;
}
