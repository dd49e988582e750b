use crate::domain::ports::{BodyId, BodyShape, PhysicsBackend};
use glam::Vec2;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub(crate) struct RecordedBody {
    pub center: Vec2,
    pub velocity: Vec2,
    pub sensor: Option<bool>,
}

// Backend with scripted contacts; integrates velocity with unit mass.
#[derive(Debug, Default)]
pub(crate) struct RecordingBackend {
    next_id: u64,
    pub bodies: HashMap<BodyId, RecordedBody>,
    pub impulses: Vec<(BodyId, Vec2)>,
    pub touching: Vec<(BodyId, BodyId)>,
    pub steps: Vec<f32>,
}

impl RecordingBackend {
    fn insert(&mut self, center: Vec2, sensor: Option<bool>) -> BodyId {
        self.next_id += 1;
        let id = BodyId(self.next_id);
        self.bodies.insert(
            id,
            RecordedBody {
                center,
                velocity: Vec2::ZERO,
                sensor,
            },
        );
        id
    }

    pub(crate) fn impulses_for(&self, body: BodyId) -> Vec<Vec2> {
        self.impulses
            .iter()
            .filter(|(b, _)| *b == body)
            .map(|(_, i)| *i)
            .collect()
    }

    /// `Some(is_sensor)` for static bodies, `None` if unknown or dynamic.
    pub(crate) fn sensor(&self, body: BodyId) -> Option<bool> {
        self.bodies.get(&body).and_then(|b| b.sensor)
    }
}

impl PhysicsBackend for RecordingBackend {
    fn create_dynamic_body(&mut self, center: Vec2, _shape: BodyShape) -> BodyId {
        self.insert(center, None)
    }

    fn create_static_body(&mut self, center: Vec2, _shape: BodyShape, sensor: bool) -> BodyId {
        self.insert(center, Some(sensor))
    }

    fn remove_body(&mut self, body: BodyId) {
        self.bodies.remove(&body);
        self.touching.retain(|&(a, b)| a != body && b != body);
    }

    fn set_velocity(&mut self, body: BodyId, velocity: Vec2) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.velocity = velocity;
        }
    }

    fn set_position(&mut self, body: BodyId, center: Vec2) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.center = center;
        }
    }

    fn apply_impulse(&mut self, body: BodyId, impulse: Vec2) {
        self.impulses.push((body, impulse));
        if let Some(b) = self.bodies.get_mut(&body) {
            b.velocity += impulse;
        }
    }

    fn position(&self, body: BodyId) -> Option<Vec2> {
        self.bodies.get(&body).map(|b| b.center)
    }

    fn step(&mut self, dt: f32) {
        self.steps.push(dt);
        for body in self.bodies.values_mut() {
            if body.sensor.is_none() {
                body.center += body.velocity * dt;
            }
        }
    }

    fn touching_pairs(&self) -> Vec<(BodyId, BodyId)> {
        self.touching.clone()
    }
}
