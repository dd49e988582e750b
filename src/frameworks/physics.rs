// Rapier-backed implementation of the physics port.

use crate::domain::ports::{BodyId, BodyShape, PhysicsBackend};
use crate::domain::{BlockRegistry, World, WorldTuning};
use glam::Vec2;
use rapier2d::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

pub struct RapierBackend {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,

    // Rapier handles are arena indices; keep them behind our own ids.
    handles: HashMap<BodyId, RigidBodyHandle>,
    ids: HashMap<RigidBodyHandle, BodyId>,
    next_id: u64,
}

impl Default for RapierBackend {
    fn default() -> Self {
        Self {
            // Top-down world: no gravity.
            gravity: vector![0.0, 0.0],
            integration_parameters: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            handles: HashMap::new(),
            ids: HashMap::new(),
            next_id: 0,
        }
    }
}

impl RapierBackend {
    fn register(&mut self, handle: RigidBodyHandle) -> BodyId {
        self.next_id += 1;
        let id = BodyId(self.next_id);
        self.handles.insert(id, handle);
        self.ids.insert(handle, id);
        id
    }

    fn body_of(&self, collider: ColliderHandle) -> Option<BodyId> {
        let parent = self.colliders.get(collider)?.parent()?;
        self.ids.get(&parent).copied()
    }

    fn body_mut(&mut self, body: BodyId) -> Option<&mut RigidBody> {
        let handle = *self.handles.get(&body)?;
        self.bodies.get_mut(handle)
    }
}

impl PhysicsBackend for RapierBackend {
    fn create_dynamic_body(&mut self, center: Vec2, shape: BodyShape) -> BodyId {
        let body = RigidBodyBuilder::dynamic()
            .translation(vector![center.x, center.y])
            .lock_rotations()
            .can_sleep(false)
            .build();
        let collider = ColliderBuilder::cuboid(shape.half_extent, shape.half_extent)
            .density(shape.density)
            .friction(shape.friction)
            .restitution(shape.restitution)
            .build();

        let handle = self.bodies.insert(body);
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        self.register(handle)
    }

    fn create_static_body(&mut self, center: Vec2, shape: BodyShape, sensor: bool) -> BodyId {
        let body = RigidBodyBuilder::fixed()
            .translation(vector![center.x, center.y])
            .build();
        let collider = ColliderBuilder::cuboid(shape.half_extent, shape.half_extent)
            .density(shape.density)
            .friction(shape.friction)
            .restitution(shape.restitution)
            .sensor(sensor)
            .build();

        let handle = self.bodies.insert(body);
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        self.register(handle)
    }

    fn remove_body(&mut self, body: BodyId) {
        let Some(handle) = self.handles.remove(&body) else {
            return;
        };
        self.ids.remove(&handle);
        self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    fn set_velocity(&mut self, body: BodyId, velocity: Vec2) {
        if let Some(b) = self.body_mut(body) {
            b.set_linvel(vector![velocity.x, velocity.y], true);
        }
    }

    fn set_position(&mut self, body: BodyId, center: Vec2) {
        if let Some(b) = self.body_mut(body) {
            b.set_translation(vector![center.x, center.y], true);
        }
    }

    fn apply_impulse(&mut self, body: BodyId, impulse: Vec2) {
        if let Some(b) = self.body_mut(body) {
            b.apply_impulse(vector![impulse.x, impulse.y], true);
        }
    }

    fn position(&self, body: BodyId) -> Option<Vec2> {
        let handle = self.handles.get(&body)?;
        let t = self.bodies.get(*handle)?.translation();
        Some(Vec2::new(t.x, t.y))
    }

    fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    fn touching_pairs(&self) -> Vec<(BodyId, BodyId)> {
        let sensors = self
            .narrow_phase
            .intersection_pairs()
            .filter(|(_, _, intersecting)| *intersecting)
            .map(|(c1, c2, _)| (c1, c2));
        let solids = self
            .narrow_phase
            .contact_pairs()
            .filter(|pair| pair.has_any_active_contact)
            .map(|pair| (pair.collider1, pair.collider2));

        sensors
            .chain(solids)
            .filter_map(|(c1, c2)| Some((self.body_of(c1)?, self.body_of(c2)?)))
            .collect()
    }
}

impl World<RapierBackend> {
    /// Generates the world for `seed` with default tuning and a Rapier simulation.
    pub fn new(seed: u64, registry: Arc<BlockRegistry>) -> Self {
        World::with_backend(
            seed,
            WorldTuning::default(),
            registry,
            RapierBackend::default(),
        )
    }
}
