// Fixed-timestep simulation layered over a pluggable rigid-body backend.

use super::block::{Block, BlockKind, BlockProperties, BlockRegistry};
use super::entity::Player;
use super::ports::{BodyId, BodyShape, PhysicsBackend};
use super::tile::TileVector;
use super::tuning::{PhysicsTuning, PlayerTuning};
use std::collections::{BTreeSet, HashMap};
use tracing::trace;

// Absorbs rounding when a frame is split into several smaller deltas.
const STEP_EPSILON: f32 = 1e-6;

/// What a physics body stands for in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyOwner {
    Player,
    Block(TileVector),
}

pub struct PhysicsSimulation<B> {
    backend: B,
    tuning: PhysicsTuning,
    player_body: BodyId,
    // Side table from body to the value owning it.
    owners: HashMap<BodyId, BodyOwner>,
    blocks: HashMap<TileVector, BodyId>,
    // Ordered so impulses are applied in a stable order every run.
    active_contacts: BTreeSet<(BodyId, BodyId)>,
    accumulator: f32,
    steps: u64,
}

impl<B: PhysicsBackend> PhysicsSimulation<B> {
    pub fn new(
        mut backend: B,
        tuning: PhysicsTuning,
        player: &Player,
        player_tuning: &PlayerTuning,
    ) -> Self {
        let shape = BodyShape {
            half_extent: player.size() / player_tuning.hitbox_scale,
            density: player_tuning.density,
            friction: player_tuning.friction,
            restitution: player_tuning.restitution,
        };
        let player_body = backend.create_dynamic_body(player.center(), shape);

        let mut owners = HashMap::new();
        owners.insert(player_body, BodyOwner::Player);

        Self {
            backend,
            tuning,
            player_body,
            owners,
            blocks: HashMap::new(),
            active_contacts: BTreeSet::new(),
            accumulator: 0.0,
            steps: 0,
        }
    }

    /// Adds a static body for the block unless its type is walkable.
    /// Returns whether a body was created.
    pub fn block_placed(&mut self, block: &Block, props: &BlockProperties) -> bool {
        if !props.has_body() {
            return false;
        }

        let position = block.position();
        // Never keep two bodies for one tile.
        self.block_removed(position);

        let body =
            self.backend
                .create_static_body(position.center(), BodyShape::tile(), props.is_sensor());
        self.blocks.insert(position, body);
        self.owners.insert(body, BodyOwner::Block(position));
        true
    }

    /// Detaches the body of the block at `position`, if it has one.
    pub fn block_removed(&mut self, position: TileVector) {
        let Some(body) = self.blocks.remove(&position) else {
            return;
        };
        self.owners.remove(&body);
        self.active_contacts.retain(|&(a, b)| a != body && b != body);
        self.backend.remove_body(body);
    }

    /// Moves the player body to match an externally set position.
    pub fn teleport_player(&mut self, player: &Player) {
        self.backend.set_position(self.player_body, player.center());
    }

    /// Advances the simulation by `delta_time` seconds of wall time and returns the
    /// number of fixed sub-steps that ran.
    pub fn tick(
        &mut self,
        delta_time: f32,
        player: &mut Player,
        grid: &HashMap<TileVector, Block>,
        registry: &BlockRegistry,
    ) -> u32 {
        let frame_time = delta_time.clamp(0.0, self.tuning.max_frame_time);
        self.accumulator += frame_time;

        let mut sub_steps = 0;
        while self.accumulator + STEP_EPSILON >= self.tuning.time_step {
            self.sub_step(player, grid, registry);
            self.accumulator -= self.tuning.time_step;
            sub_steps += 1;
        }
        sub_steps
    }

    fn sub_step(
        &mut self,
        player: &mut Player,
        grid: &HashMap<TileVector, Block>,
        registry: &BlockRegistry,
    ) {
        self.backend
            .set_velocity(self.player_body, player.body_velocity());
        self.apply_conveyors(grid, registry);
        self.backend.step(self.tuning.time_step);
        self.refresh_contacts();

        if let Some(center) = self.backend.position(self.player_body) {
            player.set_from_body(center);
        }
        self.steps += 1;
    }

    fn apply_conveyors(&mut self, grid: &HashMap<TileVector, Block>, registry: &BlockRegistry) {
        let mut impulses = Vec::new();
        for &(a, b) in &self.active_contacts {
            for (conveyor, other) in [(a, b), (b, a)] {
                let Some(BodyOwner::Block(position)) = self.owners.get(&conveyor) else {
                    continue;
                };
                // Static blocks never move; only the player can be pushed.
                if !matches!(self.owners.get(&other), Some(BodyOwner::Player)) {
                    continue;
                }
                let Some(block) = grid.get(position) else {
                    continue;
                };
                let Some(props) = block.properties(registry) else {
                    continue;
                };
                if props.kind == BlockKind::Conveyor && block.can_work(props) {
                    impulses.push((
                        other,
                        block.direction().unit() * self.tuning.conveyor_impulse,
                    ));
                }
            }
        }

        for (body, impulse) in impulses {
            self.backend.apply_impulse(body, impulse);
        }
    }

    fn refresh_contacts(&mut self) {
        let current: BTreeSet<(BodyId, BodyId)> = self
            .backend
            .touching_pairs()
            .into_iter()
            .filter(|(a, b)| self.owners.contains_key(a) && self.owners.contains_key(b))
            .map(|(a, b)| if a <= b { (a, b) } else { (b, a) })
            .collect();

        for pair in current.difference(&self.active_contacts) {
            trace!(step = self.steps, a = pair.0.0, b = pair.1.0, "contact began");
        }
        for pair in self.active_contacts.difference(&current) {
            trace!(step = self.steps, a = pair.0.0, b = pair.1.0, "contact ended");
        }
        self.active_contacts = current;
    }

    pub fn player_body(&self) -> BodyId {
        self.player_body
    }

    pub fn block_body(&self, position: TileVector) -> Option<BodyId> {
        self.blocks.get(&position).copied()
    }

    pub fn owner(&self, body: BodyId) -> Option<BodyOwner> {
        self.owners.get(&body).copied()
    }

    pub fn active_contact_count(&self) -> usize {
        self.active_contacts.len()
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[cfg(test)]
    pub(crate) fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::block::BlockTypeId;
    use crate::domain::test_support::RecordingBackend;
    use crate::domain::tile::Direction;
    use glam::Vec2;

    fn setup() -> (PhysicsSimulation<RecordingBackend>, Player, BlockRegistry) {
        let player = Player::new(Vec2::new(3.0, 3.0), 1.0);
        let sim = PhysicsSimulation::new(
            RecordingBackend::default(),
            PhysicsTuning::default(),
            &player,
            &PlayerTuning::default(),
        );
        (sim, player, BlockRegistry::default())
    }

    fn place(
        sim: &mut PhysicsSimulation<RecordingBackend>,
        grid: &mut HashMap<TileVector, Block>,
        registry: &BlockRegistry,
        block: Block,
    ) {
        let props = registry.get(block.block_type()).unwrap();
        sim.block_placed(&block, props);
        grid.insert(block.position(), block);
    }

    #[test]
    fn when_frame_is_split_into_small_deltas_then_same_number_of_steps_run() {
        let (mut split, mut p1, registry) = setup();
        let (mut whole, mut p2, _) = setup();
        let grid = HashMap::new();

        let split_steps: u32 = (0..4)
            .map(|_| split.tick(1.0 / 240.0, &mut p1, &grid, &registry))
            .sum();
        let whole_steps = whole.tick(1.0 / 60.0, &mut p2, &grid, &registry);

        assert_eq!(split_steps, 1);
        assert_eq!(whole_steps, 1);
    }

    #[test]
    fn when_frame_stalls_then_catch_up_is_clamped() {
        let (mut sim, mut player, registry) = setup();
        let steps = sim.tick(5.0, &mut player, &HashMap::new(), &registry);
        // 0.25s at 60Hz.
        assert_eq!(steps, 15);
    }

    #[test]
    fn when_player_rests_on_conveyor_then_impulse_is_applied_every_sub_step_until_contact_ends() {
        let (mut sim, mut player, registry) = setup();
        let mut grid = HashMap::new();
        let conveyor = Block::new(TileVector::new(3, 3), BlockTypeId::CONVEYOR, Direction::Right);
        place(&mut sim, &mut grid, &registry, conveyor);

        let player_body = sim.player_body();
        let conveyor_body = sim.block_body(TileVector::new(3, 3)).unwrap();
        sim.backend_mut().touching = vec![(conveyor_body, player_body)];

        // First sub-step discovers the contact, the next three push.
        for _ in 0..4 {
            sim.tick(1.0 / 60.0, &mut player, &grid, &registry);
        }
        let pushes = sim.backend().impulses_for(player_body);
        assert_eq!(pushes.len(), 3);
        assert!(pushes.iter().all(|i| *i == Vec2::new(3.0, 0.0)));

        // Contact ends during the next step; the one after gets nothing.
        sim.backend_mut().touching.clear();
        sim.tick(1.0 / 60.0, &mut player, &grid, &registry);
        assert_eq!(sim.backend().impulses_for(player_body).len(), 4);
        sim.tick(1.0 / 60.0, &mut player, &grid, &registry);
        assert_eq!(sim.backend().impulses_for(player_body).len(), 4);
        assert_eq!(sim.active_contact_count(), 0);
    }

    #[test]
    fn when_conveyor_lacks_material_then_no_impulse_is_applied() {
        let (mut sim, mut player, registry) = setup();
        let mut grid = HashMap::new();
        let conveyor = Block::new(
            TileVector::new(3, 3),
            BlockTypeId::POWERED_CONVEYOR,
            Direction::Up,
        );
        place(&mut sim, &mut grid, &registry, conveyor);
        let player_body = sim.player_body();
        let conveyor_body = sim.block_body(TileVector::new(3, 3)).unwrap();
        sim.backend_mut().touching = vec![(player_body, conveyor_body)];

        for _ in 0..3 {
            sim.tick(1.0 / 60.0, &mut player, &grid, &registry);
        }
        assert!(sim.backend().impulses_for(player_body).is_empty());
    }

    #[test]
    fn when_walkable_block_is_placed_then_no_body_is_created() {
        let (mut sim, _, registry) = setup();
        let floor = Block::new(TileVector::new(0, 0), BlockTypeId::FLOOR, Direction::Up);
        let created = sim.block_placed(&floor, registry.get(BlockTypeId::FLOOR).unwrap());
        assert!(!created);
        assert_eq!(sim.block_body(TileVector::new(0, 0)), None);
    }

    #[test]
    fn when_block_is_removed_then_body_and_owner_are_released() {
        let (mut sim, _, registry) = setup();
        let wall = Block::new(TileVector::new(1, 2), BlockTypeId::WALL, Direction::Up);
        sim.block_placed(&wall, registry.get(BlockTypeId::WALL).unwrap());
        let body = sim.block_body(TileVector::new(1, 2)).unwrap();
        assert_eq!(sim.owner(body), Some(BodyOwner::Block(TileVector::new(1, 2))));
        assert_eq!(sim.backend().sensor(body), Some(false));

        sim.block_removed(TileVector::new(1, 2));
        assert_eq!(sim.owner(body), None);
        assert!(sim.backend().sensor(body).is_none());
    }

    #[test]
    fn when_sub_step_runs_then_player_position_is_corner_anchored() {
        let (mut sim, mut player, registry) = setup();
        player.velocity = Vec2::new(6.0, 0.0);
        sim.tick(1.0 / 60.0, &mut player, &HashMap::new(), &registry);
        // Recording backend integrates velocity directly.
        assert!((player.position.x - 3.1).abs() < 1e-5);
        assert!((player.position.y - 3.0).abs() < 1e-5);
    }
}
