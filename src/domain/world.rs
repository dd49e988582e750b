// The world: tile grid, controlled player and the physics simulation driving them.

use super::block::{Block, BlockRegistry, BlockTypeId};
use super::entity::Player;
use super::physics::PhysicsSimulation;
use super::ports::PhysicsBackend;
use super::tile::{Direction, TileVector};
use super::tuning::WorldTuning;
use super::worldgen::{self, GeneratedMap, MapBounds, Terrain};
use glam::Vec2;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Name of the block type generated as natural terrain.
pub const NATURAL_BLOCK: &str = "rock";

/// A single change to the tile grid.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEdit {
    Placed(Block),
    Removed(TileVector),
}

pub struct World<B> {
    seed: u64,
    tuning: WorldTuning,
    registry: Arc<BlockRegistry>,
    map: GeneratedMap,
    blocks: HashMap<TileVector, Block>,
    // Blocks as generated from the seed; late joiners receive the difference.
    generated: HashMap<TileVector, Block>,
    player: Player,
    physics: PhysicsSimulation<B>,
}

impl<B: PhysicsBackend> World<B> {
    /// Generates the world for `seed`. Identical seeds give identical worlds.
    pub fn with_backend(
        seed: u64,
        tuning: WorldTuning,
        registry: Arc<BlockRegistry>,
        backend: B,
    ) -> Self {
        let map = worldgen::generate(seed, &tuning.map);
        let player = Player::new(map.spawn.to_world(), tuning.player.size);
        let physics = PhysicsSimulation::new(backend, tuning.physics, &player, &tuning.player);

        let mut world = Self {
            seed,
            tuning,
            registry,
            map,
            blocks: HashMap::new(),
            generated: HashMap::new(),
            player,
            physics,
        };

        match world.registry.find(NATURAL_BLOCK) {
            Some(rock) => {
                for position in world.map.rocks.clone() {
                    world.place_block(position, rock, Direction::default());
                }
            }
            None => warn!(block = NATURAL_BLOCK, "natural block type missing; map has no rocks"),
        }
        world.generated = world.blocks.clone();

        debug!(
            seed,
            rocks = world.generated.len(),
            spawn = %world.map.spawn,
            "world generated"
        );
        world
    }

    /// Places a new block. Returns nothing if the tile is occupied, outside the map
    /// or the type is unknown.
    pub fn place_block(
        &mut self,
        position: TileVector,
        block_type: BlockTypeId,
        direction: Direction,
    ) -> Option<Block> {
        self.add_block(Block::new(position, block_type, direction))
    }

    /// Inserts a block by full value, e.g. one replicated from the authority.
    pub fn add_block(&mut self, block: Block) -> Option<Block> {
        let position = block.position();
        if !self.map.bounds.contains(position) {
            debug!(%position, "edit outside map ignored");
            return None;
        }
        if self.blocks.contains_key(&position) {
            debug!(%position, "tile occupied; place ignored");
            return None;
        }
        let Some(props) = self.registry.get(block.block_type()) else {
            debug!(%position, block_type = block.block_type().0, "unknown block type");
            return None;
        };

        self.physics.block_placed(&block, props);
        self.blocks.insert(position, block.clone());
        Some(block)
    }

    /// Removes and returns the block at `position`, if any.
    pub fn remove_block(&mut self, position: TileVector) -> Option<Block> {
        let block = self.blocks.remove(&position)?;
        self.physics.block_removed(position);
        Some(block)
    }

    /// Turns a click on the map into a place or remove.
    ///
    /// Returns the placed block; nothing if a block was removed or nothing changed.
    /// Blocks whose type is not removable survive remove clicks.
    pub fn map_clicked(
        &mut self,
        position: TileVector,
        remove: bool,
        block_type: BlockTypeId,
        direction: Direction,
    ) -> Option<Block> {
        if !remove {
            return self.place_block(position, block_type, direction);
        }

        let removable = self
            .blocks
            .get(&position)
            .and_then(|b| b.properties(&self.registry))
            .is_some_and(|props| props.removable);
        if removable {
            self.remove_block(position);
        }
        None
    }

    /// Advances the player through the physics simulation.
    pub fn tick(&mut self, delta_time: f32) -> u32 {
        self.physics
            .tick(delta_time, &mut self.player, &self.blocks, &self.registry)
    }

    /// Sets the movement input; `direction` is normalized and scaled by the player speed.
    pub fn set_player_input(&mut self, direction: Vec2) {
        self.player.velocity = direction.normalize_or_zero() * self.tuning.player.speed;
    }

    pub fn set_movement_multiplier(&mut self, multiplier: f32) {
        self.player.movement_multiplier = multiplier;
    }

    /// Mirrors an authoritative position without simulating.
    pub fn set_player_position(&mut self, position: Vec2) {
        self.player.position = position;
        self.physics.teleport_player(&self.player);
    }

    /// Adds one unit of material to the block at `position`.
    pub fn add_material(&mut self, position: TileVector) -> Option<u32> {
        self.blocks
            .get_mut(&position)
            .map(|block| block.increment_material())
    }

    /// Edits that turn a freshly generated world for this seed into this one.
    pub fn edits_since_generation(&self) -> Vec<WorldEdit> {
        let mut removed: Vec<TileVector> = self
            .generated
            .iter()
            .filter(|(pos, block)| self.blocks.get(*pos) != Some(*block))
            .map(|(pos, _)| *pos)
            .collect();
        let mut placed: Vec<&Block> = self
            .blocks
            .iter()
            .filter(|(pos, block)| self.generated.get(*pos) != Some(*block))
            .map(|(_, block)| block)
            .collect();

        removed.sort_by_key(|p| (p.x, p.y));
        placed.sort_by_key(|b| (b.position().x, b.position().y));

        removed
            .into_iter()
            .map(WorldEdit::Removed)
            .chain(placed.into_iter().cloned().map(WorldEdit::Placed))
            .collect()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn block_at(&self, position: TileVector) -> Option<&Block> {
        self.blocks.get(&position)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn terrain_at(&self, position: TileVector) -> Option<Terrain> {
        self.map.terrain_at(position)
    }

    pub fn bounds(&self) -> MapBounds {
        self.map.bounds
    }

    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    pub fn physics(&self) -> &PhysicsSimulation<B> {
        &self.physics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_support::RecordingBackend;

    fn world(seed: u64) -> World<RecordingBackend> {
        World::with_backend(
            seed,
            WorldTuning::default(),
            Arc::new(BlockRegistry::default()),
            RecordingBackend::default(),
        )
    }

    fn sorted_blocks(world: &World<RecordingBackend>) -> Vec<Block> {
        let mut blocks: Vec<Block> = world.blocks().cloned().collect();
        blocks.sort_by_key(|b| (b.position().x, b.position().y));
        blocks
    }

    #[test]
    fn when_two_worlds_share_a_seed_then_grids_and_spawn_match() {
        let a = world(1234);
        let b = world(1234);
        assert_eq!(sorted_blocks(&a), sorted_blocks(&b));
        assert_eq!(a.player(), b.player());
        assert!(a.bounds().tiles().all(|t| a.terrain_at(t) == b.terrain_at(t)));
    }

    #[test]
    fn when_block_is_placed_on_empty_tile_then_lookup_and_remove_return_it() {
        let mut w = world(5);
        let p = TileVector::new(3, 3);
        let placed = w.place_block(p, BlockTypeId::CONVEYOR, Direction::Right);
        assert!(placed.is_some());

        let found = w.block_at(p).cloned().unwrap();
        assert_eq!(found.block_type(), BlockTypeId::CONVEYOR);
        assert_eq!(found.direction(), Direction::Right);

        assert_eq!(w.remove_block(p), Some(found));
        assert!(w.block_at(p).is_none());
        assert!(w.physics().block_body(p).is_none());
    }

    #[test]
    fn when_tile_is_occupied_then_place_is_a_no_op() {
        let mut w = world(5);
        let p = TileVector::new(1, 0);
        w.place_block(p, BlockTypeId::WALL, Direction::Up).unwrap();
        assert!(w.place_block(p, BlockTypeId::CONVEYOR, Direction::Left).is_none());
        assert_eq!(w.block_at(p).unwrap().block_type(), BlockTypeId::WALL);
    }

    #[test]
    fn when_removing_from_empty_tile_then_nothing_changes_twice() {
        let mut w = world(5);
        let before = sorted_blocks(&w);
        assert!(w.remove_block(TileVector::new(0, 1)).is_none());
        assert!(w.remove_block(TileVector::new(0, 1)).is_none());
        assert_eq!(sorted_blocks(&w), before);
    }

    #[test]
    fn when_placing_outside_map_or_unknown_type_then_nothing_is_placed() {
        let mut w = world(5);
        assert!(
            w.place_block(TileVector::new(500, 0), BlockTypeId::WALL, Direction::Up)
                .is_none()
        );
        assert!(
            w.place_block(TileVector::new(0, 0), BlockTypeId(99), Direction::Up)
                .is_none()
        );
    }

    #[test]
    fn when_map_is_clicked_then_place_returns_block_and_remove_returns_nothing() {
        let mut w = world(9);
        let p = TileVector::new(-2, 4);
        let placed = w.map_clicked(p, false, BlockTypeId::WALL, Direction::Down);
        assert_eq!(placed.as_ref().map(Block::position), Some(p));

        assert!(w.map_clicked(p, true, BlockTypeId::WALL, Direction::Down).is_none());
        assert!(w.block_at(p).is_none());
    }

    #[test]
    fn when_natural_rock_is_clicked_for_removal_then_it_survives() {
        let mut w = world(42);
        let Some(rock) = w.generated.keys().next().copied() else {
            return;
        };
        assert!(w.map_clicked(rock, true, BlockTypeId::WALL, Direction::Up).is_none());
        assert!(w.block_at(rock).is_some());
    }

    #[test]
    fn when_world_is_edited_then_edits_since_generation_describe_the_difference() {
        let mut w = world(42);
        assert!(w.edits_since_generation().is_empty());

        let p = TileVector::new(2, 2);
        let placed = w.place_block(p, BlockTypeId::CONVEYOR, Direction::Up).unwrap();
        w.place_block(TileVector::new(-1, -1), BlockTypeId::WALL, Direction::Up);
        w.remove_block(TileVector::new(-1, -1));
        assert_eq!(w.edits_since_generation(), vec![WorldEdit::Placed(placed)]);

        if let Some(rock) = w.generated.keys().next().copied() {
            w.remove_block(rock);
            assert_eq!(w.edits_since_generation()[0], WorldEdit::Removed(rock));
        }
    }

    #[test]
    fn when_material_is_added_then_stock_increases() {
        let mut w = world(3);
        let p = TileVector::new(0, 2);
        w.place_block(p, BlockTypeId::POWERED_CONVEYOR, Direction::Left);
        assert_eq!(w.add_material(p), Some(1));
        assert_eq!(w.add_material(p), Some(2));
        assert_eq!(w.add_material(TileVector::new(0, 3)), None);
    }

    #[test]
    fn when_input_is_set_then_velocity_is_normalized_and_scaled() {
        let mut w = world(3);
        w.set_player_input(Vec2::new(3.0, 4.0));
        let v = w.player().velocity;
        assert!((v.length() - WorldTuning::default().player.speed).abs() < 1e-5);
    }

    #[test]
    fn when_movement_multiplier_is_halved_then_player_covers_half_the_distance() {
        let mut w = world(3);
        let start = w.player().position;
        w.set_player_input(Vec2::X);
        w.set_movement_multiplier(0.5);
        assert_eq!(w.tick(1.0 / 60.0), 1);

        let expected = WorldTuning::default().player.speed * 0.5 / 60.0;
        assert!((w.player().position.x - start.x - expected).abs() < 1e-5);
    }
}
