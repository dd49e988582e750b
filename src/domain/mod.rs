// Domain layer: core simulation types and rules.

pub mod block;
pub mod entity;
pub mod physics;
pub mod ports;
pub mod tile;
pub mod tuning;
pub mod world;
pub mod worldgen;

#[cfg(test)]
pub(crate) mod test_support;

pub use block::{Block, BlockKind, BlockProperties, BlockRegistry, BlockTypeId, Collision};
pub use entity::{Player, PlayerSnapshot};
pub use ports::{BodyId, BodyShape, PhysicsBackend};
pub use tile::{Direction, TileVector};
pub use tuning::WorldTuning;
pub use world::{World, WorldEdit};
