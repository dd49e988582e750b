// Block model: grid occupants and the immutable per-type property table.

use super::tile::{Direction, TileVector};
use serde::Deserialize;

/// Index into the [`BlockRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockTypeId(pub u16);

impl BlockTypeId {
    // Indices of the built-in table.
    pub const WALL: BlockTypeId = BlockTypeId(0);
    pub const CONVEYOR: BlockTypeId = BlockTypeId(1);
    pub const FLOOR: BlockTypeId = BlockTypeId(2);
    pub const ROCK: BlockTypeId = BlockTypeId(3);
    pub const POWERED_CONVEYOR: BlockTypeId = BlockTypeId(4);
}

/// How a block behaves during a simulation sub-step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    #[default]
    Plain,
    Conveyor,
}

/// How a block takes part in the physics simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collision {
    /// Static obstacle.
    Solid,
    /// Non-colliding trigger; still reports contacts.
    Sensor,
    /// Walkable; no physics body at all.
    Passable,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlockProperties {
    pub name: String,
    #[serde(default)]
    pub kind: BlockKind,
    pub collision: Collision,
    /// Whether a player click may remove it. Generated terrain blocks are not.
    #[serde(default = "default_removable")]
    pub removable: bool,
    /// Material the block needs in stock to do any work.
    #[serde(default)]
    pub material_required: Option<String>,
    pub texture: String,
}

fn default_removable() -> bool {
    true
}

impl BlockProperties {
    pub fn is_sensor(&self) -> bool {
        self.collision == Collision::Sensor
    }

    pub fn has_body(&self) -> bool {
        self.collision != Collision::Passable
    }

    pub fn texture_path(&self) -> String {
        format!("textures/{}.png", self.texture)
    }
}

/// Process-wide block property table. Built once at startup and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlockRegistry {
    #[serde(rename = "block")]
    blocks: Vec<BlockProperties>,
}

impl BlockRegistry {
    pub fn new(blocks: Vec<BlockProperties>) -> Self {
        Self { blocks }
    }

    pub fn get(&self, id: BlockTypeId) -> Option<&BlockProperties> {
        self.blocks.get(usize::from(id.0))
    }

    pub fn find(&self, name: &str) -> Option<BlockTypeId> {
        self.blocks
            .iter()
            .position(|b| b.name == name)
            .and_then(|i| u16::try_from(i).ok())
            .map(BlockTypeId)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        let block = |name: &str, kind, collision, removable, material: Option<&str>| {
            BlockProperties {
                name: name.to_string(),
                kind,
                collision,
                removable,
                material_required: material.map(str::to_string),
                texture: name.to_string(),
            }
        };

        // Order must match the BlockTypeId constants.
        Self::new(vec![
            block("wall", BlockKind::Plain, Collision::Solid, true, None),
            block("conveyor", BlockKind::Conveyor, Collision::Sensor, true, None),
            block("floor", BlockKind::Plain, Collision::Passable, true, None),
            block("rock", BlockKind::Plain, Collision::Solid, false, None),
            block(
                "powered_conveyor",
                BlockKind::Conveyor,
                Collision::Sensor,
                true,
                Some("coal"),
            ),
        ])
    }
}

/// A single grid occupant.
///
/// `block_type`, `position` and `direction` are fixed at creation; only the
/// material stock changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    block_type: BlockTypeId,
    position: TileVector,
    direction: Direction,
    material_amount: u32,
}

impl Block {
    pub fn new(position: TileVector, block_type: BlockTypeId, direction: Direction) -> Self {
        Self {
            block_type,
            position,
            direction,
            material_amount: 0,
        }
    }

    /// Rebuilds a block from its full replicated value.
    pub fn from_parts(
        position: TileVector,
        block_type: BlockTypeId,
        direction: Direction,
        material_amount: u32,
    ) -> Self {
        Self {
            block_type,
            position,
            direction,
            material_amount,
        }
    }

    pub fn block_type(&self) -> BlockTypeId {
        self.block_type
    }

    pub fn position(&self) -> TileVector {
        self.position
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn material_amount(&self) -> u32 {
        self.material_amount
    }

    pub fn properties<'a>(&self, registry: &'a BlockRegistry) -> Option<&'a BlockProperties> {
        registry.get(self.block_type)
    }

    /// Work is anything a block does during a sub-step, e.g. pushing bodies.
    pub fn can_work(&self, props: &BlockProperties) -> bool {
        props.material_required.is_none() || self.material_amount > 0
    }

    pub(crate) fn increment_material(&mut self) -> u32 {
        self.material_amount = self.material_amount.saturating_add(1);
        self.material_amount
    }
}
