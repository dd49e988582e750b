// Wire protocol DTOs and conversions for the authority -> observer stream and the
// local action routes.

use crate::domain::{Block, BlockTypeId, Direction, PlayerSnapshot, TileVector};
use crate::use_cases::SyncMessage;
use serde::{Deserialize, Serialize};

/// One text frame on the sync socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WireMessage {
    Seed { seed: u64 },
    EntityState { x: f32, y: f32 },
    BlockPlaced(BlockDto),
    BlockRemoved(TileDto),
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectionDto {
    Up,
    Right,
    Down,
    Left,
}

impl From<Direction> for DirectionDto {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Up => DirectionDto::Up,
            Direction::Right => DirectionDto::Right,
            Direction::Down => DirectionDto::Down,
            Direction::Left => DirectionDto::Left,
        }
    }
}

impl From<DirectionDto> for Direction {
    fn from(direction: DirectionDto) -> Self {
        match direction {
            DirectionDto::Up => Direction::Up,
            DirectionDto::Right => Direction::Right,
            DirectionDto::Down => Direction::Down,
            DirectionDto::Left => Direction::Left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileDto {
    pub x: i32,
    pub y: i32,
}

impl From<TileVector> for TileDto {
    fn from(tile: TileVector) -> Self {
        Self {
            x: tile.x,
            y: tile.y,
        }
    }
}

impl From<TileDto> for TileVector {
    fn from(tile: TileDto) -> Self {
        TileVector::new(tile.x, tile.y)
    }
}

/// Full block value; replicated placements rebuild the block exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDto {
    pub block_type: u16,
    pub x: i32,
    pub y: i32,
    pub direction: DirectionDto,
    #[serde(default)]
    pub material_amount: u32,
}

impl From<&Block> for BlockDto {
    fn from(block: &Block) -> Self {
        Self {
            block_type: block.block_type().0,
            x: block.position().x,
            y: block.position().y,
            direction: block.direction().into(),
            material_amount: block.material_amount(),
        }
    }
}

impl From<BlockDto> for Block {
    fn from(block: BlockDto) -> Self {
        Block::from_parts(
            TileVector::new(block.x, block.y),
            BlockTypeId(block.block_type),
            block.direction.into(),
            block.material_amount,
        )
    }
}

impl From<&SyncMessage> for WireMessage {
    fn from(message: &SyncMessage) -> Self {
        match message {
            SyncMessage::Seed(seed) => WireMessage::Seed { seed: *seed },
            SyncMessage::EntityState(snapshot) => WireMessage::EntityState {
                x: snapshot.x,
                y: snapshot.y,
            },
            SyncMessage::BlockPlaced(block) => WireMessage::BlockPlaced(block.into()),
            SyncMessage::BlockRemoved(position) => WireMessage::BlockRemoved((*position).into()),
            SyncMessage::Disconnected => WireMessage::Disconnected,
        }
    }
}

impl From<WireMessage> for SyncMessage {
    fn from(message: WireMessage) -> Self {
        match message {
            WireMessage::Seed { seed } => SyncMessage::Seed(seed),
            WireMessage::EntityState { x, y } => SyncMessage::EntityState(PlayerSnapshot { x, y }),
            WireMessage::BlockPlaced(block) => SyncMessage::BlockPlaced(block.into()),
            WireMessage::BlockRemoved(tile) => SyncMessage::BlockRemoved(tile.into()),
            WireMessage::Disconnected => SyncMessage::Disconnected,
        }
    }
}

/// `POST /actions/click`: a click already translated to a tile.
#[derive(Debug, Clone, Deserialize)]
pub struct ClickRequest {
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub remove: bool,
    // Block type name from the property table; required when placing.
    #[serde(default)]
    pub block: Option<String>,
    #[serde(default)]
    pub direction: Option<DirectionDto>,
}

/// `POST /actions/move`: movement input; (0, 0) stops.
#[derive(Debug, Clone, Deserialize)]
pub struct MoveRequest {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
}

/// `POST /actions/material`: feed one unit of material into a block.
#[derive(Debug, Clone, Deserialize)]
pub struct MaterialRequest {
    pub x: i32,
    pub y: i32,
}
