// Grid coordinates and facing directions shared by the world and the wire protocol.

use glam::Vec2;
use std::fmt;

/// Integer grid coordinates of a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TileVector {
    pub x: i32,
    pub y: i32,
}

impl TileVector {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Tile containing the given continuous world position.
    pub fn from_world(position: Vec2) -> Self {
        Self {
            x: position.x.floor() as i32,
            y: position.y.floor() as i32,
        }
    }

    /// Bottom-left corner of the tile in world coordinates.
    pub fn to_world(self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }

    pub fn center(self) -> Vec2 {
        self.to_world() + Vec2::splat(0.5)
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Squared euclidean distance in tiles.
    pub fn distance_squared(self, other: TileVector) -> i64 {
        let dx = i64::from(self.x - other.x);
        let dy = i64::from(self.y - other.y);
        dx * dx + dy * dy
    }
}

impl fmt::Display for TileVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The direction a block is facing. Only some block kinds (conveyors) act on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    Up,
    #[default]
    Right,
    Down,
    Left,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    /// Rotation in degrees; right = 0, counter-clockwise.
    pub fn to_degrees(self) -> u16 {
        match self {
            Direction::Up => 90,
            Direction::Right => 0,
            Direction::Down => 270,
            Direction::Left => 180,
        }
    }

    pub fn unit(self) -> Vec2 {
        match self {
            Direction::Up => Vec2::Y,
            Direction::Right => Vec2::X,
            Direction::Down => Vec2::NEG_Y,
            Direction::Left => Vec2::NEG_X,
        }
    }
}
