// Use-case level inputs/outputs for the authority and observer loops.

use crate::domain::{Block, BlockTypeId, Direction, PlayerSnapshot, TileVector, WorldEdit};
use glam::Vec2;
use tokio::sync::{broadcast, oneshot};

/// Everything the authority replicates to observers, in send order.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncMessage {
    /// World generation seed. Always first, sent once per observer.
    Seed(u64),
    EntityState(PlayerSnapshot),
    BlockPlaced(Block),
    BlockRemoved(TileVector),
    /// The authority is going away.
    Disconnected,
}

impl From<WorldEdit> for SyncMessage {
    fn from(edit: WorldEdit) -> Self {
        match edit {
            WorldEdit::Placed(block) => SyncMessage::BlockPlaced(block),
            WorldEdit::Removed(position) => SyncMessage::BlockRemoved(position),
        }
    }
}

/// Inputs consumed by the authority world task between ticks.
#[derive(Debug)]
pub enum AuthorityCommand {
    MapClicked {
        position: TileVector,
        remove: bool,
        block_type: BlockTypeId,
        direction: Direction,
    },
    Move {
        direction: Vec2,
    },
    AddMaterial {
        position: TileVector,
    },
    /// A new observer connected and needs the catch-up sequence.
    ObserverJoined {
        reply: oneshot::Sender<ObserverFeed>,
    },
}

/// What a newly joined observer receives: the messages that rebuild the current
/// world, then every delta published after them.
#[derive(Debug)]
pub struct ObserverFeed {
    pub catch_up: Vec<SyncMessage>,
    pub updates: broadcast::Receiver<SyncMessage>,
}

/// Events handed from the transport to the observer's frame loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverEvent {
    Message(SyncMessage),
    TransportClosed,
}
