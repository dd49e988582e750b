// The authority role: owns the only live simulation and publishes its deltas.

use super::types::{AuthorityCommand, ObserverFeed, SyncMessage};
use crate::domain::{BlockTypeId, Direction, PhysicsBackend, TileVector, World};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{Notify, broadcast, mpsc};
use tracing::{debug, info};

pub struct Authority<B> {
    world: World<B>,
    sync_tx: broadcast::Sender<SyncMessage>,
    ticks: u64,
}

impl<B: PhysicsBackend> Authority<B> {
    pub fn new(world: World<B>, sync_tx: broadcast::Sender<SyncMessage>) -> Self {
        Self {
            world,
            sync_tx,
            ticks: 0,
        }
    }

    pub fn world(&self) -> &World<B> {
        &self.world
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Observer sockets still holding a subscription.
    pub fn observer_count(&self) -> usize {
        self.sync_tx.receiver_count()
    }

    pub fn handle(&mut self, command: AuthorityCommand) {
        match command {
            AuthorityCommand::MapClicked {
                position,
                remove,
                block_type,
                direction,
            } => {
                self.map_clicked(position, remove, block_type, direction);
            }
            AuthorityCommand::Move { direction } => self.world.set_player_input(direction),
            AuthorityCommand::AddMaterial { position } => {
                self.add_material(position);
            }
            AuthorityCommand::ObserverJoined { reply } => {
                let feed = self.observer_feed();
                let catch_up = feed.catch_up.len();
                if reply.send(feed).is_err() {
                    debug!("observer left before catch-up");
                } else {
                    info!(catch_up, "observer joined");
                }
            }
        }
    }

    /// Edits the local world first, then publishes the matching delta.
    /// Returns the published message; nothing when the click changed nothing.
    pub fn map_clicked(
        &mut self,
        position: TileVector,
        remove: bool,
        block_type: BlockTypeId,
        direction: Direction,
    ) -> Option<SyncMessage> {
        let was_occupied = self.world.block_at(position).is_some();
        let message = match self.world.map_clicked(position, remove, block_type, direction) {
            Some(block) => Some(SyncMessage::BlockPlaced(block)),
            None if remove && was_occupied && self.world.block_at(position).is_none() => {
                Some(SyncMessage::BlockRemoved(position))
            }
            None => None,
        };

        match &message {
            Some(msg) => self.publish(msg.clone()),
            None => debug!(%position, remove, "click changed nothing"),
        }
        message
    }

    /// Adds one unit of material, then republishes the whole block so live observers
    /// hold the same stock a late joiner would receive.
    pub fn add_material(&mut self, position: TileVector) -> Option<u32> {
        let Some(amount) = self.world.add_material(position) else {
            debug!(%position, "no block to add material to");
            return None;
        };
        debug!(%position, amount, "material added");

        if let Some(block) = self.world.block_at(position).cloned() {
            self.publish(SyncMessage::BlockRemoved(position));
            self.publish(SyncMessage::BlockPlaced(block));
        }
        Some(amount)
    }

    /// Seed, the edits made since generation and the current player position,
    /// plus a subscription to everything published after them.
    pub fn observer_feed(&self) -> ObserverFeed {
        let mut catch_up = vec![SyncMessage::Seed(self.world.seed())];
        catch_up.extend(
            self.world
                .edits_since_generation()
                .into_iter()
                .map(SyncMessage::from),
        );
        catch_up.push(SyncMessage::EntityState(self.world.player().into()));

        ObserverFeed {
            catch_up,
            updates: self.sync_tx.subscribe(),
        }
    }

    /// Steps the simulation and publishes the player position, moved or not.
    pub fn step(&mut self, delta_time: f32) {
        self.world.tick(delta_time);
        self.ticks += 1;
        self.publish(SyncMessage::EntityState(self.world.player().into()));
    }

    pub fn shutdown(&self) {
        self.publish(SyncMessage::Disconnected);
    }

    fn publish(&self, message: SyncMessage) {
        // No receivers just means no observers are connected.
        let _ = self.sync_tx.send(message);
    }
}

/// Drives the authority at a fixed tick interval until `shutdown` fires or every
/// command sender is gone. Returns the authority for inspection.
pub async fn authority_task<B: PhysicsBackend>(
    mut authority: Authority<B>,
    mut command_rx: mpsc::Receiver<AuthorityCommand>,
    tick_interval: Duration,
    shutdown: Arc<Notify>,
) -> Authority<B> {
    let mut interval = tokio::time::interval(tick_interval);
    let mut last_tick = Instant::now();

    info!(seed = authority.world.seed(), "authority started");

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                break;
            }
            _ = interval.tick() => {}
        }

        // Apply queued edits before stepping so physics sees current geometry.
        let mut commands_closed = false;
        loop {
            match command_rx.try_recv() {
                Ok(command) => authority.handle(command),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    commands_closed = true;
                    break;
                }
            }
        }

        let now = Instant::now();
        authority.step(now.duration_since(last_tick).as_secs_f32());
        last_tick = now;

        if commands_closed {
            info!("command channel closed");
            break;
        }
    }

    authority.shutdown();
    info!(ticks = authority.ticks, "authority stopped");
    authority
}
