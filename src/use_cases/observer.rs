// The observer role: mirrors the authority's world from the replicated message stream.

use super::types::{ObserverEvent, SyncMessage};
use crate::domain::{BlockRegistry, PhysicsBackend, World, WorldTuning};
use glam::Vec2;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverState {
    /// Transport handshake in progress.
    Connecting,
    /// No server answered. Terminal.
    ConnectFailed,
    /// Connected; no world exists until the seed arrives.
    AwaitingSeed,
    Synced,
    /// Disconnected by the authority or the transport. Terminal.
    TornDown,
}

impl ObserverState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ObserverState::ConnectFailed | ObserverState::TornDown)
    }
}

pub struct Observer<B> {
    state: ObserverState,
    world: Option<World<B>>,
    registry: Arc<BlockRegistry>,
    tuning: WorldTuning,
    applied: u64,
    dropped: u64,
}

impl<B: PhysicsBackend + Default> Observer<B> {
    pub fn new(registry: Arc<BlockRegistry>) -> Self {
        Self::with_tuning(registry, WorldTuning::default())
    }

    /// The tuning must match the authority's for the generated worlds to agree.
    pub fn with_tuning(registry: Arc<BlockRegistry>, tuning: WorldTuning) -> Self {
        Self {
            state: ObserverState::Connecting,
            world: None,
            registry,
            tuning,
            applied: 0,
            dropped: 0,
        }
    }

    pub fn state(&self) -> ObserverState {
        self.state
    }

    /// The mirrored world; only present while synced.
    pub fn world(&self) -> Option<&World<B>> {
        self.world.as_ref()
    }

    pub fn applied(&self) -> u64 {
        self.applied
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn connected(&mut self) {
        if self.state == ObserverState::Connecting {
            self.transition(ObserverState::AwaitingSeed);
        }
    }

    pub fn connect_failed(&mut self) {
        if self.state == ObserverState::Connecting {
            self.transition(ObserverState::ConnectFailed);
        }
    }

    /// Local teardown; the world stops updating and is released.
    pub fn tear_down(&mut self) {
        if !self.state.is_terminal() {
            self.world = None;
            self.transition(ObserverState::TornDown);
        }
    }

    pub fn receive(&mut self, event: ObserverEvent) {
        let message = match event {
            ObserverEvent::TransportClosed => {
                if self.state != ObserverState::ConnectFailed {
                    self.tear_down();
                }
                return;
            }
            ObserverEvent::Message(message) => message,
        };

        match (self.state, message) {
            (ObserverState::AwaitingSeed, SyncMessage::Seed(seed)) => {
                self.world = Some(World::with_backend(
                    seed,
                    self.tuning,
                    self.registry.clone(),
                    B::default(),
                ));
                self.applied += 1;
                info!(seed, "world received");
                self.transition(ObserverState::Synced);
            }
            (ObserverState::AwaitingSeed | ObserverState::Synced, SyncMessage::Disconnected) => {
                self.tear_down();
            }
            (ObserverState::Synced, message) => self.apply(message),
            (state, message) => {
                // Pre-seed traffic is dropped, never buffered.
                self.dropped += 1;
                debug!(?state, ?message, "message dropped");
            }
        }
    }

    fn apply(&mut self, message: SyncMessage) {
        let Some(world) = self.world.as_mut() else {
            return;
        };

        match message {
            SyncMessage::EntityState(snapshot) => {
                world.set_player_position(Vec2::new(snapshot.x, snapshot.y));
            }
            SyncMessage::BlockPlaced(block) => {
                let position = block.position();
                if world.add_block(block).is_none() {
                    warn!(%position, "replicated placement conflicted");
                }
            }
            SyncMessage::BlockRemoved(position) => {
                if world.remove_block(position).is_none() {
                    debug!(%position, "replicated removal on empty tile");
                }
            }
            SyncMessage::Seed(seed) => {
                // The seed is only ever sent once.
                self.dropped += 1;
                debug!(seed, "repeated seed dropped");
                return;
            }
            SyncMessage::Disconnected => return,
        }
        self.applied += 1;
    }

    /// Applies every queued event. Runs on the frame loop only.
    pub fn pump(&mut self, inbox: &mut mpsc::Receiver<ObserverEvent>) -> usize {
        let mut handled = 0;
        while !self.state.is_terminal() {
            match inbox.try_recv() {
                Ok(event) => {
                    self.receive(event);
                    handled += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.receive(ObserverEvent::TransportClosed);
                    break;
                }
            }
        }
        handled
    }

    fn transition(&mut self, next: ObserverState) {
        info!(from = ?self.state, to = ?next, "observer state changed");
        self.state = next;
    }
}

/// Drains the inbox once per frame until the observer reaches a terminal state.
pub async fn observer_task<B: PhysicsBackend + Default>(
    mut observer: Observer<B>,
    mut inbox: mpsc::Receiver<ObserverEvent>,
    frame_interval: Duration,
    summary_every: u64,
) -> Observer<B> {
    let mut interval = tokio::time::interval(frame_interval);
    let mut frame: u64 = 0;

    while !observer.state().is_terminal() {
        interval.tick().await;
        observer.pump(&mut inbox);
        frame += 1;

        if summary_every > 0 && frame % summary_every == 0 {
            if let Some(world) = observer.world() {
                let p = world.player().position;
                info!(
                    frame,
                    blocks = world.block_count(),
                    x = p.x,
                    y = p.y,
                    applied = observer.applied(),
                    dropped = observer.dropped(),
                    "observer summary"
                );
            }
        }
    }

    observer
}
