// Frameworks layer: runtime bootstrap, configuration and the physics engine adapter.

pub mod client;
pub mod config;
pub mod physics;
pub mod server;
