// Network adapters: the authority's sync socket and action routes, and the observer's
// connector.

pub mod actions;
pub mod host;
pub mod observer;

pub use actions::{click_handler, material_handler, move_handler};
pub use host::ws_handler;
pub use observer::{ConnectError, LinkHandle, ObserverLink, connect};
