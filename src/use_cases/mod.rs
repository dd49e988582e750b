// Use cases layer: the authority and observer roles and the messages between them.

pub mod authority;
pub mod observer;
pub mod types;

pub use authority::{Authority, authority_task};
pub use observer::{Observer, ObserverState, observer_task};
pub use types::{AuthorityCommand, ObserverEvent, ObserverFeed, SyncMessage};
