pub mod domain;
pub mod frameworks;
pub mod interface_adapters;
pub mod use_cases;

pub use frameworks::client::{run_observer, run_observer_with_config};
pub use frameworks::physics::RapierBackend;
pub use frameworks::server::{HostSettings, run, run_with_config};
