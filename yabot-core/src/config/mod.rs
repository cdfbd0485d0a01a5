//! Runtime-tunable configuration shared between the server and the
//! background processors.

pub mod config_store;
pub mod economy;
pub mod sweeper;

pub use config_store::{ConfigStore, ConfigWatcher};
pub use economy::EconomyConfig;
pub use sweeper::SweeperConfig;
