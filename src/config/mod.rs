//! Configuration: data model, YAML loading, and validation (spec §6).

mod loader;
mod model;
mod validate;

pub use loader::load;
pub use model::{
    AllocationStrategy, Config, CrossSeedConfig, GlobalConfig, LoggingConfig, QbitConfig,
    RollbackConfig, TrackerConfigEntry,
};
pub use validate::validate;
