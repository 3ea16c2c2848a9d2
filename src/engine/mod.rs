pub mod config;
pub mod lifecycle;
pub mod sweep;

pub use config::EngineConfig;
pub use lifecycle::{augment_long_duration_flag, PassEngine};
pub use sweep::{SweepCoordinator, SweepError, SweepReport, SWEEP_STAFF_ID};
