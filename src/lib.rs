// ============================================================================
// Hallpass Library
// ============================================================================

pub mod audit;
pub mod cache;
pub mod core;
pub mod data;
pub mod engine;
pub mod lock;
pub mod retry;
pub mod storage;

// Re-export main types for convenience
pub use crate::core::{
    tables, ActivePassRecord, AuditLogEntry, PassError, PassState, PassStatus, PermanentRecord,
    Result,
};
pub use engine::{EngineConfig, PassEngine, SweepCoordinator, SweepError, SweepReport};
pub use storage::{MemoryStore, TabularStore};

// Re-export collaborator API
pub use cache::TtlCache;
pub use data::{BellPeriod, BellSchedule, DataAccess, Settings, StaffDirectory, StaffKind};
pub use lock::AdvisoryLocks;
pub use retry::RetryPolicy;
