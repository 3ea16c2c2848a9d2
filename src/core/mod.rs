pub mod error;
pub mod types;

pub use error::{PassError, Result};
pub use types::{
    tables, sanitize_cell, ActivePassRecord, AuditLogEntry, PassState, PassStatus,
    PermanentRecord, RESTROOM,
};
