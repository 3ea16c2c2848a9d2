use thiserror::Error;

#[derive(Error, Debug)]
pub enum PassError {
    #[error("Student '{student_id}' already has an active pass ({existing_pass_id})")]
    DuplicateActivePass {
        student_id: String,
        existing_pass_id: String,
    },

    #[error("Invalid restroom transition for pass '{pass_id}': {reason}")]
    InvalidRestroomTransition { pass_id: String, reason: String },

    #[error("Rate limited: another request for '{key}' is in flight")]
    RateLimited { key: String },

    #[error("Pass not found: {0}")]
    PassNotFound(String),

    #[error("System is in emergency mode. Passes cannot be modified")]
    EmergencyModeActive,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Storage retries exhausted after {attempts} attempts: {last}")]
    StorageExhausted { attempts: u32, last: String },

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Lock error: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, PassError>;

impl PassError {
    /// Only substrate faults are worth retrying; domain rejections are final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl<T> From<std::sync::PoisonError<T>> for PassError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}
