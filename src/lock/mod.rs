use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::core::{PassError, Result};

pub const DEFAULT_LOCK_TTL: Duration = Duration::from_millis(5000);

/// TTL-based per-key mutual-exclusion hint.
///
/// This is a throttle, not a true mutex: two callers racing within the same
/// window can both observe no lock and proceed. The lifecycle engine uses it
/// to reject rapid duplicate open requests for the same student.
pub struct AdvisoryLocks {
    held: Mutex<HashMap<String, Instant>>,
    ttl: Duration,
}

impl AdvisoryLocks {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_LOCK_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            held: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Grant the lock for `key` unless an unexpired grant already exists.
    pub fn acquire(&self, key: &str) -> Result<()> {
        let mut held = self.held.lock()?;
        let now = Instant::now();
        if let Some(acquired_at) = held.get(key) {
            if now.duration_since(*acquired_at) < self.ttl {
                return Err(PassError::RateLimited {
                    key: key.to_string(),
                });
            }
        }
        held.insert(key.to_string(), now);
        Ok(())
    }

    /// Idempotent release.
    pub fn release(&self, key: &str) -> Result<()> {
        self.held.lock()?.remove(key);
        Ok(())
    }
}

impl Default for AdvisoryLocks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_rate_limited() {
        let locks = AdvisoryLocks::new();
        locks.acquire("S1").unwrap();
        let err = locks.acquire("S1").unwrap_err();
        assert!(matches!(err, PassError::RateLimited { ref key } if key == "S1"));
        // other keys are unaffected
        locks.acquire("S2").unwrap();
    }

    #[test]
    fn release_allows_reacquire() {
        let locks = AdvisoryLocks::new();
        locks.acquire("S1").unwrap();
        locks.release("S1").unwrap();
        locks.release("S1").unwrap();
        locks.acquire("S1").unwrap();
    }

    #[test]
    fn expired_grant_is_reusable() {
        let locks = AdvisoryLocks::with_ttl(Duration::from_millis(20));
        locks.acquire("S1").unwrap();
        std::thread::sleep(Duration::from_millis(30));
        locks.acquire("S1").unwrap();
    }
}
