use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::core::Result;

/// Cache key for the bulk active-pass snapshot.
pub const ACTIVE_PASSES_KEY: &str = "ACTIVE_PASSES";
/// Key prefix for per-student current-pass entries.
pub const STUDENT_PASS_PREFIX: &str = "STUDENT_PASS_";
/// Key prefix for per-staff derived views (rosters), invalidated on open/close.
pub const STAFF_VIEW_PREFIX: &str = "STAFF_VIEW_";

pub fn student_pass_key(student_id: &str) -> String {
    format!("{STUDENT_PASS_PREFIX}{student_id}")
}

struct CacheEntry {
    value: Value,
    expire_at: Instant,
}

/// TTL-based read-through cache over JSON values.
///
/// Entries are evicted lazily: an expired entry is dropped the next time it
/// is read, never by a background task.
pub struct TtlCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl TtlCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut entries = self.entries.lock()?;
        match entries.get(key) {
            Some(entry) if entry.expire_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock()?;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expire_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    /// Idempotent removal of a single key.
    pub fn invalidate(&self, key: &str) -> Result<()> {
        self.entries.lock()?.remove(key);
        Ok(())
    }

    /// Remove every entry whose key starts with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) -> Result<()> {
        self.entries.lock()?.retain(|k, _| !k.starts_with(prefix));
        Ok(())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new()
    }
}
