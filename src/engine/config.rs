use std::time::Duration;

use crate::lock::DEFAULT_LOCK_TTL;
use crate::retry::{DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES};

/// Engine tuning knobs.
///
/// Defaults match the documented behavior; batch size and pause are load
/// tunables, not correctness parameters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Advisory lock TTL for duplicate-open throttling
    pub lock_ttl: Duration,

    /// Maximum storage retries after the initial attempt
    pub max_retries: u32,

    /// Base delay for exponential backoff
    pub base_delay: Duration,

    /// Passes closed per sweep batch
    pub sweep_batch_size: usize,

    /// Pause between sweep batches
    pub sweep_batch_pause: Duration,

    /// TTL of the bulk active-pass cache entry
    pub active_cache_ttl: Duration,

    /// TTL of per-student current-pass cache entries
    pub student_cache_ttl: Duration,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            lock_ttl: DEFAULT_LOCK_TTL,
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            sweep_batch_size: 10,
            sweep_batch_pause: Duration::from_millis(500),
            active_cache_ttl: Duration::from_secs(60),
            student_cache_ttl: Duration::from_secs(30),
        }
    }

    pub fn lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    pub fn max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn sweep_batch_size(mut self, size: usize) -> Self {
        self.sweep_batch_size = size.max(1);
        self
    }

    pub fn sweep_batch_pause(mut self, pause: Duration) -> Self {
        self.sweep_batch_pause = pause;
        self
    }

    pub fn active_cache_ttl(mut self, ttl: Duration) -> Self {
        self.active_cache_ttl = ttl;
        self
    }

    pub fn student_cache_ttl(mut self, ttl: Duration) -> Self {
        self.student_cache_ttl = ttl;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
