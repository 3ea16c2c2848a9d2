use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::audit::{Archive, AuditLog};
use crate::cache::{student_pass_key, TtlCache, ACTIVE_PASSES_KEY, STAFF_VIEW_PREFIX};
use crate::core::{
    tables, ActivePassRecord, AuditLogEntry, PassError, PassState, PassStatus, PermanentRecord,
    Result, RESTROOM,
};
use crate::data::{DataAccess, Settings};
use crate::engine::EngineConfig;
use crate::lock::AdvisoryLocks;
use crate::retry::RetryPolicy;
use crate::storage::TabularStore;

/// The pass lifecycle engine.
///
/// Owns the Active Passes table: opens, updates and closes pass records,
/// appends one audit entry per transition, archives closed passes, and keeps
/// the caches coherent with a write-then-invalidate discipline. Duplicate
/// open requests are throttled per student with an advisory lock.
///
/// # Examples
///
/// ```
/// use hallpass::{MemoryStore, PassEngine, PassStatus};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(MemoryStore::new());
/// store.bootstrap_standard_tables().await;
///
/// let engine = PassEngine::new(store);
/// let pass_id = engine.open_pass("S1", "T1", "MEDIA", "").await?;
///
/// engine
///     .update_pass_status(&pass_id, PassStatus::In, "MEDIA", "T2", "", "")
///     .await?;
/// engine.close_pass(&pass_id, "T2", "", "done").await?;
///
/// assert!(engine.current_student_pass("S1").await?.is_none());
/// # Ok(())
/// # }
/// ```
pub struct PassEngine {
    store: Arc<dyn TabularStore>,
    cache: Arc<TtlCache>,
    locks: AdvisoryLocks,
    retry: RetryPolicy,
    settings: Arc<Settings>,
    data: Arc<DataAccess>,
    audit: AuditLog,
    archive: Archive,
    config: EngineConfig,
}

impl PassEngine {
    pub fn new(store: Arc<dyn TabularStore>) -> Self {
        Self::with_config(store, EngineConfig::new())
    }

    pub fn with_config(store: Arc<dyn TabularStore>, config: EngineConfig) -> Self {
        let cache = Arc::new(TtlCache::new());
        let retry = RetryPolicy::new(config.max_retries, config.base_delay);
        let data = Arc::new(DataAccess::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            retry.clone(),
        ));
        let settings = Arc::new(Settings::new(Arc::clone(&data)));
        let audit = AuditLog::new(Arc::clone(&store), retry.clone());
        let archive = Archive::new(Arc::clone(&store), retry.clone());
        Self {
            store,
            cache,
            locks: AdvisoryLocks::with_ttl(config.lock_ttl),
            retry,
            settings,
            data,
            audit,
            archive,
            config,
        }
    }

    pub fn settings(&self) -> Arc<Settings> {
        Arc::clone(&self.settings)
    }

    pub fn data(&self) -> Arc<DataAccess> {
        Arc::clone(&self.data)
    }

    pub fn cache(&self) -> Arc<TtlCache> {
        Arc::clone(&self.cache)
    }

    pub(crate) fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Open a new pass for `student_id`.
    ///
    /// Rejected while emergency mode is active, while an advisory lock for
    /// the student is held, or while the student already has an active pass.
    /// The lock is released on success and failure alike.
    pub async fn open_pass(
        &self,
        student_id: &str,
        origin_staff_id: &str,
        destination_id: &str,
        notes: &str,
    ) -> Result<String> {
        let started = Instant::now();
        let result = self
            .open_pass_inner(student_id, origin_staff_id, destination_id, notes)
            .await;
        match &result {
            Ok(pass_id) => tracing::info!(
                operation = "openPass",
                student_id,
                destination_id,
                pass_id = %pass_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "pass opened"
            ),
            Err(err) => tracing::error!(
                operation = "openPass",
                student_id,
                origin_staff_id,
                destination_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                error = %err,
                "pass operation failed"
            ),
        }
        result
    }

    async fn open_pass_inner(
        &self,
        student_id: &str,
        origin_staff_id: &str,
        destination_id: &str,
        notes: &str,
    ) -> Result<String> {
        self.ensure_not_emergency().await?;
        self.locks.acquire(student_id)?;
        let result = self
            .open_pass_locked(student_id, origin_staff_id, destination_id, notes)
            .await;
        self.locks.release(student_id)?;
        result
    }

    async fn open_pass_locked(
        &self,
        student_id: &str,
        origin_staff_id: &str,
        destination_id: &str,
        notes: &str,
    ) -> Result<String> {
        if let Some(existing) = self.current_student_pass(student_id).await? {
            return Err(PassError::DuplicateActivePass {
                student_id: student_id.to_string(),
                existing_pass_id: existing.pass_id,
            });
        }

        let record = ActivePassRecord {
            pass_id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            origin_staff_id: origin_staff_id.to_string(),
            current_staff_id: String::new(),
            destination_id: destination_id.to_string(),
            leg_id: 1,
            state: PassState::Open,
            status: PassStatus::Out,
            start_time: Utc::now(),
        };

        let row = record.to_row();
        self.retry
            .with_retry("activePasses.appendRow", || {
                let store = Arc::clone(&self.store);
                let row = row.clone();
                async move { store.append_row(tables::ACTIVE_PASSES, row).await }
            })
            .await?;

        self.audit
            .append(&AuditLogEntry {
                timestamp: record.start_time,
                pass_id: record.pass_id.clone(),
                leg_id: 1,
                student_id: student_id.to_string(),
                state: PassState::Open,
                status: PassStatus::Out,
                staff_id: origin_staff_id.to_string(),
                destination_id: destination_id.to_string(),
                flag: String::new(),
                notes: notes.to_string(),
            })
            .await?;

        self.invalidate_after_membership_change(student_id)?;
        Ok(record.pass_id)
    }

    /// Record a leg transition on an active pass.
    ///
    /// A restroom-destined pass may only be closed: it can neither return
    /// (`IN`) nor move to another location.
    pub async fn update_pass_status(
        &self,
        pass_id: &str,
        status: PassStatus,
        location_id: &str,
        staff_id: &str,
        flag: &str,
        notes: &str,
    ) -> Result<()> {
        let started = Instant::now();
        let result = self
            .update_pass_status_inner(pass_id, status, location_id, staff_id, flag, notes)
            .await;
        match &result {
            Ok(()) => tracing::info!(
                operation = "updatePassStatus",
                pass_id,
                status = status.as_str(),
                location_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "pass updated"
            ),
            Err(err) => tracing::error!(
                operation = "updatePassStatus",
                pass_id,
                status = status.as_str(),
                location_id,
                staff_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                error = %err,
                "pass operation failed"
            ),
        }
        result
    }

    async fn update_pass_status_inner(
        &self,
        pass_id: &str,
        status: PassStatus,
        location_id: &str,
        staff_id: &str,
        flag: &str,
        notes: &str,
    ) -> Result<()> {
        self.ensure_not_emergency().await?;
        let mut record = self.resolve_pass(pass_id).await?;

        if record.destination_id.eq_ignore_ascii_case(RESTROOM) {
            if status == PassStatus::In {
                return Err(PassError::InvalidRestroomTransition {
                    pass_id: pass_id.to_string(),
                    reason: "restroom pass cannot be marked IN; close it instead".to_string(),
                });
            }
            if !location_id.eq_ignore_ascii_case(&record.destination_id) {
                return Err(PassError::InvalidRestroomTransition {
                    pass_id: pass_id.to_string(),
                    reason: format!(
                        "restroom pass cannot move to '{location_id}'; close it instead"
                    ),
                });
            }
        }

        let now = Utc::now();
        let elapsed_minutes = (now - record.start_time).num_seconds() as f64 / 60.0;
        let threshold = self.settings.long_duration_threshold().await?;
        let flag = augment_long_duration_flag(flag, elapsed_minutes, threshold);

        record.leg_id += 1;
        record.current_staff_id = staff_id.to_string();
        record.destination_id = location_id.to_string();
        record.status = status;

        self.write_active_row(pass_id, record.to_row()).await?;

        self.audit
            .append(&AuditLogEntry {
                timestamp: now,
                pass_id: pass_id.to_string(),
                leg_id: record.leg_id,
                student_id: record.student_id.clone(),
                state: PassState::Open,
                status,
                staff_id: staff_id.to_string(),
                destination_id: location_id.to_string(),
                flag,
                notes: notes.to_string(),
            })
            .await?;

        self.cache.invalidate(ACTIVE_PASSES_KEY)?;
        self.cache.invalidate(&student_pass_key(&record.student_id))?;
        Ok(())
    }

    /// Close an active pass: terminal audit entry, exactly one permanent
    /// record, then removal from the active store.
    pub async fn close_pass(
        &self,
        pass_id: &str,
        closing_staff_id: &str,
        flag: &str,
        notes: &str,
    ) -> Result<()> {
        let started = Instant::now();
        let result = self
            .close_pass_inner(pass_id, closing_staff_id, flag, notes)
            .await;
        match &result {
            Ok(()) => tracing::info!(
                operation = "closePass",
                pass_id,
                closing_staff_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "pass closed"
            ),
            Err(err) => tracing::error!(
                operation = "closePass",
                pass_id,
                closing_staff_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                error = %err,
                "pass operation failed"
            ),
        }
        result
    }

    async fn close_pass_inner(
        &self,
        pass_id: &str,
        closing_staff_id: &str,
        flag: &str,
        notes: &str,
    ) -> Result<()> {
        self.ensure_not_emergency().await?;
        let record = self.resolve_pass(pass_id).await?;

        let now = Utc::now();
        let total_minutes = (now - record.start_time).num_seconds() as f64 / 60.0;
        let threshold = self.settings.long_duration_threshold().await?;
        let flag = augment_long_duration_flag(flag, total_minutes, threshold);
        let final_leg = record.leg_id + 1;

        self.audit
            .append(&AuditLogEntry {
                timestamp: now,
                pass_id: pass_id.to_string(),
                leg_id: final_leg,
                student_id: record.student_id.clone(),
                state: PassState::Closed,
                status: PassStatus::In,
                staff_id: closing_staff_id.to_string(),
                destination_id: record.destination_id.clone(),
                flag: flag.clone(),
                notes: notes.to_string(),
            })
            .await?;

        self.archive
            .append(&PermanentRecord {
                pass_id: pass_id.to_string(),
                student_id: record.student_id.clone(),
                start_time: record.start_time,
                end_time: now,
                total_duration_minutes: total_minutes,
                origin_staff_id: record.origin_staff_id.clone(),
                final_destination_id: record.destination_id.clone(),
                leg_count: final_leg,
                flags: flag,
                notes: notes.to_string(),
            })
            .await?;

        self.delete_active_row(pass_id).await?;

        self.invalidate_after_membership_change(&record.student_id)?;
        Ok(())
    }

    /// The student's current pass, through the 30-second per-student cache.
    /// Only present passes are cached; absence always re-reads storage.
    pub async fn current_student_pass(&self, student_id: &str) -> Result<Option<ActivePassRecord>> {
        let key = student_pass_key(student_id);
        if let Some(cached) = self.cache.get(&key)? {
            match serde_json::from_value::<ActivePassRecord>(cached) {
                Ok(record) => return Ok(Some(record)),
                Err(_) => self.cache.invalidate(&key)?,
            }
        }

        let found = self
            .read_active_records()
            .await?
            .into_iter()
            .find(|r| r.student_id == student_id);

        if let Some(record) = &found {
            if let Ok(payload) = serde_json::to_value(record) {
                self.cache
                    .set(&key, payload, self.config.student_cache_ttl)?;
            }
        }
        Ok(found)
    }

    /// All active passes, through the 60-second bulk cache.
    pub async fn all_active_passes(&self) -> Result<Vec<ActivePassRecord>> {
        if let Some(cached) = self.cache.get(ACTIVE_PASSES_KEY)? {
            match serde_json::from_value::<Vec<ActivePassRecord>>(cached) {
                Ok(records) => return Ok(records),
                Err(_) => self.cache.invalidate(ACTIVE_PASSES_KEY)?,
            }
        }

        let records = self.read_active_records().await?;
        if let Ok(payload) = serde_json::to_value(&records) {
            self.cache
                .set(ACTIVE_PASSES_KEY, payload, self.config.active_cache_ttl)?;
        }
        Ok(records)
    }

    async fn ensure_not_emergency(&self) -> Result<()> {
        if self.settings.emergency_mode().await? {
            return Err(PassError::EmergencyModeActive);
        }
        Ok(())
    }

    async fn read_active_rows(&self) -> Result<Vec<Vec<String>>> {
        self.retry
            .with_retry("activePasses.readAll", || {
                let store = Arc::clone(&self.store);
                async move { store.read_all(tables::ACTIVE_PASSES).await }
            })
            .await
    }

    async fn read_active_records(&self) -> Result<Vec<ActivePassRecord>> {
        let rows = self.read_active_rows().await?;
        let mut records = Vec::with_capacity(rows.len().saturating_sub(1));
        for row in rows.into_iter().skip(1) {
            match ActivePassRecord::from_row(&row) {
                Ok(record) => records.push(record),
                Err(err) => tracing::warn!(
                    error = %err,
                    "skipping unreadable active pass row"
                ),
            }
        }
        Ok(records)
    }

    async fn resolve_pass(&self, pass_id: &str) -> Result<ActivePassRecord> {
        let rows = self.read_active_rows().await?;
        for row in rows.iter().skip(1) {
            if row.first().map(String::as_str) == Some(pass_id) {
                return ActivePassRecord::from_row(row);
            }
        }
        Err(PassError::PassNotFound(pass_id.to_string()))
    }

    /// Overwrite the record's row. The row position is re-resolved by
    /// `passID` inside the retried closure, so a concurrent deletion between
    /// read and write surfaces as `PassNotFound` rather than clobbering a
    /// neighboring row.
    async fn write_active_row(&self, pass_id: &str, row: Vec<String>) -> Result<()> {
        self.retry
            .with_retry("activePasses.updateRow", || {
                let store = Arc::clone(&self.store);
                let pass_id = pass_id.to_string();
                let row = row.clone();
                async move {
                    let index = locate_row(&store, &pass_id).await?;
                    store.update_row(tables::ACTIVE_PASSES, index, row).await
                }
            })
            .await
    }

    async fn delete_active_row(&self, pass_id: &str) -> Result<()> {
        self.retry
            .with_retry("activePasses.deleteRow", || {
                let store = Arc::clone(&self.store);
                let pass_id = pass_id.to_string();
                async move {
                    let index = locate_row(&store, &pass_id).await?;
                    store.delete_row(tables::ACTIVE_PASSES, index).await
                }
            })
            .await
    }

    /// Open and close change staff roster membership; in-place updates do not.
    fn invalidate_after_membership_change(&self, student_id: &str) -> Result<()> {
        self.cache.invalidate(ACTIVE_PASSES_KEY)?;
        self.cache.invalidate(&student_pass_key(student_id))?;
        self.cache.invalidate_prefix(STAFF_VIEW_PREFIX)?;
        Ok(())
    }
}

async fn locate_row(store: &Arc<dyn TabularStore>, pass_id: &str) -> Result<usize> {
    let rows = store.read_all(tables::ACTIVE_PASSES).await?;
    rows.iter()
        .enumerate()
        .skip(1)
        .find(|(_, row)| row.first().map(String::as_str) == Some(pass_id))
        .map(|(index, _)| index)
        .ok_or_else(|| PassError::PassNotFound(pass_id.to_string()))
}

/// Append the `LD` token to `flag` (space-joined, never duplicated) when the
/// elapsed minutes exceed the configured threshold.
pub fn augment_long_duration_flag(flag: &str, elapsed_minutes: f64, threshold: Option<f64>) -> String {
    match threshold {
        Some(limit) if elapsed_minutes > limit => {
            let mut tokens: Vec<&str> = flag.split_whitespace().collect();
            if !tokens.contains(&"LD") {
                tokens.push("LD");
            }
            tokens.join(" ")
        }
        _ => flag.to_string(),
    }
}
