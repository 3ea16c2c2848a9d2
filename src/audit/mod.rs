use std::sync::Arc;

use crate::core::{tables, AuditLogEntry, PermanentRecord, Result};
use crate::retry::RetryPolicy;
use crate::storage::TabularStore;

/// Append-only writer for the per-transition pass trail.
///
/// Entries are never updated or deleted once written.
pub struct AuditLog {
    store: Arc<dyn TabularStore>,
    retry: RetryPolicy,
}

impl AuditLog {
    pub fn new(store: Arc<dyn TabularStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub async fn append(&self, entry: &AuditLogEntry) -> Result<()> {
        let row = entry.to_row();
        self.retry
            .with_retry("auditLog.append", || {
                let store = Arc::clone(&self.store);
                let row = row.clone();
                async move { store.append_row(tables::PASS_LOG, row).await }
            })
            .await?;
        tracing::debug!(
            pass_id = %entry.pass_id,
            leg_id = entry.leg_id,
            state = entry.state.as_str(),
            status = entry.status.as_str(),
            "audit entry appended"
        );
        Ok(())
    }
}

/// Writes one summary record per closed pass.
pub struct Archive {
    store: Arc<dyn TabularStore>,
    retry: RetryPolicy,
}

impl Archive {
    pub fn new(store: Arc<dyn TabularStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub async fn append(&self, record: &PermanentRecord) -> Result<()> {
        let row = record.to_row();
        self.retry
            .with_retry("archive.append", || {
                let store = Arc::clone(&self.store);
                let row = row.clone();
                async move { store.append_row(tables::PERMANENT_RECORD, row).await }
            })
            .await?;
        tracing::debug!(
            pass_id = %record.pass_id,
            duration_minutes = record.total_duration_minutes,
            "pass archived"
        );
        Ok(())
    }
}
