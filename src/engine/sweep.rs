use serde::Serialize;
use std::sync::Arc;

use crate::core::{PassStatus, Result};
use crate::data::{BellPeriod, StaffDirectory, StaffKind};
use crate::engine::PassEngine;

/// Staff ID stamped on sweep-closed passes.
pub const SWEEP_STAFF_ID: &str = "SYSTEM";

#[derive(Debug, Clone, Serialize)]
pub struct SweepError {
    pub pass_id: String,
    pub error: String,
}

/// Aggregate outcome of a bulk closure; per-pass failures never abort the
/// remaining batch.
#[derive(Debug, Default, Serialize)]
pub struct SweepReport {
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<SweepError>,
}

/// Policy sweep over active passes at schedule-period transitions.
pub struct SweepCoordinator {
    engine: Arc<PassEngine>,
    directory: Arc<StaffDirectory>,
}

impl SweepCoordinator {
    pub fn new(engine: Arc<PassEngine>, directory: Arc<StaffDirectory>) -> Self {
        Self { engine, directory }
    }

    /// Close every active pass that should not survive the period boundary.
    ///
    /// An OUT pass always closes. An IN pass closes unless its assigned
    /// staff member is support staff with the period-override flag set; a
    /// staff ID that resolves to no directory record also closes.
    pub async fn auto_close_passes(
        &self,
        current_period: Option<&BellPeriod>,
        next_period: Option<&BellPeriod>,
    ) -> Result<SweepReport> {
        let passes = self.engine.all_active_passes().await?;
        tracing::info!(
            active = passes.len(),
            current_period = current_period.map(|p| p.period.as_str()).unwrap_or("-"),
            next_period = next_period.map(|p| p.period.as_str()).unwrap_or("-"),
            "period-change sweep started"
        );

        let mut marked = Vec::new();
        let mut lookup_failures = Vec::new();
        for pass in &passes {
            if pass.status == PassStatus::Out {
                marked.push(pass.pass_id.clone());
                continue;
            }
            match self.directory.lookup_by_id(&pass.current_staff_id).await {
                Ok(Some(entry)) if entry.kind == StaffKind::Support && entry.period_override() => {
                    tracing::debug!(
                        pass_id = %pass.pass_id,
                        staff_id = %pass.current_staff_id,
                        "support override keeps pass open across period change"
                    );
                }
                Ok(_) => marked.push(pass.pass_id.clone()),
                // a failed lookup must not cancel the sweep for every other
                // pass; leave this one open and report it
                Err(err) => {
                    tracing::error!(
                        pass_id = %pass.pass_id,
                        staff_id = %pass.current_staff_id,
                        error = %err,
                        "staff lookup failed during sweep, leaving pass open"
                    );
                    lookup_failures.push(SweepError {
                        pass_id: pass.pass_id.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        let notes = format!(
            "Auto-closed at period change {} -> {}",
            current_period.map(|p| p.period.as_str()).unwrap_or("-"),
            next_period.map(|p| p.period.as_str()).unwrap_or("-"),
        );
        let mut report = self.close_in_batches(&marked, SWEEP_STAFF_ID, &notes).await;
        report.failed += lookup_failures.len();
        report.errors.extend(lookup_failures);
        tracing::info!(
            succeeded = report.succeeded,
            failed = report.failed,
            "period-change sweep finished"
        );
        Ok(report)
    }

    /// Close an explicit list of passes on a staff member's behalf.
    pub async fn bulk_close_passes(
        &self,
        pass_ids: &[String],
        staff_id: &str,
        reason: &str,
    ) -> SweepReport {
        self.close_in_batches(pass_ids, staff_id, reason).await
    }

    /// Fixed-size batches with a pause in between to bound load on the
    /// storage substrate.
    async fn close_in_batches(&self, pass_ids: &[String], staff_id: &str, notes: &str) -> SweepReport {
        let mut report = SweepReport::default();
        let batch_size = self.engine.config().sweep_batch_size;
        let pause = self.engine.config().sweep_batch_pause;

        for (batch_index, batch) in pass_ids.chunks(batch_size).enumerate() {
            if batch_index > 0 {
                tokio::time::sleep(pause).await;
            }
            for pass_id in batch {
                match self.engine.close_pass(pass_id, staff_id, "", notes).await {
                    Ok(()) => report.succeeded += 1,
                    Err(err) => {
                        report.failed += 1;
                        report.errors.push(SweepError {
                            pass_id: pass_id.clone(),
                            error: err.to_string(),
                        });
                    }
                }
            }
        }
        report
    }
}
