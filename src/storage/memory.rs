use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::RwLock;

use crate::core::{PassError, Result};
use crate::storage::TabularStore;

/// In-memory tabular store for embedding and tests.
///
/// Tables are plain row vectors with the header at index 0, matching the
/// snapshot semantics of the `TabularStore` contract. A fail-injection
/// counter lets tests exercise the retry path.
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Vec<String>>>>,
    fail_next: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            fail_next: AtomicU32::new(0),
        }
    }

    /// Create `table` with the given header row, replacing any existing table.
    pub async fn create_table(&self, table: &str, header: &[&str]) {
        let mut tables = self.tables.write().await;
        tables.insert(
            table.to_string(),
            vec![header.iter().map(|h| h.to_string()).collect()],
        );
    }

    /// Append a row without going through the failure gate. Intended for
    /// seeding fixture data.
    pub async fn seed_row(&self, table: &str, row: Vec<String>) {
        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().push(row);
    }

    /// Overwrite a single cell in place. Lets tests age a record by
    /// rewriting its stored timestamp.
    pub async fn set_cell(&self, table: &str, row_index: usize, col: usize, value: &str) {
        let mut tables = self.tables.write().await;
        if let Some(rows) = tables.get_mut(table) {
            if let Some(row) = rows.get_mut(row_index) {
                if let Some(cell) = row.get_mut(col) {
                    *cell = value.to_string();
                }
            }
        }
    }

    /// Create the full set of system tables with their standard headers.
    pub async fn bootstrap_standard_tables(&self) {
        use crate::core::{tables, ActivePassRecord, AuditLogEntry, PermanentRecord};

        self.create_table(tables::ACTIVE_PASSES, &ActivePassRecord::HEADER)
            .await;
        self.create_table(tables::PASS_LOG, &AuditLogEntry::HEADER)
            .await;
        self.create_table(tables::PERMANENT_RECORD, &PermanentRecord::HEADER)
            .await;
        self.create_table(tables::SETTINGS, &["settingKey", "settingValue"])
            .await;
        self.create_table(
            tables::BELL_SCHEDULE,
            &["period", "startTime", "endTime", "dayType"],
        )
        .await;
        self.create_table(tables::TEACHERS, &["staffID", "staffName", "staffEmail"])
            .await;
        self.create_table(
            tables::SUPPORT,
            &["staffID", "staffName", "staffEmail", "periodOverride"],
        )
        .await;
        self.create_table(tables::ADMINS, &["staffID", "staffName", "staffEmail"])
            .await;
    }

    /// Make the next `n` store operations fail with a retryable error.
    pub fn fail_next_ops(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    fn check_failure_gate(&self) -> Result<()> {
        let remaining =
            self.fail_next
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                    if n > 0 {
                        Some(n - 1)
                    } else {
                        None
                    }
                });
        if remaining.is_ok() {
            return Err(PassError::Storage("injected storage failure".into()));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TabularStore for MemoryStore {
    async fn read_all(&self, table: &str) -> Result<Vec<Vec<String>>> {
        self.check_failure_gate()?;
        let tables = self.tables.read().await;
        tables
            .get(table)
            .cloned()
            .ok_or_else(|| PassError::Storage(format!("table '{table}' not found")))
    }

    async fn append_row(&self, table: &str, row: Vec<String>) -> Result<()> {
        self.check_failure_gate()?;
        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| PassError::Storage(format!("table '{table}' not found")))?;
        rows.push(row);
        Ok(())
    }

    async fn update_row(&self, table: &str, row_index: usize, row: Vec<String>) -> Result<()> {
        self.check_failure_gate()?;
        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| PassError::Storage(format!("table '{table}' not found")))?;
        if row_index == 0 || row_index >= rows.len() {
            return Err(PassError::Storage(format!(
                "row index {row_index} out of range for table '{table}'"
            )));
        }
        rows[row_index] = row;
        Ok(())
    }

    async fn delete_row(&self, table: &str, row_index: usize) -> Result<()> {
        self.check_failure_gate()?;
        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| PassError::Storage(format!("table '{table}' not found")))?;
        if row_index == 0 || row_index >= rows.len() {
            return Err(PassError::Storage(format!(
                "row index {row_index} out of range for table '{table}'"
            )));
        }
        rows.remove(row_index);
        Ok(())
    }
}
