pub mod directory;
pub mod schedule;
pub mod settings;

pub use directory::{StaffDirectory, StaffDirectoryEntry, StaffKind};
pub use schedule::{BellPeriod, BellSchedule};
pub use settings::Settings;

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::TtlCache;
use crate::core::Result;
use crate::retry::RetryPolicy;
use crate::storage::TabularStore;

/// TTL for cached reference tables (settings, schedule, staff rosters).
pub const TABLE_CACHE_TTL: Duration = Duration::from_secs(300);

/// Read-mostly access to reference tables, cached whole under the table name.
///
/// Rows come back as column-name -> value maps built from the header row,
/// so reference tables can grow columns without breaking lookups.
pub struct DataAccess {
    store: Arc<dyn TabularStore>,
    cache: Arc<TtlCache>,
    retry: RetryPolicy,
}

impl DataAccess {
    pub fn new(store: Arc<dyn TabularStore>, cache: Arc<TtlCache>, retry: RetryPolicy) -> Self {
        Self {
            store,
            cache,
            retry,
        }
    }

    pub async fn table_objects(&self, table: &str) -> Result<Vec<HashMap<String, String>>> {
        if let Some(cached) = self.cache.get(table)? {
            match serde_json::from_value::<Vec<HashMap<String, String>>>(cached) {
                Ok(objects) => return Ok(objects),
                // corrupt payload: treat as a miss and drop it
                Err(_) => self.cache.invalidate(table)?,
            }
        }

        let rows = self
            .retry
            .with_retry("data.readAll", || {
                let store = Arc::clone(&self.store);
                let table = table.to_string();
                async move { store.read_all(&table).await }
            })
            .await?;

        let mut iter = rows.into_iter();
        let headers = iter.next().unwrap_or_default();
        let objects: Vec<HashMap<String, String>> = iter
            .map(|row| {
                headers
                    .iter()
                    .cloned()
                    .zip(row.into_iter())
                    .collect::<HashMap<_, _>>()
            })
            .collect();

        let payload = serde_json::to_value(&objects)
            .unwrap_or(Value::Null);
        if payload != Value::Null {
            self.cache.set(table, payload, TABLE_CACHE_TTL)?;
        }
        Ok(objects)
    }

    /// Drop the cached copy of `table`, forcing the next read to hit storage.
    pub fn invalidate(&self, table: &str) -> Result<()> {
        self.cache.invalidate(table)
    }
}
