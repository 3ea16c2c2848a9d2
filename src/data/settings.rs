use std::sync::Arc;

use crate::core::{tables, Result};
use crate::data::DataAccess;

/// Read-mostly system settings, cached five minutes.
///
/// Administrative toggles (emergency mode, developer mode) write the table
/// out-of-band and then call `invalidate` so the next read sees the change.
pub struct Settings {
    data: Arc<DataAccess>,
}

impl Settings {
    pub fn new(data: Arc<DataAccess>) -> Self {
        Self { data }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let rows = self.data.table_objects(tables::SETTINGS).await?;
        Ok(rows
            .iter()
            .find(|r| r.get("settingKey").map(String::as_str) == Some(key))
            .and_then(|r| r.get("settingValue").cloned()))
    }

    pub async fn emergency_mode(&self) -> Result<bool> {
        Ok(self.get("emergencyMode").await?.as_deref() == Some("TRUE"))
    }

    /// Minutes after which a transition gets the LD flag, if configured.
    pub async fn long_duration_threshold(&self) -> Result<Option<f64>> {
        Ok(self
            .get("longDurationThreshold")
            .await?
            .and_then(|v| v.parse::<f64>().ok()))
    }

    pub async fn system_timezone(&self) -> Result<Option<String>> {
        self.get("systemTimezone").await
    }

    pub async fn day_type(&self) -> Result<Option<String>> {
        self.get("dayType").await
    }

    pub fn invalidate(&self) -> Result<()> {
        self.data.invalidate(tables::SETTINGS)
    }
}
