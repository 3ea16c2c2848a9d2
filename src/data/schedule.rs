use chrono::{FixedOffset, Local, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::{tables, Result};
use crate::data::{DataAccess, Settings};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BellPeriod {
    pub period: String,
    /// Wall-clock "HH:mm"; periods are resolved by string comparison.
    pub start_time: String,
    pub end_time: String,
    pub day_type: String,
}

/// Ordered bell schedule, filtered by the configured day type.
pub struct BellSchedule {
    data: Arc<DataAccess>,
    settings: Arc<Settings>,
}

impl BellSchedule {
    pub fn new(data: Arc<DataAccess>, settings: Arc<Settings>) -> Self {
        Self { data, settings }
    }

    pub async fn periods(&self) -> Result<Vec<BellPeriod>> {
        let rows = self.data.table_objects(tables::BELL_SCHEDULE).await?;
        let day_type = self.settings.day_type().await?;
        Ok(rows
            .into_iter()
            .map(|r| BellPeriod {
                period: r.get("period").cloned().unwrap_or_default(),
                start_time: r.get("startTime").cloned().unwrap_or_default(),
                end_time: r.get("endTime").cloned().unwrap_or_default(),
                day_type: r.get("dayType").cloned().unwrap_or_default(),
            })
            .filter(|p| match &day_type {
                Some(dt) => p.day_type == *dt,
                None => true,
            })
            .collect())
    }

    pub async fn current_period(&self) -> Result<Option<BellPeriod>> {
        let now = self.wall_clock_hhmm().await?;
        Ok(current_period_at(&self.periods().await?, &now))
    }

    pub async fn next_period(&self) -> Result<Option<BellPeriod>> {
        let now = self.wall_clock_hhmm().await?;
        Ok(next_period_at(&self.periods().await?, &now))
    }

    /// "HH:mm" in the configured timezone (fixed-offset string such as
    /// "-05:00"); falls back to local time when unset or unparseable.
    async fn wall_clock_hhmm(&self) -> Result<String> {
        let tz = self.settings.system_timezone().await?;
        let formatted = match tz.and_then(|s| s.parse::<FixedOffset>().ok()) {
            Some(offset) => Utc::now().with_timezone(&offset).format("%H:%M").to_string(),
            None => Local::now().format("%H:%M").to_string(),
        };
        Ok(formatted)
    }
}

pub fn current_period_at(periods: &[BellPeriod], now_hhmm: &str) -> Option<BellPeriod> {
    periods
        .iter()
        .find(|p| now_hhmm >= p.start_time.as_str() && now_hhmm < p.end_time.as_str())
        .cloned()
}

pub fn next_period_at(periods: &[BellPeriod], now_hhmm: &str) -> Option<BellPeriod> {
    periods
        .iter()
        .find(|p| now_hhmm < p.start_time.as_str())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> Vec<BellPeriod> {
        ["1:08:00:08:45", "2:08:50:09:35", "3:09:40:10:25"]
            .iter()
            .map(|s| {
                let parts: Vec<&str> = s.split(':').collect();
                BellPeriod {
                    period: parts[0].to_string(),
                    start_time: format!("{}:{}", parts[1], parts[2]),
                    end_time: format!("{}:{}", parts[3], parts[4]),
                    day_type: "A".to_string(),
                }
            })
            .collect()
    }

    #[test]
    fn resolves_current_period_by_string_compare() {
        let periods = schedule();
        assert_eq!(current_period_at(&periods, "08:10").unwrap().period, "1");
        assert_eq!(current_period_at(&periods, "08:50").unwrap().period, "2");
        // between periods
        assert!(current_period_at(&periods, "08:47").is_none());
        assert!(current_period_at(&periods, "11:00").is_none());
    }

    #[test]
    fn resolves_next_period() {
        let periods = schedule();
        assert_eq!(next_period_at(&periods, "08:10").unwrap().period, "2");
        assert_eq!(next_period_at(&periods, "08:47").unwrap().period, "2");
        assert!(next_period_at(&periods, "10:00").is_none());
    }
}
