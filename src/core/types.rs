use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{PassError, Result};

/// Table names in the backing tabular store.
pub mod tables {
    pub const ACTIVE_PASSES: &str = "Active Passes";
    pub const PASS_LOG: &str = "Pass Log";
    pub const PERMANENT_RECORD: &str = "Permanent Record";
    pub const SETTINGS: &str = "Settings";
    pub const BELL_SCHEDULE: &str = "Bell Schedule";
    pub const TEACHERS: &str = "Teacher Data";
    pub const SUPPORT: &str = "Support Data";
    pub const ADMINS: &str = "Admin Data";
}

/// Destination that pins a pass to OUT until it is closed.
pub const RESTROOM: &str = "RESTROOM";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassState {
    Open,
    Closed,
}

impl PassState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassStatus {
    Out,
    In,
}

impl PassStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Out => "OUT",
            Self::In => "IN",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "OUT" => Ok(Self::Out),
            "IN" => Ok(Self::In),
            other => Err(PassError::Corrupt(format!("unknown pass status '{other}'"))),
        }
    }
}

/// One currently-open pass. Owned exclusively by the lifecycle engine:
/// created by open, mutated by update, deleted by close.
///
/// Row layout in the Active Passes table:
/// `[passID, studentID, originStaffID, staffID, destinationID, legID, state, status, startTime]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivePassRecord {
    pub pass_id: String,
    pub student_id: String,
    pub origin_staff_id: String,
    /// Staff member the student is currently with. Empty until the first update.
    pub current_staff_id: String,
    pub destination_id: String,
    pub leg_id: u32,
    pub state: PassState,
    pub status: PassStatus,
    pub start_time: DateTime<Utc>,
}

impl ActivePassRecord {
    pub const HEADER: [&'static str; 9] = [
        "passID",
        "studentID",
        "originStaffID",
        "staffID",
        "destinationID",
        "legID",
        "state",
        "status",
        "startTime",
    ];

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.pass_id.clone(),
            self.student_id.clone(),
            self.origin_staff_id.clone(),
            self.current_staff_id.clone(),
            self.destination_id.clone(),
            self.leg_id.to_string(),
            self.state.as_str().to_string(),
            self.status.as_str().to_string(),
            self.start_time.to_rfc3339(),
        ]
    }

    pub fn from_row(row: &[String]) -> Result<Self> {
        if row.len() < 9 {
            return Err(PassError::Corrupt(format!(
                "active pass row has {} columns, expected 9",
                row.len()
            )));
        }
        let leg_id = row[5]
            .parse::<u32>()
            .map_err(|e| PassError::Corrupt(format!("bad legID '{}': {e}", row[5])))?;
        let state = match row[6].as_str() {
            "OPEN" => PassState::Open,
            other => {
                return Err(PassError::Corrupt(format!(
                    "unexpected state '{other}' in active pass row"
                )))
            }
        };
        let start_time = DateTime::parse_from_rfc3339(&row[8])
            .map_err(|e| PassError::Corrupt(format!("bad startTime '{}': {e}", row[8])))?
            .with_timezone(&Utc);
        Ok(Self {
            pass_id: row[0].clone(),
            student_id: row[1].clone(),
            origin_staff_id: row[2].clone(),
            current_staff_id: row[3].clone(),
            destination_id: row[4].clone(),
            leg_id,
            state,
            status: PassStatus::parse(&row[7])?,
            start_time,
        })
    }
}

/// One append-only trail entry per open/update/close event.
/// Never updated or deleted once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: DateTime<Utc>,
    pub pass_id: String,
    pub leg_id: u32,
    pub student_id: String,
    pub state: PassState,
    pub status: PassStatus,
    pub staff_id: String,
    pub destination_id: String,
    pub flag: String,
    pub notes: String,
}

impl AuditLogEntry {
    pub const HEADER: [&'static str; 10] = [
        "timestamp",
        "passID",
        "legID",
        "studentID",
        "state",
        "status",
        "staffID",
        "destinationID",
        "flag",
        "notes",
    ];

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.timestamp.to_rfc3339(),
            self.pass_id.clone(),
            self.leg_id.to_string(),
            self.student_id.clone(),
            self.state.as_str().to_string(),
            self.status.as_str().to_string(),
            self.staff_id.clone(),
            self.destination_id.clone(),
            sanitize_cell(&self.flag),
            sanitize_cell(&self.notes),
        ]
    }
}

/// The immutable archived summary, written exactly once when a pass closes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermanentRecord {
    pub pass_id: String,
    pub student_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_duration_minutes: f64,
    pub origin_staff_id: String,
    pub final_destination_id: String,
    pub leg_count: u32,
    pub flags: String,
    pub notes: String,
}

impl PermanentRecord {
    pub const HEADER: [&'static str; 10] = [
        "passID",
        "studentID",
        "startTime",
        "endTime",
        "totalDurationMinutes",
        "originStaffID",
        "finalDestinationID",
        "legCount",
        "flags",
        "notes",
    ];

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.pass_id.clone(),
            self.student_id.clone(),
            self.start_time.to_rfc3339(),
            self.end_time.to_rfc3339(),
            self.total_duration_minutes.to_string(),
            self.origin_staff_id.clone(),
            self.final_destination_id.clone(),
            self.leg_count.to_string(),
            sanitize_cell(&self.flags),
            sanitize_cell(&self.notes),
        ]
    }
}

/// Defuse spreadsheet formula injection in free-text cells.
pub fn sanitize_cell(value: &str) -> String {
    match value.chars().next() {
        Some('=') | Some('+') | Some('-') | Some('@') => format!(" '{value}"),
        _ => value.to_string(),
    }
}
