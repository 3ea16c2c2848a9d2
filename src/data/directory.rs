use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{tables, Result};
use crate::data::DataAccess;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaffKind {
    Teacher,
    Support,
    Admin,
}

#[derive(Debug, Clone)]
pub struct StaffDirectoryEntry {
    pub kind: StaffKind,
    pub record: HashMap<String, String>,
}

impl StaffDirectoryEntry {
    /// Boolean-as-string flag, meaningful only for support staff: keeps an
    /// IN pass open across a period boundary.
    pub fn period_override(&self) -> bool {
        self.record.get("periodOverride").map(String::as_str) == Some("TRUE")
    }
}

/// Staff lookup across the teacher, support and admin rosters.
pub struct StaffDirectory {
    data: Arc<DataAccess>,
}

impl StaffDirectory {
    pub fn new(data: Arc<DataAccess>) -> Self {
        Self { data }
    }

    pub async fn lookup_by_id(&self, staff_id: &str) -> Result<Option<StaffDirectoryEntry>> {
        for (table, kind) in [
            (tables::TEACHERS, StaffKind::Teacher),
            (tables::SUPPORT, StaffKind::Support),
            (tables::ADMINS, StaffKind::Admin),
        ] {
            let rows = self.data.table_objects(table).await?;
            if let Some(record) = rows
                .into_iter()
                .find(|r| r.get("staffID").map(String::as_str) == Some(staff_id))
            {
                return Ok(Some(StaffDirectoryEntry { kind, record }));
            }
        }
        Ok(None)
    }
}
