use async_trait::async_trait;

use crate::core::Result;

/// The non-transactional tabular storage substrate.
///
/// `read_all` returns the header row at index 0 followed by data rows. Row
/// indices are snapshot-local identifiers only: callers must re-resolve a
/// record's position by primary key immediately before any `update_row` or
/// `delete_row`, never reuse an index taken from an earlier read.
#[async_trait]
pub trait TabularStore: Send + Sync {
    async fn read_all(&self, table: &str) -> Result<Vec<Vec<String>>>;

    async fn append_row(&self, table: &str, row: Vec<String>) -> Result<()>;

    async fn update_row(&self, table: &str, row_index: usize, row: Vec<String>) -> Result<()>;

    async fn delete_row(&self, table: &str, row_index: usize) -> Result<()>;
}
