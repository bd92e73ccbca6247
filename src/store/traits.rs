//! Backend-agnostic tabular store trait.

use async_trait::async_trait;

use crate::error::StoreError;

/// A tabular store addressed by logical table name.
///
/// The store guarantees per-call atomicity only — there are no transactions.
/// Rows and columns are 1-based, matching the spreadsheet convention; rows
/// may be ragged (trailing empty cells omitted).
#[async_trait]
pub trait TableBackend: Send + Sync {
    /// Read every row of a table, header row included.
    async fn read_all(&self, table: &str) -> Result<Vec<Vec<String>>, StoreError>;

    /// Overwrite a single cell.
    async fn update_cell(
        &self,
        table: &str,
        row: u32,
        col: u32,
        value: &str,
    ) -> Result<(), StoreError>;

    /// Append a row after the last non-empty row.
    async fn append_row(&self, table: &str, values: &[String]) -> Result<(), StoreError>;
}
