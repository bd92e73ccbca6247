//! In-memory backend (for tests).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::store::traits::TableBackend;

/// In-memory table store mirroring the spreadsheet backend's semantics.
#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<HashMap<String, Vec<Vec<String>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed tables from `(name, rows)` pairs.
    pub fn with_tables<I, R>(tables: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, R)>,
        R: IntoIterator<Item = Vec<&'static str>>,
    {
        let mut map = HashMap::new();
        for (name, rows) in tables {
            let rows: Vec<Vec<String>> = rows
                .into_iter()
                .map(|r| r.into_iter().map(str::to_string).collect())
                .collect();
            map.insert(name.to_string(), rows);
        }
        Self {
            tables: Mutex::new(map),
        }
    }

    /// Snapshot a table's current rows.
    pub fn rows(&self, table: &str) -> Vec<Vec<String>> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl TableBackend for MemoryBackend {
    async fn read_all(&self, table: &str) -> Result<Vec<Vec<String>>, StoreError> {
        Ok(self.rows(table))
    }

    async fn update_cell(
        &self,
        table: &str,
        row: u32,
        col: u32,
        value: &str,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_string()).or_default();
        let (row, col) = (row as usize, col as usize);
        while rows.len() < row {
            rows.push(Vec::new());
        }
        let cells = &mut rows[row - 1];
        while cells.len() < col {
            cells.push(String::new());
        }
        cells[col - 1] = value.to_string();
        Ok(())
    }

    async fn append_row(&self, table: &str, values: &[String]) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        tables
            .entry(table.to_string())
            .or_default()
            .push(values.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn update_grows_table() {
        let backend = MemoryBackend::new();
        backend.update_cell("t", 3, 2, "x").await.unwrap();
        let rows = backend.read_all("t").await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], vec!["".to_string(), "x".to_string()]);
    }

    #[tokio::test]
    async fn append_then_read() {
        let backend = MemoryBackend::with_tables([("t", vec![vec!["h1", "h2"]])]);
        backend
            .append_row("t", &["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        let rows = backend.read_all("t").await.unwrap();
        assert_eq!(rows[1], vec!["a".to_string(), "b".to_string()]);
    }
}
