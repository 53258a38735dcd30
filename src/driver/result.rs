//! The outcome of a non-`SELECT` statement.
//!
//! Grounded on `original_source/sql/result.go`'s `Result`: a thin wrapper
//! around the rows-affected count and the last inserted row id, plus
//! whatever column/row data the server chose to echo back.

use crate::wire::{Column, ColumnDefinition};

/// The outcome of a `Statement::execute` call.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    columns: Vec<ColumnDefinition>,
    changes: i64,
    last_insert_row_id: i64,
    rows: Vec<Vec<Column>>,
}

impl QueryResult {
    pub(crate) fn new(
        columns: Vec<ColumnDefinition>,
        changes: i64,
        last_insert_row_id: i64,
        rows: Vec<Vec<Column>>,
    ) -> Self {
        Self {
            columns,
            changes,
            last_insert_row_id,
            rows,
        }
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn last_insert_row_id(&self) -> i64 {
        self.last_insert_row_id
    }

    pub fn rows_affected(&self) -> i64 {
        self.changes
    }

    /// Whatever row data the server echoed back alongside the statement's
    /// outcome (usually empty for a plain `INSERT`/`UPDATE`/`DELETE`).
    pub fn rows(&self) -> &[Vec<Column>] {
        &self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::ColumnType;

    #[test]
    fn exposes_changes_and_last_insert_row_id() {
        let result = QueryResult::new(Vec::new(), 1, 42, Vec::new());
        assert_eq!(result.rows_affected(), 1);
        assert_eq!(result.last_insert_row_id(), 42);
        assert!(result.rows().is_empty());
    }

    #[test]
    fn carries_echoed_columns_and_rows() {
        let columns = vec![ColumnDefinition {
            name: "id".to_string(),
            column_type: ColumnType::Integer,
        }];
        let rows = vec![vec![Column::new(ColumnType::Integer, 7i64.to_le_bytes().to_vec())]];
        let result = QueryResult::new(columns.clone(), 0, 0, rows.clone());
        assert_eq!(result.columns(), columns.as_slice());
        assert_eq!(result.rows(), rows.as_slice());
    }
}
