//! Materialized rows.
//!
//! Rows are rebuilt from scratch every time their query re-executes. A
//! [`ReadOnlyRow`] holds a snapshot of its cells; a [`WritableRow`] stages
//! edits on top of the cursor it was read from.

mod writable;

pub use writable::{CommitOutcome, RowPosition, WritableRow};
pub(crate) use writable::RowBinding;

use crate::pipeline::Materialize;
use quarry_core::schema::ColumnDescriptor;
use quarry_core::{Error, Result, Value};
use quarry_storage::{Cursor, CursorHandle};
use std::rc::Rc;

/// Reads every column of the cursor's current row.
pub(crate) fn read_cells(cursor: &CursorHandle, count: usize) -> Result<Vec<Value>> {
    (1..=count).map(|column| cursor.get(column)).collect()
}

/// Resolves a column name to its 1-based position.
pub(crate) fn column_position(columns: &[ColumnDescriptor], name: &str) -> Result<usize> {
    columns
        .iter()
        .position(|c| c.name() == name)
        .map(|i| i + 1)
        .ok_or_else(|| {
            let table = columns.first().map(|c| c.table()).unwrap_or_default();
            Error::column_not_found(table, name)
        })
}

/// A row of a read-only query.
#[derive(Clone, Debug)]
pub struct ReadOnlyRow {
    position: usize,
    values: Rc<[Value]>,
    columns: Rc<[ColumnDescriptor]>,
}

impl ReadOnlyRow {
    /// Reads every row of a rewound cursor.
    pub(crate) fn materialize(source: &Materialize<'_>) -> Result<Vec<Self>> {
        let mut rows = Vec::with_capacity(source.cursor.row_count());
        while source.cursor.next()? {
            rows.push(Self {
                position: source.cursor.position(),
                values: read_cells(source.cursor, source.columns.len())?.into(),
                columns: source.columns.clone(),
            });
        }
        Ok(rows)
    }

    /// Returns the 1-based cursor position the row was read from.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the cell at a 1-based column index.
    pub fn get(&self, column: usize) -> Result<&Value> {
        column
            .checked_sub(1)
            .and_then(|i| self.values.get(i))
            .ok_or_else(|| Error::column_index(column, self.values.len()))
    }

    /// Returns the cell of a named column.
    pub fn get_by_name(&self, name: &str) -> Result<&Value> {
        self.get(column_position(&self.columns, name)?)
    }
}
