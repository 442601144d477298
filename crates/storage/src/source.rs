//! Data-source abstractions consumed by query pipelines.
//!
//! A data source is reached through a `Connector`, which opens a
//! `Connection`. Connections create `Statement`s, which execute query text
//! and return `Cursor`s over the result rows. All methods take `&self`; an
//! implementation keeps its mutable state behind interior mutability so
//! handles can be shared between graph nodes.
//!
//! Column positions are 1-based throughout, matching the metadata order.

use crate::config::ConnectionConfig;
use quarry_core::schema::ColumnDescriptor;
use quarry_core::{Error, Result, Value};
use std::rc::Rc;

/// Shared handle to an open connection.
pub type ConnectionHandle = Rc<dyn Connection>;

/// Shared handle to a statement.
pub type StatementHandle = Rc<dyn Statement>;

/// Shared handle to a result cursor.
pub type CursorHandle = Rc<dyn Cursor>;

/// Opens connections to a data source.
pub trait Connector {
    /// Opens a new connection described by `config`.
    fn connect(&self, config: &ConnectionConfig) -> Result<ConnectionHandle>;
}

/// An open connection.
pub trait Connection {
    /// Returns true while the connection can still be used.
    fn is_valid(&self) -> bool;

    /// Closes the connection. Closing twice is a no-op.
    fn close(&self);

    /// Returns the primary-key column names of a table, in key order.
    fn primary_keys(&self, table: &str) -> Result<Vec<String>>;

    /// Returns the column descriptors of a table.
    fn columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>>;

    /// Creates a statement bound to this connection.
    fn create_statement(&self) -> Result<StatementHandle>;
}

impl std::fmt::Debug for dyn Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Executes query text against a connection.
pub trait Statement {
    /// Runs a query and returns a cursor over its rows.
    ///
    /// Executing a new query closes the cursor of the previous one.
    fn execute_query(&self, text: &str) -> Result<CursorHandle>;

    /// Runs a modifying command and returns the number of affected rows.
    fn execute_update(&self, text: &str) -> Result<usize>;

    fn is_closed(&self) -> bool;

    fn close(&self);
}

/// A scrollable, updatable cursor over a query result.
///
/// Position 0 is before the first row; rows are numbered from 1. The cursor
/// additionally has an insert row, entered with `move_to_insert_row`, where
/// values for a new row are staged.
///
/// `update` stages a value for the current row without writing it. Staged
/// values are visible through `get`, written by `update_row`, and dropped
/// when the cursor moves.
pub trait Cursor {
    /// Returns the result columns in position order.
    fn metadata(&self) -> Rc<[ColumnDescriptor]>;

    /// Returns the 1-based position of a named column.
    fn find_column(&self, name: &str) -> Result<usize> {
        let columns = self.metadata();
        columns
            .iter()
            .position(|c| c.name() == name)
            .map(|i| i + 1)
            .ok_or_else(|| {
                let table = columns.first().map(|c| c.table()).unwrap_or_default();
                Error::column_not_found(table, name)
            })
    }

    /// Moves before the first row.
    fn before_first(&self) -> Result<()>;

    /// Advances one row. Returns false once past the last row.
    fn next(&self) -> Result<bool>;

    /// Moves to a 1-based row. Returns false if there is no such row.
    fn absolute(&self, position: usize) -> Result<bool>;

    /// Returns the current 1-based position, 0 when before the first row.
    fn position(&self) -> usize;

    /// Returns the number of rows in the result.
    fn row_count(&self) -> usize;

    /// Reads a column of the current row.
    fn get(&self, column: usize) -> Result<Value>;

    /// Reads a named column of the current row.
    fn get_by_name(&self, name: &str) -> Result<Value> {
        self.get(self.find_column(name)?)
    }

    /// Stages a value for a column of the current row or the insert row.
    fn update(&self, column: usize, value: Value) -> Result<()>;

    /// Writes the staged values of the current row to the data source.
    fn update_row(&self) -> Result<()>;

    /// Moves to the insert row with every column null.
    fn move_to_insert_row(&self) -> Result<()>;

    /// Writes the insert row to the data source.
    fn insert_row(&self) -> Result<()>;

    /// Deletes the current row from the data source.
    fn delete_row(&self) -> Result<()>;

    fn is_closed(&self) -> bool;

    fn close(&self);
}
