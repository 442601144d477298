//! Result cursors of the in-memory data source.

use super::{Lifeline, MemoryDatabase};
use crate::source::Cursor;
use quarry_core::schema::ColumnDescriptor;
use quarry_core::{Error, Result, Row, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::trace;

struct CursorState {
    /// Snapshot of the matching rows taken at execution.
    rows: Vec<Row>,
    /// 0 before the first row, `rows.len() + 1` after the last.
    position: usize,
    on_insert_row: bool,
    insert_buffer: Vec<Value>,
    /// Staged values for the current row, by 0-based column.
    pending: BTreeMap<usize, Value>,
}

impl CursorState {
    fn current(&self) -> Result<&Row> {
        if self.on_insert_row || self.position == 0 || self.position > self.rows.len() {
            return Err(Error::CursorPosition {
                position: self.position,
            });
        }
        Ok(&self.rows[self.position - 1])
    }

    fn leave_row(&mut self) {
        self.on_insert_row = false;
        self.pending.clear();
    }
}

/// A scrollable, updatable cursor over a snapshot of one table.
///
/// Writes go straight to the table; the snapshot is patched to match so the
/// cursor reads back what it wrote.
pub struct MemoryCursor {
    db: MemoryDatabase,
    table: String,
    columns: Rc<[ColumnDescriptor]>,
    lifeline: Rc<Lifeline>,
    state: RefCell<CursorState>,
}

impl MemoryCursor {
    pub(crate) fn new(
        db: MemoryDatabase,
        table: String,
        columns: Rc<[ColumnDescriptor]>,
        rows: Vec<Row>,
        lifeline: Rc<Lifeline>,
    ) -> Self {
        let width = columns.len();
        Self {
            db,
            table,
            columns,
            lifeline,
            state: RefCell::new(CursorState {
                rows,
                position: 0,
                on_insert_row: false,
                insert_buffer: vec![Value::Null; width],
                pending: BTreeMap::new(),
            }),
        }
    }

    /// Converts a 1-based column to an index.
    fn column_index(&self, column: usize) -> Result<usize> {
        if column == 0 || column > self.columns.len() {
            return Err(Error::column_index(column, self.columns.len()));
        }
        Ok(column - 1)
    }
}

impl Cursor for MemoryCursor {
    fn metadata(&self) -> Rc<[ColumnDescriptor]> {
        self.columns.clone()
    }

    fn before_first(&self) -> Result<()> {
        self.lifeline.ensure_open()?;
        let mut state = self.state.borrow_mut();
        state.leave_row();
        state.position = 0;
        Ok(())
    }

    fn next(&self) -> Result<bool> {
        self.lifeline.ensure_open()?;
        let mut state = self.state.borrow_mut();
        state.leave_row();
        if state.position <= state.rows.len() {
            state.position += 1;
        }
        Ok(state.position <= state.rows.len())
    }

    fn absolute(&self, position: usize) -> Result<bool> {
        self.lifeline.ensure_open()?;
        let mut state = self.state.borrow_mut();
        state.leave_row();
        let len = state.rows.len();
        if (1..=len).contains(&position) {
            state.position = position;
            Ok(true)
        } else {
            state.position = if position == 0 { 0 } else { len + 1 };
            Ok(false)
        }
    }

    fn position(&self) -> usize {
        self.state.borrow().position
    }

    fn row_count(&self) -> usize {
        self.state.borrow().rows.len()
    }

    fn get(&self, column: usize) -> Result<Value> {
        self.lifeline.ensure_open()?;
        let index = self.column_index(column)?;
        let state = self.state.borrow();
        if state.on_insert_row {
            return Ok(state.insert_buffer[index].clone());
        }
        if let Some(staged) = state.pending.get(&index) {
            return Ok(staged.clone());
        }
        Ok(state.current()?.values()[index].clone())
    }

    fn update(&self, column: usize, value: Value) -> Result<()> {
        self.lifeline.ensure_open()?;
        let index = self.column_index(column)?;
        let descriptor = &self.columns[index];
        let value = if value.is_null() {
            value
        } else {
            descriptor.kind().coerce(descriptor.name(), value)?
        };
        let mut state = self.state.borrow_mut();
        if state.on_insert_row {
            state.insert_buffer[index] = value;
        } else {
            state.current()?;
            state.pending.insert(index, value);
        }
        Ok(())
    }

    fn update_row(&self) -> Result<()> {
        self.lifeline.ensure_open()?;
        let mut state = self.state.borrow_mut();
        let row = state.current()?;
        let row_id = row.id();
        let mut values = row.values().to_vec();
        for (&index, value) in &state.pending {
            values[index] = value.clone();
        }

        let stored = {
            let mut tables = self.db.tables().borrow_mut();
            let store = tables.get_table_mut(&self.table)?;
            store.update(row_id, values)?;
            store.get(row_id).cloned()
        };
        let position = state.position;
        if let Some(stored) = stored {
            state.rows[position - 1] = stored;
        }
        state.pending.clear();
        trace!(table = %self.table, row_id, "updated row");
        Ok(())
    }

    fn move_to_insert_row(&self) -> Result<()> {
        self.lifeline.ensure_open()?;
        let mut state = self.state.borrow_mut();
        state.pending.clear();
        state.on_insert_row = true;
        state.insert_buffer = vec![Value::Null; self.columns.len()];
        Ok(())
    }

    fn insert_row(&self) -> Result<()> {
        self.lifeline.ensure_open()?;
        let mut state = self.state.borrow_mut();
        if !state.on_insert_row {
            return Err(Error::invalid_operation("cursor is not on the insert row"));
        }
        let values = std::mem::replace(
            &mut state.insert_buffer,
            vec![Value::Null; self.columns.len()],
        );

        let stored = {
            let mut tables = self.db.tables().borrow_mut();
            let store = tables.get_table_mut(&self.table)?;
            let row_id = store.insert(values)?;
            store.get(row_id).cloned()
        };
        if let Some(stored) = stored {
            trace!(table = %self.table, row_id = stored.id(), "inserted row");
            state.rows.push(stored);
        }
        Ok(())
    }

    fn delete_row(&self) -> Result<()> {
        self.lifeline.ensure_open()?;
        let mut state = self.state.borrow_mut();
        let row_id = state.current()?.id();
        self.db
            .tables()
            .borrow_mut()
            .get_table_mut(&self.table)?
            .delete(row_id)?;
        let position = state.position;
        state.rows.remove(position - 1);
        state.position = position - 1;
        state.pending.clear();
        trace!(table = %self.table, row_id, "deleted row");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        !self.lifeline.is_open()
    }

    fn close(&self) {
        self.lifeline.close();
    }
}
