//! Rows that stage edits before writing them back.

use super::{column_position, read_cells};
use crate::context::{Context, CREATED_BY, CREATE_DATE, LAST_UPDATE, LAST_UPDATED_BY};
use crate::pipeline::Materialize;
use crate::validate::Verdict;
use crate::writable::Rules;
use quarry_core::schema::ColumnDescriptor;
use quarry_core::{ColumnKind, Error, Result, Value};
use quarry_reactive::{Flag, NodeId};
use quarry_storage::{Cursor, CursorHandle};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, info, trace};

/// Where a writable row lives in its result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowPosition {
    /// A 1-based cursor position.
    Materialized(usize),
    /// The synthetic row for a record not yet inserted.
    PendingInsert,
}

/// The result of [`WritableRow::commit`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The row had no live edits; nothing was written.
    Unchanged,
    /// The row was written and the query refreshed.
    Committed,
    /// A validator rejected the row. Staged edits are kept.
    Rejected { message: Option<String> },
}

impl CommitOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed)
    }
}

/// What every row of one writable query shares.
pub(crate) struct RowBinding {
    pub(crate) context: Weak<Context>,
    pub(crate) rules: Weak<Rules>,
    pub(crate) table: String,
    pub(crate) primary_keys: Rc<BTreeSet<String>>,
}

impl RowBinding {
    /// Builds one row per cursor position, plus the pending-insert row
    /// when `insert_row` is set.
    pub(crate) fn materialize(
        self: &Rc<Self>,
        source: &Materialize<'_>,
        insert_row: bool,
    ) -> Result<Vec<WritableRow>> {
        let mut rows = Vec::with_capacity(source.cursor.row_count() + 1);
        while source.cursor.next()? {
            let position = RowPosition::Materialized(source.cursor.position());
            let backing = read_cells(source.cursor, source.columns.len())?;
            rows.push(WritableRow::new(self, source, position, backing));
        }
        if insert_row {
            let backing = vec![Value::Null; source.columns.len()];
            rows.push(WritableRow::new(self, source, RowPosition::PendingInsert, backing));
        }
        Ok(rows)
    }
}

struct RowState {
    binding: Rc<RowBinding>,
    position: RowPosition,
    cursor: CursorHandle,
    cursor_node: NodeId,
    columns: Rc<[ColumnDescriptor]>,
    staged: RefCell<Vec<Value>>,
    live_edits: Flag,
    submittable: Flag,
}

/// A row whose cells can be edited, committed, discarded and deleted.
///
/// Handles are cheap to clone and share state. A row belongs to one
/// execution of its query: once the query re-executes, the old rows are
/// replaced and their cursor is closed.
#[derive(Clone)]
pub struct WritableRow {
    state: Rc<RowState>,
}

impl WritableRow {
    fn new(
        binding: &Rc<RowBinding>,
        source: &Materialize<'_>,
        position: RowPosition,
        staged: Vec<Value>,
    ) -> Self {
        let row = Self {
            state: Rc::new(RowState {
                binding: binding.clone(),
                position,
                cursor: source.cursor.clone(),
                cursor_node: source.cursor_node,
                columns: source.columns.clone(),
                staged: RefCell::new(staged),
                live_edits: Flag::new(false),
                submittable: Flag::new(false),
            }),
        };
        row.state.submittable.set(row.compute_submittable());
        row
    }

    pub fn position(&self) -> RowPosition {
        self.state.position
    }

    pub fn is_pending_insert(&self) -> bool {
        self.state.position == RowPosition::PendingInsert
    }

    pub fn table(&self) -> &str {
        &self.state.binding.table
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.state.columns
    }

    pub fn len(&self) -> usize {
        self.state.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.columns.is_empty()
    }

    /// Returns the 1-based position of a named column.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        column_position(&self.state.columns, name)
    }

    /// Returns the staged value at a 1-based column index.
    pub fn get(&self, column: usize) -> Result<Value> {
        let staged = self.state.staged.borrow();
        column
            .checked_sub(1)
            .and_then(|i| staged.get(i))
            .cloned()
            .ok_or_else(|| Error::column_index(column, staged.len()))
    }

    pub fn get_by_name(&self, name: &str) -> Result<Value> {
        self.get(self.column_index(name)?)
    }

    /// Copies out every staged value.
    pub fn values(&self) -> Vec<Value> {
        self.state.staged.borrow().clone()
    }

    /// Stages a value at a 1-based column index.
    ///
    /// Returns whether the staged value changed. Fails with a type
    /// mismatch if the value does not fit the column kind.
    pub fn set_entry(&self, column: usize, value: impl Into<Value>) -> Result<bool> {
        let descriptor = column
            .checked_sub(1)
            .and_then(|i| self.state.columns.get(i))
            .ok_or_else(|| Error::column_index(column, self.state.columns.len()))?;
        let value = descriptor.kind().coerce(descriptor.name(), value.into())?;
        if self.state.staged.borrow()[column - 1] == value {
            return Ok(false);
        }
        // Read before staging so a closed cursor leaves the row untouched.
        let backing = self.backing()?;
        self.state.staged.borrow_mut()[column - 1] = value;
        self.update_flags(&backing);
        Ok(true)
    }

    pub fn set_entry_by_name(&self, name: &str, value: impl Into<Value>) -> Result<bool> {
        self.set_entry(self.column_index(name)?, value)
    }

    pub fn has_live_edits(&self) -> bool {
        self.state.live_edits.get()
    }

    pub fn meets_submission_criteria(&self) -> bool {
        self.state.submittable.get()
    }

    /// The observable behind [`has_live_edits`](Self::has_live_edits).
    pub fn live_edits(&self) -> &Flag {
        &self.state.live_edits
    }

    /// The observable behind
    /// [`meets_submission_criteria`](Self::meets_submission_criteria).
    pub fn submission_criteria(&self) -> &Flag {
        &self.state.submittable
    }

    /// Writes the staged values back and refreshes the query.
    ///
    /// Validators run first; a rejection leaves the staged values in place.
    pub fn commit(&self) -> Result<CommitOutcome> {
        if !self.has_live_edits() {
            return Ok(CommitOutcome::Unchanged);
        }
        let context = self.context()?;

        if let Some(rules) = self.state.binding.rules.upgrade() {
            if let Verdict::Rejected(message) = rules.check(self)? {
                info!(table = %self.table(), message = ?message, "commit rejected");
                return Ok(CommitOutcome::Rejected { message });
            }
        }

        let cursor = &self.state.cursor;
        let inserting = self.is_pending_insert();
        match self.state.position {
            RowPosition::Materialized(position) => self.move_to(position)?,
            RowPosition::PendingInsert => cursor.move_to_insert_row()?,
        }
        for (i, value) in self.state.staged.borrow().iter().enumerate() {
            cursor.update(i + 1, value.clone())?;
        }
        self.stamp_audit_columns(&context, inserting);
        if inserting {
            cursor.insert_row()?;
        } else {
            cursor.update_row()?;
        }
        info!(table = %self.table(), position = ?self.state.position, "row committed");

        self.state.live_edits.set(false);
        context.refresh(self.state.cursor_node)?;
        Ok(CommitOutcome::Committed)
    }

    /// Drops every staged edit, reloading the values from the cursor.
    pub fn discard(&self) -> Result<()> {
        let backing = self.backing()?;
        *self.state.staged.borrow_mut() = backing.clone();
        self.update_flags(&backing);
        Ok(())
    }

    /// Deletes the row and refreshes the query.
    ///
    /// Delete hooks run first. Returns the first confirmation message a
    /// hook produced.
    pub fn delete(&self) -> Result<Option<String>> {
        let RowPosition::Materialized(position) = self.state.position else {
            return Err(Error::invalid_operation(
                "the pending insert row cannot be deleted",
            ));
        };
        let context = self.context()?;

        let message = match self.state.binding.rules.upgrade() {
            Some(rules) => rules.before_delete(self)?,
            None => None,
        };

        self.move_to(position)?;
        self.state.cursor.delete_row()?;
        info!(table = %self.table(), position, "row deleted");

        context.refresh(self.state.cursor_node)?;
        Ok(message)
    }

    fn context(&self) -> Result<Rc<Context>> {
        self.state
            .binding
            .context
            .upgrade()
            .ok_or_else(|| Error::invalid_operation("the query context was dropped"))
    }

    fn move_to(&self, position: usize) -> Result<()> {
        if self.state.cursor.absolute(position)? {
            Ok(())
        } else {
            Err(Error::CursorPosition { position })
        }
    }

    /// Reads the values the row was built from.
    fn backing(&self) -> Result<Vec<Value>> {
        match self.state.position {
            RowPosition::PendingInsert => Ok(vec![Value::Null; self.state.columns.len()]),
            RowPosition::Materialized(position) => {
                self.move_to(position)?;
                read_cells(&self.state.cursor, self.state.columns.len())
            }
        }
    }

    fn update_flags(&self, backing: &[Value]) {
        let live = self.state.staged.borrow().as_slice() != backing;
        self.state.live_edits.set(live);
        self.state.submittable.set(self.compute_submittable());
    }

    fn compute_submittable(&self) -> bool {
        let binding = &self.state.binding;
        let context = binding.context.upgrade();
        let staged = self.state.staged.borrow();
        self.state
            .columns
            .iter()
            .zip(staged.iter())
            .filter(|(column, _)| !binding.primary_keys.contains(column.name()))
            .filter(|(column, _)| {
                context
                    .as_ref()
                    .map_or(true, |ctx| !ctx.is_system_column(column.name()))
            })
            .all(|(_, value)| !value.is_null())
    }

    /// Stamps the audit columns the table has. Missing or incompatible
    /// columns are skipped.
    fn stamp_audit_columns(&self, context: &Context, inserting: bool) {
        let now = context.now();
        let user = Value::from(context.user_name());
        let mut stamps = vec![(LAST_UPDATE, None), (LAST_UPDATED_BY, Some(user.clone()))];
        if inserting {
            stamps.push((CREATE_DATE, None));
            stamps.push((CREATED_BY, Some(user)));
        }
        for (column, value) in stamps {
            let result = column_position(&self.state.columns, column).and_then(|index| {
                let value = match value {
                    Some(value) => value,
                    None => match self.state.columns[index - 1].kind() {
                        ColumnKind::Date => Value::Date(now.date()),
                        _ => Value::Timestamp(now),
                    },
                };
                self.state.cursor.update(index, value)
            });
            if let Err(error) = result {
                trace!(column, %error, "audit stamp skipped");
            }
        }
        debug!(table = %self.table(), inserting, "audit columns stamped");
    }
}

impl fmt::Debug for WritableRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WritableRow")
            .field("table", &self.state.binding.table)
            .field("position", &self.state.position)
            .field("staged", &self.state.staged.borrow())
            .field("live_edits", &self.state.live_edits.get())
            .finish()
    }
}
