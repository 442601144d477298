//! Side effects run before a writable row is deleted.

use crate::constraint::{Comparator, Constraint, ConstraintSet};
use crate::context::Context;
use crate::pipeline::statement_node;
use crate::row::WritableRow;
use quarry_core::{Error, Result};
use quarry_reactive::Node;
use quarry_storage::{Statement, StatementHandle};
use std::rc::Rc;
use tracing::info;

/// Runs before a row is deleted.
///
/// A hook may return a confirmation message; the first message produced is
/// handed back from [`WritableRow::delete`]. An `Err` aborts the delete.
pub trait DeleteHook {
    fn before_delete(&self, row: &WritableRow) -> Result<Option<String>>;
}

/// Deletes the rows of a child table that reference the deleted row, then
/// publishes on the child table's channel.
pub struct CascadeDelete {
    context: Rc<Context>,
    statement: Node<StatementHandle>,
    parent_column: String,
    child_table: String,
    child_column: String,
}

impl CascadeDelete {
    /// Cascades from `parent_column` of the deleted row to the rows of
    /// `child_table` whose `child_column` holds the same value.
    pub fn new(
        context: &Rc<Context>,
        parent_column: impl Into<String>,
        child_table: impl Into<String>,
        child_column: impl Into<String>,
    ) -> Result<Self> {
        let child_table = child_table.into();
        let statement = statement_node(context, &format!("{}.cascade", child_table))?;
        Ok(Self {
            context: context.clone(),
            statement,
            parent_column: parent_column.into(),
            child_table,
            child_column: child_column.into(),
        })
    }

    pub fn child_table(&self) -> &str {
        &self.child_table
    }
}

impl DeleteHook for CascadeDelete {
    fn before_delete(&self, row: &WritableRow) -> Result<Option<String>> {
        let key = row.get_by_name(&self.parent_column)?;
        if key.is_null() {
            return Ok(None);
        }
        let mut matching = ConstraintSet::new();
        matching.insert(Constraint::new(&self.child_column, Comparator::Eq, key));
        let text = matching
            .render_query(&self.child_table)
            .replacen("SELECT *", "DELETE", 1);

        let statement = self.context.graph().get(self.statement)?;
        let deleted = statement.execute_update(&text)?;
        info!(table = %self.child_table, deleted, "cascade delete");

        self.context
            .publish(Some(self.statement.id()), [self.child_table.as_str()])?;
        Ok(None)
    }
}

impl Drop for CascadeDelete {
    fn drop(&mut self) {
        self.context.graph().release(self.statement);
    }
}

/// Produces a confirmation message from the deleted row.
///
/// `{Column}` in the template is replaced by the row's value for that
/// column; `{{` and `}}` stand for literal braces.
#[derive(Clone, Debug)]
pub struct DeleteMessage {
    template: String,
}

impl DeleteMessage {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Renders the template against a row.
    pub fn render(&self, row: &WritableRow) -> Result<String> {
        let mut out = String::with_capacity(self.template.len());
        let mut chars = self.template.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let mut column = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => column.push(c),
                            None => {
                                return Err(Error::invalid_operation(format!(
                                    "unclosed placeholder in delete message `{}`",
                                    self.template
                                )))
                            }
                        }
                    }
                    out.push_str(&row.get_by_name(column.trim())?.to_string());
                }
                c => out.push(c),
            }
        }
        Ok(out)
    }
}

impl DeleteHook for DeleteMessage {
    fn before_delete(&self, row: &WritableRow) -> Result<Option<String>> {
        self.render(row).map(Some)
    }
}
