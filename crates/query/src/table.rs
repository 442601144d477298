//! Queries over one table, narrowed by a constraint set.

use crate::columns::ColumnVisibility;
use crate::constraint::{Constraint, ConstraintSet};
use crate::context::Context;
use crate::pipeline::{Pipeline, RowBuilder};
use crate::row::ReadOnlyRow;
use quarry_core::Result;
use quarry_reactive::{compute, Dependencies, Node};
use quarry_storage::Connection;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::ops::Deref;
use std::rc::Rc;
use tracing::debug;

/// A query selecting every column of a table.
///
/// The query subscribes to the channel named after its table, and its
/// primary-key columns can never be hidden. Changing the constraint set
/// re-renders the query text and re-executes the query; a change that
/// leaves the set as it was does nothing.
///
/// # Example
///
/// ```rust
/// use quarry_core::schema::TableBuilder;
/// use quarry_core::{ColumnKind, Value};
/// use quarry_query::{Comparator, Constraint, ContextBuilder, TableQuery};
/// use quarry_storage::{ConnectionConfig, MemoryDatabase, StaticConfig};
///
/// let db = MemoryDatabase::new("shop");
/// db.create_table(
///     TableBuilder::new("items")
///         .unwrap()
///         .add_column("id", ColumnKind::Integer)
///         .unwrap()
///         .add_column("qty", ColumnKind::Integer)
///         .unwrap()
///         .add_primary_key(&["id"], true)
///         .unwrap()
///         .build()
///         .unwrap(),
/// )
/// .unwrap();
/// db.insert("items", vec![Value::Null, Value::Int32(3)]).unwrap();
/// db.insert("items", vec![Value::Null, Value::Int32(7)]).unwrap();
///
/// let context = ContextBuilder::new(db)
///     .config(StaticConfig(ConnectionConfig::new("localhost", 0, "shop", "sa")))
///     .build()
///     .unwrap();
/// let items = TableQuery::new(&context, "items").unwrap();
/// assert_eq!(items.rows().unwrap().len(), 2);
///
/// items.add_constraint(Constraint::new("qty", Comparator::Gt, 4)).unwrap();
/// assert_eq!(items.rows().unwrap().len(), 1);
/// assert!(!items.remove_column("id"));
/// ```
pub struct TableQuery<R = ReadOnlyRow> {
    pipeline: Pipeline<R>,
    table: String,
    primary_keys: Rc<BTreeSet<String>>,
    constraints: Rc<RefCell<ConstraintSet>>,
    trigger: Node<()>,
}

impl TableQuery<ReadOnlyRow> {
    /// Creates a read-only query over `table` with every column requested.
    pub fn new(context: &Rc<Context>, table: &str) -> Result<Self> {
        Self::build(context, table, None, Box::new(ReadOnlyRow::materialize))
    }

    /// Creates a read-only query requesting only `columns` and the keys.
    pub fn with_columns(context: &Rc<Context>, table: &str, columns: &[&str]) -> Result<Self> {
        Self::build(context, table, Some(columns), Box::new(ReadOnlyRow::materialize))
    }
}

impl<R: Clone + 'static> TableQuery<R> {
    pub(crate) fn build(
        context: &Rc<Context>,
        table: &str,
        requested: Option<&[&str]>,
        rows: RowBuilder<R>,
    ) -> Result<Self> {
        let primary_keys = context.primary_keys(table)?;

        let mut columns = ColumnVisibility::new();
        if let Some(requested) = requested {
            columns.refresh(&context.connection()?.columns(table)?);
            columns.overwrite(requested.iter().copied());
        }
        columns.protect(primary_keys.iter().cloned());

        let graph = context.graph();
        let constraints = Rc::new(RefCell::new(ConstraintSet::new()));
        let trigger = graph.trigger(format!("{}.constraints", table));
        let source = constraints.clone();
        let name = table.to_string();
        let text = graph.add(
            format!("{}.text", table),
            compute(move |_, _| Ok(source.borrow().render_query(&name))),
            Dependencies::new().observable("constraints", trigger),
        )?;

        let pipeline = Pipeline::new(
            context,
            table,
            text,
            vec![trigger.id()],
            [table],
            columns,
            rows,
        )?;
        Ok(Self {
            pipeline,
            table: table.to_string(),
            primary_keys,
            constraints,
            trigger,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the primary-key columns of the table.
    pub fn primary_keys(&self) -> &BTreeSet<String> {
        &self.primary_keys
    }

    /// Returns a copy of the active constraints.
    pub fn constraints(&self) -> ConstraintSet {
        self.constraints.borrow().clone()
    }

    /// Adds a constraint. Returns false if it was already active.
    pub fn add_constraint(&self, constraint: Constraint) -> Result<bool> {
        self.update_constraints(|set| set.insert(constraint))
    }

    /// Removes a constraint. Returns false if it was not active.
    pub fn remove_constraint(&self, constraint: &Constraint) -> Result<bool> {
        self.update_constraints(|set| set.remove(constraint))
    }

    pub fn add_constraints<I>(&self, constraints: I) -> Result<bool>
    where
        I: IntoIterator<Item = Constraint>,
    {
        self.update_constraints(|set| set.extend(constraints))
    }

    pub fn remove_constraints<'a, I>(&self, constraints: I) -> Result<bool>
    where
        I: IntoIterator<Item = &'a Constraint>,
    {
        self.update_constraints(|set| set.remove_all(constraints))
    }

    /// Replaces every constraint at once, re-executing at most once.
    pub fn replace_constraints<I>(&self, constraints: I) -> Result<bool>
    where
        I: IntoIterator<Item = Constraint>,
    {
        self.update_constraints(|set| set.replace(constraints))
    }

    pub fn clear_constraints(&self) -> Result<bool> {
        self.update_constraints(|set| set.replace(std::iter::empty()))
    }

    fn update_constraints<F>(&self, update: F) -> Result<bool>
    where
        F: FnOnce(&mut ConstraintSet) -> bool,
    {
        let changed = update(&mut self.constraints.borrow_mut());
        if changed {
            debug!(table = %self.table, constraints = self.constraints.borrow().len(), "constraints changed");
            self.pipeline.context().graph().invalidate(self.trigger)?;
        }
        Ok(changed)
    }
}

impl<R> Deref for TableQuery<R> {
    type Target = Pipeline<R>;

    fn deref(&self) -> &Pipeline<R> {
        &self.pipeline
    }
}
