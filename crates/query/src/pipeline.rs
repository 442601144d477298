//! The query pipeline.
//!
//! Every query is a chain of nodes in the context graph:
//!
//! ```text
//! connection -> statement -> text -> cursor -> metadata -> rows
//! ```
//!
//! The statement and cursor belong to one pipeline and are closed whenever
//! their node replaces or releases them. The cursor node is the one
//! subscribed to the pipeline's channels, so publishing on a channel
//! re-executes the query and rebuilds its metadata and rows. Whenever a
//! cursor is re-executed for any other reason (new text, a new statement,
//! a lost connection), every other subscriber of its channels is
//! re-executed with it.

use crate::columns::ColumnVisibility;
use crate::context::Context;
use quarry_core::schema::ColumnDescriptor;
use quarry_core::Result;
use quarry_reactive::{compute, Dependencies, ListenerId, Node, NodeId};
use quarry_storage::{Connection, ConnectionHandle, Cursor, CursorHandle, Statement, StatementHandle};
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// What a row builder sees when the rows node rebuilds.
pub(crate) struct Materialize<'a> {
    /// The cursor node rows refresh after a write.
    pub(crate) cursor_node: NodeId,
    /// The freshly executed cursor, positioned before the first row.
    pub(crate) cursor: &'a CursorHandle,
    pub(crate) columns: &'a Rc<[ColumnDescriptor]>,
}

/// Turns a rewound cursor into rows.
pub(crate) type RowBuilder<R> = Box<dyn FnMut(&Materialize<'_>) -> Result<Vec<R>>>;

/// The rows of a query.
///
/// A `RowSet` keeps its identity across re-executions: the rows node
/// replaces the contents of the set it returned before, so a clone held by
/// a consumer always sees the latest rows.
pub struct RowSet<R> {
    rows: Rc<RefCell<Vec<R>>>,
}

impl<R> Clone for RowSet<R> {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows.clone(),
        }
    }
}

impl<R: Clone> RowSet<R> {
    fn new(rows: Vec<R>) -> Self {
        Self {
            rows: Rc::new(RefCell::new(rows)),
        }
    }

    fn replace(&self, rows: Vec<R>) {
        *self.rows.borrow_mut() = rows;
    }

    pub fn len(&self) -> usize {
        self.rows.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.borrow().is_empty()
    }

    /// Returns the row at a 0-based index.
    pub fn get(&self, index: usize) -> Option<R> {
        self.rows.borrow().get(index).cloned()
    }

    pub fn last(&self) -> Option<R> {
        self.rows.borrow().last().cloned()
    }

    /// Copies the current rows out.
    pub fn snapshot(&self) -> Vec<R> {
        self.rows.borrow().clone()
    }

    /// Returns true if both handles refer to the same set.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.rows, &other.rows)
    }
}

impl<R: fmt::Debug> fmt::Debug for RowSet<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.rows.borrow().iter()).finish()
    }
}

/// Adds a statement node on the shared connection.
pub(crate) fn statement_node(context: &Context, label: &str) -> Result<Node<StatementHandle>> {
    context.graph().add(
        format!("{}.statement", label),
        compute(|deps, _| {
            let connection: ConnectionHandle = deps.get("connection")?;
            connection.create_statement()
        })
        .with_validate(|statement: &StatementHandle| Ok(!statement.is_closed()))
        .with_dispose(|statement: &StatementHandle| statement.close()),
        Dependencies::new().value("connection", context.connection_node()),
    )
}

/// The node chain behind every query.
pub struct Pipeline<R> {
    context: Rc<Context>,
    label: String,
    statement: Node<StatementHandle>,
    text: Node<String>,
    cursor: Node<CursorHandle>,
    metadata: Node<Rc<[ColumnDescriptor]>>,
    rows: Node<RowSet<R>>,
    columns: Rc<RefCell<ColumnVisibility>>,
    /// Parameter nodes feeding `text`, released with the pipeline.
    owned: Vec<NodeId>,
}

impl<R: Clone + 'static> Pipeline<R> {
    /// Builds the chain on top of an existing text node.
    ///
    /// The pipeline takes ownership of `text` and of the `owned` parameter
    /// nodes. Its cursor subscribes to every channel in `channels`.
    pub(crate) fn new<I, S>(
        context: &Rc<Context>,
        label: &str,
        text: Node<String>,
        owned: Vec<NodeId>,
        channels: I,
        columns: ColumnVisibility,
        mut build: RowBuilder<R>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let graph = context.graph();
        let statement = statement_node(context, label)?;

        let cursor = graph.add(
            format!("{}.cursor", label),
            compute(|deps, _| {
                let statement: StatementHandle = deps.get("statement")?;
                let text: String = deps.get("text")?;
                debug!(query = %text, "executing query");
                statement.execute_query(&text)
            })
            .with_validate(|cursor: &CursorHandle| Ok(!cursor.is_closed()))
            .with_dispose(|cursor: &CursorHandle| cursor.close()),
            Dependencies::new()
                .value("statement", statement)
                .value("text", text),
        )?;

        let owner = Rc::downgrade(context);
        graph.on_invalidate(cursor, move |invalidation| {
            let Some(context) = owner.upgrade() else {
                return;
            };
            // The first execution is not an invalidation.
            if context.graph().rebuild_count(invalidation.node) < 2 {
                return;
            }
            if let Err(error) = context.fan_out(invalidation.node) {
                warn!(node = %invalidation.node, %error, "channel fan-out failed");
            }
        })?;

        let columns = Rc::new(RefCell::new(columns));
        let visibility = columns.clone();
        let metadata = graph.add(
            format!("{}.metadata", label),
            compute(move |deps, _| {
                let cursor: CursorHandle = deps.get("cursor")?;
                let metadata = cursor.metadata();
                visibility.borrow_mut().refresh(&metadata);
                Ok(metadata)
            }),
            Dependencies::new().value("cursor", cursor),
        )?;

        let cursor_node = cursor.id();
        let rows = graph.add(
            format!("{}.rows", label),
            compute(move |deps, previous: Option<&RowSet<R>>| {
                let cursor: CursorHandle = deps.get("cursor")?;
                let columns: Rc<[ColumnDescriptor]> = deps.get("metadata")?;
                cursor.before_first()?;
                let rows = build(&Materialize {
                    cursor_node,
                    cursor: &cursor,
                    columns: &columns,
                })?;
                trace!(rows = rows.len(), "rows materialized");
                Ok(match previous {
                    Some(set) => {
                        set.replace(rows);
                        set.clone()
                    }
                    None => RowSet::new(rows),
                })
            }),
            Dependencies::new()
                .value("cursor", cursor)
                .value("metadata", metadata),
        )?;

        for channel in channels {
            context.channels().subscribe(channel.as_ref(), cursor);
        }

        Ok(Self {
            context: context.clone(),
            label: label.to_string(),
            statement,
            text,
            cursor,
            metadata,
            rows,
            columns,
            owned,
        })
    }

    /// Returns the current rows, re-executing the query if needed.
    pub fn rows(&self) -> Result<RowSet<R>> {
        self.context.graph().get(self.rows)
    }

    /// Returns the result columns.
    pub fn metadata(&self) -> Result<Rc<[ColumnDescriptor]>> {
        self.context.graph().get(self.metadata)
    }

    /// Returns the current query text.
    pub fn text(&self) -> Result<String> {
        self.context.graph().get(self.text)
    }

    pub fn cursor(&self) -> Result<CursorHandle> {
        self.context.graph().get(self.cursor)
    }

    /// Re-executes this query and every query sharing one of its channels.
    ///
    /// Returns the number of cursors invalidated.
    pub fn refresh(&self) -> Result<usize> {
        self.context.refresh(self.cursor)
    }

    /// Calls `listener` with the row set every time it is rebuilt.
    pub fn on_rows_changed<F>(&self, listener: F) -> Result<ListenerId>
    where
        F: Fn(&RowSet<R>) + 'static,
    {
        self.context
            .graph()
            .on_change(self.rows, move |_, rows| listener(rows))
    }

    /// Calls `listener` with the column descriptors every time the query
    /// is re-executed.
    pub fn on_metadata_changed<F>(&self, listener: F) -> Result<ListenerId>
    where
        F: Fn(&[ColumnDescriptor]) + 'static,
    {
        self.context
            .graph()
            .on_change(self.metadata, move |_, columns| listener(columns))
    }

    /// Removes a listener added with `on_rows_changed`.
    pub fn remove_rows_listener(&self, id: ListenerId) -> bool {
        self.context.graph().remove_listener(self.rows, id)
    }

    /// Removes a listener added with `on_metadata_changed`.
    pub fn remove_metadata_listener(&self, id: ListenerId) -> bool {
        self.context.graph().remove_listener(self.metadata, id)
    }
}

impl<R> Pipeline<R> {
    pub fn context(&self) -> &Rc<Context> {
        &self.context
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the channels this query's cursor is subscribed to.
    pub fn channels(&self) -> Vec<String> {
        self.context.channels().channels_of(self.cursor)
    }

    /// Subscribes the cursor to one more channel.
    pub fn subscribe(&self, channel: &str) -> bool {
        self.context.channels().subscribe(channel, self.cursor)
    }

    pub fn unsubscribe(&self, channel: &str) -> bool {
        self.context.channels().unsubscribe(channel, self.cursor)
    }

    pub fn statement_node(&self) -> Node<StatementHandle> {
        self.statement
    }

    pub fn text_node(&self) -> Node<String> {
        self.text
    }

    pub fn cursor_node(&self) -> Node<CursorHandle> {
        self.cursor
    }

    pub fn metadata_node(&self) -> Node<Rc<[ColumnDescriptor]>> {
        self.metadata
    }

    pub fn rows_node(&self) -> Node<RowSet<R>> {
        self.rows
    }

    /// Borrows the requested-column map.
    pub fn columns(&self) -> Ref<'_, ColumnVisibility> {
        self.columns.borrow()
    }

    /// Returns the requested columns in first-seen order.
    pub fn requested_columns(&self) -> Vec<String> {
        self.columns.borrow().requested()
    }

    pub fn is_requested(&self, column: &str) -> bool {
        self.columns.borrow().is_requested(column)
    }

    /// Requests a column. Returns whether it was already requested.
    pub fn add_column(&self, column: &str) -> bool {
        self.columns.borrow_mut().add(column)
    }

    /// Stops requesting a column. Returns false if it was not requested or
    /// is a protected key column.
    pub fn remove_column(&self, column: &str) -> bool {
        self.columns.borrow_mut().remove(column)
    }

    pub fn add_columns<'a, I>(&self, columns: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.columns.borrow_mut().add_all(columns);
    }

    pub fn remove_columns<'a, I>(&self, columns: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.columns.borrow_mut().remove_all(columns);
    }

    /// Requests exactly `columns`, plus any protected ones.
    pub fn overwrite_columns<'a, I>(&self, columns: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.columns.borrow_mut().overwrite(columns);
    }

    pub fn clear_columns(&self) {
        self.columns.borrow_mut().clear();
    }
}

impl<R> Drop for Pipeline<R> {
    fn drop(&mut self) {
        let graph = self.context.graph();
        self.context.channels().unsubscribe_all(self.cursor);
        graph.release(self.rows);
        graph.release(self.metadata);
        graph.release(self.cursor);
        graph.release(self.statement);
        graph.release(self.text);
        for node in self.owned.drain(..) {
            graph.release(node);
        }
        trace!(label = %self.label, "pipeline released");
    }
}
