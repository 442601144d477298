//! The process context shared by every query.
//!
//! A `Context` owns the node graph, the channel registry, the connection
//! node and the primary-key cache. It is built once with `ContextBuilder`
//! and handed to queries as `Rc<Context>`.

use chrono::NaiveDateTime;
use hashbrown::HashMap;
use quarry_core::{Error, Result};
use quarry_reactive::{ChannelRegistry, Compute, DepValues, Dependencies, Graph, Node, NodeId};
use quarry_storage::{ConfigSource, Connection, ConnectionHandle, Connector};
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;
use tracing::{debug, info};

use crate::session::Session;

/// Audit column stamped with the time of the last write.
pub const LAST_UPDATE: &str = "Last_Update";
/// Audit column stamped with the user of the last write.
pub const LAST_UPDATED_BY: &str = "Last_Updated_By";
/// Audit column stamped with the time a row was inserted.
pub const CREATE_DATE: &str = "Create_Date";
/// Audit column stamped with the user who inserted a row.
pub const CREATED_BY: &str = "Created_By";

/// Columns maintained by the application rather than the user.
pub const SYSTEM_COLUMNS: [&str; 4] = [LAST_UPDATE, LAST_UPDATED_BY, CREATE_DATE, CREATED_BY];

type Clock = Box<dyn Fn() -> NaiveDateTime>;

/// Produces the shared connection, reconnecting when the current one is no
/// longer valid. Configuration is re-read on every reconnect.
struct ConnectionNode {
    connector: Rc<dyn Connector>,
    config: Box<dyn ConfigSource>,
}

impl Compute for ConnectionNode {
    type Value = ConnectionHandle;

    fn validate(&self, connection: &ConnectionHandle) -> Result<bool> {
        Ok(connection.is_valid())
    }

    fn construct(&mut self, _deps: &DepValues, _previous: Option<&ConnectionHandle>) -> Result<ConnectionHandle> {
        let config = self.config.load()?;
        let connection = self.connector.connect(&config)?;
        info!(url = %config.url(), "connection established");
        Ok(connection)
    }

    fn dispose(&self, connection: &ConnectionHandle) {
        connection.close();
    }
}

/// The process context.
pub struct Context {
    graph: Graph,
    channels: ChannelRegistry,
    connection: Node<ConnectionHandle>,
    /// Table name -> primary-key columns, filled on first use.
    primary_keys: RefCell<HashMap<String, Rc<BTreeSet<String>>>>,
    system_columns: BTreeSet<String>,
    pub(crate) session: Session,
    clock: Clock,
    /// Set while a channel wave runs, so cursors it rebuilds do not fan out again.
    fanning: Cell<bool>,
}

impl Context {
    /// Returns the node graph.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Returns the channel registry.
    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    /// Returns the connection node. Queries depend on it.
    pub fn connection_node(&self) -> Node<ConnectionHandle> {
        self.connection
    }

    /// Returns a valid connection, reconnecting if needed.
    pub fn connection(&self) -> Result<ConnectionHandle> {
        self.graph.get(self.connection)
    }

    /// Returns the primary-key columns of a table.
    ///
    /// The data source is asked once per table; later calls are served from
    /// the cache for the lifetime of the context.
    pub fn primary_keys(&self, table: &str) -> Result<Rc<BTreeSet<String>>> {
        if let Some(keys) = self.primary_keys.borrow().get(table) {
            return Ok(keys.clone());
        }
        let keys: Rc<BTreeSet<String>> =
            Rc::new(self.connection()?.primary_keys(table)?.into_iter().collect());
        debug!(table, keys = ?keys, "discovered primary keys");
        self.primary_keys
            .borrow_mut()
            .insert(table.to_string(), keys.clone());
        Ok(keys)
    }

    /// Returns true if the column is maintained by the application.
    pub fn is_system_column(&self, column: &str) -> bool {
        self.system_columns.contains(column)
    }

    /// Returns the system columns.
    pub fn system_columns(&self) -> &BTreeSet<String> {
        &self.system_columns
    }

    /// Returns the current local time from the context clock.
    pub fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    /// Invalidates a node together with every subscriber of its channels.
    pub fn refresh(&self, node: impl Into<NodeId>) -> Result<usize> {
        let node = node.into();
        self.fanning(|| self.channels.publish_from(&self.graph, node))
    }

    /// Invalidates every subscriber of the given channels in one wave.
    pub fn publish<I, S>(&self, updater: Option<NodeId>, channels: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.fanning(move || self.channels.publish(&self.graph, updater, channels))
    }

    /// Re-executes the other subscribers of a cursor's channels after the
    /// cursor itself was rebuilt.
    ///
    /// Does nothing while a channel wave is already running: that wave
    /// covers every subscriber exactly once.
    pub(crate) fn fan_out(&self, cursor: NodeId) -> Result<usize> {
        if self.fanning.get() {
            return Ok(0);
        }
        let channels = self.channels.channels_of(cursor);
        let mut targets = self.channels.subscribers(&channels);
        targets.remove(&cursor);
        if targets.is_empty() {
            return Ok(0);
        }
        debug!(node = %cursor, channels = ?channels, subscribers = targets.len(), "cursor fan-out");
        let count = targets.len();
        self.fanning(|| self.graph.invalidate_all(targets, Some(cursor)))?;
        Ok(count)
    }

    fn fanning<T>(&self, wave: impl FnOnce() -> Result<T>) -> Result<T> {
        let outer = self.fanning.replace(true);
        let result = wave();
        self.fanning.set(outer);
        result
    }
}

/// Builder for a `Context`.
///
/// # Example
///
/// ```rust
/// use quarry_query::ContextBuilder;
/// use quarry_storage::{Connection, ConnectionConfig, MemoryDatabase, StaticConfig};
///
/// let db = MemoryDatabase::new("clinic");
/// let context = ContextBuilder::new(db.clone())
///     .config(StaticConfig(ConnectionConfig::new("localhost", 3306, "clinic", "admin")))
///     .build()
///     .unwrap();
/// assert!(context.connection().unwrap().is_valid());
/// assert!(context.is_system_column("Last_Update"));
/// ```
pub struct ContextBuilder {
    connector: Rc<dyn Connector>,
    config: Option<Box<dyn ConfigSource>>,
    user: Option<(Option<i64>, String)>,
    system_columns: BTreeSet<String>,
    clock: Option<Clock>,
}

impl ContextBuilder {
    /// Starts a builder around a connector.
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self {
            connector: Rc::new(connector),
            config: None,
            user: None,
            system_columns: SYSTEM_COLUMNS.iter().map(|c| c.to_string()).collect(),
            clock: None,
        }
    }

    /// Sets where connection parameters are read from.
    pub fn config(mut self, source: impl ConfigSource + 'static) -> Self {
        self.config = Some(Box::new(source));
        self
    }

    /// Starts the session already logged in as `name`.
    pub fn user(mut self, name: impl Into<String>) -> Self {
        self.user = Some((None, name.into()));
        self
    }

    /// Adds a column to the set of application-maintained columns.
    pub fn system_column(mut self, name: impl Into<String>) -> Self {
        self.system_columns.insert(name.into());
        self
    }

    /// Replaces the wall clock used for audit stamps.
    pub fn clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> NaiveDateTime + 'static,
    {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Builds the context. The connection is opened lazily.
    pub fn build(self) -> Result<Rc<Context>> {
        let config = self
            .config
            .ok_or_else(|| Error::config("no configuration source given"))?;
        let graph = Graph::new();
        let connection = graph.add(
            "connection",
            ConnectionNode {
                connector: self.connector,
                config,
            },
            Dependencies::new(),
        )?;
        let session = Session::default();
        if let Some((id, name)) = self.user {
            session.begin(id, name);
        }
        Ok(Rc::new(Context {
            graph,
            channels: ChannelRegistry::new(),
            connection,
            primary_keys: RefCell::new(HashMap::new()),
            system_columns: self.system_columns,
            session,
            fanning: Cell::new(false),
            clock: self
                .clock
                .unwrap_or_else(|| Box::new(|| chrono::Local::now().naive_local())),
        }))
    }
}
