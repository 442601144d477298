//! An in-memory data source.
//!
//! `MemoryDatabase` implements `Connector` over a set of in-process tables
//! and understands the query text that pipelines generate (see [`sql`]).
//! It is used by tests and demos, and doubles as a reference for what a
//! real driver adapter has to provide.
//!
//! # Example
//!
//! ```rust
//! use quarry_core::schema::TableBuilder;
//! use quarry_core::{ColumnKind, Value};
//! use quarry_storage::{Connection, ConnectionConfig, Connector, Cursor, MemoryDatabase, Statement};
//!
//! let db = MemoryDatabase::new("shop");
//! db.create_table(
//!     TableBuilder::new("items")
//!         .unwrap()
//!         .add_column("id", ColumnKind::Integer)
//!         .unwrap()
//!         .add_column("qty", ColumnKind::Integer)
//!         .unwrap()
//!         .add_primary_key(&["id"], true)
//!         .unwrap()
//!         .build()
//!         .unwrap(),
//! )
//! .unwrap();
//! db.insert("items", vec![Value::Null, Value::Int32(3)]).unwrap();
//!
//! let connection = db.connect(&ConnectionConfig::new("localhost", 0, "shop", "sa")).unwrap();
//! let cursor = connection
//!     .create_statement()
//!     .unwrap()
//!     .execute_query("SELECT * FROM items WHERE qty > '2'")
//!     .unwrap();
//! assert!(cursor.next().unwrap());
//! assert_eq!(cursor.get(1).unwrap(), Value::Int32(1));
//! ```

mod cache;
mod connection;
mod cursor;
mod row_store;
pub mod sql;

pub use cache::TableCache;
pub use connection::{MemoryConnection, MemoryStatement};
pub use cursor::MemoryCursor;
pub use row_store::RowStore;

use crate::config::ConnectionConfig;
use crate::source::{ConnectionHandle, Connector};
use quarry_core::schema::TableSchema;
use quarry_core::{Error, Result, RowId, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, info, warn};

struct Shared {
    name: String,
    tables: RefCell<TableCache>,
    /// Required user and password, if any.
    credentials: RefCell<Option<(String, String)>>,
    /// Bumped by `drop_connections`; connections opened earlier become invalid.
    generation: Cell<u64>,
    connects: Cell<u64>,
    refusing: Cell<bool>,
}

/// A shared handle to an in-memory database.
///
/// Clones refer to the same tables.
#[derive(Clone)]
pub struct MemoryDatabase {
    shared: Rc<Shared>,
}

impl MemoryDatabase {
    /// Creates an empty database. Connections must name it in their config.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            shared: Rc::new(Shared {
                name: name.into(),
                tables: RefCell::new(TableCache::new()),
                credentials: RefCell::new(None),
                generation: Cell::new(0),
                connects: Cell::new(0),
                refusing: Cell::new(false),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn create_table(&self, schema: TableSchema) -> Result<()> {
        self.shared.tables.borrow_mut().create_table(schema)
    }

    /// Inserts a row directly, bypassing any connection. Returns its row ID.
    pub fn insert(&self, table: &str, values: Vec<Value>) -> Result<RowId> {
        self.shared
            .tables
            .borrow_mut()
            .get_table_mut(table)?
            .insert(values)
    }

    /// Returns the values of every row of a table, in insertion order.
    pub fn rows(&self, table: &str) -> Result<Vec<Vec<Value>>> {
        Ok(self
            .shared
            .tables
            .borrow()
            .get_table(table)?
            .scan()
            .map(|row| row.values().to_vec())
            .collect())
    }

    /// Requires connections to authenticate with these credentials.
    pub fn require_credentials(&self, user: impl Into<String>, password: impl Into<String>) {
        *self.shared.credentials.borrow_mut() = Some((user.into(), password.into()));
    }

    /// Invalidates every open connection together with its statements and
    /// cursors, as if the server had gone away.
    pub fn drop_connections(&self) {
        let generation = self.shared.generation.get() + 1;
        self.shared.generation.set(generation);
        warn!(database = %self.shared.name, generation, "dropped all connections");
    }

    /// Makes subsequent connection attempts fail until switched back.
    pub fn refuse_connections(&self, refuse: bool) {
        self.shared.refusing.set(refuse);
    }

    /// Returns how many connections have been opened.
    pub fn connect_count(&self) -> u64 {
        self.shared.connects.get()
    }

    pub(crate) fn tables(&self) -> &RefCell<TableCache> {
        &self.shared.tables
    }
}

impl Connector for MemoryDatabase {
    fn connect(&self, config: &ConnectionConfig) -> Result<ConnectionHandle> {
        if self.shared.refusing.get() {
            return Err(Error::connection(format!(
                "{} refused the connection",
                config.url()
            )));
        }
        if config.name != self.shared.name {
            return Err(Error::connection(format!(
                "unknown database {}",
                config.name
            )));
        }
        if let Some((user, password)) = &*self.shared.credentials.borrow() {
            if &config.user != user || &config.password != password {
                return Err(Error::connection(format!(
                    "access denied for {}",
                    config.user
                )));
            }
        }

        self.shared.connects.set(self.shared.connects.get() + 1);
        info!(url = %config.url(), "connected");
        let lifeline = Lifeline::root(self.clone(), self.shared.generation.get());
        Ok(Rc::new(MemoryConnection::new(self.clone(), lifeline)))
    }
}

/// Tracks whether a connection, statement or cursor is still usable.
///
/// A handle is usable while neither it nor any of its ancestors has been
/// closed and the database has not dropped the root connection.
pub(crate) struct Lifeline {
    resource: &'static str,
    closed: Cell<bool>,
    parent: Option<Rc<Lifeline>>,
    origin: Option<(MemoryDatabase, u64)>,
}

impl Lifeline {
    fn root(db: MemoryDatabase, generation: u64) -> Rc<Self> {
        Rc::new(Self {
            resource: "connection",
            closed: Cell::new(false),
            parent: None,
            origin: Some((db, generation)),
        })
    }

    pub(crate) fn child(resource: &'static str, parent: &Rc<Lifeline>) -> Rc<Self> {
        Rc::new(Self {
            resource,
            closed: Cell::new(false),
            parent: Some(parent.clone()),
            origin: None,
        })
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed.get() {
            return Err(Error::closed(self.resource));
        }
        if let Some((db, generation)) = &self.origin {
            if db.shared.generation.get() != *generation {
                return Err(Error::connection(format!(
                    "connection to {} was dropped",
                    db.shared.name
                )));
            }
        }
        match &self.parent {
            Some(parent) => parent.ensure_open(),
            None => Ok(()),
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.ensure_open().is_ok()
    }

    pub(crate) fn close(&self) {
        if !self.closed.replace(true) {
            debug!(resource = self.resource, "closed");
        }
    }
}
