//! Quarry Storage - data-source access for Quarry query pipelines.
//!
//! This crate provides:
//!
//! - `Connector`, `Connection`, `Statement`, `Cursor`: the interface a data
//!   source adapter implements
//! - `ConnectionConfig` and `ConfigSource`: where connection parameters come from
//! - `MemoryDatabase`: an in-memory data source with primary keys,
//!   generated keys and a small query dialect
//!
//! # Example
//!
//! ```rust
//! use quarry_core::schema::TableBuilder;
//! use quarry_core::{ColumnKind, Value};
//! use quarry_storage::{
//!     ConfigSource, Connection, ConnectionConfig, Connector, Cursor, MemoryDatabase,
//!     Statement, StaticConfig,
//! };
//!
//! let db = MemoryDatabase::new("clinic");
//! db.create_table(
//!     TableBuilder::new("customers")
//!         .unwrap()
//!         .add_column("Customer_ID", ColumnKind::Integer)
//!         .unwrap()
//!         .add_column("Customer_Name", ColumnKind::Text)
//!         .unwrap()
//!         .add_primary_key(&["Customer_ID"], true)
//!         .unwrap()
//!         .build()
//!         .unwrap(),
//! )
//! .unwrap();
//!
//! let source = StaticConfig(ConnectionConfig::new("localhost", 3306, "clinic", "admin"));
//! let connection = db.connect(&source.load().unwrap()).unwrap();
//! assert_eq!(connection.primary_keys("customers").unwrap(), vec!["Customer_ID"]);
//!
//! let cursor = connection
//!     .create_statement()
//!     .unwrap()
//!     .execute_query("SELECT * FROM customers")
//!     .unwrap();
//! cursor.move_to_insert_row().unwrap();
//! cursor.update(2, Value::from("Ada")).unwrap();
//! cursor.insert_row().unwrap();
//! assert_eq!(db.rows("customers").unwrap()[0][0], Value::Int32(1));
//! ```

pub mod config;
pub mod memory;
pub mod source;

pub use config::{ConfigSource, ConnectionConfig, JsonFileConfig, StaticConfig};
pub use memory::{MemoryConnection, MemoryCursor, MemoryDatabase, MemoryStatement};
pub use source::{
    Connection, ConnectionHandle, Connector, Cursor, CursorHandle, Statement, StatementHandle,
};
