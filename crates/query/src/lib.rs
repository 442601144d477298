//! Quarry Query - reactive query pipelines over a live data source.
//!
//! This crate provides:
//!
//! - `Context`: the node graph, channel registry, shared connection and
//!   primary-key cache every query is built on
//! - `Query`: a read-only query over literal text
//! - `TableQuery`: a query over one table, narrowed by a `ConstraintSet`
//! - `WritableQuery`: a table query whose `WritableRow`s stage, commit,
//!   discard and delete edits
//! - `validate`: row validators, including business hours and double
//!   booking checks
//! - `hooks`: side effects run before a delete, such as cascading to a
//!   child table
//! - `KeyLabels`: display labels for foreign-key values
//!
//! # Example
//!
//! ```rust
//! use quarry_core::schema::TableBuilder;
//! use quarry_core::{ColumnKind, Value};
//! use quarry_query::{CommitOutcome, ContextBuilder, WritableQuery};
//! use quarry_storage::{ConnectionConfig, MemoryDatabase, StaticConfig};
//!
//! let db = MemoryDatabase::new("shop");
//! db.create_table(
//!     TableBuilder::new("items")
//!         .unwrap()
//!         .add_column("id", ColumnKind::Integer)
//!         .unwrap()
//!         .add_column("name", ColumnKind::Text)
//!         .unwrap()
//!         .add_column("qty", ColumnKind::Integer)
//!         .unwrap()
//!         .add_primary_key(&["id"], true)
//!         .unwrap()
//!         .build()
//!         .unwrap(),
//! )
//! .unwrap();
//! db.insert("items", vec![Value::Null, "a".into(), Value::Int32(3)]).unwrap();
//!
//! let context = ContextBuilder::new(db.clone())
//!     .config(StaticConfig(ConnectionConfig::new("localhost", 0, "shop", "sa")))
//!     .build()
//!     .unwrap();
//! let items = WritableQuery::new(&context, "items", false).unwrap();
//!
//! let row = items.rows().unwrap().get(0).unwrap();
//! assert!(!row.set_entry_by_name("qty", 3).unwrap());
//! assert!(row.set_entry_by_name("qty", 5).unwrap());
//! assert!(row.has_live_edits());
//! assert_eq!(row.commit().unwrap(), CommitOutcome::Committed);
//!
//! let row = items.rows().unwrap().get(0).unwrap();
//! assert_eq!(row.get_by_name("qty").unwrap(), Value::Int32(5));
//! assert!(!row.has_live_edits());
//! ```

pub mod columns;
pub mod constraint;
pub mod context;
pub mod hooks;
pub mod labels;
pub mod pipeline;
pub mod query;
pub mod row;
mod session;
pub mod table;
pub mod validate;
pub mod writable;

pub use columns::ColumnVisibility;
pub use constraint::{Comparator, Constraint, ConstraintSet};
pub use context::{
    Context, ContextBuilder, CREATED_BY, CREATE_DATE, LAST_UPDATE, LAST_UPDATED_BY, SYSTEM_COLUMNS,
};
pub use hooks::{CascadeDelete, DeleteHook, DeleteMessage};
pub use labels::{KeyLabels, LabelMap};
pub use pipeline::{Pipeline, RowSet};
pub use query::Query;
pub use row::{CommitOutcome, ReadOnlyRow, RowPosition, WritableRow};
pub use session::USERS_TABLE;
pub use table::TableQuery;
pub use validate::{BookingColumns, BusinessHours, NoDoubleBooking, Validator, Verdict};
pub use writable::WritableQuery;
