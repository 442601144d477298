//! Quarry Core - value, column and error types shared by every Quarry crate.
//!
//! - `ColumnKind`: the closed set of column kinds (integer, long integer, text,
//!   timestamp, date, foreign-key reference)
//! - `Value`: runtime values read from or staged into cells
//! - `Row`: a stored row with a store-assigned identifier
//! - `schema`: column descriptors and table definitions
//! - `Error`: the single fatal error type, with `Result`
//!
//! # Example
//!
//! ```rust
//! use quarry_core::schema::TableBuilder;
//! use quarry_core::{ColumnKind, Value};
//!
//! let table = TableBuilder::new("items")
//!     .unwrap()
//!     .add_column("id", ColumnKind::Integer)
//!     .unwrap()
//!     .add_column("name", ColumnKind::Text)
//!     .unwrap()
//!     .add_primary_key(&["id"], true)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//!
//! let name = table.get_column("name").unwrap();
//! assert!(name.kind().accepts(&Value::String("Alice".into())));
//! assert!(!name.kind().accepts(&Value::Int32(1)));
//! ```

mod error;
mod row;
pub mod schema;
mod types;
mod value;

pub use error::{Error, Result};
pub use row::{Row, RowId};
pub use types::ColumnKind;
pub use value::{Value, DATE_FORMAT, TIMESTAMP_FORMAT};
