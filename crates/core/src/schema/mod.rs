//! Schema module for Quarry.
//!
//! Column descriptors are what a cursor reports about its result columns;
//! table schemas are what a data source keeps about its tables.

mod column;
mod table;

pub use column::ColumnDescriptor;
pub use table::{TableBuilder, TableSchema};
