//! Rows as a data source stores them.

use crate::value::Value;

/// Identifier a store assigns to each row it holds. Never reused.
pub type RowId = u64;

/// A stored row: its identifier and one value per column.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    id: RowId,
    values: Vec<Value>,
}

impl Row {
    pub fn new(id: RowId, values: Vec<Value>) -> Self {
        Self { id, values }
    }

    #[inline]
    pub fn id(&self) -> RowId {
        self.id
    }

    /// Returns the values in column order.
    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}
