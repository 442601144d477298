//! Column descriptors.

use crate::types::ColumnKind;

/// Describes one result column: its name, kind and the table it came from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ColumnDescriptor {
    /// Column name.
    name: String,
    /// Kind of the values in this column.
    kind: ColumnKind,
    /// Table the column belongs to.
    table: String,
    /// Whether this column allows null values.
    nullable: bool,
}

impl ColumnDescriptor {
    /// Creates a new nullable column descriptor.
    pub fn new(name: impl Into<String>, kind: ColumnKind, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            table: table.into(),
            nullable: true,
        }
    }

    /// Sets whether this column is nullable.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Returns the column name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the column kind.
    #[inline]
    pub fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    /// Returns the owning table name.
    #[inline]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns whether this column is nullable.
    #[inline]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_new() {
        let col = ColumnDescriptor::new("id", ColumnKind::Integer, "items");
        assert_eq!(col.name(), "id");
        assert_eq!(col.kind(), &ColumnKind::Integer);
        assert_eq!(col.table(), "items");
        assert!(col.is_nullable());
    }

    #[test]
    fn test_column_builder() {
        let col = ColumnDescriptor::new("name", ColumnKind::Text, "items").nullable(false);
        assert!(!col.is_nullable());
    }
}
