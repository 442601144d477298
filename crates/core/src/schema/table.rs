//! Table definition for a data source schema.

use super::column::ColumnDescriptor;
use crate::error::{Error, Result};
use crate::types::ColumnKind;

/// A table definition: ordered columns plus the primary key.
#[derive(Clone, Debug)]
pub struct TableSchema {
    /// Table name.
    name: String,
    /// Column definitions.
    columns: Vec<ColumnDescriptor>,
    /// Positions of the primary-key columns.
    primary_key: Vec<usize>,
    /// Whether a null single-column integer key is generated on insert.
    auto_increment: bool,
}

impl TableSchema {
    /// Returns the table name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the columns.
    #[inline]
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Gets a column by name.
    pub fn get_column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Gets a column index by name.
    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// Returns the positions of the primary-key columns.
    #[inline]
    pub fn primary_key(&self) -> &[usize] {
        &self.primary_key
    }

    /// Returns the names of the primary-key columns.
    pub fn primary_key_names(&self) -> Vec<String> {
        self.primary_key
            .iter()
            .map(|&i| self.columns[i].name().to_string())
            .collect()
    }

    /// Returns whether the primary key is generated on insert.
    #[inline]
    pub fn auto_increment(&self) -> bool {
        self.auto_increment
    }
}

/// Builder for creating table definitions.
pub struct TableBuilder {
    name: String,
    columns: Vec<ColumnDescriptor>,
    primary_key: Vec<String>,
    auto_increment: bool,
}

impl TableBuilder {
    /// Creates a new table builder.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::check_naming_rules(&name)?;
        Ok(Self {
            name,
            columns: Vec::new(),
            primary_key: Vec::new(),
            auto_increment: false,
        })
    }

    /// Validates a name follows naming rules.
    fn check_naming_rules(name: &str) -> Result<()> {
        let Some(first) = name.chars().next() else {
            return Err(Error::invalid_schema("Name cannot be empty"));
        };
        if !first.is_ascii_alphabetic() && first != '_' {
            return Err(Error::invalid_schema(format!(
                "Name must start with letter or underscore: {}",
                name
            )));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::invalid_schema(format!(
                "Name contains invalid characters: {}",
                name
            )));
        }
        Ok(())
    }

    /// Adds a nullable column to the table.
    pub fn add_column(mut self, name: impl Into<String>, kind: ColumnKind) -> Result<Self> {
        let name = name.into();
        Self::check_naming_rules(&name)?;
        if self.columns.iter().any(|c| c.name() == name) {
            return Err(Error::invalid_schema(format!(
                "Column already exists: {}",
                name
            )));
        }
        self.columns
            .push(ColumnDescriptor::new(name, kind, self.name.clone()));
        Ok(self)
    }

    /// Marks columns as not nullable.
    pub fn add_not_null(mut self, columns: &[&str]) -> Result<Self> {
        for name in columns {
            let col = self
                .columns
                .iter_mut()
                .find(|c| c.name() == *name)
                .ok_or_else(|| Error::invalid_schema(format!("Column not found: {}", name)))?;
            *col = col.clone().nullable(false);
        }
        Ok(self)
    }

    /// Sets the primary key.
    ///
    /// Auto-increment is only honored for a single integer column.
    pub fn add_primary_key(mut self, columns: &[&str], auto_increment: bool) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::invalid_schema("Primary key needs at least one column"));
        }
        for name in columns {
            match self.columns.iter().find(|c| c.name() == *name) {
                None => {
                    return Err(Error::invalid_schema(format!("Column not found: {}", name)))
                }
                Some(c) if auto_increment && columns.len() == 1 && !c.kind().is_integral() => {
                    return Err(Error::invalid_schema("Auto-increment requires integer type"))
                }
                _ => {}
            }
        }
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self.auto_increment = auto_increment && columns.len() == 1;
        Ok(self)
    }

    /// Builds the table definition.
    pub fn build(self) -> Result<TableSchema> {
        if self.columns.is_empty() {
            return Err(Error::invalid_schema(format!(
                "Table {} has no columns",
                self.name
            )));
        }
        let primary_key = self
            .primary_key
            .iter()
            .filter_map(|name| self.columns.iter().position(|c| c.name() == name))
            .collect();
        Ok(TableSchema {
            name: self.name,
            columns: self.columns,
            primary_key,
            auto_increment: self.auto_increment,
        })
    }
}
