//! The set of tables held by an in-memory database.

use super::row_store::RowStore;
use quarry_core::schema::TableSchema;
use quarry_core::{Error, Result};
use std::collections::BTreeMap;

/// Tables by name.
#[derive(Default)]
pub struct TableCache {
    tables: BTreeMap<String, RowStore>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an empty table. Names are unique.
    pub fn create_table(&mut self, schema: TableSchema) -> Result<()> {
        let name = schema.name().to_string();
        if self.tables.contains_key(&name) {
            return Err(Error::invalid_schema(format!("table {} already exists", name)));
        }
        self.tables.insert(name, RowStore::new(schema));
        Ok(())
    }

    pub fn get_table(&self, name: &str) -> Result<&RowStore> {
        self.tables.get(name).ok_or_else(|| Error::table_not_found(name))
    }

    pub fn get_table_mut(&mut self, name: &str) -> Result<&mut RowStore> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| Error::table_not_found(name))
    }
}
