//! Row storage for the in-memory data source.
//!
//! This module provides the `RowStore` struct which manages rows for a single table,
//! including primary key maintenance and key generation.

use quarry_core::schema::TableSchema;
use quarry_core::{Error, Result, Row, RowId, Value};
use std::collections::BTreeMap;

/// Extracts the primary-key values from a row.
fn extract_key(values: &[Value], key_columns: &[usize]) -> Vec<Value> {
    key_columns
        .iter()
        .map(|&i| values.get(i).cloned().unwrap_or(Value::Null))
        .collect()
}

/// Row storage for a single table.
pub struct RowStore {
    schema: TableSchema,
    rows: BTreeMap<RowId, Row>,
    /// Primary key -> row
    primary_index: BTreeMap<Vec<Value>, RowId>,
    next_row_id: RowId,
    /// Next generated key for auto-increment tables.
    next_key: i64,
}

impl RowStore {
    /// Creates a new row store for the given table schema.
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            primary_index: BTreeMap::new(),
            next_row_id: 1,
            next_key: 1,
        }
    }

    /// Returns the table schema.
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Gets a row by ID.
    pub fn get(&self, row_id: RowId) -> Option<&Row> {
        self.rows.get(&row_id)
    }

    /// Iterates the rows in insertion order.
    pub fn scan(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }

    /// Finds the row holding a primary key.
    pub fn get_by_key(&self, key: &[Value]) -> Option<&Row> {
        self.primary_index
            .get(key)
            .and_then(|row_id| self.rows.get(row_id))
    }

    /// Coerces every value to its column kind and checks nullability.
    fn check_row(&self, values: Vec<Value>) -> Result<Vec<Value>> {
        let columns = self.schema.columns();
        if values.len() != columns.len() {
            return Err(Error::invalid_operation(format!(
                "Table {} has {} columns, got {} values",
                self.schema.name(),
                columns.len(),
                values.len()
            )));
        }
        values
            .into_iter()
            .zip(columns)
            .map(|(value, column)| {
                if value.is_null() {
                    if column.is_nullable() {
                        Ok(Value::Null)
                    } else {
                        Err(Error::null_constraint(column.name()))
                    }
                } else {
                    column.kind().coerce(column.name(), value)
                }
            })
            .collect()
    }

    /// Fills a null auto-increment key with the next generated value.
    fn assign_key(&mut self, values: &mut [Value]) {
        if !self.schema.auto_increment() {
            return;
        }
        let Some(&index) = self.schema.primary_key().first() else {
            return;
        };
        match &values[index] {
            Value::Null => {
                let key = self.next_key;
                self.next_key += 1;
                values[index] = match self.schema.columns()[index].kind() {
                    quarry_core::ColumnKind::LongInteger => Value::Int64(key),
                    _ => Value::Int32(key as i32),
                };
            }
            explicit => {
                if let Some(key) = explicit.as_i64() {
                    self.next_key = self.next_key.max(key + 1);
                }
            }
        }
    }

    /// Inserts a row into the store and returns its ID.
    ///
    /// A null auto-increment key is generated. Any other null key column is
    /// rejected.
    pub fn insert(&mut self, values: Vec<Value>) -> Result<RowId> {
        let mut values = self.check_row(values)?;
        let pk = self.schema.primary_key().to_vec();
        if !pk.is_empty() {
            let generated = self.schema.auto_increment() && values[pk[0]].is_null();
            if !generated {
                if let Some(&i) = pk.iter().find(|&&i| values[i].is_null()) {
                    return Err(Error::null_constraint(self.schema.columns()[i].name()));
                }
                let key = extract_key(&values, &pk);
                if self.primary_index.contains_key(&key) {
                    return Err(Error::unique_constraint(self.schema.name(), key));
                }
            }
            self.assign_key(&mut values);
        }

        let row_id = self.next_row_id;
        self.next_row_id += 1;
        if !pk.is_empty() {
            self.primary_index.insert(extract_key(&values, &pk), row_id);
        }
        self.rows.insert(row_id, Row::new(row_id, values));
        Ok(row_id)
    }

    /// Replaces the values of a row.
    pub fn update(&mut self, row_id: RowId, values: Vec<Value>) -> Result<()> {
        let values = self.check_row(values)?;
        let old = self
            .rows
            .get(&row_id)
            .ok_or_else(|| Error::invalid_operation(format!("Row {} not found", row_id)))?;

        let pk = self.schema.primary_key();
        if !pk.is_empty() {
            if let Some(&i) = pk.iter().find(|&&i| values[i].is_null()) {
                return Err(Error::null_constraint(self.schema.columns()[i].name()));
            }
            let old_key = extract_key(old.values(), pk);
            let new_key = extract_key(&values, pk);
            if old_key != new_key {
                if self.primary_index.contains_key(&new_key) {
                    return Err(Error::unique_constraint(self.schema.name(), new_key));
                }
                if self.schema.auto_increment() {
                    if let Some(key) = new_key[0].as_i64() {
                        self.next_key = self.next_key.max(key + 1);
                    }
                }
                self.primary_index.remove(&old_key);
                self.primary_index.insert(new_key, row_id);
            }
        }

        self.rows.insert(row_id, Row::new(row_id, values));
        Ok(())
    }

    /// Deletes a row from the store.
    pub fn delete(&mut self, row_id: RowId) -> Result<Row> {
        let row = self
            .rows
            .remove(&row_id)
            .ok_or_else(|| Error::invalid_operation(format!("Row {} not found", row_id)))?;
        let pk = self.schema.primary_key();
        if !pk.is_empty() {
            self.primary_index.remove(&extract_key(row.values(), pk));
        }
        Ok(row)
    }

    /// Removes all rows. Generated keys keep counting up.
    pub fn clear(&mut self) {
        self.rows.clear();
        self.primary_index.clear();
    }
}
