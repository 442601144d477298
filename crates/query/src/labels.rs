//! Display labels for foreign-key values.

use crate::context::Context;
use crate::pipeline::RowSet;
use crate::row::ReadOnlyRow;
use crate::table::TableQuery;
use quarry_core::{Error, Result, Value};
use quarry_reactive::{compute, Dependencies, Node};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Keys of a referenced table in row order, with the label of each.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelMap {
    keys: Vec<Value>,
    labels: BTreeMap<Value, String>,
}

impl LabelMap {
    /// Returns the label of a key.
    pub fn label(&self, key: &Value) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Returns the keys in the order the referenced table returned them.
    pub fn keys(&self) -> &[Value] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Maps the primary key of a table to a human-readable column, for
/// presenting foreign-key cells.
///
/// The map is a node over the table's rows, so it follows the table's
/// channel like any other query.
pub struct KeyLabels {
    query: TableQuery,
    labels: Node<Rc<LabelMap>>,
}

impl KeyLabels {
    /// Labels the single-column primary key of `table` with `label_column`.
    pub fn new(context: &Rc<Context>, table: &str, label_column: &str) -> Result<Self> {
        let keys = context.primary_keys(table)?;
        let key_column = match keys.iter().collect::<Vec<_>>().as_slice() {
            [key] => (*key).clone(),
            _ => {
                return Err(Error::invalid_operation(format!(
                    "table {} needs exactly one primary-key column to label, found {}",
                    table,
                    keys.len()
                )))
            }
        };

        let query = TableQuery::with_columns(context, table, &[label_column])?;
        let label_column = label_column.to_string();
        let labels = context.graph().add(
            format!("{}.labels", table),
            compute(move |deps, _| {
                let rows: RowSet<ReadOnlyRow> = deps.get("rows")?;
                let mut map = LabelMap::default();
                for row in rows.snapshot() {
                    let key = row.get_by_name(&key_column)?.clone();
                    let label = row.get_by_name(&label_column)?.to_string();
                    map.labels.insert(key.clone(), label);
                    map.keys.push(key);
                }
                Ok(Rc::new(map))
            }),
            Dependencies::new().value("rows", query.rows_node()),
        )?;
        Ok(Self { query, labels })
    }

    /// Returns the current map.
    pub fn labels(&self) -> Result<Rc<LabelMap>> {
        self.query.context().graph().get(self.labels)
    }

    /// Returns the label of one key.
    pub fn label(&self, key: &Value) -> Result<Option<String>> {
        Ok(self.labels()?.label(key).map(str::to_string))
    }

    pub fn node(&self) -> Node<Rc<LabelMap>> {
        self.labels
    }

    pub fn query(&self) -> &TableQuery {
        &self.query
    }
}

impl Drop for KeyLabels {
    fn drop(&mut self) {
        self.query.context().graph().release(self.labels);
    }
}
