//! Connections and statements of the in-memory data source.

use super::cursor::MemoryCursor;
use super::sql::{self, Command, Filter};
use super::{Lifeline, MemoryDatabase};
use crate::source::{Connection, CursorHandle, Statement, StatementHandle};
use quarry_core::schema::ColumnDescriptor;
use quarry_core::{Error, Result, Row};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

/// A connection to a `MemoryDatabase`.
pub struct MemoryConnection {
    db: MemoryDatabase,
    lifeline: Rc<Lifeline>,
}

impl MemoryConnection {
    pub(crate) fn new(db: MemoryDatabase, lifeline: Rc<Lifeline>) -> Self {
        Self { db, lifeline }
    }
}

impl Connection for MemoryConnection {
    fn is_valid(&self) -> bool {
        self.lifeline.is_open()
    }

    fn close(&self) {
        self.lifeline.close();
    }

    fn primary_keys(&self, table: &str) -> Result<Vec<String>> {
        self.lifeline.ensure_open()?;
        Ok(self
            .db
            .tables()
            .borrow()
            .get_table(table)?
            .schema()
            .primary_key_names())
    }

    fn columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        self.lifeline.ensure_open()?;
        Ok(self
            .db
            .tables()
            .borrow()
            .get_table(table)?
            .schema()
            .columns()
            .to_vec())
    }

    fn create_statement(&self) -> Result<StatementHandle> {
        self.lifeline.ensure_open()?;
        Ok(Rc::new(MemoryStatement {
            db: self.db.clone(),
            lifeline: Lifeline::child("statement", &self.lifeline),
            current: RefCell::new(None),
        }))
    }
}

/// A statement of a `MemoryConnection`.
pub struct MemoryStatement {
    db: MemoryDatabase,
    lifeline: Rc<Lifeline>,
    /// Lifeline of the cursor returned by the last query.
    current: RefCell<Option<Rc<Lifeline>>>,
}

impl MemoryStatement {
    fn close_current(&self) {
        if let Some(previous) = self.current.borrow_mut().take() {
            previous.close();
        }
    }
}

impl Statement for MemoryStatement {
    fn execute_query(&self, text: &str) -> Result<CursorHandle> {
        self.lifeline.ensure_open()?;
        let (table, terms) = match sql::parse(text)? {
            Command::Select { table, filter } => (table, filter),
            Command::Delete { .. } => return Err(Error::syntax(text, "expected a SELECT query")),
        };

        let (columns, rows) = {
            let tables = self.db.tables().borrow();
            let store = tables.get_table(&table)?;
            let filter = Filter::bind(&terms, store.schema())?;
            let rows: Vec<Row> = store
                .scan()
                .filter(|row| filter.matches(row.values()))
                .cloned()
                .collect();
            let columns: Rc<[ColumnDescriptor]> = store.schema().columns().into();
            (columns, rows)
        };

        self.close_current();
        let lifeline = Lifeline::child("cursor", &self.lifeline);
        *self.current.borrow_mut() = Some(lifeline.clone());
        debug!(query = text, rows = rows.len(), "executed query");
        Ok(Rc::new(MemoryCursor::new(
            self.db.clone(),
            table,
            columns,
            rows,
            lifeline,
        )))
    }

    fn execute_update(&self, text: &str) -> Result<usize> {
        self.lifeline.ensure_open()?;
        let (table, terms) = match sql::parse(text)? {
            Command::Delete { table, filter } => (table, filter),
            Command::Select { .. } => return Err(Error::syntax(text, "expected a DELETE command")),
        };

        let mut tables = self.db.tables().borrow_mut();
        let store = tables.get_table_mut(&table)?;
        let filter = Filter::bind(&terms, store.schema())?;
        let doomed: Vec<_> = store
            .scan()
            .filter(|row| filter.matches(row.values()))
            .map(|row| row.id())
            .collect();
        for row_id in &doomed {
            store.delete(*row_id)?;
        }
        debug!(command = text, rows = doomed.len(), "executed update");
        Ok(doomed.len())
    }

    fn is_closed(&self) -> bool {
        !self.lifeline.is_open()
    }

    fn close(&self) {
        self.close_current();
        self.lifeline.close();
    }
}
