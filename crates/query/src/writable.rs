//! Table queries whose rows can be edited.

use crate::context::Context;
use crate::hooks::DeleteHook;
use crate::pipeline::Materialize;
use crate::row::{RowBinding, WritableRow};
use crate::table::TableQuery;
use crate::validate::{Validator, Verdict};
use quarry_core::Result;
use std::cell::RefCell;
use std::ops::Deref;
use std::rc::Rc;
use tracing::debug;

/// Compares trait objects by the address of their data.
fn same<T: ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

/// Validators and delete hooks of one writable query.
#[derive(Default)]
pub(crate) struct Rules {
    validators: RefCell<Vec<Rc<dyn Validator>>>,
    hooks: RefCell<Vec<Rc<dyn DeleteHook>>>,
}

impl Rules {
    /// Runs the validators in registration order, stopping at the first
    /// rejection.
    pub(crate) fn check(&self, row: &WritableRow) -> Result<Verdict> {
        let validators = self.validators.borrow().clone();
        for validator in validators {
            let verdict = validator.validate(row)?;
            if !verdict.is_accepted() {
                debug!(validator = validator.name(), message = ?verdict.message(), "row rejected");
                return Ok(verdict);
            }
        }
        Ok(Verdict::Accepted)
    }

    /// Runs every delete hook and keeps the first message.
    pub(crate) fn before_delete(&self, row: &WritableRow) -> Result<Option<String>> {
        let hooks = self.hooks.borrow().clone();
        let mut message = None;
        for hook in hooks {
            if let Some(produced) = hook.before_delete(row)? {
                message.get_or_insert(produced);
            }
        }
        Ok(message)
    }
}

/// A table query producing [`WritableRow`]s.
///
/// When created with an insert row, the last row of every result is a
/// pending-insert row; committing it inserts a new record.
pub struct WritableQuery {
    query: TableQuery<WritableRow>,
    rules: Rc<Rules>,
    insert_row: bool,
}

impl WritableQuery {
    /// Creates a writable query over `table`.
    pub fn new(context: &Rc<Context>, table: &str, insert_row: bool) -> Result<Self> {
        Self::build(context, table, None, insert_row)
    }

    /// Creates a writable query requesting only `columns` and the keys.
    pub fn with_columns(
        context: &Rc<Context>,
        table: &str,
        columns: &[&str],
        insert_row: bool,
    ) -> Result<Self> {
        Self::build(context, table, Some(columns), insert_row)
    }

    fn build(
        context: &Rc<Context>,
        table: &str,
        columns: Option<&[&str]>,
        insert_row: bool,
    ) -> Result<Self> {
        let rules = Rc::new(Rules::default());
        let binding = Rc::new(RowBinding {
            context: Rc::downgrade(context),
            rules: Rc::downgrade(&rules),
            table: table.to_string(),
            primary_keys: context.primary_keys(table)?,
        });
        let query = TableQuery::<WritableRow>::build(
            context,
            table,
            columns,
            Box::new(move |source: &Materialize<'_>| binding.materialize(source, insert_row)),
        )?;
        Ok(Self {
            query,
            rules,
            insert_row,
        })
    }

    pub fn has_insert_row(&self) -> bool {
        self.insert_row
    }

    /// Returns the pending-insert row of the current result.
    pub fn pending_row(&self) -> Result<Option<WritableRow>> {
        if !self.insert_row {
            return Ok(None);
        }
        Ok(self.rows()?.last().filter(|row| row.is_pending_insert()))
    }

    /// Registers a validator. Returns false if it was already registered.
    pub fn add_validator(&self, validator: Rc<dyn Validator>) -> bool {
        let mut validators = self.rules.validators.borrow_mut();
        if validators.iter().any(|v| same(v, &validator)) {
            return false;
        }
        validators.push(validator);
        true
    }

    /// Unregisters a validator. Returns false if it was not registered.
    pub fn remove_validator(&self, validator: &Rc<dyn Validator>) -> bool {
        let mut validators = self.rules.validators.borrow_mut();
        let before = validators.len();
        validators.retain(|v| !same(v, validator));
        validators.len() != before
    }

    /// Registers several validators. Returns true if any was new.
    pub fn add_validators<I>(&self, validators: I) -> bool
    where
        I: IntoIterator<Item = Rc<dyn Validator>>,
    {
        validators
            .into_iter()
            .fold(false, |changed, v| self.add_validator(v) || changed)
    }

    /// Unregisters several validators. Returns true if any was registered.
    pub fn remove_validators<'a, I>(&self, validators: I) -> bool
    where
        I: IntoIterator<Item = &'a Rc<dyn Validator>>,
    {
        validators
            .into_iter()
            .fold(false, |changed, v| self.remove_validator(v) || changed)
    }

    pub fn validator_count(&self) -> usize {
        self.rules.validators.borrow().len()
    }

    /// Registers a hook run before every delete.
    pub fn add_delete_hook(&self, hook: Rc<dyn DeleteHook>) -> bool {
        let mut hooks = self.rules.hooks.borrow_mut();
        if hooks.iter().any(|h| same(h, &hook)) {
            return false;
        }
        hooks.push(hook);
        true
    }

    pub fn remove_delete_hook(&self, hook: &Rc<dyn DeleteHook>) -> bool {
        let mut hooks = self.rules.hooks.borrow_mut();
        let before = hooks.len();
        hooks.retain(|h| !same(h, hook));
        hooks.len() != before
    }
}

impl Deref for WritableQuery {
    type Target = TableQuery<WritableRow>;

    fn deref(&self) -> &TableQuery<WritableRow> {
        &self.query
    }
}
