use super::{Validator, Verdict};
use crate::constraint::{Comparator, Constraint};
use crate::context::Context;
use crate::row::WritableRow;
use crate::table::TableQuery;
use quarry_core::{Result, Value};
use std::rc::Rc;
use tracing::debug;

/// Column names the double-booking check reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingColumns {
    pub id: String,
    pub counterpart: String,
    pub start: String,
    pub end: String,
}

impl Default for BookingColumns {
    fn default() -> Self {
        Self {
            id: "Appointment_ID".into(),
            counterpart: "Customer_ID".into(),
            start: "Start".into(),
            end: "End".into(),
        }
    }
}

/// Rejects a booking whose time range overlaps another booking of the
/// same counterpart.
///
/// Ranges are half-open, so a booking ending exactly when another starts
/// does not conflict. The check runs through a dedicated constrained query
/// that is re-parameterized and re-executed for every row. That query
/// subscribes to no channel, so commits elsewhere never re-execute it.
pub struct NoDoubleBooking {
    columns: BookingColumns,
    bookings: TableQuery,
}

impl NoDoubleBooking {
    /// Checks the `appointments` table with the default column names.
    pub fn new(context: &Rc<Context>) -> Result<Self> {
        Self::with_columns(context, "appointments", BookingColumns::default())
    }

    pub fn with_columns(context: &Rc<Context>, table: &str, columns: BookingColumns) -> Result<Self> {
        let bookings = TableQuery::with_columns(context, table, &[columns.id.as_str()])?;
        bookings.unsubscribe(table);
        Ok(Self { columns, bookings })
    }

    /// Returns the ids of bookings overlapping `[start, end)` for the
    /// counterpart, leaving out `exclude`.
    pub fn conflicts(
        &self,
        counterpart: Value,
        start: Value,
        end: Value,
        exclude: Value,
    ) -> Result<Vec<Value>> {
        let columns = &self.columns;
        let mut terms = vec![
            Constraint::new(&columns.counterpart, Comparator::Eq, counterpart),
            Constraint::new(&columns.start, Comparator::Lt, end),
            Constraint::new(&columns.end, Comparator::Gt, start),
        ];
        if !exclude.is_null() {
            terms.push(Constraint::new(&columns.id, Comparator::Neq, exclude));
        }
        if !self.bookings.replace_constraints(terms)? {
            self.bookings.refresh()?;
        }

        self.bookings
            .rows()?
            .snapshot()
            .iter()
            .map(|row| row.get_by_name(&columns.id).cloned())
            .collect()
    }
}

impl Validator for NoDoubleBooking {
    fn validate(&self, row: &WritableRow) -> Result<Verdict> {
        let columns = &self.columns;
        let counterpart = row.get_by_name(&columns.counterpart)?;
        let start = row.get_by_name(&columns.start)?;
        let end = row.get_by_name(&columns.end)?;
        if counterpart.is_null() || start.is_null() || end.is_null() {
            return Ok(Verdict::Accepted);
        }
        let id = row.get_by_name(&columns.id)?;

        let conflicts = self.conflicts(counterpart, start, end, id.clone())?;
        if conflicts.is_empty() {
            return Ok(Verdict::Accepted);
        }
        let ids: Vec<String> = conflicts.iter().map(|v| v.to_string()).collect();
        debug!(booking = %id, conflicts = ?ids, "double booking");
        Ok(Verdict::reject(format!(
            "overlaps existing booking(s) {}",
            ids.join(", ")
        )))
    }

    fn name(&self) -> &str {
        "no double booking"
    }
}
