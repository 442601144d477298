use super::{Validator, Verdict};
use crate::row::WritableRow;
use chrono::{NaiveDateTime, NaiveTime};
use quarry_core::{ColumnKind, Error, Result, Value};

// An invalid literal here fails the build instead of falling back.
const OPENS: NaiveTime = match NaiveTime::from_hms_opt(8, 0, 0) {
    Some(time) => time,
    None => panic!("invalid opening time"),
};
const CLOSES: NaiveTime = match NaiveTime::from_hms_opt(22, 0, 0) {
    Some(time) => time,
    None => panic!("invalid closing time"),
};

/// Requires a booking to start before it ends, within one day, inside
/// opening hours.
///
/// Rows with a null start or end are accepted; the submission criteria
/// already keep incomplete rows from being committed.
#[derive(Clone, Debug)]
pub struct BusinessHours {
    start_column: String,
    end_column: String,
    opens: NaiveTime,
    closes: NaiveTime,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self::new("Start", "End")
    }
}

impl BusinessHours {
    /// Checks the given columns against 08:00 to 22:00.
    pub fn new(start_column: impl Into<String>, end_column: impl Into<String>) -> Self {
        Self {
            start_column: start_column.into(),
            end_column: end_column.into(),
            opens: OPENS,
            closes: CLOSES,
        }
    }

    /// Replaces the opening hours.
    pub fn with_hours(mut self, opens: NaiveTime, closes: NaiveTime) -> Self {
        self.opens = opens;
        self.closes = closes;
        self
    }

    fn timestamp(row: &WritableRow, column: &str) -> Result<Option<NaiveDateTime>> {
        match row.get_by_name(column)? {
            Value::Null => Ok(None),
            Value::Timestamp(t) => Ok(Some(t)),
            other => Err(Error::type_mismatch(column, ColumnKind::Timestamp, other)),
        }
    }
}

impl Validator for BusinessHours {
    fn validate(&self, row: &WritableRow) -> Result<Verdict> {
        let start = Self::timestamp(row, &self.start_column)?;
        let end = Self::timestamp(row, &self.end_column)?;
        let (Some(start), Some(end)) = (start, end) else {
            return Ok(Verdict::Accepted);
        };

        if start >= end {
            return Ok(Verdict::reject("the start time must be before the end time"));
        }
        if start.date() != end.date() {
            return Ok(Verdict::reject("bookings must start and end on the same day"));
        }
        if start.time() < self.opens || end.time() > self.closes {
            return Ok(Verdict::reject(format!(
                "bookings must fall between {} and {}",
                self.opens.format("%H:%M"),
                self.closes.format("%H:%M")
            )));
        }
        Ok(Verdict::Accepted)
    }

    fn name(&self) -> &str {
        "business hours"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_opening_hours() {
        let hours = BusinessHours::default();
        assert_eq!(hours.opens.format("%H:%M").to_string(), "08:00");
        assert_eq!(hours.closes.format("%H:%M").to_string(), "22:00");
        assert!(hours.opens < hours.closes);
    }
}
