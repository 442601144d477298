//! Row validation.
//!
//! A [`Validator`] inspects a writable row before it is committed and either
//! accepts it or rejects it, optionally with a message for the user.
//! Rejection is an ordinary value; `Err` is reserved for failures such as a
//! lost connection.

mod booking;
mod hours;

pub use booking::{BookingColumns, NoDoubleBooking};
pub use hours::BusinessHours;

use crate::row::WritableRow;
use quarry_core::Result;

/// The decision of a validator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    /// Rejected, with an optional user-facing message.
    Rejected(Option<String>),
}

impl Verdict {
    /// Rejects with a message.
    pub fn reject(message: impl Into<String>) -> Self {
        Verdict::Rejected(Some(message.into()))
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Verdict::Rejected(Some(message)) => Some(message),
            _ => None,
        }
    }
}

impl From<bool> for Verdict {
    fn from(accepted: bool) -> Self {
        if accepted {
            Verdict::Accepted
        } else {
            Verdict::Rejected(None)
        }
    }
}

/// A business rule checked before a row is committed.
pub trait Validator {
    fn validate(&self, row: &WritableRow) -> Result<Verdict>;

    /// Names the rule in logs.
    fn name(&self) -> &str {
        "validator"
    }
}

impl<F> Validator for F
where
    F: Fn(&WritableRow) -> Result<Verdict>,
{
    fn validate(&self, row: &WritableRow) -> Result<Verdict> {
        self(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_from_bool() {
        assert!(Verdict::from(true).is_accepted());
        assert_eq!(Verdict::from(false), Verdict::Rejected(None));
        assert_eq!(Verdict::from(false).message(), None);
    }

    #[test]
    fn test_reject_carries_message() {
        let verdict = Verdict::reject("closed on sundays");
        assert!(!verdict.is_accepted());
        assert_eq!(verdict.message(), Some("closed on sundays"));
    }
}
