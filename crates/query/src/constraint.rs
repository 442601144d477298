//! Query constraints and their rendering into query text.
//!
//! A constraint set renders as
//! `SELECT * FROM <table> WHERE <c1> AND <c2> AND ... AND TRUE`, with the
//! terms in a deterministic order. An empty set renders the unconstrained
//! `SELECT * FROM <table>`.

use quarry_core::Value;
use std::collections::btree_set;
use std::collections::BTreeSet;
use std::fmt;

/// Comparison operators available to constraints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Comparator {
    Lt,
    Eq,
    Gt,
    Gte,
    Lte,
    Neq,
}

impl Comparator {
    /// Returns the operator as written in query text.
    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Lt => "<",
            Comparator::Eq => "=",
            Comparator::Gt => ">",
            Comparator::Gte => ">=",
            Comparator::Lte => "<=",
            Comparator::Neq => "<>",
        }
    }
}

/// One term of a WHERE clause.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Constraint {
    /// `column op 'value'`
    Compare {
        column: String,
        comparator: Comparator,
        value: Value,
    },
    AlwaysTrue,
    AlwaysFalse,
}

impl Constraint {
    /// Creates a comparison constraint.
    pub fn new(column: impl Into<String>, comparator: Comparator, value: impl Into<Value>) -> Self {
        Constraint::Compare {
            column: column.into(),
            comparator,
            value: value.into(),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Compare {
                column,
                comparator,
                value,
            } => write!(f, "{} {} {}", column, comparator.symbol(), value.to_literal()),
            Constraint::AlwaysTrue => f.write_str("TRUE"),
            Constraint::AlwaysFalse => f.write_str("FALSE"),
        }
    }
}

/// A set of constraints, iterated in a fixed order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConstraintSet {
    constraints: BTreeSet<Constraint>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a constraint. Returns false if it was already present.
    pub fn insert(&mut self, constraint: Constraint) -> bool {
        self.constraints.insert(constraint)
    }

    /// Removes a constraint. Returns false if it was absent.
    pub fn remove(&mut self, constraint: &Constraint) -> bool {
        self.constraints.remove(constraint)
    }

    /// Adds several constraints. Returns true if any was new.
    pub fn extend<I>(&mut self, constraints: I) -> bool
    where
        I: IntoIterator<Item = Constraint>,
    {
        constraints
            .into_iter()
            .fold(false, |changed, c| self.constraints.insert(c) || changed)
    }

    /// Removes several constraints. Returns true if any was present.
    pub fn remove_all<'a, I>(&mut self, constraints: I) -> bool
    where
        I: IntoIterator<Item = &'a Constraint>,
    {
        constraints
            .into_iter()
            .fold(false, |changed, c| self.constraints.remove(c) || changed)
    }

    /// Replaces the whole set. Returns true if the contents changed.
    pub fn replace<I>(&mut self, constraints: I) -> bool
    where
        I: IntoIterator<Item = Constraint>,
    {
        let next: BTreeSet<Constraint> = constraints.into_iter().collect();
        if next == self.constraints {
            return false;
        }
        self.constraints = next;
        true
    }

    pub fn contains(&self, constraint: &Constraint) -> bool {
        self.constraints.contains(constraint)
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, Constraint> {
        self.constraints.iter()
    }

    /// Renders the query text selecting every column of `table` under this set.
    pub fn render_query(&self, table: &str) -> String {
        let mut text = format!("SELECT * FROM {}", table);
        if self.constraints.is_empty() {
            return text;
        }
        text.push_str(" WHERE ");
        for constraint in &self.constraints {
            text.push_str(&constraint.to_string());
            text.push_str(" AND ");
        }
        text.push_str("TRUE");
        text
    }
}

impl<'a> IntoIterator for &'a ConstraintSet {
    type Item = &'a Constraint;
    type IntoIter = btree_set::Iter<'a, Constraint>;

    fn into_iter(self) -> Self::IntoIter {
        self.constraints.iter()
    }
}

impl FromIterator<Constraint> for ConstraintSet {
    fn from_iter<I: IntoIterator<Item = Constraint>>(iter: I) -> Self {
        Self {
            constraints: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparator_symbols() {
        let rendered: Vec<&str> = [
            Comparator::Lt,
            Comparator::Eq,
            Comparator::Gt,
            Comparator::Gte,
            Comparator::Lte,
            Comparator::Neq,
        ]
        .iter()
        .map(|c| c.symbol())
        .collect();
        assert_eq!(rendered, vec!["<", "=", ">", ">=", "<=", "<>"]);
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(ConstraintSet::new().render_query("items"), "SELECT * FROM items");
    }

    #[test]
    fn test_render_terms() {
        let mut set = ConstraintSet::new();
        set.insert(Constraint::new("qty", Comparator::Gt, 4));
        assert_eq!(
            set.render_query("items"),
            "SELECT * FROM items WHERE qty > '4' AND TRUE"
        );

        set.insert(Constraint::AlwaysFalse);
        set.insert(Constraint::new("name", Comparator::Eq, "O'Hara"));
        assert_eq!(
            set.render_query("items"),
            "SELECT * FROM items WHERE name = 'O''Hara' AND qty > '4' AND FALSE AND TRUE"
        );
    }

    #[test]
    fn test_render_is_order_independent() {
        let a: ConstraintSet = vec![
            Constraint::new("b", Comparator::Lt, 2),
            Constraint::new("a", Comparator::Eq, 1),
        ]
        .into_iter()
        .collect();
        let b: ConstraintSet = vec![
            Constraint::new("a", Comparator::Eq, 1),
            Constraint::new("b", Comparator::Lt, 2),
        ]
        .into_iter()
        .collect();
        assert_eq!(a.render_query("t"), b.render_query("t"));
    }

    #[test]
    fn test_structural_equality() {
        let mut set = ConstraintSet::new();
        assert!(set.insert(Constraint::new("qty", Comparator::Gt, 4)));
        assert!(!set.insert(Constraint::new("qty", Comparator::Gt, 4)));
        assert!(set.contains(&Constraint::new("qty", Comparator::Gt, 4)));
        assert!(!set.remove(&Constraint::new("qty", Comparator::Gt, 5)));
        assert!(set.remove(&Constraint::new("qty", Comparator::Gt, 4)));
        assert!(set.is_empty());
    }

    #[test]
    fn test_bulk_operations() {
        let mut set = ConstraintSet::new();
        let terms = vec![Constraint::AlwaysTrue, Constraint::new("a", Comparator::Eq, 1)];
        assert!(set.extend(terms.clone()));
        assert!(!set.extend(terms.clone()));
        assert!(!set.replace(terms.clone()));
        assert!(set.remove_all(&terms));
        assert!(!set.remove_all(&terms));
        assert!(set.replace(vec![Constraint::AlwaysFalse]));
        assert_eq!(set.len(), 1);
    }
}
