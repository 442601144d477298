//! Requested-column bookkeeping.
//!
//! Each query keeps a map from column name to whether a consumer asked to
//! see it. Protected columns (the primary keys of table queries) are always
//! requested.

use quarry_core::schema::ColumnDescriptor;
use std::collections::BTreeSet;

/// Column name -> requested flag, in the order columns were first seen.
#[derive(Clone, Debug, Default)]
pub struct ColumnVisibility {
    entries: Vec<(String, bool)>,
    protected: BTreeSet<String>,
}

impl ColumnVisibility {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == name)
    }

    fn set(&mut self, name: &str, requested: bool) -> bool {
        match self.position(name) {
            Some(i) => std::mem::replace(&mut self.entries[i].1, requested),
            None => {
                self.entries.push((name.to_string(), requested));
                false
            }
        }
    }

    /// Merges freshly read metadata. Known columns keep their flag, new
    /// columns start requested, and columns that vanished stay in the map.
    pub fn refresh(&mut self, columns: &[ColumnDescriptor]) {
        for column in columns {
            if self.position(column.name()).is_none() {
                self.entries.push((column.name().to_string(), true));
            }
        }
    }

    /// Marks columns as protected and requests them.
    pub fn protect<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            self.set(&name, true);
            self.protected.insert(name);
        }
    }

    pub fn is_protected(&self, name: &str) -> bool {
        self.protected.contains(name)
    }

    /// Requests a column. Returns whether it was already requested.
    pub fn add(&mut self, name: &str) -> bool {
        self.set(name, true)
    }

    /// Stops requesting a column. Returns whether it was requested.
    ///
    /// Protected columns are left alone and report false.
    pub fn remove(&mut self, name: &str) -> bool {
        if self.is_protected(name) {
            return false;
        }
        self.set(name, false)
    }

    pub fn add_all<'a, I>(&mut self, names: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for name in names {
            self.add(name);
        }
    }

    /// Stops requesting every named column that is not protected.
    pub fn remove_all<'a, I>(&mut self, names: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for name in names {
            self.remove(name);
        }
    }

    /// Requests exactly the named columns plus the protected ones.
    pub fn overwrite<'a, I>(&mut self, names: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let wanted: BTreeSet<&str> = names.into_iter().collect();
        for (name, requested) in self.entries.iter_mut() {
            *requested = wanted.contains(name.as_str()) || self.protected.contains(name);
        }
        for name in wanted {
            if self.position(name).is_none() {
                self.entries.push((name.to_string(), true));
            }
        }
    }

    /// Stops requesting everything except the protected columns.
    pub fn clear(&mut self) {
        for (name, requested) in self.entries.iter_mut() {
            *requested = self.protected.contains(name);
        }
    }

    pub fn is_requested(&self, name: &str) -> bool {
        self.position(name)
            .map(|i| self.entries[i].1)
            .unwrap_or(false)
    }

    /// Returns the requested columns in first-seen order.
    pub fn requested(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, requested)| *requested)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Returns every known column with its flag.
    pub fn entries(&self) -> &[(String, bool)] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::ColumnKind;

    fn columns(names: &[&str]) -> Vec<ColumnDescriptor> {
        names
            .iter()
            .map(|n| ColumnDescriptor::new(*n, ColumnKind::Text, "t"))
            .collect()
    }

    #[test]
    fn test_refresh_is_additive() {
        let mut visibility = ColumnVisibility::new();
        visibility.refresh(&columns(&["id", "name"]));
        visibility.remove("name");
        visibility.refresh(&columns(&["id", "name", "qty"]));
        assert_eq!(visibility.requested(), vec!["id", "qty"]);

        visibility.refresh(&columns(&["id"]));
        assert_eq!(visibility.entries().len(), 3);
    }

    #[test]
    fn test_add_remove_report_previous() {
        let mut visibility = ColumnVisibility::new();
        visibility.refresh(&columns(&["id", "name"]));
        assert!(visibility.remove("name"));
        assert!(!visibility.remove("name"));
        assert!(!visibility.add("name"));
        assert!(visibility.add("name"));
        assert!(!visibility.add("extra"));
        assert!(visibility.is_requested("extra"));
    }

    #[test]
    fn test_protected_columns() {
        let mut visibility = ColumnVisibility::new();
        visibility.refresh(&columns(&["id", "name", "qty"]));
        visibility.protect(["id"]);

        assert!(!visibility.remove("id"));
        assert!(visibility.is_requested("id"));

        visibility.remove_all(["id", "name"]);
        assert_eq!(visibility.requested(), vec!["id", "qty"]);

        visibility.overwrite(["qty"]);
        assert_eq!(visibility.requested(), vec!["id", "qty"]);

        visibility.clear();
        assert_eq!(visibility.requested(), vec!["id"]);
    }

    #[test]
    fn test_overwrite_adds_unknown() {
        let mut visibility = ColumnVisibility::new();
        visibility.refresh(&columns(&["a", "b"]));
        visibility.overwrite(["b", "c"]);
        assert_eq!(visibility.requested(), vec!["b", "c"]);
        visibility.add_all(["a"]);
        assert_eq!(visibility.requested(), vec!["a", "b", "c"]);
    }
}
