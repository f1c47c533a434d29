//! The contract with the host table: its filter list, and the update it accepts.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One active filter of the table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterEntry {
    /// Identifier of the filtered column
    pub id: String,
    pub value: Value,
}

impl FilterEntry {
    pub fn new(id: &str, value: Value) -> Self {
        Self {
            id: id.to_string(),
            value,
        }
    }
}

/// Find the entry for a column in a filter list
pub fn find_entry<'a>(filters: &'a [FilterEntry], id: &str) -> Option<&'a FilterEntry> {
    filters.iter().find(|entry| entry.id == id)
}

/// A change to the table's filter list.
///
/// Every update is a function from the current list to the next one; a literal list is lifted into a function
/// that ignores its input.
pub struct FilterUpdate(Box<dyn FnOnce(&[FilterEntry]) -> Vec<FilterEntry>>);

impl FilterUpdate {
    pub fn new<F: FnOnce(&[FilterEntry]) -> Vec<FilterEntry> + 'static>(update: F) -> Self {
        Self(Box::new(update))
    }

    /// Compute the next filter list
    pub fn apply(self, current: &[FilterEntry]) -> Vec<FilterEntry> {
        (self.0)(current)
    }

    /// Replace the entry of one column, or drop it when `value` is `None`
    pub fn set_entry(id: &str, value: Option<Value>) -> Self {
        let id = id.to_string();
        Self::new(move |current| {
            let mut next: Vec<FilterEntry> = current
                .iter()
                .filter(|entry| entry.id != id)
                .cloned()
                .collect();
            if let Some(value) = value {
                next.push(FilterEntry { id, value });
            }
            next
        })
    }
}

impl From<Vec<FilterEntry>> for FilterUpdate {
    fn from(filters: Vec<FilterEntry>) -> Self {
        Self::new(move |_| filters)
    }
}

impl fmt::Debug for FilterUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FilterUpdate(..)")
    }
}

/// The part of a host table the engine drives
pub trait FilterTable {
    /// The current filter list
    fn filters(&self) -> Vec<FilterEntry>;

    fn set_filters(&mut self, update: FilterUpdate);
}

impl FilterTable for Vec<FilterEntry> {
    fn filters(&self) -> Vec<FilterEntry> {
        self.clone()
    }

    fn set_filters(&mut self, update: FilterUpdate) {
        let next = update.apply(self.as_slice());
        *self = next;
    }
}

#[cfg(test)]
mod test {
    use crate::table::*;
    use serde_json::json;

    #[test]
    fn literal_list_ignores_current() {
        let current = vec![FilterEntry::new("a", json!(1))];
        let update = FilterUpdate::from(vec![FilterEntry::new("b", json!(2))]);

        assert_eq!(update.apply(&current), vec![FilterEntry::new("b", json!(2))]);
    }

    #[test]
    fn set_entry_replaces_or_drops() {
        let mut table = vec![
            FilterEntry::new("a", json!(1)),
            FilterEntry::new("b", json!(2)),
        ];
        table.set_filters(FilterUpdate::set_entry("a", Some(json!(10))));
        assert_eq!(
            table,
            vec![FilterEntry::new("b", json!(2)), FilterEntry::new("a", json!(10))]
        );

        table.set_filters(FilterUpdate::set_entry("b", None));
        assert_eq!(table, vec![FilterEntry::new("a", json!(10))]);
        assert_eq!(find_entry(&table, "a").map(|entry| &entry.value), Some(&json!(10)));
    }
}
