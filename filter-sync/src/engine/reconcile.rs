//! The reconciliation passes as pure functions of explicit snapshots.
//!
//! Nothing here reads or writes a store. Each pass receives the routed columns, the bucket snapshots and the
//! table's filter list, and returns the writes it wants made. `FilterSync` applies them.
use crate::{
    filter::LoadingState,
    routing::PersistedColumn,
    sanitize::sanitize_value,
    store::{BucketPatches, Buckets},
    table::{find_entry, FilterEntry},
    value::{is_empty, values_equal},
};
use log::warn;
use serde_json::Value;

/// Compute the table's initial filter list from what the stores hold.
///
/// Stored values are sanitized, except for select filters whose options cannot be checked yet: those are trusted
/// as stored while their loading status is unknown, and skipped while they are loading unless `optimistic` is set.
/// If no column yields a value, the caller's `initial` list is returned instead.
pub fn bootstrap_filters(
    columns: &[PersistedColumn],
    buckets: &Buckets,
    initial: &[FilterEntry],
    optimistic: bool,
) -> Vec<FilterEntry> {
    let mut filters = Vec::new();

    for column in columns {
        let Some(raw) = stored_value(column, buckets) else {
            continue;
        };
        if let Some(value) = bootstrap_value(column, raw, optimistic) {
            filters.push(FilterEntry::new(&column.id, value));
        }
    }

    if filters.is_empty() {
        return initial.to_vec();
    }
    filters
}

fn bootstrap_value(column: &PersistedColumn, raw: &Value, optimistic: bool) -> Option<Value> {
    let Some(state) = column.filter.kind.select_state() else {
        return sanitized(column, raw);
    };
    match state.loading {
        LoadingState::Ready if !state.options.is_empty() => sanitized(column, raw),
        LoadingState::Loading if optimistic => Some(raw.clone()),
        LoadingState::Loading => None,
        // Nothing to validate against yet
        _ => Some(raw.clone()),
    }
}

// Sanitize a stored value, keeping it only if something non-empty is left
fn sanitized(column: &PersistedColumn, raw: &Value) -> Option<Value> {
    let value = sanitize_value(&column.filter.kind, raw).filter(|value| !is_empty(Some(value)));
    if value.is_none() {
        warn!(
            "Stored value {} for the {} filter {} is not valid and will be ignored.",
            raw,
            column.filter.kind.name(),
            column.id
        );
    }
    value
}

// The non-empty raw value stored for a column, if any
fn stored_value<'a>(column: &PersistedColumn, buckets: &'a Buckets) -> Option<&'a Value> {
    buckets
        .get(column.target, &column.key)
        .filter(|raw| !is_empty(Some(raw)))
}

// The non-empty value of a column's entry in a filter list, if any
fn entry_value<'a>(filters: &'a [FilterEntry], id: &str) -> Option<&'a Value> {
    find_entry(filters, id)
        .map(|entry| &entry.value)
        .filter(|value| !is_empty(Some(value)))
}

/// Compute the store writes for a change of the table's filter list.
///
/// Only columns whose value or presence actually changed are written. Lists are compared without regard to
/// order, so re-ordering a multi-select writes nothing.
pub fn diff_filters(
    columns: &[PersistedColumn],
    previous: &[FilterEntry],
    next: &[FilterEntry],
) -> BucketPatches {
    let mut patches = BucketPatches::default();

    for column in columns {
        match (entry_value(previous, &column.id), entry_value(next, &column.id)) {
            (None, None) => {}
            (Some(before), Some(after)) if values_equal(before, after) => {}
            (_, Some(after)) => patches.set(column.target, &column.key, Some(after.clone())),
            (Some(_), None) => patches.set(column.target, &column.key, None),
        }
    }

    patches
}

/// A change the post-load pass makes to one entry of the table's filter list
#[derive(Clone, Debug, PartialEq)]
pub struct Correction {
    pub id: String,
    /// The new value, or `None` to drop the entry
    pub value: Option<Value>,
}

/// Store writes and table corrections produced by the post-load pass
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadedCorrections {
    pub patches: BucketPatches,
    pub corrections: Vec<Correction>,
}

impl LoadedCorrections {
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty() && self.corrections.is_empty()
    }
}

/// Re-validate stored select values against option sets that just finished loading.
///
/// `columns` are the select columns whose options became final. For each one with a stored value, the value is
/// sanitized against the options; the store is corrected when the sanitized value differs from what is stored,
/// and the table when it differs from the table's entry. Values are compared by their JSON text.
pub fn reconcile_loaded(
    columns: &[&PersistedColumn],
    buckets: &Buckets,
    filters: &[FilterEntry],
) -> LoadedCorrections {
    let mut result = LoadedCorrections::default();

    for column in columns {
        if column.filter.kind.select_state().is_none() {
            continue;
        }
        // Nothing stored means nothing to clean up; the caller's initial state stands
        let Some(raw) = stored_value(column, buckets) else {
            continue;
        };
        let value = sanitized(column, raw);
        let text = value.as_ref().map(Value::to_string);

        if text.as_deref() != Some(raw.to_string().as_str()) {
            result
                .patches
                .set(column.target, &column.key, value.clone());
        }
        let current = find_entry(filters, &column.id).map(|entry| entry.value.to_string());
        if text != current {
            result.corrections.push(Correction {
                id: column.id.clone(),
                value,
            });
        }
    }

    result
}

/// Compute the writes that persist the caller's initial filters on a first visit.
///
/// If any persisted column already has a stored value, nothing is seeded, so a fresh initial configuration is
/// never mixed with values left over from an earlier session.
pub fn seed_filters(
    columns: &[PersistedColumn],
    buckets: &Buckets,
    initial: &[FilterEntry],
) -> BucketPatches {
    let mut patches = BucketPatches::default();
    if columns
        .iter()
        .any(|column| stored_value(column, buckets).is_some())
    {
        return patches;
    }

    for entry in initial {
        if is_empty(Some(&entry.value)) {
            continue;
        }
        if let Some(column) = columns.iter().find(|column| column.id == entry.id) {
            patches.set(column.target, &column.key, Some(entry.value.clone()));
        }
    }

    patches
}

#[cfg(test)]
mod test {
    use crate::{
        column::ColumnDef,
        engine::reconcile::*,
        filter::{ColumnFilter, FilterVariant, PersistenceTarget},
        routing::persisted_columns,
        store::{Bucket, Patch},
    };
    use serde_json::json;
    use test_log::test;

    fn columns() -> Vec<ColumnDef> {
        vec![
            ColumnDef::new("name").with_filter(
                ColumnFilter::builder(FilterVariant::Text)
                    .persistence(PersistenceTarget::Url)
                    .build()
                    .unwrap(),
            ),
            ColumnDef::new("tags").with_filter(
                ColumnFilter::builder(FilterVariant::MultiSelect)
                    .persistence(PersistenceTarget::Local)
                    .key("t")
                    .options(vec!["tag1", "tag2", "tag3"])
                    .loading(LoadingState::Ready)
                    .build()
                    .unwrap(),
            ),
            ColumnDef::new("age").with_filter(
                ColumnFilter::builder(FilterVariant::Number)
                    .persistence(PersistenceTarget::Url)
                    .build()
                    .unwrap(),
            ),
            ColumnDef::new("scratch")
                .with_filter(ColumnFilter::builder(FilterVariant::Text).build().unwrap()),
        ]
    }

    fn buckets(url: Value, local: Value) -> Buckets {
        let bucket = |value: Value| -> Bucket { serde_json::from_value(value).unwrap() };
        Buckets {
            url: bucket(url),
            local: bucket(local),
        }
    }

    #[test]
    fn bootstrap_sanitizes_and_skips_empty() {
        let columns = columns();
        let columns = persisted_columns(&columns).unwrap();
        let snapshot = buckets(
            json!({"name": "", "age": "42"}),
            json!({"t": ["tag2", "bogus"]}),
        );

        assert_eq!(
            bootstrap_filters(&columns, &snapshot, &[], false),
            vec![
                FilterEntry::new("tags", json!(["tag2"])),
                FilterEntry::new("age", json!(42))
            ]
        );
    }

    #[test]
    fn bootstrap_falls_back_to_initial() {
        let columns = columns();
        let columns = persisted_columns(&columns).unwrap();
        let initial = vec![FilterEntry::new("name", json!("ann"))];
        let snapshot = buckets(json!({"age": "old"}), json!({}));

        assert_eq!(bootstrap_filters(&columns, &snapshot, &initial, false), initial);
    }

    #[test]
    fn diff_writes_only_changed_columns() {
        let columns = columns();
        let columns = persisted_columns(&columns).unwrap();
        let previous = vec![
            FilterEntry::new("name", json!("ann")),
            FilterEntry::new("tags", json!(["tag1", "tag3"])),
            FilterEntry::new("scratch", json!("x")),
        ];
        let next = vec![
            FilterEntry::new("tags", json!(["tag3", "tag1"])),
            FilterEntry::new("age", json!(30)),
            FilterEntry::new("scratch", json!("y")),
        ];

        let patches = diff_filters(&columns, &previous, &next);
        assert_eq!(
            patches.url,
            Patch::from([
                ("age".to_string(), Some(json!(30))),
                ("name".to_string(), None)
            ])
        );
        assert!(patches.local.is_empty());
    }

    #[test]
    fn diff_treats_empty_values_as_absent() {
        let columns = columns();
        let columns = persisted_columns(&columns).unwrap();
        let previous = vec![FilterEntry::new("name", json!(""))];
        let next = vec![FilterEntry::new("tags", json!([]))];

        assert!(diff_filters(&columns, &previous, &next).is_empty());
    }

    #[test]
    fn seed_only_on_a_clean_slate() {
        let columns = columns();
        let columns = persisted_columns(&columns).unwrap();
        let initial = vec![
            FilterEntry::new("name", json!("ann")),
            FilterEntry::new("tags", json!(["tag1"])),
            FilterEntry::new("age", json!("")),
            FilterEntry::new("scratch", json!("x")),
        ];

        let patches = seed_filters(&columns, &Buckets::default(), &initial);
        assert_eq!(
            patches.url,
            Patch::from([("name".to_string(), Some(json!("ann")))])
        );
        assert_eq!(
            patches.local,
            Patch::from([("t".to_string(), Some(json!(["tag1"])))])
        );

        let leftovers = buckets(json!({"age": 7}), json!({}));
        assert!(seed_filters(&columns, &leftovers, &initial).is_empty());
    }

    #[test]
    fn reconcile_corrects_store_and_table_separately() {
        let columns = columns();
        let columns = persisted_columns(&columns).unwrap();
        let tags: Vec<&PersistedColumn> = columns.iter().filter(|column| column.id == "tags").collect();

        // Stored value is already valid but the table has not picked it up
        let snapshot = buckets(json!({}), json!({"t": ["tag1"]}));
        let result = reconcile_loaded(&tags, &snapshot, &[]);
        assert!(result.patches.is_empty());
        assert_eq!(
            result.corrections,
            vec![Correction {
                id: "tags".to_string(),
                value: Some(json!(["tag1"]))
            }]
        );

        // Both already agree with the sanitized value
        let filters = vec![FilterEntry::new("tags", json!(["tag1"]))];
        assert!(reconcile_loaded(&tags, &snapshot, &filters).is_empty());
    }
}
