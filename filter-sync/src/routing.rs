//! Routes each filterable column to the store its value is persisted in, and builds the codec table the address
//! store needs for compound values.
use crate::{
    column::{flatten_columns, ColumnDef},
    error::{return_multiple_errors, FilterSyncError as Error},
    filter::{ColumnFilter, FilterKind, PersistenceTarget},
    store::codec::{JsonCodec, ListCodec, RangeCodec, ValueCodec},
};
use log::warn;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

/// A filterable column whose value is persisted
#[derive(Clone, Debug)]
pub struct PersistedColumn<'a> {
    /// Column identifier, used for the table's filter entry
    pub id: String,
    /// Store key: the filter's override key, or else the column identifier
    pub key: String,
    pub target: PersistenceTarget,
    pub filter: &'a ColumnFilter,
}

/// Every persisted filter of a column tree, in column order.
///
/// Fails if any filterable column, persisted or not, has no identifier.
pub fn persisted_columns(columns: &[ColumnDef]) -> Result<Vec<PersistedColumn<'_>>, Error> {
    let mut persisted = Vec::new();
    let mut errors = Vec::new();
    let mut seen_keys = HashSet::new();

    for column in flatten_columns(columns) {
        let Some(filter) = &column.filter else {
            continue;
        };
        let id = match column.column_id() {
            Ok(id) => id,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };
        let Some(target) = filter.persistence else {
            continue;
        };
        let key = filter.key.clone().unwrap_or_else(|| id.clone());
        if !seen_keys.insert((target, key.clone())) {
            warn!(
                "Column {} uses {} store key {} which is already used by another column.",
                id, target, key
            );
        }

        persisted.push(PersistedColumn {
            id,
            key,
            target,
            filter,
        });
    }
    return_multiple_errors(errors)?;

    Ok(persisted)
}

/// The codec a filter kind uses in the address store when the column does not name one
pub fn default_codec(kind: &FilterKind) -> Arc<dyn ValueCodec> {
    match kind {
        FilterKind::MultiSelect(_) => Arc::new(ListCodec::default()),
        FilterKind::DateRange(_) | FilterKind::NumberRange(_) => Arc::new(RangeCodec::default()),
        _ => Arc::new(JsonCodec),
    }
}

/// Codecs for every address-persisted filter, keyed by store key
pub fn url_codecs(columns: &[ColumnDef]) -> Result<HashMap<String, Arc<dyn ValueCodec>>, Error> {
    Ok(persisted_columns(columns)?
        .into_iter()
        .filter(|column| column.target == PersistenceTarget::Url)
        .map(|column| {
            let codec = column
                .filter
                .codec
                .clone()
                .unwrap_or_else(|| default_codec(&column.filter.kind));
            (column.key, codec)
        })
        .collect())
}

#[cfg(test)]
mod test {
    use crate::{
        column::ColumnDef,
        error::FilterSyncError as Error,
        filter::{ColumnFilter, FilterVariant, PersistenceTarget},
        routing::*,
        store::codec::ValueCodec,
    };
    use serde_json::json;

    fn filter(variant: FilterVariant, target: Option<PersistenceTarget>) -> ColumnFilter {
        let builder = match target {
            Some(target) => ColumnFilter::builder(variant).persistence(target),
            None => ColumnFilter::builder(variant),
        };
        builder.build().unwrap()
    }

    #[test]
    fn only_persisted_filters_are_routed() {
        let columns = vec![
            ColumnDef::new("name").with_filter(filter(FilterVariant::Text, Some(PersistenceTarget::Url))),
            ColumnDef::new("notes").with_filter(filter(FilterVariant::Text, None)),
            ColumnDef::new("plain"),
            ColumnDef::group(
                "group",
                vec![ColumnDef::accessor("status").with_filter(
                    ColumnFilter::builder(FilterVariant::Select)
                        .persistence(PersistenceTarget::Local)
                        .key("st")
                        .build()
                        .unwrap(),
                )],
            ),
        ];
        let routed = persisted_columns(&columns).unwrap();

        let summary: Vec<(&str, &str, PersistenceTarget)> = routed
            .iter()
            .map(|column| (column.id.as_str(), column.key.as_str(), column.target))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("name", "name", PersistenceTarget::Url),
                ("status", "st", PersistenceTarget::Local)
            ]
        );
    }

    #[test]
    fn filterable_columns_need_an_identifier() {
        let columns = vec![
            ColumnDef::group("No id", vec![]).with_filter(filter(FilterVariant::Text, None)),
            ColumnDef::group("Also no id", vec![])
                .with_filter(filter(FilterVariant::Text, Some(PersistenceTarget::Url))),
        ];

        assert_eq!(
            persisted_columns(&columns).unwrap_err(),
            Error::MultipleErrors(vec![
                Error::MissingColumnId("No id".to_string()),
                Error::MissingColumnId("Also no id".to_string())
            ])
        );
    }

    #[test]
    fn codec_table_uses_variant_defaults_and_overrides() {
        #[derive(Debug)]
        struct Upper;
        impl ValueCodec for Upper {
            fn encode(&self, value: &serde_json::Value) -> Result<String, Error> {
                Ok(value.as_str().unwrap_or_default().to_uppercase())
            }
            fn decode(&self, text: &str) -> Option<serde_json::Value> {
                Some(json!(text.to_lowercase()))
            }
        }

        let columns = vec![
            ColumnDef::new("tags")
                .with_filter(filter(FilterVariant::MultiSelect, Some(PersistenceTarget::Url))),
            ColumnDef::new("price")
                .with_filter(filter(FilterVariant::NumberRange, Some(PersistenceTarget::Url))),
            ColumnDef::new("code").with_filter(
                ColumnFilter::builder(FilterVariant::Text)
                    .persistence(PersistenceTarget::Url)
                    .codec(Arc::new(Upper))
                    .build()
                    .unwrap(),
            ),
            ColumnDef::new("local")
                .with_filter(filter(FilterVariant::MultiSelect, Some(PersistenceTarget::Local))),
        ];
        let codecs = url_codecs(&columns).unwrap();

        assert_eq!(codecs.len(), 3);
        assert_eq!(codecs["tags"].encode(&json!(["a", "b"])).unwrap(), "a,b");
        assert_eq!(codecs["price"].encode(&json!([1, 2])).unwrap(), "1~2");
        assert_eq!(codecs["code"].encode(&json!("abc")).unwrap(), "ABC");
    }
}
