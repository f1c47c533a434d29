//! Column definitions as the host table declares them, and the helpers that flatten column groups and resolve a
//! stable identifier for each column.
use crate::{
    error::FilterSyncError as Error,
    filter::{ColumnFilter, ColumnFilterSpec},
};
use log::warn;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Column groups nested deeper than this are not traversed
pub const MAX_COLUMN_DEPTH: usize = 64;

/// A column definition, or a group of columns when `columns` is non-empty
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDef {
    /// Explicit column identifier
    pub id: Option<String>,
    /// Name of the row field the column reads. Used as the identifier when `id` is not set.
    #[serde(default, deserialize_with = "deserialize_accessor_key")]
    pub accessor_key: Option<String>,
    pub header: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnDef>,
    #[serde(default, deserialize_with = "deserialize_filter")]
    pub filter: Option<ColumnFilter>,
}

impl ColumnDef {
    /// A leaf column with an explicit identifier
    pub fn new(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Default::default()
        }
    }

    /// A leaf column identified by the row field it reads
    pub fn accessor(accessor_key: &str) -> Self {
        Self {
            accessor_key: Some(accessor_key.to_string()),
            ..Default::default()
        }
    }

    /// A group of columns
    pub fn group(header: &str, columns: Vec<ColumnDef>) -> Self {
        Self {
            header: Some(header.to_string()),
            columns,
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, filter: ColumnFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Parse a list of column definitions from a JSON string
    pub fn from_json(json: &str) -> Result<Vec<Self>, Error> {
        serde_json::from_str(json).map_err(|e| Error::DeserializationError(e.to_string()))
    }

    /// The stable identifier of the column: its `id`, or else its `accessor_key`.
    ///
    /// A column with neither cannot be round-tripped through a store, so this is a configuration error.
    pub fn column_id(&self) -> Result<String, Error> {
        self.id
            .clone()
            .or_else(|| self.accessor_key.clone())
            .ok_or_else(|| {
                Error::MissingColumnId(
                    self.header
                        .clone()
                        .unwrap_or_else(|| "without a header".to_string()),
                )
            })
    }
}

// Accessor keys may be given as numbers (array-backed rows) as well as strings
fn deserialize_accessor_key<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    use serde::de::Error as _;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(key)) => Ok(Some(key)),
        Some(Value::Number(index)) => Ok(Some(index.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "accessorKey must be a string or a number, found {}",
            other
        ))),
    }
}

fn deserialize_filter<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<ColumnFilter>, D::Error> {
    use serde::de::Error as _;

    Option::<ColumnFilterSpec>::deserialize(deserializer)?
        .map(ColumnFilter::try_from)
        .transpose()
        .map_err(D::Error::custom)
}

/// Flatten a column tree in pre-order: every column is followed by the flattened columns of its group.
///
/// Group columns are part of the output; callers skip the columns that carry no filter.
pub fn flatten_columns(columns: &[ColumnDef]) -> Vec<&ColumnDef> {
    let mut flat = Vec::new();
    push_columns(columns, 0, &mut flat);
    flat
}

fn push_columns<'a>(columns: &'a [ColumnDef], depth: usize, flat: &mut Vec<&'a ColumnDef>) {
    if depth >= MAX_COLUMN_DEPTH {
        warn!(
            "Column groups are nested more than {} levels deep. {} deeper columns are ignored.",
            MAX_COLUMN_DEPTH,
            columns.len()
        );
        return;
    }
    for column in columns {
        flat.push(column);
        push_columns(&column.columns, depth + 1, flat);
    }
}

#[cfg(test)]
mod test {
    use crate::{
        column::*,
        filter::{FilterKind, FilterVariant, PersistenceTarget},
    };
    use test_log::test;

    fn ids(columns: &[&ColumnDef]) -> Vec<String> {
        columns
            .iter()
            .map(|column| {
                column
                    .column_id()
                    .unwrap_or_else(|_| column.header.clone().unwrap())
            })
            .collect()
    }

    #[test]
    fn flatten_is_pre_order() {
        let columns = vec![
            ColumnDef::new("a"),
            ColumnDef::group(
                "group",
                vec![
                    ColumnDef::new("b"),
                    ColumnDef::group("inner", vec![ColumnDef::new("c")]),
                    ColumnDef::new("d"),
                ],
            ),
            ColumnDef::new("e"),
        ];

        assert_eq!(
            ids(&flatten_columns(&columns)),
            vec!["a", "group", "b", "inner", "c", "d", "e"]
        );
    }

    #[test]
    fn flatten_stops_at_depth_limit() {
        let mut column = ColumnDef::new("leaf");
        for level in 0..MAX_COLUMN_DEPTH + 5 {
            column = ColumnDef::group(&format!("g{}", level), vec![column]);
        }

        assert_eq!(flatten_columns(&[column]).len(), MAX_COLUMN_DEPTH);
    }

    #[test]
    fn id_falls_back_to_accessor() {
        assert_eq!(ColumnDef::new("role").column_id().unwrap(), "role");
        assert_eq!(ColumnDef::accessor("email").column_id().unwrap(), "email");

        let both = ColumnDef {
            id: Some("id".to_string()),
            accessor_key: Some("accessor".to_string()),
            ..Default::default()
        };
        assert_eq!(both.column_id().unwrap(), "id");
    }

    #[test]
    fn id_missing_is_an_error() {
        let column = ColumnDef {
            header: Some("Role".to_string()),
            ..Default::default()
        };

        assert_eq!(
            column.column_id(),
            Err(Error::MissingColumnId("Role".to_string()))
        );
    }

    #[test]
    fn columns_from_json() {
        let columns = ColumnDef::from_json(
            r#"[
                {"accessorKey": "name", "header": "Name", "filter": {"variant": "text", "persistenceStorage": "url"}},
                {"header": "Details", "columns": [
                    {"id": "price", "filter": {"variant": "numberRange", "min": 0, "max": "100"}},
                    {"accessorKey": 3}
                ]}
            ]"#,
        )
        .unwrap();
        let flat = flatten_columns(&columns);

        assert_eq!(ids(&flat), vec!["name", "Details", "price", "3"]);
        let name_filter = flat[0].filter.as_ref().unwrap();
        assert_eq!(name_filter.variant(), Some(FilterVariant::Text));
        assert_eq!(name_filter.persistence, Some(PersistenceTarget::Url));
        assert!(matches!(
            flat[2].filter.as_ref().unwrap().kind,
            FilterKind::NumberRange(bounds) if bounds.min == Some(0.0) && bounds.max == Some(100.0)
        ));
    }

    #[test]
    fn columns_from_json_with_illegal_filter() {
        let result = ColumnDef::from_json(
            r#"[{"id": "name", "filter": {"variant": "text", "options": ["a"]}}]"#,
        );

        assert!(matches!(result, Err(Error::DeserializationError(_))));
    }
}
