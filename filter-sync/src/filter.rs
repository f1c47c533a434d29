//! Filter metadata attached to a table column: what kind of filter it is, where its value is persisted, and the
//! per-variant payload (option lists, loading status, bounds) the sanitizers validate against.
use crate::{
    error::{add_error, return_multiple_errors, FilterSyncError as Error},
    store::codec::ValueCodec,
    value::{coerce_date, coerce_number, coerce_string},
};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;
use std::{str::FromStr, sync::Arc};
use strum::{AsRefStr, Display, EnumString};

/// The declared kind of a filter
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum FilterVariant {
    Text,
    Number,
    Date,
    DateRange,
    NumberRange,
    Select,
    MultiSelect,
}

/// Which store a filter value is persisted in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PersistenceTarget {
    /// The address bar query string
    Url,
    /// The device-resident local store
    Local,
}

/// Whether the option set of a select filter is known yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LoadingState {
    /// The option source has not reported a status
    #[default]
    Unknown,
    /// The options are still being fetched
    Loading,
    /// The options are final
    Ready,
}

impl LoadingState {
    /// Returns `true` unless the options are known to still be loading
    pub fn is_settled(&self) -> bool {
        !matches!(self, LoadingState::Loading)
    }
}

impl From<Option<bool>> for LoadingState {
    fn from(is_loading: Option<bool>) -> Self {
        match is_loading {
            Some(true) => LoadingState::Loading,
            Some(false) => LoadingState::Ready,
            None => LoadingState::Unknown,
        }
    }
}

/// One choice of a select or multi-select filter.
///
/// Only the `value` takes part in validation; the `label` is carried for the host's rendering.
#[skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub value: String,
    pub label: Option<String>,
}

impl SelectOption {
    pub fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
            label: None,
        }
    }

    pub fn labelled(value: &str, label: &str) -> Self {
        Self {
            value: value.to_string(),
            label: Some(label.to_string()),
        }
    }
}

impl From<&str> for SelectOption {
    fn from(value: &str) -> Self {
        SelectOption::new(value)
    }
}

// Options arrive either as bare scalars or as `{ value, label }` objects
impl<'de> Deserialize<'de> for SelectOption {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<SelectOption, D::Error> {
        use serde::de::Error as _;

        let raw = Value::deserialize(deserializer)?;
        if let Some(value) = coerce_string(&raw) {
            return Ok(SelectOption { value, label: None });
        }
        let Value::Object(map) = &raw else {
            return Err(D::Error::custom(format!(
                "expected a scalar or an object with a `value`, found {}",
                raw
            )));
        };
        let value = map
            .get("value")
            .and_then(coerce_string)
            .ok_or_else(|| D::Error::custom("select option is missing a scalar `value`"))?;
        let label = map.get("label").and_then(coerce_string);

        Ok(SelectOption { value, label })
    }
}

/// Inclusive bounds for a date or date-range filter. Either side may be open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateBounds {
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
}

/// Inclusive bounds for a number-range filter. Either side may be open.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NumberBounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Option list and loading status shared by both select variants
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectState {
    pub options: Vec<SelectOption>,
    pub loading: LoadingState,
}

impl SelectState {
    /// Returns `true` if `candidate` is one of the option values
    pub fn contains(&self, candidate: &str) -> bool {
        self.options.iter().any(|option| option.value == candidate)
    }
}

/// The variant of a filter together with the payload its sanitizer needs
#[derive(Clone, Debug, PartialEq)]
pub enum FilterKind {
    Text,
    Number,
    Date(DateBounds),
    DateRange(DateBounds),
    NumberRange(NumberBounds),
    Select(SelectState),
    MultiSelect(SelectState),
    /// A host-defined variant this crate does not know how to validate; values pass through unchanged
    Custom(String),
}

impl FilterKind {
    /// The name of the variant, as it appears in column metadata
    pub fn name(&self) -> &str {
        match self {
            FilterKind::Text => FilterVariant::Text.as_ref(),
            FilterKind::Number => FilterVariant::Number.as_ref(),
            FilterKind::Date(_) => FilterVariant::Date.as_ref(),
            FilterKind::DateRange(_) => FilterVariant::DateRange.as_ref(),
            FilterKind::NumberRange(_) => FilterVariant::NumberRange.as_ref(),
            FilterKind::Select(_) => FilterVariant::Select.as_ref(),
            FilterKind::MultiSelect(_) => FilterVariant::MultiSelect.as_ref(),
            FilterKind::Custom(name) => name,
        }
    }

    /// The option list and loading status, for the two select variants
    pub fn select_state(&self) -> Option<&SelectState> {
        match self {
            FilterKind::Select(state) | FilterKind::MultiSelect(state) => Some(state),
            _ => None,
        }
    }
}

/// Filter metadata attached to a column
#[derive(Clone, Debug)]
pub struct ColumnFilter {
    pub kind: FilterKind,
    /// Where the value is persisted. `None` means the filter is not persisted at all.
    pub persistence: Option<PersistenceTarget>,
    /// Store key, if it should differ from the column identifier
    pub key: Option<String>,
    /// Codec used when the value is written to the address bar
    pub codec: Option<Arc<dyn ValueCodec>>,
}

impl ColumnFilter {
    /// Start building filter metadata for a variant
    pub fn builder(variant: FilterVariant) -> ColumnFilterBuilder {
        ColumnFilterBuilder::new(variant)
    }

    /// Metadata for a host-defined variant whose values are passed through unchanged
    pub fn custom(name: &str) -> Self {
        Self {
            kind: FilterKind::Custom(name.to_string()),
            persistence: None,
            key: None,
            codec: None,
        }
    }

    pub fn variant(&self) -> Option<FilterVariant> {
        FilterVariant::from_str(self.kind.name()).ok()
    }

    pub fn is_select(&self) -> bool {
        self.kind.select_state().is_some()
    }

    /// Replace the option list and loading status of a select filter.
    ///
    /// Hosts call this on every render as their option source resolves. It is a no-op for other variants.
    pub fn set_options(&mut self, options: Vec<SelectOption>, loading: LoadingState) {
        if let FilterKind::Select(state) | FilterKind::MultiSelect(state) = &mut self.kind {
            state.options = options;
            state.loading = loading;
        }
    }
}

/// Builder for `ColumnFilter`.
///
/// Properties that do not apply to the chosen variant are rejected when `build()` is called.
#[derive(Debug, Clone)]
pub struct ColumnFilterBuilder {
    variant: FilterVariant,
    persistence: Option<PersistenceTarget>,
    key: Option<String>,
    codec: Option<Arc<dyn ValueCodec>>,
    options: Option<Vec<SelectOption>>,
    loading: Option<LoadingState>,
    min: Option<f64>,
    max: Option<f64>,
    from_date: Option<Timestamp>,
    to_date: Option<Timestamp>,
}

impl ColumnFilterBuilder {
    pub fn new(variant: FilterVariant) -> Self {
        Self {
            variant,
            persistence: None,
            key: None,
            codec: None,
            options: None,
            loading: None,
            min: None,
            max: None,
            from_date: None,
            to_date: None,
        }
    }

    pub fn persistence(mut self, target: PersistenceTarget) -> Self {
        self.persistence = Some(target);
        self
    }

    pub fn key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }

    pub fn codec(mut self, codec: Arc<dyn ValueCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn options<T: Into<SelectOption>>(mut self, options: Vec<T>) -> Self {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn loading(mut self, loading: LoadingState) -> Self {
        self.loading = Some(loading);
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn from_date(mut self, from_date: Timestamp) -> Self {
        self.from_date = Some(from_date);
        self
    }

    pub fn to_date(mut self, to_date: Timestamp) -> Self {
        self.to_date = Some(to_date);
        self
    }

    pub fn build(self) -> Result<ColumnFilter, Error> {
        let mut errors = Vec::new();
        let is_select = matches!(self.variant, FilterVariant::Select | FilterVariant::MultiSelect);
        let is_date = matches!(self.variant, FilterVariant::Date | FilterVariant::DateRange);

        if !is_select {
            add_error(&mut errors, self.illegal("options", self.options.is_some()));
            add_error(&mut errors, self.illegal("isLoading", self.loading.is_some()));
        }
        if self.variant != FilterVariant::NumberRange {
            add_error(&mut errors, self.illegal("min", self.min.is_some()));
            add_error(&mut errors, self.illegal("max", self.max.is_some()));
        }
        if !is_date {
            add_error(&mut errors, self.illegal("fromDate", self.from_date.is_some()));
            add_error(&mut errors, self.illegal("toDate", self.to_date.is_some()));
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            add_error(
                &mut errors,
                ordered_bounds("min", min > max, &format!("{} is above max {}", min, max)),
            );
        }
        if let (Some(from), Some(to)) = (self.from_date, self.to_date) {
            add_error(
                &mut errors,
                ordered_bounds("fromDate", from > to, &format!("{} is after toDate {}", from, to)),
            );
        }
        return_multiple_errors(errors)?;

        let select = SelectState {
            options: self.options.unwrap_or_default(),
            loading: self.loading.unwrap_or_default(),
        };
        let dates = DateBounds {
            from: self.from_date,
            to: self.to_date,
        };
        let kind = match self.variant {
            FilterVariant::Text => FilterKind::Text,
            FilterVariant::Number => FilterKind::Number,
            FilterVariant::Date => FilterKind::Date(dates),
            FilterVariant::DateRange => FilterKind::DateRange(dates),
            FilterVariant::NumberRange => FilterKind::NumberRange(NumberBounds {
                min: self.min,
                max: self.max,
            }),
            FilterVariant::Select => FilterKind::Select(select),
            FilterVariant::MultiSelect => FilterKind::MultiSelect(select),
        };

        Ok(ColumnFilter {
            kind,
            persistence: self.persistence,
            key: self.key,
            codec: self.codec,
        })
    }

    fn illegal(&self, property: &str, is_set: bool) -> Result<(), Error> {
        if is_set {
            return Err(Error::IllegalFilterProperty {
                variant: self.variant.to_string(),
                property: property.to_string(),
            });
        }
        Ok(())
    }
}

/// Serialized shape of column filter metadata, as a host would write it in a column definition.
///
/// Converted into a `ColumnFilter` through the builder, so the same per-variant rules apply.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnFilterSpec {
    pub variant: Option<String>,
    pub persistence_storage: Option<PersistenceTarget>,
    pub key: Option<String>,
    pub is_loading: Option<bool>,
    pub options: Option<Vec<SelectOption>>,
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub from_date: Option<Value>,
    pub to_date: Option<Value>,
}

impl TryFrom<ColumnFilterSpec> for ColumnFilter {
    type Error = Error;

    fn try_from(spec: ColumnFilterSpec) -> Result<Self, Self::Error> {
        // A missing or unrecognized variant is kept as a pass-through filter
        let variant_name = spec.variant.clone().unwrap_or_default();
        let Ok(variant) = FilterVariant::from_str(&variant_name) else {
            let mut filter = ColumnFilter::custom(&variant_name);
            filter.persistence = spec.persistence_storage;
            filter.key = spec.key;
            return Ok(filter);
        };

        let mut builder = ColumnFilter::builder(variant);
        if let Some(target) = spec.persistence_storage {
            builder = builder.persistence(target);
        }
        if let Some(key) = &spec.key {
            builder = builder.key(key);
        }
        if let Some(options) = spec.options {
            builder = builder.options(options);
        }
        if spec.is_loading.is_some() {
            builder = builder.loading(LoadingState::from(spec.is_loading));
        }
        if let Some(min) = &spec.min {
            builder = builder.min(number_bound("min", min)?);
        }
        if let Some(max) = &spec.max {
            builder = builder.max(number_bound("max", max)?);
        }
        if let Some(from_date) = &spec.from_date {
            builder = builder.from_date(date_bound("fromDate", from_date)?);
        }
        if let Some(to_date) = &spec.to_date {
            builder = builder.to_date(date_bound("toDate", to_date)?);
        }

        builder.build()
    }
}

// A lower bound above its upper bound leaves no value that satisfies both
fn ordered_bounds(bound: &str, reversed: bool, message: &str) -> Result<(), Error> {
    if reversed {
        return Err(Error::InvalidBound {
            bound: bound.to_string(),
            message: message.to_string(),
        });
    }
    Ok(())
}

fn number_bound(bound: &str, value: &Value) -> Result<f64, Error> {
    coerce_number(value).ok_or_else(|| Error::InvalidBound {
        bound: bound.to_string(),
        message: format!("{} is not a finite number", value),
    })
}

fn date_bound(bound: &str, value: &Value) -> Result<Timestamp, Error> {
    coerce_date(value).ok_or_else(|| Error::InvalidBound {
        bound: bound.to_string(),
        message: format!("{} is not a date", value),
    })
}
