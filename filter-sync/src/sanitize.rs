//! Per-variant sanitizers.
//!
//! A sanitizer turns a raw value read from a store into the canonical shape the table expects for that filter
//! variant, or decides that the value is absent. Scalar variants never partially succeed. The one deliberate
//! partial recovery is a date range, where each side is meaningful on its own.
use crate::{
    filter::{DateBounds, FilterKind, NumberBounds, SelectState},
    value::{coerce_date, coerce_number, coerce_string, date_value, number_value},
};
use jiff::Timestamp;
use serde_json::Value;

/// A sanitized filter value in its canonical shape
#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
    Text(String),
    Number(f64),
    Select(String),
    /// Never empty
    MultiSelect(Vec<String>),
    /// `None` is an explicit "no date"
    Date(Option<Timestamp>),
    /// At least one side is present, and `start <= end` when both are
    DateRange(Option<Timestamp>, Option<Timestamp>),
    /// `min <= max`
    NumberRange(f64, f64),
    /// Value of a host-defined variant, passed through unchanged
    Other(Value),
}

impl FilterValue {
    /// Convert to the JSON value stored in the table and written to the stores
    pub fn into_value(self) -> Value {
        match self {
            FilterValue::Text(text) | FilterValue::Select(text) => Value::String(text),
            FilterValue::Number(number) => number_value(number),
            FilterValue::MultiSelect(values) => {
                Value::Array(values.into_iter().map(Value::String).collect())
            }
            FilterValue::Date(date) => date_value(date),
            FilterValue::DateRange(start, end) => Value::Array(vec![date_value(start), date_value(end)]),
            FilterValue::NumberRange(min, max) => Value::Array(vec![number_value(min), number_value(max)]),
            FilterValue::Other(value) => value,
        }
    }
}

/// Sanitize a raw value for a filter of the given kind
pub fn sanitize(kind: &FilterKind, raw: &Value) -> Option<FilterValue> {
    match kind {
        FilterKind::Text => sanitize_text(raw).map(FilterValue::Text),
        FilterKind::Number => sanitize_number(raw).map(FilterValue::Number),
        FilterKind::Select(state) => sanitize_select(raw, state).map(FilterValue::Select),
        FilterKind::MultiSelect(state) => {
            sanitize_multi_select(raw, state).map(FilterValue::MultiSelect)
        }
        FilterKind::Date(bounds) => sanitize_date(raw, bounds).map(FilterValue::Date),
        FilterKind::DateRange(bounds) => {
            sanitize_date_range(raw, bounds).map(|(start, end)| FilterValue::DateRange(start, end))
        }
        FilterKind::NumberRange(bounds) => {
            sanitize_number_range(raw, bounds).map(|(min, max)| FilterValue::NumberRange(min, max))
        }
        FilterKind::Custom(_) => Some(FilterValue::Other(raw.clone())),
    }
}

/// Sanitize a raw value and return it as JSON, the form the engine works with
pub fn sanitize_value(kind: &FilterKind, raw: &Value) -> Option<Value> {
    sanitize(kind, raw).map(FilterValue::into_value)
}

pub fn sanitize_text(raw: &Value) -> Option<String> {
    coerce_string(raw)
}

pub fn sanitize_number(raw: &Value) -> Option<f64> {
    coerce_number(raw)
}

/// Keep a single scalar if it is one of the options, or if there are no options to check against yet
pub fn sanitize_select(raw: &Value, state: &SelectState) -> Option<String> {
    let candidate = coerce_string(raw)?;
    (state.options.is_empty() || state.contains(&candidate)).then_some(candidate)
}

/// Keep the members of a list that are options, preserving their order.
///
/// A scalar is treated as a one-element list. Members that are not scalars are dropped.
pub fn sanitize_multi_select(raw: &Value, state: &SelectState) -> Option<Vec<String>> {
    let candidates: Vec<String> = match raw {
        Value::Array(members) => members.iter().filter_map(coerce_string).collect(),
        scalar => vec![coerce_string(scalar)?],
    };
    let selected: Vec<String> = candidates
        .into_iter()
        .filter(|candidate| state.options.is_empty() || state.contains(candidate))
        .collect();

    (!selected.is_empty()).then_some(selected)
}

/// Coerce to a date clamped into the bounds. `null` is a valid "no date" and passes through as `Some(None)`.
pub fn sanitize_date(raw: &Value, bounds: &DateBounds) -> Option<Option<Timestamp>> {
    if raw.is_null() {
        return Some(None);
    }
    let date = coerce_date(raw)?;
    Some(Some(clamp(date, bounds.from, bounds.to)))
}

/// Coerce a `[start, end]` list or a `{from, to}` map to a pair of dates.
///
/// Each side that fails to coerce becomes `None`; the range is absent only when both sides are. Each side is
/// clamped into the bounds first, and the pair is swapped afterwards if it is still out of order.
pub fn sanitize_date_range(
    raw: &Value,
    bounds: &DateBounds,
) -> Option<(Option<Timestamp>, Option<Timestamp>)> {
    let (start, end) = match raw {
        Value::Array(sides) if sides.len() == 2 => (&sides[0], &sides[1]),
        Value::Object(map) => (
            map.get("from").unwrap_or(&Value::Null),
            map.get("to").unwrap_or(&Value::Null),
        ),
        _ => return None,
    };
    let side = |value: &Value| coerce_date(value).map(|date| clamp(date, bounds.from, bounds.to));

    match (side(start), side(end)) {
        (None, None) => None,
        (Some(start), Some(end)) if start > end => Some((Some(end), Some(start))),
        (start, end) => Some((start, end)),
    }
}

/// Coerce a two-element list to an ordered pair of numbers clamped into the bounds.
///
/// Unlike a date range, a partial number range is absent as a whole.
pub fn sanitize_number_range(raw: &Value, bounds: &NumberBounds) -> Option<(f64, f64)> {
    let Value::Array(ends) = raw else {
        return None;
    };
    let [first, second] = ends.as_slice() else {
        return None;
    };
    let (mut min, mut max) = (coerce_number(first)?, coerce_number(second)?);
    if min > max {
        std::mem::swap(&mut min, &mut max);
    }

    Some((
        clamp(min, bounds.min, bounds.max),
        clamp(max, bounds.min, bounds.max),
    ))
}

fn clamp<T: PartialOrd + Copy>(value: T, lower: Option<T>, upper: Option<T>) -> T {
    let mut clamped = value;
    if let Some(lower) = lower {
        if clamped < lower {
            clamped = lower;
        }
    }
    if let Some(upper) = upper {
        if clamped > upper {
            clamped = upper;
        }
    }
    clamped
}
