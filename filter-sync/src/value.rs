//! Helpers for inspecting and coercing raw filter values read from a store.
//!
//! Values coming out of a store are untrusted: they may have been edited by hand in the address bar or left behind
//! by an older version of the table. None of the functions here fail; a value that cannot be coerced is `None`.
use jiff::{civil, tz::TimeZone, Timestamp};
use regex::Regex;
use serde_json::{Number, Value};
use std::sync::OnceLock;

/// Largest integer that survives a round trip through an `f64`
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Returns `true` if the value counts as "no filter".
///
/// `None` (the key is missing), `null`, the empty string and the empty list are empty.
/// Everything else is a real filter value, including `0`, `false`, whitespace-only strings and `[null]`.
pub fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(string)) => string.is_empty(),
        Some(Value::Array(array)) => array.is_empty(),
        Some(_) => false,
    }
}

/// Compare two filter values, ignoring the order of list members.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Array(left), Value::Array(right)) => {
            left.len() == right.len() && sorted_members(left) == sorted_members(right)
        }
        _ => left == right,
    }
}

// Sort copies of the members by their canonical JSON text so that lists of mixed types still have a total order
fn sorted_members(values: &[Value]) -> Vec<String> {
    let mut members: Vec<String> = values.iter().map(Value::to_string).collect();
    members.sort();
    members
}

/// Coerce a scalar value to a string. Lists, maps and `null` are not coercible.
pub fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(string) => Some(string.clone()),
        Value::Number(number) => Some(number_to_string(number)),
        Value::Bool(bool) => Some(bool.to_string()),
        _ => None,
    }
}

/// Render a JSON number the way a user would type it: integral values never carry a trailing `.0`.
pub fn number_to_string(number: &Number) -> String {
    if let Some(signed) = number.as_i64() {
        signed.to_string()
    } else if let Some(unsigned) = number.as_u64() {
        unsigned.to_string()
    } else {
        number.as_f64().map(format_float).unwrap_or_default()
    }
}

fn format_float(float: f64) -> String {
    if float.fract() == 0.0 && float.abs() <= MAX_SAFE_INTEGER {
        format!("{}", float as i64)
    } else {
        format!("{}", float)
    }
}

/// Coerce a value to a finite number.
///
/// Strings are trimmed before parsing and a blank string counts as `0`, matching how browsers coerce form input.
/// Unsigned `0x`, `0o` and `0b` literals are read in their radix, as browsers do.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(string) => {
            let trimmed = string.trim();
            if trimmed.is_empty() {
                0.0
            } else if let Some(number) = parse_radix_literal(trimmed) {
                number
            } else {
                trimmed.parse::<f64>().ok()?
            }
        }
        _ => return None,
    };

    number.is_finite().then_some(number)
}

// `0x1F`, `0o17`, `0b101`. Accumulated as a float so that long literals do not overflow.
fn parse_radix_literal(text: &str) -> Option<f64> {
    let radix = match text.get(..2)?.to_ascii_lowercase().as_str() {
        "0x" => 16,
        "0o" => 8,
        "0b" => 2,
        _ => return None,
    };
    let digits = &text[2..];
    if digits.is_empty() {
        return None;
    }
    digits.chars().try_fold(0.0, |number: f64, digit| {
        digit
            .to_digit(radix)
            .map(|digit| number * f64::from(radix) + f64::from(digit))
    })
}

/// Convert a finite `f64` back to a JSON value, preferring an integer representation when it is exact.
pub fn number_value(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() <= MAX_SAFE_INTEGER {
        Value::from(number as i64)
    } else {
        Number::from_f64(number)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Coerce a value to a point in time.
///
/// Accepted forms are RFC 3339 timestamps, `YYYY-MM-DD` dates and offset-less date-times (both read as UTC),
/// and millisecond Unix timestamps.
pub fn coerce_date(value: &Value) -> Option<Timestamp> {
    match value {
        Value::String(string) => parse_date(string.trim()),
        Value::Number(number) => {
            let millis = number.as_f64().filter(|millis| millis.is_finite())?;
            Timestamp::from_millisecond(millis.trunc() as i64).ok()
        }
        _ => None,
    }
}

fn parse_date(date_str: &str) -> Option<Timestamp> {
    if date_only_pattern().is_match(date_str) {
        let date: civil::Date = date_str.parse().ok()?;
        return date.to_zoned(TimeZone::UTC).ok().map(|zoned| zoned.timestamp());
    }
    if let Ok(timestamp) = date_str.parse::<Timestamp>() {
        return Some(timestamp);
    }
    let datetime: civil::DateTime = date_str.parse().ok()?;
    datetime
        .to_zoned(TimeZone::UTC)
        .ok()
        .map(|zoned| zoned.timestamp())
}

fn date_only_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Panic: Safe to unwrap because this is a valid regex pattern
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap())
}

/// Render a timestamp as the RFC 3339 string stored in a filter value
pub fn date_value(timestamp: Option<Timestamp>) -> Value {
    match timestamp {
        Some(timestamp) => Value::String(timestamp.to_string()),
        None => Value::Null,
    }
}

#[cfg(test)]
mod test {
    use crate::value::*;
    use serde_json::json;
    use test_log::test;

    #[test]
    fn emptiness_truth_table() {
        assert!(is_empty(None));
        assert!(is_empty(Some(&Value::Null)));
        assert!(is_empty(Some(&json!(""))));
        assert!(is_empty(Some(&json!([]))));

        assert!(!is_empty(Some(&json!(0))));
        assert!(!is_empty(Some(&json!(false))));
        assert!(!is_empty(Some(&json!(" "))));
        assert!(!is_empty(Some(&json!([null]))));
        assert!(!is_empty(Some(&json!({}))));
    }

    #[test]
    fn lists_compare_without_order() {
        assert!(values_equal(&json!(["a", "b"]), &json!(["b", "a"])));
        assert!(!values_equal(&json!(["a", "b"]), &json!(["a", "b", "b"])));
        assert!(!values_equal(&json!(["a"]), &json!("a")));
        assert!(values_equal(&json!({"from": 1}), &json!({"from": 1})));
    }

    #[test]
    fn numbers_coerce_like_form_input() {
        assert_eq!(coerce_number(&json!(5)), Some(5.0));
        assert_eq!(coerce_number(&json!(" 2.5 ")), Some(2.5));
        assert_eq!(coerce_number(&json!("   ")), Some(0.0));
        assert_eq!(coerce_number(&json!("Infinity")), None);
        assert_eq!(coerce_number(&json!("NaN")), None);
        assert_eq!(coerce_number(&json!("12abc")), None);
        assert_eq!(coerce_number(&json!("0x1F")), Some(31.0));
        assert_eq!(coerce_number(&json!(" 0o17 ")), Some(15.0));
        assert_eq!(coerce_number(&json!("0B101")), Some(5.0));
        assert_eq!(coerce_number(&json!("0x")), None);
        assert_eq!(coerce_number(&json!("0xZZ")), None);
        assert_eq!(coerce_number(&json!("-0x10")), None);
        assert_eq!(coerce_number(&json!(true)), None);
        assert_eq!(coerce_number(&Value::Null), None);
    }

    #[test]
    fn integral_numbers_stay_integers() {
        assert_eq!(number_value(5.0), json!(5));
        assert_eq!(number_value(-0.5), json!(-0.5));
        assert_eq!(coerce_string(&json!(5.0)), Some("5".to_string()));
        assert_eq!(coerce_string(&json!(1.25)), Some("1.25".to_string()));
        assert_eq!(coerce_string(&json!(false)), Some("false".to_string()));
        assert_eq!(coerce_string(&json!(["a"])), None);
    }

    #[test]
    fn dates_from_every_supported_form() {
        let midnight: Timestamp = "2020-01-01T00:00:00Z".parse().unwrap();

        assert_eq!(coerce_date(&json!("2020-01-01")), Some(midnight));
        assert_eq!(coerce_date(&json!("2020-01-01T00:00:00Z")), Some(midnight));
        assert_eq!(coerce_date(&json!("2020-01-01T00:00:00")), Some(midnight));
        assert_eq!(coerce_date(&json!("2020-01-01T01:00:00+01:00")), Some(midnight));
        assert_eq!(
            coerce_date(&json!(midnight.as_millisecond())),
            Some(midnight)
        );
        assert_eq!(coerce_date(&json!("not a date")), None);
        assert_eq!(coerce_date(&json!("2020-13-45")), None);
        assert_eq!(coerce_date(&json!(true)), None);
    }
}
