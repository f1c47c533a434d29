//! Codecs that turn filter values into the text of a single query parameter and back.
//!
//! Decoding never fails outright: the address bar is user-editable, so whatever comes back is handed to the
//! sanitizers, which decide whether it is usable.
use crate::{error::FilterSyncError as Error, value::coerce_string};
use serde_json::Value;
use std::fmt;

/// Encodes one filter value to query parameter text and decodes it back
pub trait ValueCodec: fmt::Debug + Send + Sync {
    fn encode(&self, value: &Value) -> Result<String, Error>;

    /// Decode parameter text. `None` means the text carries no value at all.
    fn decode(&self, text: &str) -> Option<Value>;
}

fn to_json(value: &Value) -> Result<String, Error> {
    serde_json::to_string(value).map_err(|e| Error::SerializationError(e.to_string()))
}

fn from_json_or_string(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// The default codec.
///
/// Plain strings are written verbatim so that the address stays readable; a string that would itself parse as
/// JSON (`"42"`, `"true"`) is quoted so that it decodes back to a string. Everything else is written as JSON.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JsonCodec;

impl ValueCodec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<String, Error> {
        match value {
            Value::String(string) if serde_json::from_str::<Value>(string).is_err() => {
                Ok(string.clone())
            }
            _ => to_json(value),
        }
    }

    fn decode(&self, text: &str) -> Option<Value> {
        Some(from_json_or_string(text))
    }
}

/// Writes a list of scalars as `a,b,c`.
///
/// Lists whose members contain the separator, or are not scalars, fall back to JSON.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListCodec {
    pub separator: char,
}

impl Default for ListCodec {
    fn default() -> Self {
        Self { separator: ',' }
    }
}

impl ValueCodec for ListCodec {
    fn encode(&self, value: &Value) -> Result<String, Error> {
        let Value::Array(members) = value else {
            return JsonCodec.encode(value);
        };
        let members: Option<Vec<String>> = members.iter().map(coerce_string).collect();
        match members {
            Some(members)
                if !members.is_empty()
                    && members.iter().all(|member| !member.contains(self.separator)) =>
            {
                Ok(members.join(&self.separator.to_string()))
            }
            _ => to_json(value),
        }
    }

    fn decode(&self, text: &str) -> Option<Value> {
        if text.is_empty() {
            return None;
        }
        if text.starts_with('[') {
            if let Ok(list @ Value::Array(_)) = serde_json::from_str::<Value>(text) {
                return Some(list);
            }
        }
        Some(Value::Array(
            text.split(self.separator)
                .map(|member| Value::String(member.to_string()))
                .collect(),
        ))
    }
}

/// Writes a two-element range as `start~end`, with an empty side for `null`.
///
/// Anything that is not a pair of scalars falls back to JSON.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RangeCodec {
    pub separator: char,
}

impl Default for RangeCodec {
    fn default() -> Self {
        Self { separator: '~' }
    }
}

impl RangeCodec {
    fn side(&self, value: &Value) -> Option<String> {
        match value {
            Value::Null => Some(String::new()),
            scalar => coerce_string(scalar).filter(|side| !side.contains(self.separator)),
        }
    }
}

impl ValueCodec for RangeCodec {
    fn encode(&self, value: &Value) -> Result<String, Error> {
        if let Value::Array(sides) = value {
            if let [start, end] = sides.as_slice() {
                if let (Some(start), Some(end)) = (self.side(start), self.side(end)) {
                    return Ok(format!("{}{}{}", start, self.separator, end));
                }
            }
        }
        to_json(value)
    }

    fn decode(&self, text: &str) -> Option<Value> {
        let side = |side: &str| match side {
            "" => Value::Null,
            side => Value::String(side.to_string()),
        };
        match text.split_once(self.separator) {
            Some((start, end)) if !end.contains(self.separator) => {
                Some(Value::Array(vec![side(start), side(end)]))
            }
            _ => Some(from_json_or_string(text)),
        }
    }
}
