//! Cleaning of raw scalar values before they are persisted.
//!
//! Source data produced by dataframe exports marks missing numbers with `NaN`,
//! either as a float or as the text `"nan"`. Nothing of the sort may reach the
//! store: a field is either a valid value or absent.

use serde_json::Value;

/// A scalar as it appears in the import source, before typing.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Lift a JSON value into a scalar. `null` is absent; arrays and objects
    /// are kept as their JSON text.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(FieldValue::Int(i64::from(*b))),
            Value::Number(n) => n
                .as_i64()
                .map(FieldValue::Int)
                .or_else(|| n.as_f64().map(FieldValue::Float)),
            Value::String(s) => Some(FieldValue::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => Some(FieldValue::Text(value.to_string())),
        }
    }

    /// Read as a float column value. Non-numeric text is absent.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        let f = match self {
            FieldValue::Int(i) => *i as f64,
            FieldValue::Float(f) => *f,
            FieldValue::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        (!f.is_nan()).then_some(f)
    }

    /// Read as an integer column value. Floats and numeric text are accepted
    /// only when integral.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            FieldValue::Float(f) => integral(*f),
            FieldValue::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(integral))
            }
        }
    }

    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            FieldValue::Int(i) => i.to_string(),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::Text(s) => s,
        }
    }
}

#[allow(clippy::float_cmp, clippy::cast_precision_loss)]
fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.trunc() == f && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Map every "not a number" representation to absent; pass anything else
/// through untouched.
#[must_use]
pub fn handle_nan(value: Option<FieldValue>) -> Option<FieldValue> {
    match value? {
        FieldValue::Text(s) if s.eq_ignore_ascii_case("nan") => None,
        FieldValue::Float(f) if f.is_nan() => None,
        other => Some(other),
    }
}

/// Normalize a source field and read it as a float.
#[must_use]
pub fn clean_f64(value: Option<&Value>) -> Option<f64> {
    handle_nan(value.and_then(FieldValue::from_json))?.as_f64()
}

/// Normalize a source field and read it as an integer.
#[must_use]
pub fn clean_i64(value: Option<&Value>) -> Option<i64> {
    handle_nan(value.and_then(FieldValue::from_json))?.as_i64()
}

/// Read a source text field verbatim; numbers keep their textual form.
#[must_use]
pub fn clean_text(value: Option<&Value>) -> Option<String> {
    value.and_then(FieldValue::from_json).map(FieldValue::into_text)
}
