// ── Resource value helpers ──
//
// Resource values are plain JSON. These helpers classify their shape
// and derive the string forms used for comparison and list membership.

use serde_json::Value;
use strum::{Display, EnumString};

/// Coarse shape of a resource value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ValueKind {
    Scalar,
    Sequence,
    Mapping,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Array(_) => Self::Sequence,
            Value::Object(_) => Self::Mapping,
            _ => Self::Scalar,
        }
    }
}

/// Canonical string form of a value.
///
/// Strings render without quotes so that `"disk0"` and an id segment
/// `disk0` compare equal. Everything else renders as compact JSON.
pub fn string_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Path segment derived from a list element.
pub fn segment_id(value: &Value) -> String {
    string_form(value)
}

/// Empty lists and maps carry no information for baseline comparisons.
pub fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
