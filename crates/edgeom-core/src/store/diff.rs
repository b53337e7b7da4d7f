// ── Structural differ ──
//
// Compares a freshly fetched value against the cached baseline.
// Sequences compare as sets of string forms, mappings key by key,
// scalars by string form. When the baseline is the full `"all"`
// snapshot and the new value is a partial view, null and empty fields
// in the new value carry no information and are not changes.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::model::{ValueKind, is_empty_container, string_form};

/// Result of comparing a new value with its baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum Delta {
    Unchanged,
    /// Nothing was cached before: the value is stored as-is and no
    /// change event is reported.
    Bootstrap(Value),
    /// Sequence membership changed. Elements are in string form.
    Members {
        removed: Vec<String>,
        added: Vec<String>,
    },
    /// Mapping fields changed.
    Fields {
        /// Only the fields that changed.
        changed: Map<String, Value>,
        /// The whole baseline with the changes applied. Present only
        /// when the baseline was the full snapshot.
        merged: Option<Map<String, Value>>,
    },
    Scalar(Value),
}

impl Delta {
    pub fn is_changed(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Compare `new` against `old`.
///
/// `baseline_was_all` says `old` is the full snapshot of the resource
/// rather than a previous value of the same view.
pub fn diff(old: Option<&Value>, new: &Value, baseline_was_all: bool) -> Result<Delta, CoreError> {
    let Some(old) = old.filter(|v| !v.is_null()) else {
        return Ok(Delta::Bootstrap(new.clone()));
    };
    if new.is_null() {
        return Ok(Delta::Unchanged);
    }

    match (old, new) {
        (Value::Array(old), Value::Array(new)) => Ok(diff_members(old, new)),
        (Value::Object(old), Value::Object(new)) => {
            if !baseline_was_all && old == new {
                return Ok(Delta::Unchanged);
            }
            let mut reconciled = old.clone();
            let changed = reconcile(&mut reconciled, new, baseline_was_all);
            if changed.is_empty() {
                return Ok(Delta::Unchanged);
            }
            Ok(Delta::Fields {
                changed,
                merged: baseline_was_all.then_some(reconciled),
            })
        }
        (old, new)
            if ValueKind::of(old) == ValueKind::Scalar && ValueKind::of(new) == ValueKind::Scalar =>
        {
            if string_form(old) == string_form(new) {
                Ok(Delta::Unchanged)
            } else {
                Ok(Delta::Scalar(new.clone()))
            }
        }
        (old, new) => Err(CoreError::TypeMismatch {
            cached: ValueKind::of(old),
            received: ValueKind::of(new),
        }),
    }
}

fn diff_members(old: &[Value], new: &[Value]) -> Delta {
    let old: BTreeSet<String> = old.iter().map(string_form).collect();
    let new: BTreeSet<String> = new.iter().map(string_form).collect();
    if old == new {
        return Delta::Unchanged;
    }
    Delta::Members {
        removed: old.difference(&new).cloned().collect(),
        added: new.difference(&old).cloned().collect(),
    }
}

/// Apply `new` onto `old` field by field, returning the fields that
/// changed. Keys absent from `new` are never touched.
fn reconcile(
    old: &mut Map<String, Value>,
    new: &Map<String, Value>,
    baseline_was_all: bool,
) -> Map<String, Value> {
    let mut changed = Map::new();

    for (key, new_value) in new {
        if !old.contains_key(key) {
            old.insert(key.clone(), new_value.clone());
            changed.insert(key.clone(), new_value.clone());
            continue;
        }
        let Some(old_value) = old.get_mut(key) else {
            continue;
        };
        if baseline_was_all
            && is_empty_container(new_value)
            && ValueKind::of(old_value) == ValueKind::of(new_value)
        {
            continue;
        }

        let replacement = match (&mut *old_value, new_value) {
            (old_value, Value::Null) => {
                (!baseline_was_all && !old_value.is_null()).then_some(Value::Null)
            }
            (Value::Null, _) => Some(new_value.clone()),
            (Value::Array(old_items), Value::Array(new_items)) => {
                let differs = if old_items.is_empty() {
                    !new_items.is_empty()
                } else {
                    lists_differ(old_items, new_items)
                };
                differs.then(|| new_value.clone())
            }
            (Value::Object(old_nested), Value::Object(new_nested)) => {
                let nested = reconcile(old_nested, new_nested, baseline_was_all);
                if nested.is_empty() {
                    None
                } else if baseline_was_all {
                    Some(Value::Object(old_nested.clone()))
                } else {
                    Some(new_value.clone())
                }
            }
            (old_value, new_value) => {
                (string_form(old_value) != string_form(new_value)).then(|| new_value.clone())
            }
        };

        if let Some(value) = replacement {
            *old_value = value.clone();
            changed.insert(key.clone(), value);
        }
    }

    changed
}

/// Order-insensitive comparison of two nested lists.
fn lists_differ(old: &[Value], new: &[Value]) -> bool {
    if old.len() != new.len() {
        return true;
    }

    let mut old: Vec<&Value> = old.iter().collect();
    let mut new: Vec<&Value> = new.iter().collect();
    old.sort_by_cached_key(|v| string_form(v));
    new.sort_by_cached_key(|v| string_form(v));

    old.iter().zip(&new).any(|(o, n)| match (o, n) {
        (Value::Array(a), Value::Array(b)) => lists_differ(a, b),
        (Value::Object(a), Value::Object(b)) => {
            let mut scratch = a.clone();
            !reconcile(&mut scratch, b, false).is_empty()
        }
        _ => string_form(o) != string_form(n),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn missing_baseline_bootstraps() {
        let delta = diff(None, &json!({"a": 1}), false).unwrap();
        assert_eq!(delta, Delta::Bootstrap(json!({"a": 1})));
        assert!(delta.is_changed());
    }

    #[test]
    fn null_new_value_is_not_a_change() {
        let delta = diff(Some(&json!({"a": 1})), &Value::Null, false).unwrap();
        assert_eq!(delta, Delta::Unchanged);
    }

    #[test]
    fn sequences_compare_as_sets() {
        let delta = diff(Some(&json!([1, 2, 3])), &json!([2, 3, 4]), false).unwrap();
        assert_eq!(
            delta,
            Delta::Members {
                removed: vec!["1".into()],
                added: vec!["4".into()],
            }
        );

        let delta = diff(Some(&json!(["b", "a"])), &json!(["a", "b"]), false).unwrap();
        assert_eq!(delta, Delta::Unchanged);
    }

    #[test]
    fn full_baseline_ignores_null_fields() {
        let old = json!({"x": 1, "y": 2});
        let delta = diff(Some(&old), &json!({"x": 1, "y": null}), true).unwrap();
        assert_eq!(delta, Delta::Unchanged);
    }

    #[test]
    fn full_baseline_merges_changed_fields() {
        let old = json!({"x": 1, "y": 2});
        let delta = diff(Some(&old), &json!({"x": 5}), true).unwrap();
        assert_eq!(
            delta,
            Delta::Fields {
                changed: object(json!({"x": 5})),
                merged: Some(object(json!({"x": 5, "y": 2}))),
            }
        );
    }

    #[test]
    fn partial_baseline_treats_null_as_change() {
        let old = json!({"h": "OK"});
        let delta = diff(Some(&old), &json!({"h": null}), false).unwrap();
        assert_eq!(
            delta,
            Delta::Fields {
                changed: object(json!({"h": null})),
                merged: None,
            }
        );
    }

    #[test]
    fn full_baseline_skips_empty_containers() {
        let old = json!({"mounts": ["/a"], "opts": {"ro": true}});
        let delta = diff(Some(&old), &json!({"mounts": [], "opts": {}}), true).unwrap();
        assert_eq!(delta, Delta::Unchanged);
    }

    #[test]
    fn nested_lists_ignore_order() {
        let old = json!({"mounts": ["/a", "/b"]});
        let delta = diff(Some(&old), &json!({"mounts": ["/b", "/a"]}), false).unwrap();
        assert_eq!(delta, Delta::Unchanged);

        let delta = diff(Some(&old), &json!({"mounts": ["/b", "/c"]}), false).unwrap();
        assert!(delta.is_changed());
    }

    #[test]
    fn nested_maps_keep_baseline_fields() {
        let old = json!({"usage": {"used": 1, "free": 9}});
        let delta = diff(Some(&old), &json!({"usage": {"used": 2, "free": null}}), true).unwrap();
        let Delta::Fields { merged, .. } = delta else {
            panic!("expected a field delta");
        };
        assert_eq!(merged, Some(object(json!({"usage": {"used": 2, "free": 9}}))));
    }

    #[test]
    fn scalars_compare_by_string_form() {
        assert_eq!(diff(Some(&json!(1)), &json!("1"), false).unwrap(), Delta::Unchanged);
        assert_eq!(
            diff(Some(&json!(1)), &json!(2), false).unwrap(),
            Delta::Scalar(json!(2))
        );
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let err = diff(Some(&json!([1])), &json!({"a": 1}), false).unwrap_err();
        assert!(matches!(
            err,
            CoreError::TypeMismatch {
                cached: ValueKind::Sequence,
                received: ValueKind::Mapping,
            }
        ));
    }
}
