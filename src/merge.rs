//! Deep-merge of machine-local overrides and its inverse.
//!
//! Overrides are merged onto synced configuration after every pull and
//! stripped back out before every push.  The pair obeys the round-trip law
//!
//! ```text
//! strip_overrides(&deep_merge(&base, &overrides), &overrides, &base) == base
//! ```
//!
//! for every pair of plain JSON objects, so the mirrored copy is never
//! polluted with machine-local values.
use serde_json::{Map, Value};

/// Merge `overrides` onto `base`.
///
/// Objects merge key-by-key recursively.  Arrays and scalars are replaced
/// wholesale.  Keys absent from `overrides` leave `base` untouched.  When
/// either side is not an object the override wins.
#[must_use]
pub fn deep_merge(base: &Value, overrides: &Value) -> Value {
    match (base, overrides) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged = base_map.clone();
            for (key, override_value) in override_map {
                let next = merged.get(key).map_or_else(
                    || override_value.clone(),
                    |existing| deep_merge(existing, override_value),
                );
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        _ => overrides.clone(),
    }
}

/// Remove every key of `overrides` from `local`, restoring the value `base`
/// holds for it (or deleting it when `base` lacks the key).
///
/// Non-object inputs are returned unchanged.
#[must_use]
pub fn strip_overrides(local: &Value, overrides: &Value, base: &Value) -> Value {
    match (local, overrides) {
        (Value::Object(local_map), Value::Object(override_map)) => {
            let base_map = base.as_object();
            Value::Object(strip_map(local_map, override_map, base_map))
        }
        _ => local.clone(),
    }
}

fn strip_map(
    local: &Map<String, Value>,
    overrides: &Map<String, Value>,
    base: Option<&Map<String, Value>>,
) -> Map<String, Value> {
    let mut out = local.clone();
    for (key, override_value) in overrides {
        let base_value = base.and_then(|b| b.get(key));
        let local_value = out.get(key);

        let recurse = matches!(
            (override_value, local_value, base_value),
            (Value::Object(_), Some(Value::Object(_)), None | Some(Value::Object(_)))
        );

        if recurse {
            let Some(Value::Object(local_child)) = local_value else {
                continue;
            };
            let Value::Object(override_child) = override_value else {
                continue;
            };
            let stripped = strip_map(
                local_child,
                override_child,
                base_value.and_then(Value::as_object),
            );
            if stripped.is_empty() && base_value.is_none() {
                out.shift_remove(key);
            } else {
                out.insert(key.clone(), Value::Object(stripped));
            }
            continue;
        }

        match base_value {
            Some(value) => {
                out.insert(key.clone(), value.clone());
            }
            None => {
                out.shift_remove(key);
            }
        }
    }
    out
}

/// Whether `value` is an object with no keys (or null), i.e. an override
/// document that changes nothing.
#[must_use]
pub fn is_empty_overrides(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
