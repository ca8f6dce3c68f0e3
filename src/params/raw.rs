//! Raw key/value parameter input
//!
//! Parameters usually arrive as a loose JSON object (a file written by hand,
//! an exported preset, a UI panel). [`TreeParams::from_map`] overlays the
//! recognized keys on the defaults, coerces integer-valued keys the same way
//! regardless of whether they were written as `3`, `3.0` or `-3.7`, and
//! ignores keys it does not know with a warning.

use serde_json::{Map, Value};

use crate::core::types::Result;
use crate::core::TreeError;
use crate::params::tree_params::TreeParams;

/// Loose parameter input keyed by field name
pub type RawParams = Map<String, Value>;

/// How a recognized key is normalized before deserialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coercion {
    /// Taken as given
    None,
    /// Truncated toward zero
    Int,
    /// Absolute value, then truncated
    AbsInt,
    /// Absolute value, truncated, at least 1
    Count,
}

fn coercion_for(key: &str) -> Coercion {
    match key {
        "shape" | "leaf_shape" | "blossom_shape" => Coercion::AbsInt,
        "levels" | "curve_res" | "bevel_res" => Coercion::Count,
        "base_splits" | "branches" | "leaf_blos_num" => Coercion::Int,
        _ => Coercion::None,
    }
}

fn coerce_number(key: &str, value: &Value, coercion: Coercion) -> Result<Value> {
    let n = value.as_f64().ok_or_else(|| TreeError::InvalidParam {
        key: key.to_string(),
        reason: format!("expected a number, got {}", value),
    })?;
    let n = match coercion {
        Coercion::None => return Ok(value.clone()),
        Coercion::Int => n.trunc(),
        Coercion::AbsInt => n.abs().trunc(),
        Coercion::Count => n.abs().trunc().max(1.0),
    };
    Ok(Value::from(n as i64))
}

fn coerce(key: &str, value: &Value) -> Result<Value> {
    let coercion = coercion_for(key);
    if coercion == Coercion::None {
        return Ok(value.clone());
    }
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| coerce_number(key, item, coercion))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        other => coerce_number(key, other, coercion),
    }
}

impl TreeParams {
    /// Build params from raw key/value input on top of the defaults.
    ///
    /// Unknown keys are logged and skipped. A known key with a value of the
    /// wrong type (or an array of the wrong length) is an error.
    pub fn from_map(raw: &RawParams) -> Result<Self> {
        let mut merged = TreeParams::default().to_map()?;

        for (key, value) in raw {
            if !merged.contains_key(key) {
                log::warn!("Ignoring unknown tree parameter '{}'", key);
                continue;
            }
            merged.insert(key.clone(), coerce(key, value)?);
        }

        let mut params: TreeParams = serde_json::from_value(Value::Object(merged))?;
        // Zero segments would divide by zero in segment arithmetic
        params.levels = params.levels.max(1);
        for res in params.curve_res.iter_mut().chain(params.bevel_res.iter_mut()) {
            *res = (*res).max(1);
        }
        Ok(params)
    }

    /// Params as raw key/value pairs (the inverse of [`TreeParams::from_map`])
    pub fn to_map(&self) -> Result<RawParams> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(TreeError::InvalidParam {
                key: "<params>".to_string(),
                reason: format!("serialized to a non-object value: {}", other),
            }),
        }
    }

    /// Parse params from a JSON document holding one object
    pub fn from_json_str(json: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(json)? {
            Value::Object(map) => Self::from_map(&map),
            _ => Err(TreeError::InvalidParam {
                key: "<params>".to_string(),
                reason: "expected a JSON object at the top level".to_string(),
            }),
        }
    }
}
