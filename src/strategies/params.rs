//! Strategy parameter maps.
//!
//! Spec files carry parameters as a free-form map. Each policy pulls the keys it
//! understands through typed getters that fall back to the policy default and
//! report bad values as [`BacktestError::InvalidParameter`].

use crate::error::{BacktestError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Raw `params:` block of a strategy spec.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamMap(BTreeMap<String, Value>);

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for tests and programmatic specs.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Present and not an explicit `null`.
    fn value(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// Integer parameter. Floats with no fractional part are accepted since YAML
    /// authors sometimes write `20.0`.
    pub fn int_or(&self, key: &str, default: i64) -> Result<i64> {
        match self.value(key) {
            None => Ok(default),
            Some(v) => as_int(v).ok_or_else(|| {
                BacktestError::InvalidParameter(format!("Expected integer for {}, got {}", key, v))
            }),
        }
    }

    /// Window length: an integer that must be strictly positive.
    pub fn window_or(&self, key: &str, default: usize) -> Result<usize> {
        let n = self.int_or(key, default as i64)?;
        positive(key, n)
    }

    /// Like [`window_or`](Self::window_or) but an explicit `null` disables the window.
    pub fn optional_window_or(&self, key: &str, default: Option<usize>) -> Result<Option<usize>> {
        match self.0.get(key) {
            None => Ok(default),
            Some(Value::Null) => Ok(None),
            Some(v) => {
                let n = as_int(v).ok_or_else(|| {
                    BacktestError::InvalidParameter(format!(
                        "Expected integer or null for {}, got {}",
                        key, v
                    ))
                })?;
                positive(key, n).map(Some)
            }
        }
    }

    pub fn float_or(&self, key: &str, default: f64) -> Result<f64> {
        match self.value(key) {
            None => Ok(default),
            Some(v) => v.as_f64().filter(|x| x.is_finite()).ok_or_else(|| {
                BacktestError::InvalidParameter(format!("Expected number for {}, got {}", key, v))
            }),
        }
    }

    pub fn string_or(&self, key: &str, default: &str) -> Result<String> {
        match self.value(key) {
            None => Ok(default.to_string()),
            Some(Value::String(s)) => Ok(s.trim().to_string()),
            Some(v) => Err(BacktestError::InvalidParameter(format!(
                "Expected string for {}, got {}",
                key, v
            ))),
        }
    }

    /// Keys not in `known`, sorted.
    pub fn unknown_keys(&self, known: &[&str]) -> Vec<String> {
        self.0
            .keys()
            .filter(|k| !known.contains(&k.as_str()))
            .cloned()
            .collect()
    }
}

impl From<BTreeMap<String, Value>> for ParamMap {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

fn as_int(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| {
        v.as_f64()
            .filter(|x| x.is_finite() && x.fract() == 0.0)
            .map(|x| x as i64)
    })
}

fn positive(key: &str, n: i64) -> Result<usize> {
    if n <= 0 {
        return Err(BacktestError::InvalidParameter(format!("Expected {} > 0", key)));
    }
    Ok(n as usize)
}
