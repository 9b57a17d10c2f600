//! Attribute values and style maps exchanged with the native surface.
//!
//! The diff engine describes appearance as loosely typed key/value maps.
//! This module defines the value type plus the delta computation the node
//! lifecycle uses to push only changed attributes to the native handle.

use crate::collections::map::HashMap;

/// Loosely typed attribute value carried in style maps and event payloads.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<AttrValue>),
    Map(HashMap<String, AttrValue>),
}

impl AttrValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Float(value) => Some(*value),
            AttrValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

/// Attribute map keyed by style/property name. Iteration order carries no
/// meaning; the native surface receives attributes one key at a time.
pub type StyleMap = HashMap<String, AttrValue>;

/// Returns the keys of `target` whose values differ from `applied`,
/// together with the new value. Keys present in `applied` but absent from
/// `target` are not reported; the diff engine expresses removals as
/// explicit `Null` writes.
pub(crate) fn changed_entries<'a>(
    applied: &StyleMap,
    target: &'a StyleMap,
) -> Vec<(&'a str, &'a AttrValue)> {
    let mut changed: Vec<(&str, &AttrValue)> = target
        .iter()
        .filter(|(key, value)| applied.get(key.as_str()) != Some(*value))
        .map(|(key, value)| (key.as_str(), value))
        .collect();
    // Deterministic apply order keeps surface call recordings stable.
    changed.sort_by_key(|(key, _)| *key);
    changed
}
