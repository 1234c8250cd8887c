// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Structured field annotations and start-call arguments.
//!
//! A [`Field`] is one key/value annotation attached to a call or span. The
//! value is an arbitrary [`serde_json::Value`], so anything serializable can
//! be recorded. Fields accumulate in order and are emitted as a flat
//! key/value sequence through a [`FieldEmitter`] when a span is logged.
//!
//! [`StartCallArg`] is the argument type accepted by `start_call` /
//! `start_span`. Plain [`Field`]s become annotations; values that also carry
//! an option capability (see [`crate::call::CallOption`]) configure the new
//! call instead of being logged. The distinction is made by probing each
//! argument's concrete type at runtime, not by a type tag.

use std::any::Any;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

/// One structured key/value annotation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub key: String,
    pub value: Value,
}

impl Field {
    /// Create a field from any serializable value.
    ///
    /// Values that fail to serialize are recorded as their `Debug`-less
    /// fallback, `Value::Null` - annotation problems must never fail the
    /// instrumented call.
    pub fn new(key: impl Into<String>, value: impl Serialize) -> Self {
        Self {
            key: key.into(),
            value: serde_json::to_value(value).unwrap_or(Value::Null),
        }
    }
}

/// Receives flattened key/value pairs from [`crate::call::CallInfo::marshal_fields`].
pub trait FieldEmitter {
    fn emit(&mut self, key: &str, value: Value);
}

/// A `FieldEmitter` collecting into an ordered JSON object.
#[derive(Debug, Default)]
pub struct MapEmitter {
    entries: serde_json::Map<String, Value>,
}

impl MapEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the emitter, yielding the collected object.
    pub fn into_map(self) -> serde_json::Map<String, Value> {
        self.entries
    }
}

impl FieldEmitter for MapEmitter {
    fn emit(&mut self, key: &str, value: Value) {
        self.entries.insert(key.to_string(), value);
    }
}

/// An argument to `start_call` / `start_span`.
///
/// Implementations expose their concrete type through [`StartCallArg::as_any`]
/// so the tracker can probe for option capabilities and treat everything else
/// as a plain annotation.
pub trait StartCallArg: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

impl StartCallArg for Field {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Convenience constructor for a field argument.
pub fn arg(key: impl Into<String>, value: impl Serialize) -> Arc<dyn StartCallArg> {
    Arc::new(Field::new(key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_from_serializable() {
        let f = Field::new("count", 3);
        assert_eq!(f.key, "count");
        assert_eq!(f.value, Value::from(3));
    }

    #[test]
    fn test_field_from_str() {
        let f = Field::new("name", "checkout");
        assert_eq!(f.value, Value::from("checkout"));
    }

    #[test]
    fn test_map_emitter_collects_in_order() {
        let mut emitter = MapEmitter::new();
        emitter.emit("a", Value::from(1));
        emitter.emit("b", Value::from("two"));

        let map = emitter.into_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map["a"], Value::from(1));
        assert_eq!(map["b"], Value::from("two"));
    }

    #[test]
    fn test_arg_probes_as_field() {
        let a = arg("k", true);
        assert!(a.as_any().downcast_ref::<Field>().is_some());
    }
}
