// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! JSON-safe projection of arbitrary runtime values.
//!
//! The encoder turns values captured at a log call site into a
//! `serde_json::Value` tree that is safe to ship. Dispatch runs through an
//! ordered converter registry: each converter tests the concrete type and the
//! first match wins, so registration order encodes specificity (most specific
//! first). When nothing matches, the value degrades to its `Debug` rendering.
//! Encoding never fails and never panics.

use std::any::Any;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

/// A value the encoder can inspect: any `'static` type with a `Debug`
/// rendering to fall back on.
pub trait EncodeValue: Any + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + fmt::Debug> EncodeValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Capability for types that know how to export themselves as a mapping.
///
/// This is the extension point for structured models: implement it and call
/// [`Encoder::register_mapping`] instead of hard-wiring a converter for every
/// model type.
pub trait ExportMapping {
    fn export_mapping(&self) -> Map<String, Value>;
}

type Converter = Box<dyn Fn(&dyn Any) -> Option<Value> + Send + Sync>;

/// Ordered converter registry over captured values.
pub struct Encoder {
    converters: Vec<Converter>,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    /// An encoder with the default converters registered: JSON primitives,
    /// temporal values as ISO-8601 strings, set collections as lists, and
    /// one-shot sequences materialized in full.
    pub fn new() -> Self {
        let mut encoder = Self::empty();

        encoder.register(|v: &bool| Value::Bool(*v));
        encoder.register(|v: &i32| Value::from(*v));
        encoder.register(|v: &i64| Value::from(*v));
        encoder.register(|v: &u32| Value::from(*v));
        encoder.register(|v: &u64| Value::from(*v));
        encoder.register(|v: &f32| Value::from(*v));
        encoder.register(|v: &f64| Value::from(*v));
        encoder.register(|v: &String| Value::String(v.clone()));
        encoder.register(|v: &&'static str| Value::String((*v).to_string()));

        // Temporal values: fixed-width ISO-8601 so encoded instants sort
        // lexically in timestamp order.
        encoder.register(|v: &DateTime<Utc>| {
            Value::String(v.to_rfc3339_opts(SecondsFormat::Micros, true))
        });
        encoder.register(|v: &DateTime<FixedOffset>| {
            Value::String(v.to_rfc3339_opts(SecondsFormat::Micros, false))
        });
        encoder.register(|v: &DateTime<Local>| {
            Value::String(v.to_rfc3339_opts(SecondsFormat::Micros, false))
        });
        encoder.register(|v: &NaiveDate| Value::String(v.format("%Y-%m-%d").to_string()));
        encoder.register(|v: &NaiveDateTime| {
            Value::String(v.format("%Y-%m-%dT%H:%M:%S%.6f").to_string())
        });

        // Sets become lists. Only membership is preserved; hash-set element
        // order is not guaranteed.
        encoder.register(|v: &HashSet<String>| {
            Value::Array(v.iter().cloned().map(Value::String).collect())
        });
        encoder.register(|v: &BTreeSet<String>| {
            Value::Array(v.iter().cloned().map(Value::String).collect())
        });
        encoder.register(|v: &HashSet<i64>| Value::Array(v.iter().map(|n| Value::from(*n)).collect()));
        encoder.register(|v: &BTreeSet<i64>| Value::Array(v.iter().map(|n| Value::from(*n)).collect()));

        encoder.register(|v: &OnceSeq| v.materialize());

        encoder
    }

    /// An encoder with no converters at all; every value falls back to its
    /// `Debug` rendering until converters are registered.
    pub fn empty() -> Self {
        Self {
            converters: Vec::new(),
        }
    }

    /// Registers a converter for `T`. Converters are consulted in
    /// registration order and the first match wins, so register the most
    /// specific conversions first.
    pub fn register<T, F>(&mut self, convert: F)
    where
        T: Any,
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        self.converters
            .push(Box::new(move |any| any.downcast_ref::<T>().map(&convert)));
    }

    /// Registers `T` through its own mapping export.
    pub fn register_mapping<T>(&mut self)
    where
        T: Any + ExportMapping,
    {
        self.converters.push(Box::new(|any| {
            any.downcast_ref::<T>()
                .map(|v| Value::Object(v.export_mapping()))
        }));
    }

    /// Encodes a captured value. Walks the registry in order; if no converter
    /// matches, returns the value's `Debug` rendering. This path never fails.
    pub fn encode(&self, value: &dyn EncodeValue) -> Value {
        let any = value.as_any();
        for convert in &self.converters {
            if let Some(encoded) = convert(any) {
                return encoded;
            }
        }
        Value::String(format!("{value:?}"))
    }

    /// Expands a named-field aggregate into a field-to-value tree,
    /// recursively, via serde. A value serde cannot represent degrades to a
    /// placeholder string instead of erroring.
    pub fn encode_serializable<T: Serialize>(&self, value: &T) -> Value {
        match serde_json::to_value(value) {
            Ok(encoded) => encoded,
            Err(err) => Value::String(format!("<unserializable: {err}>")),
        }
    }
}

/// A lazy, one-shot sequence. Encoding it materializes the underlying
/// iterator in full, consuming it; encoding the same sequence twice is
/// unsupported and yields an empty list.
pub struct OnceSeq {
    items: Mutex<Option<Box<dyn Iterator<Item = Value> + Send>>>,
}

impl OnceSeq {
    pub fn new<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: Send + 'static,
    {
        Self {
            items: Mutex::new(Some(Box::new(iter.into_iter()))),
        }
    }

    fn materialize(&self) -> Value {
        let mut slot = match self.items.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match slot.take() {
            Some(iter) => Value::Array(iter.collect()),
            None => {
                warn!("One-shot sequence encoded twice; yielding an empty list");
                Value::Array(Vec::new())
            }
        }
    }
}

impl fmt::Debug for OnceSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OnceSeq(..)")
    }
}
