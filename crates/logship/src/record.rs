// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The log record data model and its serialized form.
//!
//! A [`Record`] is immutable once constructed and owned by the producer until
//! it is projected into a [`SerializedPayload`] and handed to the pipeline.
//! Payloads are opaque JSON-object strings; the queue, the dispatcher buffer,
//! and transport batches all carry this one unit.

use std::fmt;

use chrono::{DateTime, FixedOffset, Local, SecondsFormat};
use logship_encode::{EncodeValue, Encoder};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Severity of a record. Wire codes match the intake contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
}

impl Level {
    pub fn code(self) -> u8 {
        match self {
            Level::Debug => 10,
            Level::Info => 20,
            Level::Notice => 25,
            Level::Warning => 30,
            Level::Error => 40,
            Level::Critical => 50,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Notice => "notice",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Critical => "critical",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// One captured call-site frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub file: String,
    pub line: u32,
    pub function: String,
}

impl Frame {
    pub fn new(file: impl Into<String>, line: u32, function: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            function: function.into(),
        }
    }
}

/// Projection of an error attached to a record: type name plus message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapturedError {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "value")]
    pub message: String,
}

impl CapturedError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Captures a concrete error as its unqualified type name and rendered
    /// message.
    pub fn from_error<E: std::error::Error>(error: &E) -> Self {
        let kind = std::any::type_name::<E>()
            .rsplit("::")
            .next()
            .unwrap_or("Error");
        Self::new(kind, error.to_string())
    }
}

/// One structured log event, immutable once constructed.
///
/// The template is kept for correlation in-process but is not shipped; the
/// sink receives the rendered message alongside the structured fields.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<FixedOffset>,
    pub level: Level,
    #[serde(skip)]
    pub template: String,
    pub message: String,
    pub stack: Vec<Frame>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub kwargs: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exc: Option<CapturedError>,
}

impl Record {
    /// A record stamped with the current local time and no captured context.
    pub fn new(level: Level, template: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now().fixed_offset(),
            level,
            template: template.into(),
            message: message.into(),
            stack: Vec::new(),
            args: Vec::new(),
            kwargs: Map::new(),
            exc: None,
        }
    }

    pub fn with_stack(mut self, stack: Vec<Frame>) -> Self {
        self.stack = stack;
        self
    }

    /// Encodes positional arguments through the given encoder.
    pub fn with_args<'a, I>(mut self, encoder: &Encoder, args: I) -> Self
    where
        I: IntoIterator<Item = &'a dyn EncodeValue>,
    {
        self.args = args.into_iter().map(|v| encoder.encode(v)).collect();
        self
    }

    /// Encodes one named argument through the given encoder.
    pub fn with_kwarg(
        mut self,
        encoder: &Encoder,
        name: impl Into<String>,
        value: &dyn EncodeValue,
    ) -> Self {
        self.kwargs.insert(name.into(), encoder.encode(value));
        self
    }

    /// Encodes one named aggregate through serde field expansion instead of
    /// the converter registry.
    pub fn with_serde_kwarg<T: Serialize>(
        mut self,
        encoder: &Encoder,
        name: impl Into<String>,
        value: &T,
    ) -> Self {
        self.kwargs
            .insert(name.into(), encoder.encode_serializable(value));
        self
    }

    pub fn with_error(mut self, error: CapturedError) -> Self {
        self.exc = Some(error);
        self
    }

    /// Serializes the record into the payload shape shipped to the sink.
    /// This never fails: a value serde cannot represent degrades to a
    /// minimal payload carrying the rendered message.
    pub fn to_payload(&self) -> SerializedPayload {
        match serde_json::to_string(self) {
            Ok(body) => SerializedPayload::new(body),
            Err(err) => {
                let fallback = serde_json::json!({
                    "timestamp": self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, false),
                    "level": self.level.code(),
                    "message": self.message,
                    "serialization_error": err.to_string(),
                });
                SerializedPayload::new(fallback.to_string())
            }
        }
    }
}

fn serialize_timestamp<S: Serializer>(
    timestamp: &DateTime<FixedOffset>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Micros, false))
}

/// An already-serialized JSON object: the unit queued, buffered, and batched
/// for transport. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedPayload(String);

impl SerializedPayload {
    pub fn new(json: impl Into<String>) -> Self {
        Self(json.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SerializedPayload {
    fn from(json: String) -> Self {
        Self(json)
    }
}

impl From<&str> for SerializedPayload {
    fn from(json: &str) -> Self {
        Self(json.to_string())
    }
}

impl fmt::Display for SerializedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
