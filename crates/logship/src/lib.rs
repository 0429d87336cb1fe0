// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! In-process telemetry egress pipeline.
//!
//! Caller threads hand already-serialized payloads to [`Pipeline::submit`];
//! a single background worker batches them and ships each batch in one HTTP
//! call to a configured sink. Producers never block and never observe
//! downstream failures; shutdown drains what it can within a timeout and
//! reports whether the drain completed.
//!
//! ```text
//! producer threads -> submit() -> queue -> dispatcher buffer -> transport -> sink
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod pipeline;
pub mod queue;
pub mod record;
pub mod transport;

pub use config::Config;
pub use dispatcher::{Dispatcher, ErrorHook};
pub use error::{ConfigError, PipelineError, TransportError};
pub use pipeline::{DrainOutcome, Pipeline};
pub use record::{CapturedError, Frame, Level, Record, SerializedPayload};
pub use transport::{HttpTransport, Transport};
