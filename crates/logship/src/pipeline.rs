// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pipeline lifecycle: owns the background worker and the shutdown contract.
//!
//! The host constructs one [`Pipeline`] and shares it by reference with every
//! producer. Exactly one worker thread exists per pipeline instance; it runs
//! a single-threaded runtime hosting the dispatcher. Dropping the pipeline
//! runs the default shutdown, so the drain happens on every exit path even
//! when the host never calls [`Pipeline::shutdown`] explicitly.

use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, error};

use crate::config::Config;
use crate::dispatcher::{Dispatcher, ErrorHook};
use crate::error::PipelineError;
use crate::queue::{self, Envelope, QueueSender};
use crate::record::SerializedPayload;
use crate::transport::{HttpTransport, Transport};

/// Result of a drain attempt on shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every payload submitted before shutdown was handed to the transport.
    Drained,
    /// The worker did not finish within the timeout. Payloads still buffered
    /// or still queued behind the sentinel are lost to the caller's view;
    /// the worker keeps draining on its own but nobody waits for it.
    TimedOut,
}

impl DrainOutcome {
    pub fn is_drained(self) -> bool {
        matches!(self, DrainOutcome::Drained)
    }
}

struct Worker {
    handle: thread::JoinHandle<()>,
    done_rx: std_mpsc::Receiver<()>,
}

enum WorkerState {
    Running(Worker),
    Finished(DrainOutcome),
}

/// Handle to the egress pipeline. Cheap to share by reference; producers
/// only ever touch the non-blocking submit path.
pub struct Pipeline {
    tx: QueueSender,
    shutdown_timeout: Duration,
    worker: Mutex<WorkerState>,
}

impl Pipeline {
    /// Validates the configuration, builds the HTTP transport, and spawns
    /// the worker thread running the dispatcher.
    pub fn start(config: Config) -> Result<Self, PipelineError> {
        Self::start_with_error_hook(config, None)
    }

    /// Like [`Pipeline::start`], with a callback observing transport
    /// failures so the host can detect a failing sink.
    pub fn start_with_error_hook(
        config: Config,
        error_hook: Option<ErrorHook>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let transport: Arc<dyn Transport> =
            Arc::new(HttpTransport::new(&config.sink_url, &config.headers)?);
        Self::start_with_transport(config, transport, error_hook)
    }

    /// Starts the pipeline over an explicit transport.
    pub fn start_with_transport(
        config: Config,
        transport: Arc<dyn Transport>,
        error_hook: Option<ErrorHook>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let shutdown_timeout = config.shutdown_timeout;
        let (tx, rx) = queue::channel();
        let dispatcher = Dispatcher::new(rx, transport, config, error_hook);

        let (done_tx, done_rx) = std_mpsc::channel();
        let handle = thread::Builder::new()
            .name("logship-dispatcher".to_string())
            .spawn(move || {
                match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime.block_on(dispatcher.run()),
                    Err(err) => error!("Failed to build dispatcher runtime: {err}"),
                }
                let _ = done_tx.send(());
            })?;

        Ok(Self {
            tx,
            shutdown_timeout,
            worker: Mutex::new(WorkerState::Running(Worker { handle, done_rx })),
        })
    }

    /// Hands a payload to the pipeline. Never blocks and never fails from
    /// the caller's perspective; a submission after shutdown is dropped.
    pub fn submit(&self, payload: impl Into<SerializedPayload>) {
        if !self.tx.push(Envelope::Record(payload.into())) {
            debug!("Payload submitted after shutdown; dropping");
        }
    }

    /// Pushes the shutdown sentinel and waits up to `timeout` for the worker
    /// to finish draining. Idempotent: once the worker has terminated this
    /// is a no-op reporting the recorded outcome.
    pub fn shutdown(&self, timeout: Duration) -> DrainOutcome {
        let mut state = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        match std::mem::replace(&mut *state, WorkerState::Finished(DrainOutcome::Drained)) {
            WorkerState::Finished(outcome) => {
                *state = WorkerState::Finished(outcome);
                outcome
            }
            WorkerState::Running(worker) => {
                self.tx.push(Envelope::Shutdown);
                let outcome = match worker.done_rx.recv_timeout(timeout) {
                    Ok(()) => {
                        let _ = worker.handle.join();
                        DrainOutcome::Drained
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        debug!("Shutdown timed out after {timeout:?}; abandoning the worker");
                        DrainOutcome::TimedOut
                    }
                    // The worker is gone without signalling; nothing left to
                    // drain.
                    Err(RecvTimeoutError::Disconnected) => {
                        let _ = worker.handle.join();
                        DrainOutcome::Drained
                    }
                };
                *state = WorkerState::Finished(outcome);
                outcome
            }
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        let timeout = self.shutdown_timeout;
        let _ = self.shutdown(timeout);
    }
}
