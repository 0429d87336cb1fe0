// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Background half of the pipeline.
//!
//! Two cooperative tasks share one buffer inside the worker runtime: the
//! collector appends payloads popped off the queue, and the flusher ships
//! size-bounded batches on a throttled schedule. Observing the shutdown
//! sentinel stops the flusher and triggers one final drain of everything
//! still buffered.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::error::TransportError;
use crate::queue::{Envelope, QueueReceiver};
use crate::record::SerializedPayload;
use crate::transport::Transport;

/// Callback invoked on every failed send, so the host application can
/// observe pipeline health instead of the failure dying in a log line.
pub type ErrorHook = Arc<dyn Fn(&TransportError) + Send + Sync>;

type Buffer = Arc<Mutex<VecDeque<SerializedPayload>>>;

pub struct Dispatcher {
    rx: QueueReceiver,
    transport: Arc<dyn Transport>,
    config: Config,
    error_hook: Option<ErrorHook>,
}

impl Dispatcher {
    pub fn new(
        rx: QueueReceiver,
        transport: Arc<dyn Transport>,
        config: Config,
        error_hook: Option<ErrorHook>,
    ) -> Self {
        Self {
            rx,
            transport,
            config,
            error_hook,
        }
    }

    /// Runs until the shutdown sentinel is observed (or every sender is
    /// gone), then drains. Transport resources drop when this returns.
    pub async fn run(mut self) {
        let buffer: Buffer = Arc::new(Mutex::new(VecDeque::new()));
        let cancel = CancellationToken::new();

        let flusher = tokio::spawn(flush_loop(
            Arc::clone(&buffer),
            Arc::clone(&self.transport),
            self.config.clone(),
            self.error_hook.clone(),
            cancel.clone(),
        ));

        // Collector: the queue pop is the only await allowed to block
        // indefinitely. Buffer mutations stay non-suspending so the flusher
        // never observes a torn buffer.
        let mut evicted: u64 = 0;
        while let Some(envelope) = self.rx.pop().await {
            match envelope {
                Envelope::Record(payload) => {
                    let mut buffer = lock_buffer(&buffer);
                    if buffer.len() >= self.config.max_buffered {
                        buffer.pop_front();
                        evicted += 1;
                        if evicted == 1 {
                            warn!(
                                "Buffer reached {} payloads; evicting oldest entries",
                                self.config.max_buffered
                            );
                        }
                    }
                    buffer.push_back(payload);
                }
                Envelope::Shutdown => break,
            }
        }
        if evicted > 0 {
            warn!("Evicted {evicted} payloads while the buffer was full");
        }

        // Draining: stop the throttled loop and swallow its cancellation;
        // it is never treated as an error.
        cancel.cancel();
        let _ = flusher.await;

        drain(
            &buffer,
            self.transport.as_ref(),
            &self.config,
            self.error_hook.as_ref(),
        )
        .await;
        debug!("Dispatcher stopped");
    }
}

fn lock_buffer(buffer: &Buffer) -> MutexGuard<'_, VecDeque<SerializedPayload>> {
    match buffer.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Removes and returns an oldest-first prefix of at most `max` payloads.
/// A single non-suspending slice-and-clear step under the buffer lock.
fn take_batch(buffer: &Buffer, max: usize) -> Vec<SerializedPayload> {
    let mut buffer = lock_buffer(buffer);
    let n = buffer.len().min(max);
    buffer.drain(..n).collect()
}

/// Throttled send loop. The interval is a floor on send cadence, not a
/// ceiling: batches go out back to back no faster than one per
/// `send_interval`, measured from each send's start.
async fn flush_loop(
    buffer: Buffer,
    transport: Arc<dyn Transport>,
    config: Config,
    error_hook: Option<ErrorHook>,
    cancel: CancellationToken,
) {
    loop {
        let batch = take_batch(&buffer, config.max_batch_size);
        let pause = if batch.is_empty() {
            config.idle_sleep
        } else {
            let send_start = Instant::now();
            send_batch(transport.as_ref(), batch, error_hook.as_ref()).await;
            config
                .send_interval
                .saturating_sub(send_start.elapsed())
                .max(config.min_sleep)
        };

        tokio::select! {
            _ = sleep(pause) => {}
            _ = cancel.cancelled() => return,
        }
    }
}

/// Hands one batch to the transport. The batch is already removed from the
/// buffer and is never re-queued: a failed send drops it, logs, and reports
/// through the error hook.
async fn send_batch(
    transport: &dyn Transport,
    batch: Vec<SerializedPayload>,
    error_hook: Option<&ErrorHook>,
) {
    if batch.is_empty() {
        return;
    }
    debug!("Flushing {} payloads", batch.len());
    if let Err(err) = transport.send(&batch).await {
        error!("Failed to ship batch of {}: {err}", batch.len());
        if let Some(hook) = error_hook {
            hook(&err);
        }
    }
}

/// Final flush after the sentinel: ships everything left, oldest first, in
/// consecutive batches that still respect the batch-size cap. The throttle
/// floor does not apply here; this pass runs exactly once and is never
/// interrupted by the shutdown timeout.
async fn drain(
    buffer: &Buffer,
    transport: &dyn Transport,
    config: &Config,
    error_hook: Option<&ErrorHook>,
) {
    loop {
        let batch = take_batch(buffer, config.max_batch_size);
        if batch.is_empty() {
            return;
        }
        send_batch(transport, batch, error_hook).await;
    }
}
