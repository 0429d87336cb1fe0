// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Thread-safe handoff between producer threads and the dispatcher.
//!
//! Pushes never block; the pop side awaits until an item arrives. Arrival
//! order is preserved across all producers relative to the single consumer.

use crate::record::SerializedPayload;
use tokio::sync::mpsc;

/// One queue slot: a payload, or the distinguished shutdown sentinel.
#[derive(Debug)]
pub enum Envelope {
    Record(SerializedPayload),
    /// No more records will follow.
    Shutdown,
}

/// Creates the producer/consumer pair bridging caller threads to the
/// dispatcher.
pub fn channel() -> (QueueSender, QueueReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (QueueSender { tx }, QueueReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct QueueSender {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl QueueSender {
    /// Never blocks. Returns false when the dispatcher is gone and the
    /// envelope was dropped.
    pub fn push(&self, envelope: Envelope) -> bool {
        self.tx.send(envelope).is_ok()
    }
}

#[derive(Debug)]
pub struct QueueReceiver {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl QueueReceiver {
    /// Awaits the next envelope. `None` once every sender is dropped.
    pub async fn pop(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn payload(tag: &str, n: usize) -> SerializedPayload {
        SerializedPayload::new(format!("{{\"{tag}\":{n}}}"))
    }

    #[tokio::test]
    async fn test_fifo_single_producer() {
        let (tx, mut rx) = channel();
        for n in 0..100 {
            assert!(tx.push(Envelope::Record(payload("n", n))));
        }
        tx.push(Envelope::Shutdown);

        for n in 0..100 {
            match rx.pop().await {
                Some(Envelope::Record(p)) => assert_eq!(p, payload("n", n)),
                other => panic!("expected record {n}, got {other:?}"),
            }
        }
        assert!(matches!(rx.pop().await, Some(Envelope::Shutdown)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_per_producer_order_preserved_across_threads() {
        let (tx, mut rx) = channel();

        let producers: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|tag| {
                let tx = tx.clone();
                thread::spawn(move || {
                    for n in 0..200 {
                        assert!(tx.push(Envelope::Record(payload(tag, n))));
                    }
                })
            })
            .collect();

        for producer in producers {
            producer.join().unwrap();
        }
        drop(tx);

        let mut next = std::collections::HashMap::from([("a", 0usize), ("b", 0), ("c", 0)]);
        let mut total = 0;
        while let Some(envelope) = rx.pop().await {
            let Envelope::Record(p) = envelope else {
                panic!("unexpected sentinel");
            };
            let body = p.into_inner();
            let (tag, n) = ["a", "b", "c"]
                .into_iter()
                .find_map(|tag| {
                    body.strip_prefix(&format!("{{\"{tag}\":"))
                        .and_then(|rest| rest.strip_suffix('}'))
                        .and_then(|digits| digits.parse::<usize>().ok())
                        .map(|n| (tag, n))
                })
                .unwrap();
            assert_eq!(next[tag], n, "producer {tag} out of order");
            *next.get_mut(tag).unwrap() += 1;
            total += 1;
        }
        assert_eq!(total, 600);
    }

    #[tokio::test]
    async fn test_push_after_receiver_dropped_reports_failure() {
        let (tx, rx) = channel();
        drop(rx);
        assert!(!tx.push(Envelope::Record(payload("n", 0))));
    }
}
