// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batch shipment to the configured sink.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use tracing::debug;

use crate::error::TransportError;
use crate::record::SerializedPayload;

/// Ships one batch in a single call to the sink.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the whole batch atomically: it succeeds or fails as one unit,
    /// with no partial acknowledgment and no automatic retry.
    async fn send(&self, batch: &[SerializedPayload]) -> Result<(), TransportError>;
}

/// HTTP POST transport. Holds one persistent client for the lifetime of the
/// dispatcher; the connection pool is released when the dispatcher stops.
pub struct HttpTransport {
    client: reqwest::Client,
    sink_url: String,
    headers: HeaderMap,
}

impl HttpTransport {
    pub fn new(
        sink_url: impl Into<String>,
        headers: &BTreeMap<String, String>,
    ) -> Result<Self, TransportError> {
        let mut header_map = HeaderMap::new();
        header_map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| TransportError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|e| TransportError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            header_map.insert(header_name, header_value);
        }

        Ok(Self {
            client: reqwest::Client::new(),
            sink_url: sink_url.into(),
            headers: header_map,
        })
    }

    /// The request body is a JSON array literal joined from payloads that
    /// are already serialized objects; nothing is re-parsed.
    fn encode_body(batch: &[SerializedPayload]) -> String {
        let capacity = batch.iter().map(|p| p.len() + 1).sum::<usize>() + 2;
        let mut body = String::with_capacity(capacity);
        body.push('[');
        for (i, payload) in batch.iter().enumerate() {
            if i > 0 {
                body.push(',');
            }
            body.push_str(payload.as_str());
        }
        body.push(']');
        body
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, batch: &[SerializedPayload]) -> Result<(), TransportError> {
        debug!("Shipping {} payloads to sink", batch.len());
        let response = self
            .client
            .post(&self.sink_url)
            .headers(self.headers.clone())
            .body(Self::encode_body(batch))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(TransportError::Status { status, body })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(bodies: &[&str]) -> Vec<SerializedPayload> {
        bodies.iter().map(|b| SerializedPayload::from(*b)).collect()
    }

    #[test]
    fn test_encode_body_empty() {
        assert_eq!(HttpTransport::encode_body(&[]), "[]");
    }

    #[test]
    fn test_encode_body_single() {
        assert_eq!(
            HttpTransport::encode_body(&batch(&["{\"a\":1}"])),
            "[{\"a\":1}]"
        );
    }

    #[test]
    fn test_encode_body_joins_without_reparsing() {
        assert_eq!(
            HttpTransport::encode_body(&batch(&["{\"a\":1}", "{\"b\":2}", "{\"c\":3}"])),
            "[{\"a\":1},{\"b\":2},{\"c\":3}]"
        );
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        let headers = BTreeMap::from([("bad header".to_string(), "v".to_string())]);
        let result = HttpTransport::new("https://sink.example.com", &headers);
        assert!(matches!(
            result,
            Err(TransportError::InvalidHeader { name, .. }) if name == "bad header"
        ));
    }

    #[test]
    fn test_invalid_header_value_rejected() {
        let headers = BTreeMap::from([("x-token".to_string(), "bad\nvalue".to_string())]);
        let result = HttpTransport::new("https://sink.example.com", &headers);
        assert!(result.is_err());
    }
}
