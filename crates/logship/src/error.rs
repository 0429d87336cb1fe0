// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// Errors raised while building or validating pipeline configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid sink URL '{url}': {reason}")]
    InvalidSinkUrl { url: String, reason: String },
}

/// Failures shipping a batch to the sink. A batch fails as a whole; there is
/// no partial acknowledgment and no automatic retry.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Sink returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Failed to reach sink: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },
}

/// Errors surfaced when starting the pipeline. Once running, transport and
/// serialization failures are contained in the background context and never
/// reach producers.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Failed to spawn pipeline worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = ConfigError::Invalid("max_batch_size must be at least 1".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid configuration: max_batch_size must be at least 1"
        );
    }

    #[test]
    fn test_sink_url_error_display() {
        let error = ConfigError::InvalidSinkUrl {
            url: "ftp://sink".to_string(),
            reason: "unsupported scheme".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid sink URL 'ftp://sink': unsupported scheme"
        );
    }

    #[test]
    fn test_transport_status_error_display() {
        let error = TransportError::Status {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: "try later".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Sink returned 503 Service Unavailable: try later"
        );
    }

    #[test]
    fn test_pipeline_error_wraps_config_error() {
        let error = PipelineError::from(ConfigError::Invalid("empty sink URL".to_string()));
        assert_eq!(error.to_string(), "Invalid configuration: empty sink URL");
    }
}
