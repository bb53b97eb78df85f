//! HTTP event publisher.
//!
//! Delivers event envelopes to the fan-out endpoint observers subscribe
//! behind. The loop treats delivery as best-effort; failures surface as
//! [`EventError`] and are logged by the caller.

use async_trait::async_trait;
use serde_json::json;

use gantry_core::events::{AgentEvent, EventError, EventPublisher};

/// Publishes events by POSTing envelopes to an HTTP endpoint.
pub struct HttpEventPublisher {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpEventPublisher {
    /// Create a publisher for the given endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl EventPublisher for HttpEventPublisher {
    async fn publish(&self, worker_id: &str, event: AgentEvent) -> Result<(), EventError> {
        let envelope = json!({ "workerId": worker_id, "event": event });
        let response = self
            .client
            .post(&self.endpoint)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| EventError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(EventError(format!(
                "event endpoint returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
