//! Purchase log: domain events published to NATS.

use crate::domain::events::DomainEvent;

/// Publishes domain events when a NATS client is configured. Publishing is
/// best effort; failures are logged and never fail the request.
#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    pub async fn publish_all(&self, events: Vec<DomainEvent>) {
        for event in &events {
            self.publish(event).await;
        }
    }

    pub async fn publish(&self, event: &DomainEvent) {
        tracing::info!(subject = event.subject(), ?event, "domain event");
        let Some(client) = &self.nats else { return };
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode event");
                return;
            }
        };
        if let Err(e) = client.publish(event.subject().to_string(), payload.into()).await {
            tracing::warn!(subject = event.subject(), error = %e, "failed to publish event");
        }
    }
}
