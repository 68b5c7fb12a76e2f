//! Fire-and-forget publication of order events to NATS.

use crate::domain::events::OrderEvent;

#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    pub fn disabled() -> Self { Self::default() }

    /// Publishing failures are logged and never fail the request.
    pub async fn publish(&self, events: Vec<OrderEvent>) {
        for event in events {
            tracing::info!(subject = event.subject(), ?event, "Order event");
            let Some(client) = &self.nats else { continue };
            let payload = match serde_json::to_vec(&event) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(error = %e, "Could not encode order event");
                    continue;
                }
            };
            if let Err(e) = client.publish(event.subject().to_string(), payload.into()).await {
                tracing::warn!(subject = event.subject(), error = %e, "Failed to publish order event");
            }
        }
    }
}
