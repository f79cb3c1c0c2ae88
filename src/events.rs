//! Domain event publishing over NATS.

use tracing::{debug, warn};

use crate::domain::events::DomainEvent;

/// Publishes domain events to NATS when a connection is configured; otherwise
/// events are only logged.
#[derive(Clone, Default)]
pub struct EventBus {
    nats: Option<async_nats::Client>,
}

impl EventBus {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    pub async fn connect(url: &str) -> Result<Self, async_nats::ConnectError> {
        let client = async_nats::connect(url).await?;
        Ok(Self::new(Some(client)))
    }

    /// Publishing is best-effort: failures are logged and never surface to the
    /// request that raised the event.
    pub async fn publish(&self, events: Vec<DomainEvent>) {
        for event in events {
            let subject = event.subject();
            let Some(client) = &self.nats else {
                debug!(%subject, ?event, "domain event");
                continue;
            };
            let payload = match serde_json::to_vec(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(%subject, error = %e, "failed to serialize domain event");
                    continue;
                }
            };
            if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                warn!(%subject, error = %e, "failed to publish domain event");
            }
        }
    }
}
