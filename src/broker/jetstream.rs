use async_nats::jetstream;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{error, info};

use crate::broker::{within, BrokerError, BrokerTransport};
use crate::config::{endpoint_target, BrokerSettings};
use crate::model::BrokerVariant;

/// Core-NATS subject used by the liveness probe; not bound to any stream.
const PROBE_SUBJECT: &str = "_capture.probe";

/// JetStream publisher sharing one long-lived client across all calls.
pub struct CloudStreaming {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    subject: String,
    target: String,
}

impl CloudStreaming {
    pub async fn connect(settings: &BrokerSettings) -> Result<Self, BrokerError> {
        let target = endpoint_target(&settings.uri);
        info!("Connecting to NATS at {}", target);

        let client = async_nats::connect(settings.uri.as_str()).await.map_err(|e| {
            error!("❌ Failed to connect to NATS: {}", e);
            BrokerError::Connection(e.to_string())
        })?;
        info!("✅ Connected to NATS");

        let jetstream = jetstream::new(client.clone());

        // Ensure the stream capturing the order subject exists
        if jetstream.get_stream(&settings.stream).await.is_err() {
            info!("Creating JetStream Stream: {}", settings.stream);
            jetstream
                .create_stream(jetstream::stream::Config {
                    name: settings.stream.clone(),
                    subjects: vec![settings.queue.clone()],
                    storage: jetstream::stream::StorageType::File,
                    ..Default::default()
                })
                .await
                .map_err(|e| {
                    error!("❌ Failed to create JetStream stream: {}", e);
                    BrokerError::Stream(e.to_string())
                })?;
        }

        Ok(Self {
            client,
            jetstream,
            subject: settings.queue.clone(),
            target,
        })
    }
}

#[async_trait]
impl BrokerTransport for CloudStreaming {
    fn variant(&self) -> BrokerVariant {
        BrokerVariant::CloudStreaming
    }

    fn target(&self) -> &str {
        &self.target
    }

    async fn send(&self, payload: &[u8], timeout: Option<Duration>) -> Result<(), BrokerError> {
        within(timeout, async {
            let ack = self
                .jetstream
                .publish(self.subject.clone(), payload.to_vec().into())
                .await
                .map_err(|e| BrokerError::Stream(e.to_string()))?;
            ack.await.map_err(|e| BrokerError::Stream(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn probe(&self, timeout: Duration) -> Result<(), BrokerError> {
        within(Some(timeout), async {
            self.client
                .publish(PROBE_SUBJECT.to_string(), Vec::<u8>::new().into())
                .await
                .map_err(|e| BrokerError::Connection(e.to_string()))?;
            // Flush round-trips to the server, so success means it is reachable
            self.client
                .flush()
                .await
                .map_err(|e| BrokerError::Connection(e.to_string()))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::connect_transport;

    #[tokio::test]
    async fn test_connect_fails_when_server_unreachable() {
        let settings = BrokerSettings {
            uri: "nats://127.0.0.1:1".to_string(),
            queue: "order".to_string(),
            stream: "ORDERS".to_string(),
            variant: None,
            probe_timeout_ms: 200,
        };

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            connect_transport(&settings, BrokerVariant::CloudStreaming),
        )
        .await
        .expect("refused connect returns promptly");

        assert!(matches!(result, Err(BrokerError::Connection(_))));
    }
}
