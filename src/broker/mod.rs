//! Order announcements over one of two incompatible broker protocols.
//!
//! [`BrokerPublisher`] is bound to a single [`BrokerTransport`] when it is
//! built and dispatches every call to it; the variant is never re-detected.

pub mod amqp;
pub mod jetstream;

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::BrokerSettings;
use crate::model::{BrokerVariant, DependencyOutcome, OrderAnnouncement};
use crate::telemetry::TelemetryReporter;

pub use amqp::LegacyQueue;
pub use jetstream::CloudStreaming;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),
    #[error("Stream error: {0}")]
    Stream(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Broker call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait BrokerTransport: Send + Sync {
    fn variant(&self) -> BrokerVariant;

    /// Endpoint reported as the dependency target (no credentials).
    fn target(&self) -> &str;

    /// Publish one UTF-8 JSON envelope. `timeout` bounds the whole send when set.
    async fn send(&self, payload: &[u8], timeout: Option<Duration>) -> Result<(), BrokerError>;

    /// Liveness check, bounded by `timeout`. Never delivers to order consumers.
    async fn probe(&self, timeout: Duration) -> Result<(), BrokerError>;
}

/// Await `fut`, failing with [`BrokerError::Timeout`] once `limit` elapses.
pub(crate) async fn within<T, F>(limit: Option<Duration>, fut: F) -> Result<T, BrokerError>
where
    F: Future<Output = Result<T, BrokerError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| BrokerError::Timeout(limit))?,
        None => fut.await,
    }
}

/// Build the transport for the variant chosen at startup.
pub async fn connect_transport(
    settings: &BrokerSettings,
    variant: BrokerVariant,
) -> Result<Arc<dyn BrokerTransport>, BrokerError> {
    let transport: Arc<dyn BrokerTransport> = match variant {
        BrokerVariant::LegacyQueue => Arc::new(LegacyQueue::new(settings)),
        BrokerVariant::CloudStreaming => Arc::new(CloudStreaming::connect(settings).await?),
    };
    Ok(transport)
}

pub struct BrokerPublisher {
    transport: Arc<dyn BrokerTransport>,
    telemetry: Arc<dyn TelemetryReporter>,
}

impl BrokerPublisher {
    pub fn new(transport: Arc<dyn BrokerTransport>, telemetry: Arc<dyn TelemetryReporter>) -> Self {
        info!(
            "📨 Broker publisher bound to {} ({})",
            transport.variant(),
            transport.target()
        );
        Self {
            transport,
            telemetry,
        }
    }

    pub fn variant(&self) -> BrokerVariant {
        self.transport.variant()
    }

    /// Publish `{"order": <id>, "source": <source>}`. No retry on failure.
    pub async fn announce(&self, order_id: &str, source: &str) -> Result<(), BrokerError> {
        let announcement = OrderAnnouncement {
            order: order_id.to_string(),
            source: source.to_string(),
        };

        let started = Instant::now();
        let result = match serde_json::to_vec(&announcement) {
            Ok(payload) => self.transport.send(&payload, None).await,
            Err(e) => Err(e.into()),
        };
        let duration = started.elapsed();

        let variant = self.transport.variant();
        self.telemetry.track_dependency(DependencyOutcome {
            name: variant.label().to_string(),
            dependency_type: variant.dependency_type().to_string(),
            target: self.transport.target().to_string(),
            duration,
            success: result.is_ok(),
        });

        match &result {
            Ok(()) => debug!(
                order_id,
                broker = %variant,
                elapsed_ms = duration.as_millis() as u64,
                "Order announced"
            ),
            Err(e) => error!(
                order_id,
                broker = %variant,
                "❌ Failed to announce order: {}",
                e
            ),
        }
        result
    }
}
