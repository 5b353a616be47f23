use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info};

use crate::broker::{BrokerError, BrokerPublisher, BrokerTransport};
use crate::context::CaptureContext;
use crate::health::DependencyHealthProbe;
use crate::model::{BusinessEvent, HealthRecord, Order, StoreVariant, EVENT_ORDER_CAPTURED};
use crate::persistence::{DocumentCollection, OrderStore, StoreError};
use crate::telemetry::TelemetryReporter;

pub const STAGE_STORE_FAILED: &str = "store-failed";
pub const STAGE_ANNOUNCE_FAILED: &str = "announce-failed";

#[derive(Error, Debug)]
pub enum CaptureError {
    /// Nothing was stored; retrying the whole capture is safe.
    #[error("Order could not be stored: {0}")]
    StoreFailed(#[source] StoreError),
    /// The order is durably stored under `order_id` but was not announced.
    #[error("Order {order_id} stored but not announced: {source}")]
    AnnounceFailed {
        order_id: String,
        #[source]
        source: BrokerError,
    },
}

impl CaptureError {
    /// Machine-readable tag of the stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            CaptureError::StoreFailed(_) => STAGE_STORE_FAILED,
            CaptureError::AnnounceFailed { .. } => STAGE_ANNOUNCE_FAILED,
        }
    }

    /// Id of the stored order, if the store write succeeded.
    pub fn stored_order_id(&self) -> Option<&str> {
        match self {
            CaptureError::StoreFailed(_) => None,
            CaptureError::AnnounceFailed { order_id, .. } => Some(order_id),
        }
    }
}

/// Process-wide values the service is assembled with.
#[derive(Clone)]
pub struct CaptureWiring {
    pub default_source: String,
    pub probe_timeout: Duration,
    pub context: CaptureContext,
}

impl CaptureWiring {
    pub fn new(default_source: impl Into<String>, probe_timeout: Duration) -> Self {
        Self {
            default_source: default_source.into(),
            probe_timeout,
            context: CaptureContext::new_system(),
        }
    }

    pub fn with_context(mut self, context: CaptureContext) -> Self {
        self.context = context;
        self
    }
}

/// Store-then-announce orchestration shared by all request handlers.
pub struct OrderCaptureService {
    store: OrderStore,
    publisher: BrokerPublisher,
    probe: DependencyHealthProbe,
    telemetry: Arc<dyn TelemetryReporter>,
}

impl OrderCaptureService {
    pub fn new(
        store: OrderStore,
        publisher: BrokerPublisher,
        probe: DependencyHealthProbe,
        telemetry: Arc<dyn TelemetryReporter>,
    ) -> Self {
        Self {
            store,
            publisher,
            probe,
            telemetry,
        }
    }

    /// Wire store, publisher and probe around already-connected dependencies.
    pub fn assemble(
        collection: Arc<dyn DocumentCollection>,
        store_variant: StoreVariant,
        transport: Arc<dyn BrokerTransport>,
        wiring: CaptureWiring,
        telemetry: Arc<dyn TelemetryReporter>,
    ) -> Self {
        let probe = DependencyHealthProbe::new(
            collection.clone(),
            store_variant,
            transport.clone(),
            wiring.probe_timeout,
        );
        let store = OrderStore::new(
            collection,
            store_variant,
            wiring.default_source,
            wiring.context,
            telemetry.clone(),
        );
        let publisher = BrokerPublisher::new(transport, telemetry.clone());
        Self::new(store, publisher, probe, telemetry)
    }

    pub async fn capture(&self, mut order: Order) -> Result<String, CaptureError> {
        let started = Instant::now();

        let order_id = match self.store.save(&mut order).await {
            Ok(id) => id,
            Err(e) => {
                error!("❌ Capture aborted, order not stored: {}", e);
                let err = CaptureError::StoreFailed(e);
                self.telemetry.track_exception(err.stage(), &err);
                return Err(err);
            }
        };

        // Announce only after the store write succeeded
        if let Err(e) = self.publisher.announce(&order_id, &order.source).await {
            error!(
                order_id = %order_id,
                "❌ Order stored but announce failed: {}",
                e
            );
            let err = CaptureError::AnnounceFailed {
                order_id,
                source: e,
            };
            self.telemetry.track_exception(err.stage(), &err);
            return Err(err);
        }

        let elapsed = started.elapsed();
        self.telemetry.track_event(
            BusinessEvent::new(EVENT_ORDER_CAPTURED)
                .with("team", order.source.as_str())
                .with("orderId", order_id.as_str())
                .with("database", self.store.variant().label())
                .with("messageQueue", self.publisher.variant().label())
                .with("durationMs", elapsed.as_millis().to_string()),
        );

        info!(
            order_id = %order_id,
            source = %order.source,
            product = %order.product,
            elapsed_ms = elapsed.as_millis() as u64,
            "✅ Order captured"
        );
        Ok(order_id)
    }

    pub async fn health_check(&self) -> HealthRecord {
        self.probe.check().await
    }
}
