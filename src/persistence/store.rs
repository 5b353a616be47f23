use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error};

use crate::context::CaptureContext;
use crate::model::{DependencyOutcome, Order, StoreVariant, STATUS_OPEN};
use crate::telemetry::TelemetryReporter;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] mongodb::bson::ser::Error),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A document collection reachable over the configured store connection.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// One durable insert of the full order record.
    async fn insert(&self, order: &Order) -> Result<(), StoreError>;

    /// Metadata-only listing of the database's collections.
    async fn list_collections(&self) -> Result<Vec<String>, StoreError>;

    /// Endpoint reported as the dependency target.
    fn target(&self) -> &str;
}

pub struct OrderStore {
    collection: Arc<dyn DocumentCollection>,
    variant: StoreVariant,
    default_source: String,
    context: CaptureContext,
    telemetry: Arc<dyn TelemetryReporter>,
}

impl OrderStore {
    pub fn new(
        collection: Arc<dyn DocumentCollection>,
        variant: StoreVariant,
        default_source: impl Into<String>,
        context: CaptureContext,
        telemetry: Arc<dyn TelemetryReporter>,
    ) -> Self {
        Self {
            collection,
            variant,
            default_source: default_source.into(),
            context,
            telemetry,
        }
    }

    pub fn variant(&self) -> StoreVariant {
        self.variant
    }

    /// Assign the system fields and durably insert the order.
    ///
    /// The id is assigned before the insert, so on success the returned id is
    /// the stored one. No retry is attempted on failure.
    pub async fn save(&self, order: &mut Order) -> Result<String, StoreError> {
        order.status = STATUS_OPEN.to_string();
        if order.source.is_empty() {
            order.source = self.default_source.clone();
        }
        order.product = self.context.product_label();
        order.order_id = self.context.id.new_id();

        let started = Instant::now();
        let result = self.collection.insert(order).await;
        let duration = started.elapsed();

        self.telemetry.track_dependency(DependencyOutcome {
            name: self.variant.label().to_string(),
            dependency_type: self.variant.dependency_type().to_string(),
            target: self.collection.target().to_string(),
            duration,
            success: result.is_ok(),
        });

        match result {
            Ok(()) => {
                debug!(
                    order_id = %order.order_id,
                    product = %order.product,
                    elapsed_ms = duration.as_millis() as u64,
                    "Order stored"
                );
                Ok(order.order_id.clone())
            }
            Err(e) => {
                error!(
                    order_id = %order.order_id,
                    store = %self.variant,
                    "❌ Failed to store order: {}",
                    e
                );
                Err(e)
            }
        }
    }
}
