use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::broker::BrokerTransport;
use crate::model::{HealthRecord, StoreVariant};
use crate::persistence::DocumentCollection;

/// Liveness checks against the store and broker bound at startup.
///
/// Each check is bounded by `timeout` and converted into a healthy flag plus
/// optional error text; a failing check never stops the other one.
pub struct DependencyHealthProbe {
    collection: Arc<dyn DocumentCollection>,
    store_variant: StoreVariant,
    transport: Arc<dyn BrokerTransport>,
    timeout: Duration,
}

impl DependencyHealthProbe {
    pub fn new(
        collection: Arc<dyn DocumentCollection>,
        store_variant: StoreVariant,
        transport: Arc<dyn BrokerTransport>,
        timeout: Duration,
    ) -> Self {
        Self {
            collection,
            store_variant,
            transport,
            timeout,
        }
    }

    pub async fn check(&self) -> HealthRecord {
        let (database_error, message_queue_error) =
            tokio::join!(self.check_store(), self.check_broker());

        HealthRecord {
            message_queue_kind: self.transport.variant(),
            message_queue_healthy: message_queue_error.is_none(),
            message_queue_error,
            database_kind: self.store_variant,
            database_healthy: database_error.is_none(),
            database_error,
        }
    }

    async fn check_store(&self) -> Option<String> {
        match tokio::time::timeout(self.timeout, self.collection.list_collections()).await {
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                warn!(store = %self.store_variant, "Store health check failed: {}", e);
                Some(e.to_string())
            }
            Err(_) => {
                warn!(store = %self.store_variant, "Store health check timed out");
                Some(format!("Store health check timed out after {:?}", self.timeout))
            }
        }
    }

    async fn check_broker(&self) -> Option<String> {
        let variant = self.transport.variant();
        // The transport bounds itself too; this outer limit guards misbehaving ones
        match tokio::time::timeout(self.timeout, self.transport.probe(self.timeout)).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => {
                warn!(broker = %variant, "Broker health check failed: {}", e);
                Some(e.to_string())
            }
            Err(_) => {
                warn!(broker = %variant, "Broker health check timed out");
                Some(format!("Broker health check timed out after {:?}", self.timeout))
            }
        }
    }
}
