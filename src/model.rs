use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// Status assigned to every freshly captured order.
pub const STATUS_OPEN: &str = "Open";

/// Business event emitted once per fully captured order.
pub const EVENT_ORDER_CAPTURED: &str = "OrderCaptured";

/// An order as accepted from the caller and persisted by the store.
///
/// Caller fields are kept verbatim in `fields`; the four system fields are
/// assigned by `OrderStore::save` and are never trusted from input.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub product: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Order {
    /// Builds an order from an arbitrary JSON object.
    ///
    /// A caller-supplied `orderId`, `status` or `product` is discarded; only
    /// `source` is honoured, and only when it is a non-empty string.
    pub fn from_payload(mut fields: Map<String, Value>) -> Self {
        fields.remove("orderId");
        fields.remove("status");
        fields.remove("product");
        let source = match fields.remove("source") {
            Some(Value::String(s)) => s,
            _ => String::new(),
        };
        Self {
            source,
            fields,
            ..Default::default()
        }
    }
}

/// Minimal order reference published on the broker.
///
/// Consumers rely on exactly these two string fields; do not add more.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderAnnouncement {
    pub order: String,
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BrokerVariant {
    LegacyQueue,
    CloudStreaming,
}

impl BrokerVariant {
    pub fn label(&self) -> &'static str {
        match self {
            BrokerVariant::LegacyQueue => "LegacyQueue",
            BrokerVariant::CloudStreaming => "CloudStreaming",
        }
    }

    /// Wire protocol reported as the dependency type.
    pub fn dependency_type(&self) -> &'static str {
        match self {
            BrokerVariant::LegacyQueue => "AMQP",
            BrokerVariant::CloudStreaming => "JetStream",
        }
    }
}

impl fmt::Display for BrokerVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreVariant {
    SelfHosted,
    ManagedCloud,
}

impl StoreVariant {
    pub fn label(&self) -> &'static str {
        match self {
            StoreVariant::SelfHosted => "SelfHosted",
            StoreVariant::ManagedCloud => "ManagedCloud",
        }
    }

    /// Both variants speak the same wire protocol.
    pub fn dependency_type(&self) -> &'static str {
        "MongoDB"
    }
}

impl fmt::Display for StoreVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of one dependency health probe. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    pub message_queue_kind: BrokerVariant,
    pub message_queue_healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_queue_error: Option<String>,
    pub database_kind: StoreVariant,
    pub database_healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_error: Option<String>,
}

impl HealthRecord {
    pub fn healthy(&self) -> bool {
        self.message_queue_healthy && self.database_healthy
    }
}

/// One call to an external dependency, as reported to telemetry.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyOutcome {
    pub name: String,
    pub dependency_type: String,
    pub target: String,
    pub duration: Duration,
    pub success: bool,
}

/// Free-form business event with string properties used for correlation.
#[derive(Debug, Clone, PartialEq)]
pub struct BusinessEvent {
    pub name: String,
    pub properties: Vec<(String, String)>,
}

impl BusinessEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_order_from_payload_discards_system_fields() {
        let payload = json!({
            "name": "widget",
            "orderId": "forged",
            "status": "Closed",
            "product": "product-99",
            "source": "teamB"
        });
        let Value::Object(map) = payload else {
            unreachable!()
        };

        let order = Order::from_payload(map);
        assert_eq!(order.order_id, "");
        assert_eq!(order.status, "");
        assert_eq!(order.product, "");
        assert_eq!(order.source, "teamB");
        assert_eq!(order.fields.get("name"), Some(&json!("widget")));
        assert_eq!(order.fields.len(), 1);
    }

    #[test]
    fn test_order_serializes_flat() {
        let mut fields = Map::new();
        fields.insert("name".into(), json!("widget"));
        let order = Order {
            order_id: "abc".into(),
            status: STATUS_OPEN.into(),
            source: "teamA".into(),
            product: "product-3".into(),
            fields,
        };

        let value = serde_json::to_value(&order).unwrap();
        assert_eq!(
            value,
            json!({
                "orderId": "abc",
                "status": "Open",
                "source": "teamA",
                "product": "product-3",
                "name": "widget"
            })
        );
    }

    #[test]
    fn test_announcement_wire_shape() {
        let msg = OrderAnnouncement {
            order: "X".into(),
            source: "teamA".into(),
        };
        let wire = serde_json::to_string(&msg).unwrap();
        assert_eq!(wire, r#"{"order":"X","source":"teamA"}"#);
    }

    #[test]
    fn test_health_record_shape() {
        let record = HealthRecord {
            message_queue_kind: BrokerVariant::CloudStreaming,
            message_queue_healthy: false,
            message_queue_error: Some("timed out".into()),
            database_kind: StoreVariant::SelfHosted,
            database_healthy: true,
            database_error: None,
        };
        assert!(!record.healthy());

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["messageQueueKind"], "CloudStreaming");
        assert_eq!(value["messageQueueError"], "timed out");
        assert_eq!(value["databaseKind"], "SelfHosted");
        assert!(value.get("databaseError").is_none());
    }
}
