//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use titan_capture_rs::broker::{BrokerError, BrokerTransport};
use titan_capture_rs::context::CaptureContext;
use titan_capture_rs::model::{
    BrokerVariant, BusinessEvent, DependencyOutcome, Order, OrderAnnouncement, StoreVariant,
};
use titan_capture_rs::persistence::{DocumentCollection, StoreError};
use titan_capture_rs::service::{CaptureWiring, OrderCaptureService};
use titan_capture_rs::telemetry::TelemetryReporter;

pub const DEFAULT_SOURCE: &str = "teamA";

// --- Store ---

#[derive(Default)]
pub struct FakeCollection {
    pub inserted: Mutex<Vec<Order>>,
    pub fail_insert: bool,
    pub fail_list: bool,
    pub list_calls: AtomicUsize,
}

impl FakeCollection {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_insert: true,
            fail_list: true,
            ..Default::default()
        })
    }

    pub fn records(&self) -> Vec<Order> {
        self.inserted.lock().clone()
    }
}

#[async_trait]
impl DocumentCollection for FakeCollection {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        if self.fail_insert {
            return Err(StoreError::Backend("connection refused".into()));
        }
        self.inserted.lock().push(order.clone());
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list {
            return Err(StoreError::Backend("server selection timeout".into()));
        }
        Ok(vec!["orders".to_string()])
    }

    fn target(&self) -> &str {
        "mongo-test:27017"
    }
}

// --- Broker ---

pub struct FakeTransport {
    pub variant: BrokerVariant,
    pub sent: Mutex<Vec<String>>,
    pub fail_send: bool,
    pub fail_probe: bool,
    pub hang_probe: bool,
    pub probe_calls: AtomicUsize,
}

impl FakeTransport {
    pub fn new(variant: BrokerVariant) -> Arc<Self> {
        Arc::new(Self::with_variant(variant))
    }

    pub fn failing(variant: BrokerVariant) -> Arc<Self> {
        Arc::new(Self {
            fail_send: true,
            fail_probe: true,
            ..Self::with_variant(variant)
        })
    }

    pub fn hanging(variant: BrokerVariant) -> Arc<Self> {
        Arc::new(Self {
            hang_probe: true,
            ..Self::with_variant(variant)
        })
    }

    fn with_variant(variant: BrokerVariant) -> Self {
        Self {
            variant,
            sent: Mutex::new(Vec::new()),
            fail_send: false,
            fail_probe: false,
            hang_probe: false,
            probe_calls: AtomicUsize::new(0),
        }
    }

    pub fn payloads(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn announcements(&self) -> Vec<OrderAnnouncement> {
        self.payloads()
            .iter()
            .map(|p| serde_json::from_str(p).expect("announcement is JSON"))
            .collect()
    }
}

#[async_trait]
impl BrokerTransport for FakeTransport {
    fn variant(&self) -> BrokerVariant {
        self.variant
    }

    fn target(&self) -> &str {
        "broker-test:5672"
    }

    async fn send(&self, payload: &[u8], _timeout: Option<Duration>) -> Result<(), BrokerError> {
        if self.fail_send {
            return Err(BrokerError::Connection("broker unreachable".into()));
        }
        self.sent
            .lock()
            .push(String::from_utf8(payload.to_vec()).expect("payload is UTF-8"));
        Ok(())
    }

    async fn probe(&self, _timeout: Duration) -> Result<(), BrokerError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_probe {
            // Ignores its own timeout so the probe's outer bound is exercised
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if self.fail_probe {
            return Err(BrokerError::Connection("broker unreachable".into()));
        }
        Ok(())
    }
}

// --- Telemetry ---

#[derive(Default)]
pub struct RecordingTelemetry {
    pub events: Mutex<Vec<BusinessEvent>>,
    pub dependencies: Mutex<Vec<DependencyOutcome>>,
    pub exceptions: Mutex<Vec<String>>,
}

impl RecordingTelemetry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl TelemetryReporter for RecordingTelemetry {
    fn track_event(&self, event: BusinessEvent) {
        self.events.lock().push(event);
    }

    fn track_dependency(&self, outcome: DependencyOutcome) {
        self.dependencies.lock().push(outcome);
    }

    fn track_exception(&self, operation: &str, _error: &(dyn std::error::Error + 'static)) {
        self.exceptions.lock().push(operation.to_string());
    }
}

// --- Wiring ---

pub fn service_with(
    collection: Arc<FakeCollection>,
    store_variant: StoreVariant,
    transport: Arc<FakeTransport>,
    telemetry: Arc<dyn TelemetryReporter>,
    context: CaptureContext,
) -> OrderCaptureService {
    let wiring =
        CaptureWiring::new(DEFAULT_SOURCE, Duration::from_millis(200)).with_context(context);
    OrderCaptureService::assemble(collection, store_variant, transport, wiring, telemetry)
}

pub fn order(payload: serde_json::Value) -> Order {
    match payload {
        serde_json::Value::Object(map) => Order::from_payload(map),
        other => panic!("order payload must be an object, got {}", other),
    }
}
