//! Dependency and business-event reporting.
//!
//! The capture path talks to a [`TelemetryReporter`] trait object that is chosen
//! once at startup: [`NoopTelemetry`] when no credential is configured, or
//! [`IngestionTelemetry`] which hands items to a background exporter through a
//! bounded channel. Reporting never blocks and never fails the caller.

use chrono::Utc;
use serde_json::{json, Map, Value};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::metrics;
use crate::model::{BusinessEvent, DependencyOutcome, EVENT_ORDER_CAPTURED};

const DEFAULT_INGESTION_ENDPOINT: &str = "https://dc.services.visualstudio.com";
const QUEUE_CAPACITY: usize = 1024;
const MAX_BATCH: usize = 64;
const FLUSH_INTERVAL: Duration = Duration::from_secs(2);
const EXPORT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug, PartialEq)]
pub enum TelemetryError {
    #[error("Telemetry connection string has no instrumentation key")]
    MissingKey,
    #[error("Malformed telemetry connection string segment: {0}")]
    Malformed(String),
    #[error("Invalid telemetry ingestion endpoint: {0}")]
    Endpoint(String),
    #[error("Telemetry HTTP client error: {0}")]
    Client(String),
}

pub trait TelemetryReporter: Send + Sync {
    fn track_event(&self, event: BusinessEvent);

    fn track_dependency(&self, outcome: DependencyOutcome);

    fn track_exception(&self, operation: &str, error: &(dyn std::error::Error + 'static));

    /// False only for the reporter used when no credential is configured.
    fn enabled(&self) -> bool {
        true
    }
}

/// Reporter used when no telemetry credential is configured.
pub struct NoopTelemetry;

impl TelemetryReporter for NoopTelemetry {
    fn track_event(&self, _event: BusinessEvent) {}

    fn track_dependency(&self, _outcome: DependencyOutcome) {}

    fn track_exception(&self, _operation: &str, _error: &(dyn std::error::Error + 'static)) {}

    fn enabled(&self) -> bool {
        false
    }
}

/// Parsed `InstrumentationKey=...;IngestionEndpoint=...` connection string.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryCredential {
    pub instrumentation_key: String,
    pub ingestion_endpoint: String,
}

impl FromStr for TelemetryCredential {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut key = None;
        let mut endpoint = None;

        for segment in s.split(';').map(str::trim).filter(|seg| !seg.is_empty()) {
            let (name, value) = segment
                .split_once('=')
                .ok_or_else(|| TelemetryError::Malformed(segment.to_string()))?;
            match name.trim().to_ascii_lowercase().as_str() {
                "instrumentationkey" => key = Some(value.trim().to_string()),
                "ingestionendpoint" => {
                    endpoint = Some(value.trim().trim_end_matches('/').to_string())
                }
                // Other segments (LiveEndpoint, ApplicationId, ...) are not used here
                _ => {}
            }
        }

        let instrumentation_key = key
            .filter(|k| !k.is_empty())
            .ok_or(TelemetryError::MissingKey)?;

        let ingestion_endpoint =
            endpoint.unwrap_or_else(|| DEFAULT_INGESTION_ENDPOINT.to_string());
        match Url::parse(&ingestion_endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => return Err(TelemetryError::Endpoint(ingestion_endpoint)),
        }

        Ok(Self {
            instrumentation_key,
            ingestion_endpoint,
        })
    }
}

pub type ReporterHandle = (Arc<dyn TelemetryReporter>, Option<JoinHandle<()>>);

/// Build the process-wide reporter. Must be called from within a Tokio runtime
/// when a credential is supplied.
pub fn reporter(
    credential: Option<TelemetryCredential>,
    cloud_role: &str,
) -> Result<ReporterHandle, TelemetryError> {
    match credential {
        Some(credential) => {
            info!(
                "📡 Telemetry enabled, exporting to {}",
                credential.ingestion_endpoint
            );
            let (reporter, handle) = IngestionTelemetry::spawn(credential, cloud_role)?;
            Ok((Arc::new(reporter), Some(handle)))
        }
        None => {
            info!("Telemetry credential not configured, reporting disabled");
            Ok((Arc::new(NoopTelemetry), None))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryItem {
    Event(BusinessEvent),
    Dependency(DependencyOutcome),
    Exception { operation: String, message: String },
}

impl TelemetryItem {
    /// Ingestion envelope for this item.
    pub fn envelope(&self, instrumentation_key: &str, cloud_role: &str) -> Value {
        let (name, base_type, base_data) = match self {
            TelemetryItem::Event(event) => {
                let properties: Map<String, Value> = event
                    .properties
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect();
                (
                    "Event",
                    "EventData",
                    json!({ "ver": 2, "name": event.name, "properties": properties }),
                )
            }
            TelemetryItem::Dependency(outcome) => (
                "RemoteDependency",
                "RemoteDependencyData",
                json!({
                    "ver": 2,
                    "name": outcome.name,
                    "type": outcome.dependency_type,
                    "target": outcome.target,
                    "duration": format_duration(outcome.duration),
                    "success": outcome.success,
                }),
            ),
            TelemetryItem::Exception { operation, message } => (
                "Exception",
                "ExceptionData",
                json!({
                    "ver": 2,
                    "exceptions": [{
                        "typeName": operation,
                        "message": message,
                        "hasFullStack": false,
                    }],
                }),
            ),
        };

        json!({
            "name": format!("Microsoft.ApplicationInsights.{}", name),
            "time": Utc::now().to_rfc3339(),
            "iKey": instrumentation_key,
            "tags": { "ai.cloud.role": cloud_role },
            "data": { "baseType": base_type, "baseData": base_data },
        })
    }
}

/// Reporter that queues items for a background exporter task.
pub struct IngestionTelemetry {
    tx: mpsc::Sender<TelemetryItem>,
}

impl IngestionTelemetry {
    pub fn spawn(
        credential: TelemetryCredential,
        cloud_role: &str,
    ) -> Result<(Self, JoinHandle<()>), TelemetryError> {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let exporter = Exporter::new(credential, cloud_role, EXPORT_TIMEOUT)?;
        let handle = tokio::spawn(exporter.run(rx));
        Ok((Self { tx }, handle))
    }

    /// Reporter feeding an externally owned queue.
    pub fn with_sender(tx: mpsc::Sender<TelemetryItem>) -> Self {
        Self { tx }
    }

    fn enqueue(&self, item: TelemetryItem) {
        // Never wait on the hot path: a full or closed queue drops the item
        if self.tx.try_send(item).is_err() {
            metrics::inc_telemetry_dropped();
            debug!("Telemetry queue unavailable, item dropped");
        }
    }
}

impl TelemetryReporter for IngestionTelemetry {
    fn track_event(&self, event: BusinessEvent) {
        if event.name == EVENT_ORDER_CAPTURED {
            metrics::inc_captured_orders();
        }
        self.enqueue(TelemetryItem::Event(event));
    }

    fn track_dependency(&self, outcome: DependencyOutcome) {
        metrics::observe_dependency(&outcome.name, outcome.success, outcome.duration.as_secs_f64());
        self.enqueue(TelemetryItem::Dependency(outcome));
    }

    fn track_exception(&self, operation: &str, error: &(dyn std::error::Error + 'static)) {
        metrics::inc_capture_failures(operation);
        self.enqueue(TelemetryItem::Exception {
            operation: operation.to_string(),
            message: error.to_string(),
        });
    }
}

struct Exporter {
    client: reqwest::Client,
    url: String,
    instrumentation_key: String,
    cloud_role: String,
}

impl Exporter {
    /// `timeout` bounds each POST so a stalled endpoint cannot stop the drain loop.
    fn new(
        credential: TelemetryCredential,
        cloud_role: &str,
        timeout: Duration,
    ) -> Result<Self, TelemetryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TelemetryError::Client(e.to_string()))?;
        Ok(Self {
            client,
            url: format!("{}/v2/track", credential.ingestion_endpoint),
            instrumentation_key: credential.instrumentation_key,
            cloud_role: cloud_role.to_string(),
        })
    }

    async fn run(self, mut rx: mpsc::Receiver<TelemetryItem>) {
        let mut batch: Vec<Value> = Vec::with_capacity(MAX_BATCH);
        let mut ticker = tokio::time::interval(FLUSH_INTERVAL);

        loop {
            tokio::select! {
                item = rx.recv() => match item {
                    Some(item) => {
                        batch.push(item.envelope(&self.instrumentation_key, &self.cloud_role));
                        if batch.len() >= MAX_BATCH {
                            self.flush(&mut batch).await;
                        }
                    }
                    None => {
                        self.flush(&mut batch).await;
                        info!("Telemetry exporter stopped");
                        break;
                    }
                },
                _ = ticker.tick() => {
                    self.flush(&mut batch).await;
                }
            }
        }
    }

    async fn flush(&self, batch: &mut Vec<Value>) {
        if batch.is_empty() {
            return;
        }
        let items = std::mem::take(batch);
        let count = items.len() as u64;

        match self.client.post(&self.url).json(&items).send().await {
            Ok(resp) if resp.status().is_success() => {
                metrics::inc_telemetry_exported(count);
                debug!("📤 Exported {} telemetry items", count);
            }
            Ok(resp) => warn!("Telemetry ingestion rejected batch: HTTP {}", resp.status()),
            Err(e) => warn!("Telemetry export failed: {}", e),
        }
    }
}

/// `d.hh:mm:ss.ffffff`, the duration format the ingestion API expects.
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;
    format!(
        "{}.{:02}:{:02}:{:02}.{:06}",
        days,
        hours,
        minutes,
        seconds,
        duration.subsec_micros()
    )
}
