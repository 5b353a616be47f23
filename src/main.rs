use actix_web::{web, App, HttpServer};
use std::env;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use titan_capture_rs::api;
use titan_capture_rs::broker;
use titan_capture_rs::config::Settings;
use titan_capture_rs::persistence::{DocumentCollection, MongoCollection};
use titan_capture_rs::service::{CaptureWiring, OrderCaptureService};
use titan_capture_rs::telemetry;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("CAPTURE_LOG_JSON").map(|v| v == "1").unwrap_or(false);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load environment variables before anything reads them
    dotenv::dotenv().ok();
    init_tracing();

    info!("╔═══════════════════════════════════════════════════════════════╗");
    info!("║               TITAN CAPTURE RS                                ║");
    info!("║               Order Capture & Announce Service                ║");
    info!("╚═══════════════════════════════════════════════════════════════╝");

    let settings = Settings::new().map_err(|e| {
        error!("❌ Invalid configuration: {}", e);
        e
    })?;

    let store_variant = settings.store.variant();
    let broker_variant = settings.broker.variant();
    info!(
        "Dependencies: store={} broker={}",
        store_variant, broker_variant
    );

    let (reporter, _exporter) =
        telemetry::reporter(settings.telemetry.credential()?, "titan-capture-rs")?;

    let collection: Arc<dyn DocumentCollection> =
        Arc::new(MongoCollection::connect(&settings.store, store_variant).await?);

    let transport = broker::connect_transport(&settings.broker, broker_variant).await?;

    let wiring = CaptureWiring::new(
        settings.service.default_source.clone(),
        settings.broker.probe_timeout(),
    );
    let service = Arc::new(OrderCaptureService::assemble(
        collection,
        store_variant,
        transport,
        wiring,
        reporter,
    ));

    info!("✅ Core components initialized");

    let bind_address = format!("0.0.0.0:{}", settings.service.port);
    info!("🚀 Starting API Server on {}", bind_address);

    HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(service.clone()))
            .configure(api::config)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
