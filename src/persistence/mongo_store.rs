use async_trait::async_trait;
use mongodb::bson::Document;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use tracing::info;

use crate::config::StoreSettings;
use crate::model::{Order, StoreVariant};
use crate::persistence::store::{DocumentCollection, StoreError};

/// Order collection on a MongoDB wire-protocol server, self-hosted or managed.
pub struct MongoCollection {
    database: Database,
    collection: Collection<Document>,
    target: String,
}

impl MongoCollection {
    pub async fn connect(
        settings: &StoreSettings,
        variant: StoreVariant,
    ) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(&settings.uri).await?;
        options.app_name = Some("titan-capture-rs".to_string());
        if variant == StoreVariant::ManagedCloud {
            // Managed multi-tenant servers reject retryable writes
            options.retry_writes = Some(false);
        }

        let target = options
            .hosts
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let client = Client::with_options(options)?;
        let database = client.database(&settings.database);
        let collection = database.collection::<Document>(&settings.collection);

        info!(
            "📦 Order store ready: {} ({}) db={} collection={}",
            target, variant, settings.database, settings.collection
        );

        Ok(Self {
            database,
            collection,
            target,
        })
    }
}

#[async_trait]
impl DocumentCollection for MongoCollection {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        let doc = mongodb::bson::to_document(order)?;
        self.collection.insert_one(doc).await?;
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.database.list_collection_names().await?)
    }

    fn target(&self) -> &str {
        &self.target
    }
}
