//! MongoDB Connection Store
//!
//! One document per connection in a single collection (default
//! `userConnections`). Relies on the unique index created by
//! [`ensure_indexes`](crate::indexes::ensure_indexes) to detect duplicates.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::{ClientOptions, FindOneOptions, FindOptions, ReplaceOptions};
use mongodb::{Client, Collection, Database};
use serde::Deserialize;
use tracing::{debug, info};

use sc_config::AppConfig;

use crate::entity::{ConnectionRecord, PRIMARY_RANK};
use crate::error::Result;
use crate::indexes::ensure_indexes;
use crate::store::{ConnectionStore, ProviderUsers};

pub const DEFAULT_COLLECTION: &str = "userConnections";

/// Projection target for reverse lookups
#[derive(Debug, Deserialize)]
struct OwnerOnly {
    #[serde(rename = "userId")]
    user_id: String,
}

#[derive(Clone)]
pub struct MongoConnectionStore {
    collection: Collection<ConnectionRecord>,
}

impl MongoConnectionStore {
    pub fn new(db: &Database) -> Self {
        Self::with_collection(db, DEFAULT_COLLECTION)
    }

    pub fn with_collection(db: &Database, collection_name: &str) -> Self {
        Self {
            collection: db.collection(collection_name),
        }
    }

    /// Connect using the application config, creating indexes when
    /// `connections.ensure_indexes` is set. Fails if the unique key index
    /// cannot be created.
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(&config.mongodb.uri).await?;
        options.app_name = Some("socialconnect".to_string());
        options.server_selection_timeout = Some(Duration::from_millis(config.mongodb.connect_timeout_ms));

        let client = Client::with_options(options)?;
        let db = client.database(&config.mongodb.database);
        let store = Self::with_collection(&db, &config.connections.collection);

        info!(
            database = %config.mongodb.database,
            collection = %config.connections.collection,
            "Connection store ready"
        );

        if config.connections.ensure_indexes {
            ensure_indexes(&store.collection.clone_with_type::<Document>())
                .await
                .require_unique_key()?;
        }

        Ok(store)
    }

    pub fn collection(&self) -> &Collection<ConnectionRecord> {
        &self.collection
    }

    async fn find_sorted(&self, filter: Document, sort: Document) -> Result<Vec<ConnectionRecord>> {
        let options = FindOptions::builder().sort(sort).build();
        let cursor = self.collection.find(filter).with_options(options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_owners(&self, filter: Document) -> Result<Vec<String>> {
        let options = FindOptions::builder()
            .projection(doc! { "userId": 1, "_id": 0 })
            .sort(doc! { "userId": 1 })
            .build();
        let cursor = self
            .collection
            .clone_with_type::<OwnerOnly>()
            .find(filter)
            .with_options(options)
            .await?;
        let owners: Vec<OwnerOnly> = cursor.try_collect().await?;
        Ok(owners.into_iter().map(|o| o.user_id).collect())
    }
}

fn key_filter(user_id: &str, provider_id: &str, provider_user_id: &str) -> Document {
    doc! {
        "userId": user_id,
        "providerId": provider_id,
        "providerUserId": provider_user_id,
    }
}

#[async_trait]
impl ConnectionStore for MongoConnectionStore {
    async fn insert(&self, record: &ConnectionRecord) -> Result<()> {
        self.collection.insert_one(record).await?;
        Ok(())
    }

    async fn upsert(&self, record: &ConnectionRecord) -> Result<()> {
        match record.id {
            Some(id) => {
                self.collection
                    .replace_one(doc! { "_id": id }, record)
                    .with_options(ReplaceOptions::builder().upsert(true).build())
                    .await?;
            }
            None => {
                self.collection.insert_one(record).await?;
            }
        }
        Ok(())
    }

    async fn merge(&self, record: &ConnectionRecord) -> Result<bool> {
        let filter = key_filter(&record.user_id, &record.provider_id, &record.provider_user_id);
        let update = doc! {
            "$set": {
                "expireTime": record.expire_time,
                "accessToken": record.access_token.clone(),
                "profileUrl": record.profile_url.clone(),
                "imageUrl": record.image_url.clone(),
                "displayName": record.display_name.clone(),
            }
        };

        let previous = self.collection.find_one_and_update(filter, update).await?;
        Ok(previous.is_some())
    }

    async fn find_by_provider_users(
        &self,
        user_id: &str,
        provider_users: &ProviderUsers,
    ) -> Result<Vec<ConnectionRecord>> {
        let clauses: Vec<Document> = provider_users
            .iter()
            .map(|(provider_id, provider_user_ids)| {
                doc! {
                    "providerId": provider_id.as_str(),
                    "providerUserId": { "$in": provider_user_ids.clone() },
                }
            })
            .collect();

        self.find_sorted(
            doc! { "userId": user_id, "$or": clauses },
            doc! { "providerId": 1, "rank": 1 },
        )
        .await
    }

    async fn next_rank(&self, user_id: &str, provider_id: &str) -> Result<i32> {
        let options = FindOneOptions::builder().sort(doc! { "rank": -1 }).build();
        let highest = self
            .collection
            .find_one(doc! { "userId": user_id, "providerId": provider_id })
            .with_options(options)
            .await?;
        Ok(highest.map_or(PRIMARY_RANK, |record| record.rank + 1))
    }

    async fn remove_by_key(
        &self,
        user_id: &str,
        provider_id: &str,
        provider_user_id: &str,
    ) -> Result<u64> {
        let result = self
            .collection
            .delete_one(key_filter(user_id, provider_id, provider_user_id))
            .await?;
        debug!(user_id, provider_id, provider_user_id, deleted = result.deleted_count, "Removed connection");
        Ok(result.deleted_count)
    }

    async fn remove_by_provider(&self, user_id: &str, provider_id: &str) -> Result<u64> {
        let result = self
            .collection
            .delete_many(doc! { "userId": user_id, "providerId": provider_id })
            .await?;
        debug!(user_id, provider_id, deleted = result.deleted_count, "Removed provider connections");
        Ok(result.deleted_count)
    }

    async fn get_primary(&self, user_id: &str, provider_id: &str) -> Result<Option<ConnectionRecord>> {
        Ok(self
            .collection
            .find_one(doc! {
                "userId": user_id,
                "providerId": provider_id,
                "rank": PRIMARY_RANK,
            })
            .await?)
    }

    async fn get_by_key(
        &self,
        user_id: &str,
        provider_id: &str,
        provider_user_id: &str,
    ) -> Result<Option<ConnectionRecord>> {
        Ok(self
            .collection
            .find_one(key_filter(user_id, provider_id, provider_user_id))
            .await?)
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ConnectionRecord>> {
        self.find_sorted(doc! { "userId": user_id }, doc! { "providerId": 1, "rank": 1 })
            .await
    }

    async fn list_by_user_and_provider(
        &self,
        user_id: &str,
        provider_id: &str,
    ) -> Result<Vec<ConnectionRecord>> {
        self.find_sorted(
            doc! { "userId": user_id, "providerId": provider_id },
            doc! { "rank": 1 },
        )
        .await
    }

    async fn user_ids_connected_to(
        &self,
        provider_id: &str,
        provider_user_ids: &HashSet<String>,
    ) -> Result<HashSet<String>> {
        if provider_user_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let ids: Vec<String> = provider_user_ids.iter().cloned().collect();
        let owners = self
            .find_owners(doc! { "providerId": provider_id, "providerUserId": { "$in": ids } })
            .await?;
        Ok(owners.into_iter().collect())
    }

    async fn user_ids_with_connection(
        &self,
        provider_id: &str,
        provider_user_id: &str,
    ) -> Result<Vec<String>> {
        self.find_owners(doc! { "providerId": provider_id, "providerUserId": provider_user_id })
            .await
    }
}

