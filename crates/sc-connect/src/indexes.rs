//! Index Initializer
//!
//! Ensures the indexes the connection store depends on exist. The unique
//! index is what turns a second insert of the same connection into a
//! duplicate-key error, so it must be in place before the store takes writes.

use mongodb::bson::{doc, Document};
use mongodb::options::IndexOptions;
use mongodb::{Collection, IndexModel};
use tracing::{info, warn};

use crate::error::{ConnectError, Result};

pub const UNIQUE_KEY_INDEX: &str = "uq_user_provider_provider_user";
pub const RANK_INDEX: &str = "idx_user_provider_rank";
pub const REVERSE_LOOKUP_INDEX: &str = "idx_provider_provider_user";

/// Result of index initialization
#[derive(Debug, Default)]
pub struct IndexInitResult {
    pub indexes_created: usize,
    /// Names of indexes that could not be created
    pub failed: Vec<String>,
    /// Non-fatal problems, e.g. an existing index with conflicting options
    pub warnings: Vec<String>,
}

impl IndexInitResult {
    pub fn is_success(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Err when the unique key index, which duplicate detection relies on,
    /// could not be created
    pub fn require_unique_key(&self) -> Result<()> {
        if self.failed.iter().any(|name| name == UNIQUE_KEY_INDEX) {
            return Err(ConnectError::MissingUniqueIndex {
                index: UNIQUE_KEY_INDEX.to_string(),
                reason: self.warnings.join("; "),
            });
        }
        Ok(())
    }
}

/// The indexes a connection collection needs
pub fn connection_indexes() -> Vec<IndexModel> {
    vec![
        // One record per (user, provider, provider user)
        IndexModel::builder()
            .keys(doc! { "userId": 1, "providerId": 1, "providerUserId": 1 })
            .options(
                IndexOptions::builder()
                    .name(UNIQUE_KEY_INDEX.to_string())
                    .unique(true)
                    .build(),
            )
            .build(),
        // Rank ordering, max-rank and primary lookups
        IndexModel::builder()
            .keys(doc! { "userId": 1, "providerId": 1, "rank": 1 })
            .options(IndexOptions::builder().name(RANK_INDEX.to_string()).build())
            .build(),
        // Provider user -> local users
        IndexModel::builder()
            .keys(doc! { "providerId": 1, "providerUserId": 1 })
            .options(IndexOptions::builder().name(REVERSE_LOOKUP_INDEX.to_string()).build())
            .build(),
    ]
}

/// Create the connection indexes one by one, collecting failures instead
/// of aborting
pub async fn ensure_indexes(collection: &Collection<Document>) -> IndexInitResult {
    let mut result = IndexInitResult::default();

    for model in connection_indexes() {
        let name = model
            .options
            .as_ref()
            .and_then(|o| o.name.clone())
            .unwrap_or_default();

        match collection.create_index(model).await {
            Ok(_) => result.indexes_created += 1,
            Err(e) => {
                warn!(collection = %collection.name(), index = %name, error = %e, "Failed to create connection index");
                result.warnings.push(format!("{}.{}: {}", collection.name(), name, e));
                result.failed.push(name);
            }
        }
    }

    info!(
        collection = %collection.name(),
        created = result.indexes_created,
        failed = result.failed.len(),
        "Connection indexes ensured"
    );

    result
}
