//! Connection Store
//!
//! The persistence contract for connection records. Backends implement the
//! primitive operations; rank handling on create and the merge-on-conflict
//! fallback of update are shared by every backend through the provided
//! methods.
//!
//! Two races are accepted rather than prevented:
//!
//! - `next_rank` followed by `create` is not atomic. Two concurrent creates
//!   for the same user and provider can both take the same rank. Lookups stay
//!   correct; `get_primary` may return either of two records tied at rank 1.
//! - When `update` collides with an existing record it merges into that
//!   record. If another writer deleted it in between, the merge matches
//!   nothing and the update quietly does nothing.

use std::collections::HashSet;

use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::entity::{ConnectionRecord, PRIMARY_RANK};
use crate::error::{ConnectError, Result};

/// Provider id -> provider user ids, in caller order
pub type ProviderUsers = IndexMap<String, Vec<String>>;

#[async_trait]
pub trait ConnectionStore: Send + Sync {
    // ========================================================================
    // Backend primitives
    // ========================================================================

    /// Insert a new record. A uniqueness violation must yield an error for
    /// which [`ConnectError::is_duplicate`] holds.
    async fn insert(&self, record: &ConnectionRecord) -> Result<()>;

    /// Replace the record with the same `_id`, inserting when the record has
    /// no id or no longer exists. Uniqueness violations as for `insert`.
    async fn upsert(&self, record: &ConnectionRecord) -> Result<()>;

    /// Overwrite `expireTime`, `accessToken`, `profileUrl`, `imageUrl` and
    /// `displayName` on the record with the same (userId, providerId,
    /// providerUserId). Returns false when no record matched.
    async fn merge(&self, record: &ConnectionRecord) -> Result<bool>;

    /// Records matching any (providerId, providerUserId) pair in
    /// `provider_users`, ordered by providerId then rank. Called with a
    /// non-empty map only.
    async fn find_by_provider_users(
        &self,
        user_id: &str,
        provider_users: &ProviderUsers,
    ) -> Result<Vec<ConnectionRecord>>;

    // ========================================================================
    // Ranking
    // ========================================================================

    /// 1 when the user has no connection to the provider, otherwise the
    /// highest rank in use plus one.
    async fn next_rank(&self, user_id: &str, provider_id: &str) -> Result<i32>;

    // ========================================================================
    // Removal
    // ========================================================================

    /// Returns the number of records deleted (0 or 1)
    async fn remove_by_key(
        &self,
        user_id: &str,
        provider_id: &str,
        provider_user_id: &str,
    ) -> Result<u64>;

    async fn remove_by_provider(&self, user_id: &str, provider_id: &str) -> Result<u64>;

    // ========================================================================
    // Lookups
    // ========================================================================

    async fn get_primary(&self, user_id: &str, provider_id: &str) -> Result<Option<ConnectionRecord>>;

    async fn get_by_key(
        &self,
        user_id: &str,
        provider_id: &str,
        provider_user_id: &str,
    ) -> Result<Option<ConnectionRecord>>;

    /// Ordered by providerId, then rank
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ConnectionRecord>>;

    /// Ordered by rank
    async fn list_by_user_and_provider(
        &self,
        user_id: &str,
        provider_id: &str,
    ) -> Result<Vec<ConnectionRecord>>;

    /// Distinct local users owning any of the provider user ids
    async fn user_ids_connected_to(
        &self,
        provider_id: &str,
        provider_user_ids: &HashSet<String>,
    ) -> Result<HashSet<String>>;

    /// Local users owning this provider user id, ordered by userId. Several
    /// local users may share one external identity.
    async fn user_ids_with_connection(
        &self,
        provider_id: &str,
        provider_user_id: &str,
    ) -> Result<Vec<String>>;

    // ========================================================================
    // Provided operations
    // ========================================================================

    /// Store a new connection for `user_id` at `rank`, normally obtained from
    /// [`next_rank`](Self::next_rank).
    async fn create(&self, user_id: &str, record: &ConnectionRecord, rank: i32) -> Result<()> {
        let mut record = record.clone();
        record.id = None;
        record.user_id = user_id.to_string();
        record.rank = rank;

        match self.insert(&record).await {
            Ok(()) => {
                debug!(
                    user_id,
                    provider_id = %record.provider_id,
                    provider_user_id = %record.provider_user_id,
                    rank,
                    "Connection created"
                );
                Ok(())
            }
            Err(e) if e.is_duplicate() => Err(ConnectError::duplicate(
                user_id,
                record.provider_id,
                record.provider_user_id,
            )),
            Err(e) => Err(e),
        }
    }

    /// Upsert the full record; on a duplicate-key conflict merge the mutable
    /// profile fields into the existing record instead.
    ///
    /// A record without a rank is given [`next_rank`](Self::next_rank) so an
    /// insert never stores an unranked connection.
    async fn update(&self, user_id: &str, record: &ConnectionRecord) -> Result<()> {
        let mut record = record.clone();
        record.user_id = user_id.to_string();
        if record.rank < PRIMARY_RANK {
            record.rank = self.next_rank(user_id, &record.provider_id).await?;
        }

        match self.upsert(&record).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_duplicate() => {
                debug!(
                    user_id,
                    provider_id = %record.provider_id,
                    provider_user_id = %record.provider_user_id,
                    "Connection exists, merging profile fields"
                );
                if !self.merge(&record).await? {
                    warn!(
                        user_id,
                        provider_id = %record.provider_id,
                        provider_user_id = %record.provider_user_id,
                        "Connection vanished before merge, update skipped"
                    );
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Batch-resolve (providerId, providerUserId) pairs for one user.
    /// An empty map is rejected before any query runs.
    async fn list_by_user_provider_map(
        &self,
        user_id: &str,
        provider_users: &ProviderUsers,
    ) -> Result<Vec<ConnectionRecord>> {
        validate_provider_users(provider_users)?;
        self.find_by_provider_users(user_id, provider_users).await
    }
}

pub(crate) fn validate_provider_users(provider_users: &ProviderUsers) -> Result<()> {
    if provider_users.is_empty() {
        return Err(ConnectError::invalid_argument(
            "Unable to execute find: no providerUsers provided",
        ));
    }
    Ok(())
}
