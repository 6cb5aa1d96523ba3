//! Connection Repository
//!
//! A connection store bound to a single local user, speaking in framework
//! connection values rather than stored records.

use std::sync::Arc;

use indexmap::IndexMap;
use sc_common::{ConnectionData, ConnectionKey};
use tracing::{debug, info};

use crate::converter::ConnectionConverter;
use crate::error::{ConnectError, Result};
use crate::entity::UNRANKED;
use crate::registry::ProviderRegistry;
use crate::store::{validate_provider_users, ConnectionStore, ProviderUsers};

/// Provider id -> connections
pub type ConnectionsByProvider = IndexMap<String, Vec<ConnectionData>>;

/// Provider id -> one slot per requested provider user id
pub type ConnectionSlots = IndexMap<String, Vec<Option<ConnectionData>>>;

#[derive(Clone)]
pub struct ConnectionRepository {
    user_id: String,
    store: Arc<dyn ConnectionStore>,
    converter: Arc<dyn ConnectionConverter>,
    registry: Arc<dyn ProviderRegistry>,
}

impl ConnectionRepository {
    pub(crate) fn new(
        user_id: String,
        store: Arc<dyn ConnectionStore>,
        converter: Arc<dyn ConnectionConverter>,
        registry: Arc<dyn ProviderRegistry>,
    ) -> Self {
        Self { user_id, store, converter, registry }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Add a connection after the user's existing ones for that provider.
    /// The first connection to a provider becomes the primary one.
    pub async fn add_connection(&self, connection: &ConnectionData) -> Result<()> {
        let rank = self.store.next_rank(&self.user_id, &connection.provider_id).await?;
        let record = self.converter.to_record(&self.user_id, connection, rank);

        match self.store.create(&self.user_id, &record, rank).await {
            Ok(()) => {
                info!(
                    user_id = %self.user_id,
                    connection = %connection.key(),
                    rank,
                    "Connection added"
                );
                Ok(())
            }
            Err(e) if e.is_duplicate() => Err(ConnectError::DuplicateConnection(connection.key())),
            Err(e) => Err(e),
        }
    }

    /// Every connection of the user, grouped by provider. Registered
    /// providers are always present, with an empty list when unconnected.
    pub async fn find_all_connections(&self) -> Result<ConnectionsByProvider> {
        let mut connections: ConnectionsByProvider = self
            .registry
            .registered_provider_ids()
            .into_iter()
            .map(|provider_id| (provider_id, Vec::new()))
            .collect();

        for record in self.store.list_by_user(&self.user_id).await? {
            connections
                .entry(record.provider_id.clone())
                .or_default()
                .push(self.converter.to_data(&record));
        }

        Ok(connections)
    }

    /// The user's connections to one provider, primary first
    pub async fn find_connections(&self, provider_id: &str) -> Result<Vec<ConnectionData>> {
        let records = self
            .store
            .list_by_user_and_provider(&self.user_id, provider_id)
            .await?;
        Ok(records.iter().map(|r| self.converter.to_data(r)).collect())
    }

    /// Resolve the given provider users to this user's connections.
    ///
    /// Each provider in the result has one slot per id requested for it, in
    /// the same position; ids without a connection leave their slot `None`.
    /// Providers with no connection at all are left out.
    pub async fn find_connections_to_users(&self, provider_users: &ProviderUsers) -> Result<ConnectionSlots> {
        validate_provider_users(provider_users)?;

        let records = self
            .store
            .list_by_user_provider_map(&self.user_id, provider_users)
            .await?;

        let mut slots = ConnectionSlots::new();
        for record in records {
            let Some(requested) = provider_users.get(&record.provider_id) else {
                continue;
            };
            let Some(index) = requested.iter().position(|id| *id == record.provider_user_id) else {
                continue;
            };
            let bucket = slots
                .entry(record.provider_id.clone())
                .or_insert_with(|| vec![None; requested.len()]);
            bucket[index] = Some(self.converter.to_data(&record));
        }

        Ok(slots)
    }

    pub async fn get_connection(&self, key: &ConnectionKey) -> Result<ConnectionData> {
        self.store
            .get_by_key(&self.user_id, &key.provider_id, &key.provider_user_id)
            .await?
            .map(|record| self.converter.to_data(&record))
            .ok_or_else(|| ConnectError::NoSuchConnection(key.clone()))
    }

    /// The rank-1 connection to the provider, if any
    pub async fn find_primary_connection(&self, provider_id: &str) -> Result<Option<ConnectionData>> {
        let record = self.store.get_primary(&self.user_id, provider_id).await?;
        Ok(record.map(|r| self.converter.to_data(&r)))
    }

    /// Like [`find_primary_connection`](Self::find_primary_connection) but
    /// absence is an error
    pub async fn get_primary_connection(&self, provider_id: &str) -> Result<ConnectionData> {
        self.find_primary_connection(provider_id)
            .await?
            .ok_or_else(|| ConnectError::NotConnected(provider_id.to_string()))
    }

    /// Refresh a connection's token and profile snapshot. Rank is kept.
    pub async fn update_connection(&self, connection: &ConnectionData) -> Result<()> {
        let record = self.converter.to_record(&self.user_id, connection, UNRANKED);
        self.store.update(&self.user_id, &record).await?;
        debug!(user_id = %self.user_id, connection = %connection.key(), "Connection updated");
        Ok(())
    }

    pub async fn remove_connection(&self, key: &ConnectionKey) -> Result<()> {
        self.store
            .remove_by_key(&self.user_id, &key.provider_id, &key.provider_user_id)
            .await?;
        Ok(())
    }

    pub async fn remove_connections(&self, provider_id: &str) -> Result<()> {
        self.store.remove_by_provider(&self.user_id, provider_id).await?;
        Ok(())
    }
}
