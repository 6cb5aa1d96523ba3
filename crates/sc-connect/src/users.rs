//! Users Connection Repository
//!
//! Entry point across all users: maps provider identities back to local
//! users and hands out per-user [`ConnectionRepository`] views.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use sc_common::ConnectionData;
use tracing::info;

use crate::converter::{ConnectionConverter, RecordConverter};
use crate::error::{ConnectError, Result};
use crate::registry::{ProviderRegistry, StaticProviderRegistry};
use crate::repository::ConnectionRepository;
use crate::store::ConnectionStore;

/// Invoked when a provider identity signs in that no local user owns yet.
/// Returning a user id creates the connection for that user.
#[async_trait]
pub trait ConnectionSignUp: Send + Sync {
    async fn execute(&self, connection: &ConnectionData) -> Option<String>;
}

#[derive(Clone)]
pub struct UsersConnectionRepository {
    store: Arc<dyn ConnectionStore>,
    converter: Arc<dyn ConnectionConverter>,
    registry: Arc<dyn ProviderRegistry>,
    sign_up: Option<Arc<dyn ConnectionSignUp>>,
}

impl UsersConnectionRepository {
    pub fn new(store: Arc<dyn ConnectionStore>, registry: Arc<dyn ProviderRegistry>) -> Self {
        Self {
            store,
            converter: Arc::new(RecordConverter),
            registry,
            sign_up: None,
        }
    }

    /// Repository with no registered providers
    pub fn with_store(store: Arc<dyn ConnectionStore>) -> Self {
        Self::new(store, Arc::new(StaticProviderRegistry::default()))
    }

    pub fn with_converter(mut self, converter: Arc<dyn ConnectionConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_sign_up(mut self, sign_up: Arc<dyn ConnectionSignUp>) -> Self {
        self.sign_up = Some(sign_up);
        self
    }

    /// Local users owning this connection's provider identity. When there
    /// are none and a sign-up hook is set, the hook may create one.
    pub async fn find_user_ids_with_connection(&self, connection: &ConnectionData) -> Result<Vec<String>> {
        let user_ids = self
            .store
            .user_ids_with_connection(&connection.provider_id, &connection.provider_user_id)
            .await?;
        if !user_ids.is_empty() {
            return Ok(user_ids);
        }

        let Some(sign_up) = &self.sign_up else {
            return Ok(user_ids);
        };
        match sign_up.execute(connection).await {
            Some(new_user_id) => {
                self.create_connection_repository(&new_user_id)?
                    .add_connection(connection)
                    .await?;
                info!(user_id = %new_user_id, connection = %connection.key(), "Signed up new user");
                Ok(vec![new_user_id])
            }
            None => Ok(user_ids),
        }
    }

    pub async fn find_user_ids_connected_to(
        &self,
        provider_id: &str,
        provider_user_ids: &HashSet<String>,
    ) -> Result<HashSet<String>> {
        self.store.user_ids_connected_to(provider_id, provider_user_ids).await
    }

    /// A repository bound to `user_id`
    pub fn create_connection_repository(&self, user_id: &str) -> Result<ConnectionRepository> {
        if user_id.trim().is_empty() {
            return Err(ConnectError::invalid_argument("userId cannot be empty"));
        }
        Ok(ConnectionRepository::new(
            user_id.to_string(),
            Arc::clone(&self.store),
            Arc::clone(&self.converter),
            Arc::clone(&self.registry),
        ))
    }
}
