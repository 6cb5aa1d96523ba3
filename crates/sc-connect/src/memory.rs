//! In-Memory Connection Store (for testing/development)
//!
//! Enforces the same uniqueness rule and result ordering as the MongoDB
//! store. Clones share the same underlying records.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use bson::oid::ObjectId;
use parking_lot::RwLock;

use crate::entity::{ConnectionRecord, PRIMARY_RANK};
use crate::error::{ConnectError, Result};
use crate::store::{ConnectionStore, ProviderUsers};

#[derive(Clone, Default)]
pub struct InMemoryConnectionStore {
    records: Arc<RwLock<Vec<ConnectionRecord>>>,
}

impl InMemoryConnectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed records as-is, bypassing rank assignment. Fails on the first
    /// uniqueness violation.
    pub fn with_records(records: impl IntoIterator<Item = ConnectionRecord>) -> Result<Self> {
        let store = Self::new();
        {
            let mut guard = store.records.write();
            for record in records {
                insert_locked(&mut guard, record)?;
            }
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Copy of every stored record, in insertion order
    pub fn snapshot(&self) -> Vec<ConnectionRecord> {
        self.records.read().clone()
    }

    fn select<P>(&self, predicate: P) -> Vec<ConnectionRecord>
    where
        P: Fn(&ConnectionRecord) -> bool,
    {
        self.records
            .read()
            .iter()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }
}

fn same_key(record: &ConnectionRecord, user_id: &str, provider_id: &str, provider_user_id: &str) -> bool {
    record.user_id == user_id
        && record.provider_id == provider_id
        && record.provider_user_id == provider_user_id
}

fn conflicts(records: &[ConnectionRecord], candidate: &ConnectionRecord) -> bool {
    records.iter().any(|r| {
        r.id != candidate.id
            && same_key(r, &candidate.user_id, &candidate.provider_id, &candidate.provider_user_id)
    })
}

fn insert_locked(records: &mut Vec<ConnectionRecord>, mut record: ConnectionRecord) -> Result<()> {
    if record.id.is_none() {
        record.id = Some(ObjectId::new());
    }
    if conflicts(records, &record) {
        return Err(ConnectError::duplicate(
            record.user_id,
            record.provider_id,
            record.provider_user_id,
        ));
    }
    records.push(record);
    Ok(())
}

fn sort_by_provider_and_rank(records: &mut [ConnectionRecord]) {
    records.sort_by(|a, b| {
        a.provider_id
            .cmp(&b.provider_id)
            .then(a.rank.cmp(&b.rank))
    });
}

#[async_trait]
impl ConnectionStore for InMemoryConnectionStore {
    async fn insert(&self, record: &ConnectionRecord) -> Result<()> {
        insert_locked(&mut self.records.write(), record.clone())
    }

    async fn upsert(&self, record: &ConnectionRecord) -> Result<()> {
        let mut records = self.records.write();
        let position = record
            .id
            .and_then(|id| records.iter().position(|r| r.id == Some(id)));

        match position {
            Some(index) => {
                if conflicts(&records, record) {
                    return Err(ConnectError::duplicate(
                        record.user_id.clone(),
                        record.provider_id.clone(),
                        record.provider_user_id.clone(),
                    ));
                }
                records[index] = record.clone();
                Ok(())
            }
            None => insert_locked(&mut records, record.clone()),
        }
    }

    async fn merge(&self, record: &ConnectionRecord) -> Result<bool> {
        let mut records = self.records.write();
        match records.iter_mut().find(|r| {
            same_key(r, &record.user_id, &record.provider_id, &record.provider_user_id)
        }) {
            Some(existing) => {
                existing.merge_from(record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_by_provider_users(
        &self,
        user_id: &str,
        provider_users: &ProviderUsers,
    ) -> Result<Vec<ConnectionRecord>> {
        let mut found = self.select(|r| {
            r.user_id == user_id
                && provider_users
                    .get(&r.provider_id)
                    .is_some_and(|ids| ids.contains(&r.provider_user_id))
        });
        sort_by_provider_and_rank(&mut found);
        Ok(found)
    }

    async fn next_rank(&self, user_id: &str, provider_id: &str) -> Result<i32> {
        let max = self
            .records
            .read()
            .iter()
            .filter(|r| r.user_id == user_id && r.provider_id == provider_id)
            .map(|r| r.rank)
            .max();
        Ok(max.map_or(PRIMARY_RANK, |rank| rank + 1))
    }

    async fn remove_by_key(
        &self,
        user_id: &str,
        provider_id: &str,
        provider_user_id: &str,
    ) -> Result<u64> {
        let mut records = self.records.write();
        match records
            .iter()
            .position(|r| same_key(r, user_id, provider_id, provider_user_id))
        {
            Some(index) => {
                records.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn remove_by_provider(&self, user_id: &str, provider_id: &str) -> Result<u64> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|r| !(r.user_id == user_id && r.provider_id == provider_id));
        Ok((before - records.len()) as u64)
    }

    async fn get_primary(&self, user_id: &str, provider_id: &str) -> Result<Option<ConnectionRecord>> {
        Ok(self
            .records
            .read()
            .iter()
            .find(|r| r.user_id == user_id && r.provider_id == provider_id && r.is_primary())
            .cloned())
    }

    async fn get_by_key(
        &self,
        user_id: &str,
        provider_id: &str,
        provider_user_id: &str,
    ) -> Result<Option<ConnectionRecord>> {
        Ok(self
            .records
            .read()
            .iter()
            .find(|r| same_key(r, user_id, provider_id, provider_user_id))
            .cloned())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ConnectionRecord>> {
        let mut found = self.select(|r| r.user_id == user_id);
        sort_by_provider_and_rank(&mut found);
        Ok(found)
    }

    async fn list_by_user_and_provider(
        &self,
        user_id: &str,
        provider_id: &str,
    ) -> Result<Vec<ConnectionRecord>> {
        let mut found = self.select(|r| r.user_id == user_id && r.provider_id == provider_id);
        found.sort_by_key(|r| r.rank);
        Ok(found)
    }

    async fn user_ids_connected_to(
        &self,
        provider_id: &str,
        provider_user_ids: &HashSet<String>,
    ) -> Result<HashSet<String>> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| r.provider_id == provider_id && provider_user_ids.contains(&r.provider_user_id))
            .map(|r| r.user_id.clone())
            .collect())
    }

    async fn user_ids_with_connection(
        &self,
        provider_id: &str,
        provider_user_id: &str,
    ) -> Result<Vec<String>> {
        let mut user_ids: Vec<String> = self
            .records
            .read()
            .iter()
            .filter(|r| r.provider_id == provider_id && r.provider_user_id == provider_user_id)
            .map(|r| r.user_id.clone())
            .collect();
        user_ids.sort();
        Ok(user_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_assigns_id() {
        let store = InMemoryConnectionStore::new();
        store
            .insert(&ConnectionRecord::new("cj", "fake", "c-j", 1))
            .await
            .unwrap();

        let stored = store.snapshot();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].id.is_some());
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let store = InMemoryConnectionStore::new();
        store
            .insert(&ConnectionRecord::new("cj", "fake", "c-j", 1))
            .await
            .unwrap();

        let mut stored = store.get_by_key("cj", "fake", "c-j").await.unwrap().unwrap();
        stored.display_name = Some("CJ".to_string());
        stored.secret = Some("s3cret".to_string());
        store.upsert(&stored).await.unwrap();

        assert_eq!(store.len(), 1);
        let reloaded = store.get_by_key("cj", "fake", "c-j").await.unwrap().unwrap();
        assert_eq!(reloaded, stored);
    }

    #[tokio::test]
    async fn test_upsert_without_id_conflicts_with_existing_key() {
        let store = InMemoryConnectionStore::new();
        store
            .insert(&ConnectionRecord::new("cj", "fake", "c-j", 1))
            .await
            .unwrap();

        let err = store
            .upsert(&ConnectionRecord::new("cj", "fake", "c-j", 1))
            .await
            .unwrap_err();
        assert!(err.is_duplicate());
    }

    #[test]
    fn test_seeding_rejects_duplicates() {
        let result = InMemoryConnectionStore::with_records(vec![
            ConnectionRecord::new("cj", "fake", "c-j", 1),
            ConnectionRecord::new("cj", "fake", "c-j", 2),
        ]);
        assert!(matches!(result, Err(ConnectError::Duplicate { .. })));
    }
}
