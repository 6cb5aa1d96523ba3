//! Connection Record
//!
//! The stored shape of a user connection: one document per
//! (userId, providerId, providerUserId).

use bson::oid::ObjectId;
use sc_common::{ConnectionData, ConnectionKey};
use serde::{Deserialize, Serialize};

/// Rank of the primary connection for a user and provider
pub const PRIMARY_RANK: i32 = 1;

/// Placeholder rank for records that have not been ranked by the store yet
pub const UNRANKED: i32 = 0;

/// Stored connection document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: String,
    pub provider_id: String,
    pub provider_user_id: String,
    /// 1 = primary. Not compacted when connections are removed.
    pub rank: i32,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub profile_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Epoch milliseconds
    #[serde(default)]
    pub expire_time: Option<i64>,
}

impl ConnectionRecord {
    pub fn new(
        user_id: impl Into<String>,
        provider_id: impl Into<String>,
        provider_user_id: impl Into<String>,
        rank: i32,
    ) -> Self {
        Self {
            id: None,
            user_id: user_id.into(),
            provider_id: provider_id.into(),
            provider_user_id: provider_user_id.into(),
            rank,
            display_name: None,
            profile_url: None,
            image_url: None,
            access_token: None,
            secret: None,
            refresh_token: None,
            expire_time: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn from_data(user_id: impl Into<String>, data: &ConnectionData, rank: i32) -> Self {
        Self {
            id: None,
            user_id: user_id.into(),
            provider_id: data.provider_id.clone(),
            provider_user_id: data.provider_user_id.clone(),
            rank,
            display_name: data.display_name.clone(),
            profile_url: data.profile_url.clone(),
            image_url: data.image_url.clone(),
            access_token: data.access_token.clone(),
            secret: data.secret.clone(),
            refresh_token: data.refresh_token.clone(),
            expire_time: data.expire_time,
        }
    }

    pub fn to_data(&self) -> ConnectionData {
        ConnectionData {
            provider_id: self.provider_id.clone(),
            provider_user_id: self.provider_user_id.clone(),
            display_name: self.display_name.clone(),
            profile_url: self.profile_url.clone(),
            image_url: self.image_url.clone(),
            access_token: self.access_token.clone(),
            secret: self.secret.clone(),
            refresh_token: self.refresh_token.clone(),
            expire_time: self.expire_time,
        }
    }

    pub fn key(&self) -> ConnectionKey {
        ConnectionKey::new(self.provider_id.clone(), self.provider_user_id.clone())
    }

    pub fn is_primary(&self) -> bool {
        self.rank == PRIMARY_RANK
    }

    /// Copy the fields an update may overwrite when it collides with an
    /// existing record. Rank, tokens other than the access token, and
    /// identity stay as they are.
    pub fn merge_from(&mut self, other: &ConnectionRecord) {
        self.expire_time = other.expire_time;
        self.access_token = other.access_token.clone();
        self.profile_url = other.profile_url.clone();
        self.image_url = other.image_url.clone();
        self.display_name = other.display_name.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConnectionRecord {
        let mut record = ConnectionRecord::new("joey", "twitter", "@joey_ramones", 2)
            .with_display_name("joey r.");
        record.access_token = Some("token".to_string());
        record.secret = Some("secret".to_string());
        record.refresh_token = Some("refresh".to_string());
        record.expire_time = Some(1_700_000_000_000);
        record
    }

    #[test]
    fn test_data_round_trip_keeps_fields() {
        let record = sample();
        let back = ConnectionRecord::from_data("joey", &record.to_data(), 2);
        assert_eq!(back, record);
    }

    #[test]
    fn test_merge_only_touches_mutable_profile_fields() {
        let mut existing = sample();
        let mut incoming = ConnectionRecord::new("joey", "twitter", "@joey_ramones", 7)
            .with_display_name("Joey Ramone");
        incoming.access_token = Some("fresh".to_string());
        incoming.image_url = Some("http://img/joey.png".to_string());

        existing.merge_from(&incoming);

        assert_eq!(existing.rank, 2);
        assert_eq!(existing.display_name.as_deref(), Some("Joey Ramone"));
        assert_eq!(existing.access_token.as_deref(), Some("fresh"));
        assert_eq!(existing.image_url.as_deref(), Some("http://img/joey.png"));
        assert_eq!(existing.expire_time, None);
        assert_eq!(existing.secret.as_deref(), Some("secret"));
        assert_eq!(existing.refresh_token.as_deref(), Some("refresh"));
    }

    #[test]
    fn test_bson_field_names() {
        let doc = bson::to_document(&sample()).unwrap();
        assert!(doc.get("_id").is_none());
        assert_eq!(doc.get_str("userId").unwrap(), "joey");
        assert_eq!(doc.get_str("providerUserId").unwrap(), "@joey_ramones");
        assert_eq!(doc.get_i32("rank").unwrap(), 2);
        assert_eq!(doc.get_i64("expireTime").unwrap(), 1_700_000_000_000);
    }

    #[test]
    fn test_missing_optional_fields_deserialize() {
        let doc = bson::doc! {
            "_id": ObjectId::new(),
            "userId": "cj",
            "providerId": "fake",
            "providerUserId": "c-j",
            "rank": 1,
        };
        let record: ConnectionRecord = bson::from_document(doc).unwrap();
        assert!(record.is_primary());
        assert!(record.id.is_some());
        assert_eq!(record.display_name, None);
    }
}
