//! MongoDB connection store tests
//!
//! Needs a mongod on localhost:27017 (or `SOCIALCONNECT_MONGODB_URI`).
//! Run with: cargo test -p sc-connect --features mongo-integration
//!
//! Each test works in its own collection and drops it afterwards.

#![cfg(feature = "mongo-integration")]

use std::collections::HashSet;

use bson::Document;
use indexmap::IndexMap;
use mongodb::Client;

use sc_connect::{
    ensure_indexes, is_uniqueness_violation, ConnectError, ConnectionRecord, ConnectionStore, MongoConnectionStore,
    ProviderUsers, UNRANKED,
};

const DATABASE: &str = "socialconnect_test";

async fn store(name: &str) -> MongoConnectionStore {
    let uri = std::env::var("SOCIALCONNECT_MONGODB_URI")
        .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    let client = Client::with_uri_str(&uri).await.expect("mongo client");
    let db = client.database(DATABASE);
    let collection = format!("connections_{}", name);

    db.collection::<Document>(&collection).drop().await.expect("drop collection");
    let store = MongoConnectionStore::with_collection(&db, &collection);
    let result = ensure_indexes(&store.collection().clone_with_type::<Document>()).await;
    assert!(result.is_success(), "index warnings: {:?}", result.warnings);
    store
}

async fn drop_collection(store: &MongoConnectionStore) {
    store.collection().drop().await.expect("drop collection");
}

async fn seed(store: &MongoConnectionStore) {
    let fixture = [
        ("joey", "twitter", "@JeffreyHyman", "joey r.", 2),
        ("joey", "twitter", "@joey_ramones", "joey r.", 1),
        ("joey", "facebook", "joey.ramones", "joey r.", 1),
        ("johnny", "facebook", "JohnnyRamones", "johnny r.", 1),
        ("tommy", "twitter", "@joey_ramones", "joey r.", 1),
        ("cj", "fake", "c-j", "cj", 1),
    ];
    for (user_id, provider_id, provider_user_id, display_name, rank) in fixture {
        let record = ConnectionRecord::new(user_id, provider_id, provider_user_id, UNRANKED)
            .with_display_name(display_name);
        store.create(user_id, &record, rank).await.expect("seed");
    }
}

#[tokio::test]
async fn test_ranking_and_primary() {
    let store = store("ranking").await;
    seed(&store).await;

    assert_eq!(store.next_rank("joey", "twitter").await.unwrap(), 3);
    assert_eq!(store.next_rank("joey", "linkedin").await.unwrap(), 1);

    let primary = store.get_primary("joey", "twitter").await.unwrap().unwrap();
    assert_eq!(primary.provider_user_id, "@joey_ramones");

    let listed: Vec<(String, i32)> = store
        .list_by_user("joey")
        .await
        .unwrap()
        .into_iter()
        .map(|r| (r.provider_user_id, r.rank))
        .collect();
    assert_eq!(
        listed,
        vec![
            ("joey.ramones".to_string(), 1),
            ("@joey_ramones".to_string(), 1),
            ("@JeffreyHyman".to_string(), 2),
        ]
    );

    drop_collection(&store).await;
}

#[tokio::test]
async fn test_unique_index_rejects_duplicate_create() {
    let store = store("duplicate").await;
    seed(&store).await;

    let err = store
        .create("cj", &ConnectionRecord::new("cj", "fake", "c-j", UNRANKED), 2)
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectError::Duplicate { .. }));

    drop_collection(&store).await;
}

#[tokio::test]
async fn test_bulk_insert_duplicate_is_a_uniqueness_violation() {
    let store = store("bulk").await;

    let record = ConnectionRecord::new("cj", "fake", "c-j", 1);
    let err = store
        .collection()
        .insert_many(vec![record.clone(), record])
        .await
        .unwrap_err();
    assert!(is_uniqueness_violation(&err));
    assert!(ConnectError::from(err).is_duplicate());

    drop_collection(&store).await;
}

#[tokio::test]
async fn test_update_merges_into_existing_record() {
    let store = store("merge").await;
    seed(&store).await;

    let mut incoming = ConnectionRecord::new("joey", "twitter", "@JeffreyHyman", UNRANKED)
        .with_display_name("Jeffrey Hyman");
    incoming.access_token = Some("new-token".to_string());
    incoming.secret = Some("ignored".to_string());
    store.update("joey", &incoming).await.unwrap();

    let stored = store.get_by_key("joey", "twitter", "@JeffreyHyman").await.unwrap().unwrap();
    assert_eq!(stored.rank, 2);
    assert_eq!(stored.display_name.as_deref(), Some("Jeffrey Hyman"));
    assert_eq!(stored.access_token.as_deref(), Some("new-token"));
    assert_eq!(stored.secret, None);

    // A new connection is inserted after the existing ones
    store
        .update("joey", &ConnectionRecord::new("joey", "twitter", "@ramones", UNRANKED))
        .await
        .unwrap();
    let inserted = store.get_by_key("joey", "twitter", "@ramones").await.unwrap().unwrap();
    assert_eq!(inserted.rank, 3);

    assert!(!store
        .merge(&ConnectionRecord::new("deedee", "twitter", "@deedee", 1))
        .await
        .unwrap());

    drop_collection(&store).await;
}

#[tokio::test]
async fn test_provider_map_and_reverse_lookups() {
    let store = store("lookups").await;
    seed(&store).await;

    let mut provider_users: ProviderUsers = IndexMap::new();
    provider_users.insert("twitter".to_string(), vec!["@JeffreyHyman".to_string()]);
    provider_users.insert("facebook".to_string(), vec!["joey.ramones".to_string()]);
    let found = store.list_by_user_provider_map("joey", &provider_users).await.unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].provider_id, "facebook");

    let owners = store.user_ids_with_connection("twitter", "@joey_ramones").await.unwrap();
    assert_eq!(owners, vec!["joey", "tommy"]);

    let ids: HashSet<String> = ["joey.ramones", "JohnnyRamones"].iter().map(|s| s.to_string()).collect();
    let connected = store.user_ids_connected_to("facebook", &ids).await.unwrap();
    assert_eq!(connected.len(), 2);

    drop_collection(&store).await;
}

#[tokio::test]
async fn test_removal() {
    let store = store("removal").await;
    seed(&store).await;

    assert_eq!(store.remove_by_key("a", "b", "c").await.unwrap(), 0);
    assert_eq!(store.remove_by_key("joey", "twitter", "@JeffreyHyman").await.unwrap(), 1);
    assert_eq!(store.remove_by_provider("joey", "twitter").await.unwrap(), 1);
    assert!(store.list_by_user_and_provider("joey", "twitter").await.unwrap().is_empty());
    assert_eq!(store.user_ids_with_connection("twitter", "@joey_ramones").await.unwrap(), vec!["tommy"]);

    drop_collection(&store).await;
}
