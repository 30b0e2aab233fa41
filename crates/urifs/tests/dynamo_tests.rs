//! Key-value table mapping tests against the in-memory store.

use futures_util::TryStreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use urifs::backends::{DynamoMap, Item, MemoryKeyValueStore};
use urifs::{ChainedMap, Error, Mapping, OpenOptions, SchemeRegistry, Uri};

fn users(page_size: usize) -> MemoryKeyValueStore {
    let store = MemoryKeyValueStore::new().with_page_size(page_size);
    store.create_table("users", "name");
    for (name, age) in [("dave", 41), ("alice", 30), ("carol", 25), ("bob", 52), ("erin", 19)] {
        store.put("users", json!({"name": name, "age": age})).unwrap();
    }
    store
}

fn registry_with(store: &MemoryKeyValueStore) -> SchemeRegistry {
    let registry = SchemeRegistry::new();
    registry.register_table("dynamodb", Arc::new(store.clone()));
    registry
}

#[tokio::test]
async fn get_returns_whole_item() {
    let registry = registry_with(&users(10));
    let mut table = registry.map("dynamodb://users", OpenOptions::new()).unwrap();
    assert_eq!(table.get("bob").await.unwrap(), json!({"name": "bob", "age": 52}));
}

#[tokio::test]
async fn missing_key_is_key_not_found() {
    let registry = registry_with(&users(10));
    let mut table = registry.map("dynamodb://users", OpenOptions::new()).unwrap();
    assert!(matches!(
        table.get("mallory").await,
        Err(Error::KeyNotFound(key)) if key == "mallory"
    ));
}

#[tokio::test]
async fn keys_follow_every_scan_page() {
    let store = users(2);
    let registry = registry_with(&store);
    let mut table = registry.map("dynamodb://users", OpenOptions::new()).unwrap();

    assert_eq!(
        table.keys().await.unwrap(),
        vec!["alice", "bob", "carol", "dave", "erin"]
    );
    assert_eq!(store.scan_count(), 3);
}

#[tokio::test]
async fn items_are_scanned_page_by_page() {
    let store = users(2);
    let mut table = DynamoMap::new(
        Arc::new(store.clone()),
        Uri::parse("dynamodb://users").unwrap(),
        OpenOptions::new(),
    )
    .unwrap();

    let mut items = table.items().await.unwrap();
    assert_eq!(store.scan_count(), 0);
    let first = items.try_next().await.unwrap().unwrap();
    assert_eq!(first["name"], "alice");
    assert_eq!(store.scan_count(), 1);
    items.try_next().await.unwrap().unwrap();
    items.try_next().await.unwrap().unwrap();
    assert_eq!(store.scan_count(), 2);

    let rest: Vec<Item> = items.try_collect().await.unwrap();
    let names: Vec<_> = rest.iter().map(|item| item["name"].clone()).collect();
    assert_eq!(names, vec!["dave", "erin"]);
    assert_eq!(store.scan_count(), 3);
}

#[tokio::test]
async fn len_is_the_table_item_count() {
    let registry = registry_with(&users(10));
    let mut table = registry.map("dynamodb://users", OpenOptions::new()).unwrap();
    assert_eq!(table.len().await.unwrap(), 5);
    assert!(!table.is_empty().await.unwrap());
}

#[tokio::test]
async fn insert_merges_into_existing_item() {
    let store = users(10);
    let registry = registry_with(&store);
    let mut table = registry.map("dynamodb://users", OpenOptions::new()).unwrap();

    table.insert("alice", json!({"age": 31, "team": "ops"})).await.unwrap();
    assert_eq!(
        table.get("alice").await.unwrap(),
        json!({"name": "alice", "age": 31, "team": "ops"})
    );

    table.insert("frank", json!({"age": 60})).await.unwrap();
    assert_eq!(
        serde_json::Value::Object(store.item("users", "frank").unwrap()),
        json!({"name": "frank", "age": 60})
    );
    assert_eq!(table.len().await.unwrap(), 6);
}

#[tokio::test]
async fn remove_deletes_and_tolerates_missing_keys() {
    let store = users(10);
    let registry = registry_with(&store);
    let mut table = registry.map("dynamodb://users", OpenOptions::new()).unwrap();

    table.remove("carol").await.unwrap();
    assert!(store.item("users", "carol").is_none());
    table.remove("carol").await.unwrap();
    assert_eq!(table.len().await.unwrap(), 4);
}

#[tokio::test]
async fn credential_aliases_reach_the_client_normalized() {
    let store = users(10);
    let registry = registry_with(&store);
    let options = OpenOptions::new()
        .credential("access_key", "AKIDEXAMPLE")
        .credential("secret_key", "wJalrXUtnFEMI")
        .credential("region", "eu-north-1");

    let mut table = registry.map("dynamodb://users", options).unwrap();
    table.get("alice").await.unwrap();

    let creds = store.last_credentials().unwrap();
    assert_eq!(creds.get("aws_access_key_id"), Some("AKIDEXAMPLE"));
    assert_eq!(creds.get("aws_secret_access_key"), Some("wJalrXUtnFEMI"));
    assert_eq!(creds.get("region"), Some("eu-north-1"));
}

#[tokio::test]
async fn table_falls_back_behind_a_local_override() {
    let dir = tempfile::tempdir().unwrap();
    let overrides = dir.path().join("overrides.json");
    std::fs::write(&overrides, r#"{"alice": {"name": "alice", "age": 99}}"#).unwrap();
    let registry = registry_with(&users(10));

    let mut chain: ChainedMap = [
        registry.map(overrides.to_str().unwrap(), OpenOptions::new()).unwrap(),
        registry.map("dynamodb://users", OpenOptions::new()).unwrap(),
    ]
    .into_iter()
    .collect();
    assert_eq!(chain.get("alice").await.unwrap()["age"], 99);
    assert_eq!(chain.get("bob").await.unwrap()["age"], 52);
}
