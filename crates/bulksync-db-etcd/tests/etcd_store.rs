//! etcd backend behaviour against a mocked keys API.

use bulksync_core::{ApplicationRecord, LifecycleBundles, ProcessGuid, Recipe, RecipeBuilder};
use bulksync_db_etcd::{EtcdConfig, EtcdStore};
use bulksync_storage::{DesiredStateStore, StoreError, StoreVersion};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn recipe(guid: &str, instances: u32) -> Recipe {
    let bundles = LifecycleBundles::from_json(r#"{"stack": "lifecycle.tgz"}"#).unwrap();
    let record: ApplicationRecord = serde_json::from_value(json!({
        "process_guid": guid,
        "droplet_uri": "http://droplet",
        "stack": "stack",
        "memory_mb": 128,
        "disk_mb": 512,
        "num_instances": instances
    }))
    .unwrap();
    RecipeBuilder::new("127.0.0.1:20515", bundles)
        .build(&record)
        .unwrap()
}

fn recipe_value(recipe: &Recipe) -> String {
    String::from_utf8(recipe.to_canonical_bytes().unwrap()).unwrap()
}

fn node_body(recipe: &Recipe, index: u64) -> serde_json::Value {
    json!({
        "action": "set",
        "node": {
            "key": format!("/v1/desired/{}", recipe.process_guid),
            "value": recipe_value(recipe),
            "modifiedIndex": index,
            "createdIndex": index
        }
    })
}

fn store_for(server: &MockServer) -> EtcdStore {
    EtcdStore::new(&EtcdConfig::new([server.uri()])).unwrap()
}

#[tokio::test]
async fn test_connect_probes_version() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/version"))
        .respond_with(ResponseTemplate::new(200).set_body_string("etcd 0.4.6"))
        .expect(1)
        .mount(&server)
        .await;

    let store = EtcdStore::connect(&EtcdConfig::new([server.uri()]))
        .await
        .unwrap();
    assert_eq!(store.backend_name(), "etcd");
}

#[tokio::test]
async fn test_connect_fails_when_no_member_answers() {
    let config = EtcdConfig::new(["http://127.0.0.1:1"]).with_request_timeout_ms(500);
    let err = EtcdStore::connect(&config).await.unwrap_err();
    assert!(matches!(err, StoreError::Unavailable { .. }));
}

#[tokio::test]
async fn test_failover_to_next_member() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/version"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = EtcdConfig::from_comma_separated(&format!("http://127.0.0.1:1, {}", server.uri()));
    let store = EtcdStore::connect(&config).await.unwrap();
    assert_eq!(store.members().len(), 2);
    assert_eq!(store.members()[0].as_str(), "http://127.0.0.1:1/");
}

#[tokio::test]
async fn test_list_missing_directory_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/keys/v1/desired"))
        .and(query_param("recursive", "true"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "errorCode": 100,
            "message": "Key not found",
            "cause": "/v1/desired",
            "index": 3
        })))
        .mount(&server)
        .await;

    let records = store_for(&server).list().await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_list_decodes_records_and_skips_garbage() {
    let server = MockServer::start().await;
    let a = recipe("app-a", 2);
    let b = recipe("app-b", 1);
    Mock::given(method("GET"))
        .and(path("/v2/keys/v1/desired"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "action": "get",
            "node": {
                "key": "/v1/desired",
                "dir": true,
                "nodes": [
                    {"key": "/v1/desired/app-a", "value": recipe_value(&a), "modifiedIndex": 7},
                    {"key": "/v1/desired/app-b", "value": recipe_value(&b), "modifiedIndex": 9},
                    {"key": "/v1/desired/broken", "value": "{not json", "modifiedIndex": 10},
                    {"key": "/v1/desired/mismatch", "value": recipe_value(&a), "modifiedIndex": 11}
                ]
            }
        })))
        .mount(&server)
        .await;

    let mut records = store_for(&server).list().await.unwrap();
    records.sort_by(|l, r| l.process_guid().cmp(r.process_guid()));

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].recipe, a);
    assert_eq!(records[0].version, StoreVersion(7));
    assert_eq!(records[1].recipe, b);
    assert_eq!(records[1].version, StoreVersion(9));
}

#[tokio::test]
async fn test_create_uses_prev_exist_false() {
    let server = MockServer::start().await;
    let a = recipe("app-a", 1);
    Mock::given(method("PUT"))
        .and(path("/v2/keys/v1/desired/app-a"))
        .and(query_param("prevExist", "false"))
        .and(body_string_contains("value="))
        .respond_with(ResponseTemplate::new(201).set_body_json(node_body(&a, 12)))
        .expect(1)
        .mount(&server)
        .await;

    let version = store_for(&server).upsert(&a, None).await.unwrap();
    assert_eq!(version, StoreVersion(12));
}

#[tokio::test]
async fn test_create_existing_key_is_already_exists() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v2/keys/v1/desired/app-a"))
        .respond_with(ResponseTemplate::new(412).set_body_json(json!({
            "errorCode": 105,
            "message": "Key already exists",
            "cause": "/v1/desired/app-a",
            "index": 12
        })))
        .mount(&server)
        .await;

    let err = store_for(&server)
        .upsert(&recipe("app-a", 1), None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists { .. }));
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_update_sends_prev_index() {
    let server = MockServer::start().await;
    let a = recipe("app-a", 3);
    Mock::given(method("PUT"))
        .and(path("/v2/keys/v1/desired/app-a"))
        .and(query_param("prevIndex", "12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(node_body(&a, 13)))
        .expect(1)
        .mount(&server)
        .await;

    let version = store_for(&server)
        .upsert(&a, Some(StoreVersion(12)))
        .await
        .unwrap();
    assert_eq!(version, StoreVersion(13));
}

#[tokio::test]
async fn test_update_with_stale_index_conflicts() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v2/keys/v1/desired/app-a"))
        .respond_with(ResponseTemplate::new(412).set_body_json(json!({
            "errorCode": 101,
            "message": "Compare failed",
            "cause": "[12 != 14]",
            "index": 14
        })))
        .mount(&server)
        .await;

    let err = store_for(&server)
        .upsert(&recipe("app-a", 3), Some(StoreVersion(12)))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::VersionConflict { .. }));
}

#[tokio::test]
async fn test_delete_missing_key_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v2/keys/v1/desired/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "errorCode": 100,
            "message": "Key not found",
            "cause": "/v1/desired/gone",
            "index": 20
        })))
        .mount(&server)
        .await;

    store_for(&server)
        .delete(&ProcessGuid::new("gone"), None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_sends_prev_index() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v2/keys/v1/desired/app-a"))
        .and(query_param("prevIndex", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "action": "compareAndDelete",
            "node": {"key": "/v1/desired/app-a", "modifiedIndex": 21}
        })))
        .expect(1)
        .mount(&server)
        .await;

    store_for(&server)
        .delete(&ProcessGuid::new("app-a"), Some(StoreVersion(7)))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_server_error_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/keys/v1/desired"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = store_for(&server).list().await.unwrap_err();
    assert!(matches!(err, StoreError::Unavailable { .. }));
}

#[tokio::test]
async fn test_guid_named_version_is_stored_under_keys_path() {
    let server = MockServer::start().await;
    let v = recipe("version", 1);
    Mock::given(method("PUT"))
        .and(path("/v2/keys/v1/desired/version"))
        .and(query_param("prevExist", "false"))
        .respond_with(ResponseTemplate::new(201).set_body_json(node_body(&v, 30)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v2/keys/v1/desired/version"))
        .and(query_param("prevIndex", "30"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "action": "compareAndDelete",
            "node": {"key": "/v1/desired/version", "modifiedIndex": 31}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/version"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let version = store.upsert(&v, None).await.unwrap();
    assert_eq!(version, StoreVersion(30));
    store.delete(&v.process_guid, Some(version)).await.unwrap();
}
