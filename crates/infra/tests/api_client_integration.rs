//! End-to-end tests: token endpoint, file-backed store, API description and
//! wrapped API, all served by one mock server.

mod support;

use std::sync::Arc;

use serde_json::json;
use tokenrelay_common::auth::{PlainFileTokenStore, StrictTokenStore, TokenStore};
use tokenrelay_domain::RetrySettings;
use tokenrelay_infra::api::{ApiError, ExecError, ExecOutput, FailureClass, OperationRequest};
use tokenrelay_infra::ApiClient;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token_body(access_token: &str) -> serde_json::Value {
    json!({
        "access_token": access_token,
        "refresh_token": format!("{access_token}-refresh"),
        "token_type": "Bearer",
        "expires_in": 3600
    })
}

#[tokio::test]
async fn test_first_call_refreshes_and_persists_token() {
    support::init_tracing();
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=seed-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("acc-1")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/employer"))
        .and(header("authorization", "Bearer acc-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Acme"})))
        .expect(2)
        .mount(&server)
        .await;

    let store_path = dir.path().join("tokens").join("access.json");
    let store: Arc<dyn TokenStore> = Arc::new(PlainFileTokenStore::new(&store_path));
    let config = support::config_for(&server.uri(), &support::write_description(dir.path()));
    let client = ApiClient::from_config(config, Arc::clone(&store)).await.unwrap();

    assert_eq!(client.operations(), ["getCampaign", "getEmployerInfo"]);

    let call = OperationRequest::new("getEmployerInfo");
    assert_eq!(client.call_json(&call).await.unwrap(), Some(json!({"name": "Acme"})));
    // Second call reuses the stored token.
    assert_eq!(client.call_json(&call).await.unwrap(), Some(json!({"name": "Acme"})));

    assert_eq!(store.access_token().await.unwrap().as_deref(), Some("acc-1"));
    let persisted: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&store_path).unwrap()).unwrap();
    assert_eq!(persisted["access_token"], "acc-1");
    assert!(persisted.get("updatedAt").is_some());
}

#[tokio::test]
async fn test_unauthorized_rotates_token_and_refresh_token() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("refresh_token=seed-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("acc-1")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("refresh_token=acc-1-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("acc-2")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/campaigns/c-1"))
        .and(header("authorization", "Bearer acc-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c-1"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/campaigns/c-1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let store: Arc<dyn TokenStore> = Arc::new(PlainFileTokenStore::new(dir.path().join("t.json")));
    let config = support::config_for(&server.uri(), &support::write_description(dir.path()));
    let client = ApiClient::from_config(config, store).await.unwrap();

    let output = client
        .call(&OperationRequest::new("getCampaign").param("campaignId", "c-1"))
        .await
        .unwrap();
    assert_eq!(output, ExecOutput::Payload(json!({"id": "c-1"})));
}

#[tokio::test]
async fn test_persistent_unauthorized_exhausts_budget() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "acc",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/employer"))
        .respond_with(ResponseTemplate::new(401))
        .expect(3)
        .mount(&server)
        .await;

    let store: Arc<dyn TokenStore> = Arc::new(PlainFileTokenStore::new(dir.path().join("t.json")));
    let mut config = support::config_for(&server.uri(), &support::write_description(dir.path()));
    config.retry = RetrySettings { budget: 2, ..config.retry };
    let client = ApiClient::from_config(config, store).await.unwrap();

    let err = client.call(&OperationRequest::new("getEmployerInfo")).await.unwrap_err();
    match err {
        ApiError::Exec(ExecError::Exhausted { request, source }) => {
            assert_eq!(request.operation_id.as_deref(), Some("getEmployerInfo"));
            assert_eq!(source.class(), FailureClass::Unauthorized);
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rejected_grant_surfaces_refresh_failure() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "refresh token revoked"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/employer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let store: Arc<dyn TokenStore> = Arc::new(PlainFileTokenStore::new(dir.path().join("t.json")));
    let mut config = support::config_for(&server.uri(), &support::write_description(dir.path()));
    config.retry = RetrySettings { budget: 1, ..config.retry };
    let client = ApiClient::from_config(config, store).await.unwrap();

    // Authorizing failures count as `Other` and consume the budget.
    let err = client.call(&OperationRequest::new("getEmployerInfo")).await.unwrap_err();
    assert!(matches!(err, ApiError::Exec(ExecError::Exhausted { .. })), "got {err:?}");
}

#[tokio::test]
async fn test_strict_store_is_fatal_without_network() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store: Arc<dyn TokenStore> = Arc::new(StrictTokenStore);
    let config = support::config_for(&server.uri(), &support::write_description(dir.path()));
    let client = ApiClient::from_config(config, store).await.unwrap();

    let err = client.call(&OperationRequest::new("getEmployerInfo")).await.unwrap_err();
    assert!(matches!(err, ApiError::Exec(ExecError::Fatal { .. })), "got {err:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_share_one_exchange() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("acc-shared"))
                .set_delay(std::time::Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/employer"))
        .and(header("authorization", "Bearer acc-shared"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(6)
        .mount(&server)
        .await;

    let store: Arc<dyn TokenStore> = Arc::new(PlainFileTokenStore::new(dir.path().join("t.json")));
    let config = support::config_for(&server.uri(), &support::write_description(dir.path()));
    let client = Arc::new(ApiClient::from_config(config, store).await.unwrap());

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client.call_json(&OperationRequest::new("getEmployerInfo")).await
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), Some(json!({"ok": true})));
    }
}
