use async_trait::async_trait;
use consolectl_transport::{ApiClient, AuthLayer, TransportConfig, build_transport, wrapper};
use consolectl_types::{ConsoleError, Result, Token, TokenProvider};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct StaticProvider {
    token: Option<&'static str>,
    calls: AtomicUsize,
}

impl StaticProvider {
    fn new(token: Option<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            token,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TokenProvider for StaticProvider {
    async fn access_token(&self) -> Result<Token> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.token {
            Some(t) => Ok(Token::new(t).with_expiry(3600)),
            None => Err(ConsoleError::Auth("login required".into())),
        }
    }
}

fn client(server: &MockServer, provider: Arc<StaticProvider>) -> ApiClient {
    let config = TransportConfig {
        auth: Some(wrapper(AuthLayer::new(provider))),
        ..TransportConfig::default()
    };
    let http = config.http_client().unwrap();
    ApiClient::new(server.uri(), build_transport(&config, http.clone()), http)
}

#[tokio::test]
async fn test_get_json_is_authenticated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/clusters"))
        .and(query_param("limit", "5"))
        .and(header("authorization", "Bearer tok-1"))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [1, 2]})))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server, StaticProvider::new(Some("tok-1")));
    let body: serde_json::Value = api
        .get("/v1/clusters")
        .query(&[("limit", "5")])
        .send_json()
        .await
        .unwrap();
    assert_eq!(body["items"], json!([1, 2]));
}

#[tokio::test]
async fn test_post_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/clusters"))
        .and(body_json(json!({"name": "east"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "c-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server, StaticProvider::new(Some("tok")));
    let body: serde_json::Value = api
        .post("v1/clusters")
        .json(&json!({"name": "east"}))
        .send_json()
        .await
        .unwrap();
    assert_eq!(body["id"], "c-1");
}

#[tokio::test]
async fn test_explicit_authorization_skips_provider() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/clusters/c-1"))
        .and(header("authorization", "Bearer caller-supplied"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let provider = StaticProvider::new(Some("from-provider"));
    let api = client(&server, provider.clone());
    let resp = api
        .delete("/v1/clusters/c-1")
        .bearer_auth("caller-supplied")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 204);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_auth_failure_never_reaches_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let api = client(&server, StaticProvider::new(None));
    let err = api.get("/v1/clusters").send().await.unwrap_err();
    assert!(matches!(err, ConsoleError::Auth(_)));
}

#[tokio::test]
async fn test_non_success_status_is_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such thing"))
        .mount(&server)
        .await;

    let api = client(&server, StaticProvider::new(Some("tok")));
    let err = api
        .get("/v1/missing")
        .send_json::<serde_json::Value>()
        .await
        .unwrap_err();
    match err {
        ConsoleError::Upstream { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, "no such thing");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_server_version_is_cached_until_reset() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "7.2.1"})))
        .expect(2)
        .mount(&server)
        .await;

    let api = client(&server, StaticProvider::new(Some("tok")));
    assert_eq!(api.server_version().await.unwrap(), "7.2.1");
    assert_eq!(api.clone().server_version().await.unwrap(), "7.2.1");

    api.reset_version_cache().await;
    assert_eq!(api.server_version().await.unwrap(), "7.2.1");
}

#[tokio::test]
async fn test_server_version_failure_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/version"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "8.0.0"})))
        .mount(&server)
        .await;

    let api = client(&server, StaticProvider::new(Some("tok")));
    assert!(api.server_version().await.is_err());
    assert_eq!(api.server_version().await.unwrap(), "8.0.0");
}
