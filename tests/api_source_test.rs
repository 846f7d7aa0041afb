//! Integration tests for the REST API source.

use std::time::Duration;

use post_relay::error::FetchError;
use post_relay::post::RawPost;
use post_relay::source::{ApiSource, ClientCredentials, FeedOrder, FetchRequest, FetchSource};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(limit: u32, include_replies: bool) -> FetchRequest {
    FetchRequest {
        account: "testuser".to_string(),
        limit,
        include_replies,
    }
}

fn source(server: &MockServer) -> ApiSource {
    ApiSource::new(&server.uri(), Duration::from_secs(5), None).expect("source")
}

async fn mount_lookup(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/lookup"))
        .and(query_param("acct", "testuser"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "42"})))
        .mount(server)
        .await;
}

fn statuses(ids: &[&str]) -> serde_json::Value {
    json!(ids
        .iter()
        .map(|id| json!({"id": id, "content": format!("<p>post {id}</p>")}))
        .collect::<Vec<_>>())
}

#[tokio::test]
async fn test_fetch_returns_statuses_newest_first() {
    let server = MockServer::start().await;
    mount_lookup(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/42/statuses"))
        .and(query_param("limit", "3"))
        .and(query_param("exclude_replies", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(statuses(&["3", "2", "1"])))
        .expect(1)
        .mount(&server)
        .await;

    let source = source(&server);
    assert_eq!(source.order(), FeedOrder::NewestFirst);

    let posts = source.fetch(&request(3, false)).await.unwrap();
    assert_eq!(posts.len(), 3);
    match &posts[0] {
        RawPost::ApiJson(value) => assert_eq!(value["id"], "3"),
        RawPost::HtmlFragment(_) => panic!("expected api payload"),
    }
}

#[tokio::test]
async fn test_limit_is_clamped_to_maximum() {
    let server = MockServer::start().await;
    mount_lookup(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/42/statuses"))
        .and(query_param("limit", "40"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let posts = source(&server).fetch(&request(500, false)).await.unwrap();
    assert!(posts.is_empty());
}

#[tokio::test]
async fn test_zero_limit_requests_one() {
    let server = MockServer::start().await;
    mount_lookup(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/42/statuses"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(statuses(&["9", "8"])))
        .expect(1)
        .mount(&server)
        .await;

    let posts = source(&server).fetch(&request(0, false)).await.unwrap();
    assert_eq!(posts.len(), 1);
}

#[tokio::test]
async fn test_include_replies_omits_exclude_flag() {
    let server = MockServer::start().await;
    mount_lookup(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/42/statuses"))
        .and(query_param("exclude_replies", "true"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/42/statuses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(statuses(&["1"])))
        .mount(&server)
        .await;

    let posts = source(&server).fetch(&request(5, true)).await.unwrap();
    assert_eq!(posts.len(), 1);
}

#[tokio::test]
async fn test_unknown_account() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/lookup"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = source(&server).fetch(&request(5, false)).await.unwrap_err();
    assert!(matches!(err, FetchError::AccountNotFound(ref acct) if acct == "testuser"));
}

#[tokio::test]
async fn test_server_error_is_status() {
    let server = MockServer::start().await;
    mount_lookup(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/42/statuses"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = source(&server).fetch(&request(5, false)).await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 503, .. }));
}

#[tokio::test]
async fn test_non_list_body_is_decode_error() {
    let server = MockServer::start().await;
    mount_lookup(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/42/statuses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "nope"})))
        .mount(&server)
        .await;

    let err = source(&server).fetch(&request(5, false)).await.unwrap_err();
    assert!(matches!(err, FetchError::Decode { .. }));
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/lookup"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": "42"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let source = ApiSource::new(&server.uri(), Duration::from_millis(200), None).unwrap();
    let err = source.fetch(&request(5, false)).await.unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
}

#[tokio::test]
async fn test_client_credentials_token_is_sent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=app-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/lookup"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/42/statuses"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(statuses(&["1"])))
        .mount(&server)
        .await;

    let credentials = ClientCredentials {
        client_id: "app-id".to_string(),
        client_secret: "app-secret".to_string(),
    };
    let source = ApiSource::new(&server.uri(), Duration::from_secs(5), Some(credentials)).unwrap();

    let posts = source.fetch(&request(5, false)).await.unwrap();
    assert_eq!(posts.len(), 1);
}

#[tokio::test]
async fn test_rejected_credentials_are_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let credentials = ClientCredentials {
        client_id: "app-id".to_string(),
        client_secret: "wrong".to_string(),
    };
    let source = ApiSource::new(&server.uri(), Duration::from_secs(5), Some(credentials)).unwrap();

    let err = source.fetch(&request(5, false)).await.unwrap_err();
    assert!(matches!(err, FetchError::Auth(_)));
}
