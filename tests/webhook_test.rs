//! Integration tests for the webhook delivery sink.

use std::time::Duration;

use post_relay::error::DeliveryError;
use post_relay::sink::{DeliverySink, WebhookSink};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sink(server: &MockServer, timeout: Duration) -> WebhookSink {
    WebhookSink::new(&format!("{}/hook", server.uri()), timeout).unwrap()
}

#[tokio::test]
async fn test_posts_text_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"msg_type": "text", "content": {"text": "hello\nworld"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0, "msg": "success"})))
        .expect(1)
        .mount(&server)
        .await;

    sink(&server, Duration::from_secs(5))
        .deliver("hello\nworld")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_non_json_success_is_accepted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    sink(&server, Duration::from_secs(5)).deliver("x").await.unwrap();
}

#[tokio::test]
async fn test_http_error_is_rejection() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let err = sink(&server, Duration::from_secs(5)).deliver("x").await.unwrap_err();
    match err {
        DeliveryError::Rejected { status, body } => {
            assert_eq!(status, 403);
            assert_eq!(body, "forbidden");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_nonzero_code_is_rejection() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"code": 19021, "msg": "sign match fail"})),
        )
        .mount(&server)
        .await;

    let err = sink(&server, Duration::from_secs(5)).deliver("x").await.unwrap_err();
    assert!(matches!(err, DeliveryError::Rejected { status: 200, ref body } if body.contains("19021")));
}

#[tokio::test]
async fn test_slow_webhook_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let err = sink(&server, Duration::from_millis(200))
        .deliver("x")
        .await
        .unwrap_err();
    assert!(matches!(err, DeliveryError::Timeout));
}

#[tokio::test]
async fn test_truncated_success_body_is_still_accepted() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Promise more body than is sent, then hang up
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.ends_with(b"}}") {
            let n = socket.read(&mut buf).await.unwrap();
            assert!(n > 0, "client closed before sending the message");
            request.extend_from_slice(&buf[..n]);
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\n{\"code\"")
            .await
            .unwrap();
        socket.shutdown().await.unwrap();
        // Wait for the client to give up on the body
        while matches!(socket.read(&mut buf).await, Ok(n) if n > 0) {}
    });

    let sink = WebhookSink::new(&format!("http://{addr}/hook"), Duration::from_secs(5)).unwrap();
    sink.deliver("x").await.unwrap();
    server.await.unwrap();
}
