use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use aws_credential_types::Credentials;
use aws_credential_types::provider::SharedCredentialsProvider;
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use shared::llm::{
    BedrockAuth, BedrockGateway, BedrockGatewayConfig, GatewayError, GenerationParams,
    ModelGateway, SigV4Signer,
};
use shared::models::Message;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};

#[derive(Debug, Clone)]
struct MockReply {
    status: StatusCode,
    body: Value,
    delay_ms: u64,
}

#[derive(Debug, Clone)]
struct TestServerState {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    seen_model_ids: Arc<Mutex<Vec<String>>>,
    seen_auth_headers: Arc<Mutex<Vec<Option<String>>>>,
    seen_amz_headers: Arc<Mutex<Vec<(Option<String>, Option<String>)>>>,
    seen_payloads: Arc<Mutex<Vec<Value>>>,
}

impl TestServerState {
    fn with_replies(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            seen_model_ids: Arc::new(Mutex::new(Vec::new())),
            seen_auth_headers: Arc::new(Mutex::new(Vec::new())),
            seen_amz_headers: Arc::new(Mutex::new(Vec::new())),
            seen_payloads: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[tokio::test]
async fn sends_anthropic_messages_payload_and_returns_raw_body() {
    let response_body = anthropic_response("Hello from Claude");
    let state = TestServerState::with_replies(vec![MockReply {
        status: StatusCode::OK,
        body: response_body.clone(),
        delay_ms: 0,
    }]);
    let (url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let gateway = BedrockGateway::new(config_for(url, 5_000), bearer())
        .expect("gateway should build");
    let history = vec![
        Message::user("Hi"),
        Message::assistant("Hello!"),
        Message::user("How are you?"),
    ];
    let body = gateway
        .invoke(&history)
        .await
        .expect("invoke should succeed");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    let parsed: Value = serde_json::from_slice(&body).expect("raw body should be json");
    assert_eq!(parsed, response_body);

    let seen_model_ids = state.seen_model_ids.lock().await.clone();
    assert_eq!(
        seen_model_ids,
        vec!["anthropic.claude-3-haiku-20240307-v1:0".to_string()]
    );

    let seen_auth_headers = state.seen_auth_headers.lock().await.clone();
    assert_eq!(
        seen_auth_headers,
        vec![Some("Bearer test-bedrock-key".to_string())]
    );

    let seen_payloads = state.seen_payloads.lock().await.clone();
    assert_eq!(
        seen_payloads,
        vec![json!({
            "anthropic_version": "bedrock-2023-05-31",
            "max_tokens": 1024,
            "temperature": 0.3,
            "messages": [
                { "role": "user", "content": [{ "type": "text", "text": "Hi" }] },
                { "role": "assistant", "content": [{ "type": "text", "text": "Hello!" }] },
                { "role": "user", "content": [{ "type": "text", "text": "How are you?" }] }
            ]
        })]
    );
}

#[tokio::test]
async fn signs_requests_with_aws_credentials_without_bearer_token() {
    let state = TestServerState::with_replies(vec![MockReply {
        status: StatusCode::OK,
        body: anthropic_response("ok"),
        delay_ms: 0,
    }]);
    let (url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let credentials = Credentials::new(
        "AKIDTEST",
        "test-secret",
        Some("test-session".to_string()),
        None,
        "test",
    );
    let signer = SigV4Signer::new("us-west-2", SharedCredentialsProvider::new(credentials));
    let gateway = BedrockGateway::new(config_for(url, 5_000), BedrockAuth::SigV4(signer))
        .expect("gateway should build");
    gateway
        .invoke(&[Message::user("ping")])
        .await
        .expect("invoke should succeed");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    let seen_auth_headers = state.seen_auth_headers.lock().await.clone();
    let authorization = seen_auth_headers[0]
        .as_deref()
        .expect("request should carry authorization");
    assert!(
        authorization.starts_with("AWS4-HMAC-SHA256 Credential=AKIDTEST/"),
        "unexpected authorization: {authorization}"
    );
    assert!(authorization.contains("/us-west-2/bedrock/aws4_request"));
    assert!(authorization.contains("Signature="));

    let seen_amz_headers = state.seen_amz_headers.lock().await.clone();
    let (amz_date, security_token) = &seen_amz_headers[0];
    assert!(amz_date.is_some(), "x-amz-date should be set");
    assert_eq!(security_token.as_deref(), Some("test-session"));
}

#[tokio::test]
async fn surfaces_provider_error_status_without_retrying() {
    let state = TestServerState::with_replies(vec![MockReply {
        status: StatusCode::BAD_REQUEST,
        body: json!({ "message": "Malformed input request" }),
        delay_ms: 0,
    }]);
    let (url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let gateway = BedrockGateway::new(config_for(url, 5_000), bearer())
        .expect("gateway should build");
    let err = gateway
        .invoke(&[Message::user("ping")])
        .await
        .expect_err("provider errors should fail");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert!(
        matches!(
            err,
            GatewayError::ProviderFailure(ref message)
                if message.contains("status=400") && message.contains("Malformed input request")
        ),
        "expected structured provider error, got {err:?}"
    );

    let seen_model_ids = state.seen_model_ids.lock().await.clone();
    assert_eq!(seen_model_ids.len(), 1, "gateway calls must not be retried");
}

#[tokio::test]
async fn slow_provider_hits_the_request_timeout() {
    let state = TestServerState::with_replies(vec![MockReply {
        status: StatusCode::OK,
        body: anthropic_response("too late"),
        delay_ms: 1_000,
    }]);
    let (url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let gateway = BedrockGateway::new(config_for(url, 100), bearer())
        .expect("gateway should build");
    let err = gateway
        .invoke(&[Message::user("ping")])
        .await
        .expect_err("slow provider should time out");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert!(
        matches!(err, GatewayError::Timeout),
        "expected timeout, got {err:?}"
    );
}

#[tokio::test]
async fn unreachable_provider_is_a_provider_failure() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let local_addr = listener
        .local_addr()
        .expect("listener address should resolve");
    drop(listener);

    let runtime_url = format!("http://{local_addr}");
    let gateway =
        BedrockGateway::new(config_for(runtime_url, 5_000), bearer()).expect("gateway should build");
    let err = gateway
        .invoke(&[Message::user("ping")])
        .await
        .expect_err("closed port should fail");

    assert!(
        matches!(err, GatewayError::ProviderFailure(_)),
        "expected provider failure, got {err:?}"
    );
}

fn config_for(runtime_url: String, timeout_ms: u64) -> BedrockGatewayConfig {
    BedrockGatewayConfig {
        runtime_url,
        model_id: "anthropic.claude-3-haiku-20240307-v1:0".to_string(),
        timeout_ms,
        params: GenerationParams::default(),
    }
}

fn bearer() -> BedrockAuth {
    BedrockAuth::Bearer("test-bedrock-key".to_string())
}

fn anthropic_response(text: &str) -> Value {
    json!({
        "id": "msg_bdrk_test",
        "type": "message",
        "role": "assistant",
        "content": [{ "type": "text", "text": text }],
        "stop_reason": "end_turn",
        "usage": { "input_tokens": 10, "output_tokens": 5 }
    })
}

async fn spawn_test_server(
    state: TestServerState,
) -> (String, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route("/model/{model_id}/invoke", post(test_invoke_handler))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let local_addr = listener
        .local_addr()
        .expect("listener address should resolve");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let server_task = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });

        server.await.expect("test server should run");
    });

    (format!("http://{local_addr}"), shutdown_tx, server_task)
}

async fn test_invoke_handler(
    State(state): State<TestServerState>,
    Path(model_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.seen_model_ids.lock().await.push(model_id);
    state.seen_payloads.lock().await.push(payload);
    state
        .seen_auth_headers
        .lock()
        .await
        .push(header_string(&headers, AUTHORIZATION.as_str()));
    state.seen_amz_headers.lock().await.push((
        header_string(&headers, "x-amz-date"),
        header_string(&headers, "x-amz-security-token"),
    ));

    let reply = state.replies.lock().await.pop_front().unwrap_or(MockReply {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: json!({ "message": "exhausted_test_replies" }),
        delay_ms: 0,
    });

    if reply.delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(reply.delay_ms)).await;
    }

    (reply.status, Json(reply.body))
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|header| header.to_str().ok())
        .map(ToString::to_string)
}
