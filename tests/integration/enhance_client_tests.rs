//! HTTP enhancement client tests against a local mock service.
//!
//! Tests verify:
//! - Request shape (bearer credential, base64 image, quality tier)
//! - Decoding of successful responses
//! - Error statuses reaching the orchestrator as permission or service errors
//! - Safety blocks and request timeouts

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use tilesmith::enhance::{
    Credential, CredentialStore, EnhancementClient, EnhancementOrchestrator, HttpEnhancementClient,
    QualityLevel,
};
use tilesmith::{EnhanceError, ImageSlicer, TileRegistry, TileStatus};

use super::test_utils::{enhanced_png, png_fixture};

// =============================================================================
// Mock Service
// =============================================================================

#[derive(Clone, Copy)]
enum Reply {
    Echo,
    Status(u16),
    Safety,
    Slow,
}

#[derive(Clone)]
struct MockService {
    reply: Reply,
    result: Bytes,
    received: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

async fn enhance_endpoint(
    State(service): State<MockService>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    service.received.lock().await.push((auth, body));

    match service.reply {
        Reply::Echo => Json(json!({
            "image": STANDARD.encode(&service.result),
            "mime_type": "image/png",
            "finish_reason": "STOP",
        }))
        .into_response(),
        Reply::Status(code) => (
            StatusCode::from_u16(code).unwrap(),
            "The caller does not have permission",
        )
            .into_response(),
        Reply::Safety => Json(json!({ "image": null, "finish_reason": "SAFETY" })).into_response(),
        Reply::Slow => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::OK.into_response()
        }
    }
}

/// Start the mock service and return its URL with the shared request log.
async fn start(reply: Reply, result: Bytes) -> (String, Arc<Mutex<Vec<(Option<String>, Value)>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let service = MockService {
        reply,
        result,
        received: Arc::clone(&received),
    };
    let app = Router::new()
        .route("/v1/enhance", post(enhance_endpoint))
        .with_state(service);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/v1/enhance", addr), received)
}

fn credential() -> Credential {
    Credential::new("vendor-key").unwrap()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_successful_enhancement() {
    let result_image = enhanced_png(123);
    let (url, received) = start(Reply::Echo, result_image.clone()).await;
    let client = HttpEnhancementClient::new(&url, Duration::from_secs(5)).unwrap();

    let source = Bytes::from(png_fixture(8, 8));
    let output = client
        .enhance(source.clone(), QualityLevel::High, &credential())
        .await
        .unwrap();
    assert_eq!(output, result_image);

    let received = received.lock().await;
    assert_eq!(received.len(), 1);
    let (auth, body) = &received[0];
    assert_eq!(auth.as_deref(), Some("Bearer vendor-key"));
    assert_eq!(body["quality"], "2K");
    assert_eq!(body["mime_type"], "image/png");
    let sent = STANDARD.decode(body["image"].as_str().unwrap()).unwrap();
    assert_eq!(sent, source.to_vec());
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let (url, _) = start(Reply::Status(500), Bytes::new()).await;
    let client = HttpEnhancementClient::new(&url, Duration::from_secs(5)).unwrap();

    let err = client
        .enhance(Bytes::from_static(b"img"), QualityLevel::Standard, &credential())
        .await
        .unwrap_err();
    assert_eq!(err.status, Some(500));
}

#[tokio::test]
async fn test_safety_block() {
    let (url, _) = start(Reply::Safety, Bytes::new()).await;
    let client = HttpEnhancementClient::new(&url, Duration::from_secs(5)).unwrap();

    let err = client
        .enhance(Bytes::from_static(b"img"), QualityLevel::Standard, &credential())
        .await
        .unwrap_err();
    assert!(err.message.contains("safety"));
}

#[tokio::test]
async fn test_timeout_has_no_status() {
    let (url, _) = start(Reply::Slow, Bytes::new()).await;
    let client = HttpEnhancementClient::new(&url, Duration::from_millis(200)).unwrap();

    let err = client
        .enhance(Bytes::from_static(b"img"), QualityLevel::Standard, &credential())
        .await
        .unwrap_err();
    assert_eq!(err.status, None);
}

#[tokio::test]
async fn test_unreachable_service() {
    // Bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client =
        HttpEnhancementClient::new(format!("http://{}/enhance", addr), Duration::from_secs(2))
            .unwrap();
    let err = client
        .enhance(Bytes::from_static(b"img"), QualityLevel::Standard, &credential())
        .await
        .unwrap_err();
    assert_eq!(err.status, None);
}

#[tokio::test]
async fn test_orchestrator_over_http() {
    let result_image = enhanced_png(9);
    let (url, _) = start(Reply::Echo, result_image.clone()).await;
    let (denied_url, _) = start(Reply::Status(403), Bytes::new()).await;

    let registry = Arc::new(TileRegistry::new());
    registry
        .replace_all(ImageSlicer::new().slice(&png_fixture(20, 20), 1, 2).unwrap())
        .await;
    let snapshot = registry.snapshot().await;
    let (first, second) = (snapshot.tiles()[0].id().clone(), snapshot.tiles()[1].id().clone());
    let credentials = Arc::new(CredentialStore::with_credential(credential()));

    let working = EnhancementOrchestrator::new(
        Arc::clone(&registry),
        Arc::new(HttpEnhancementClient::new(&url, Duration::from_secs(5)).unwrap()),
        Arc::clone(&credentials),
    );
    working
        .request_enhancement(&first, QualityLevel::Ultra)
        .await
        .unwrap();
    let tile = registry.get(&first).await.unwrap();
    assert_eq!(tile.enhanced_image(), Some(&result_image));

    let denied = EnhancementOrchestrator::new(
        Arc::clone(&registry),
        Arc::new(HttpEnhancementClient::new(&denied_url, Duration::from_secs(5)).unwrap()),
        credentials,
    );
    let result = denied
        .request_enhancement(&second, QualityLevel::Ultra)
        .await;
    assert!(matches!(result, Err(EnhanceError::PermissionDenied { .. })));
    assert_eq!(
        registry.get(&second).await.unwrap().status(),
        TileStatus::Failed
    );
}
