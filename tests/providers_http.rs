//! End-to-end provider behaviour against a local stub of both APIs.

use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use nexus_art::{
    ClipdropProvider, GenerationClient, GenerationRequest, GenerationStatus, ImageProvider,
    NexusError, StabilityProvider,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const STABILITY_PATH: &str = "/v1/generation/stable-diffusion-xl-1024-v1-0/text-to-image";
const CLIPDROP_PATH: &str = "/text-to-image/v1";
const STABILITY_ALERT: &str = "Error! Check API Key in .env file";

#[derive(Debug, Default)]
struct Recorded {
    headers: HeaderMap,
    json: Option<Value>,
    fields: Vec<(String, String)>,
}

#[derive(Clone)]
struct Stub {
    status: u16,
    content_type: &'static str,
    body: Arc<Vec<u8>>,
    delay: Duration,
    hits: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<Recorded>>>,
}

impl Stub {
    fn new(status: u16, content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type,
            body: Arc::new(body.into()),
            delay: Duration::ZERO,
            hits: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    async fn reply(&self, recorded: Recorded) -> Response {
        self.hits.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(recorded);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (
            StatusCode::from_u16(self.status).unwrap(),
            [(header::CONTENT_TYPE, self.content_type)],
            self.body.as_ref().clone(),
        )
            .into_response()
    }
}

async fn stability(State(stub): State<Stub>, headers: HeaderMap, body: Bytes) -> Response {
    let json = serde_json::from_slice(&body).ok();
    stub.reply(Recorded {
        headers,
        json,
        fields: Vec::new(),
    })
    .await
}

async fn clipdrop(State(stub): State<Stub>, headers: HeaderMap, mut form: Multipart) -> Response {
    let mut fields = Vec::new();
    while let Ok(Some(field)) = form.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let text = field.text().await.unwrap_or_default();
        fields.push((name, text));
    }
    stub.reply(Recorded {
        headers,
        json: None,
        fields,
    })
    .await
}

async fn serve(stub: Stub) -> String {
    let app = Router::new()
        .route(STABILITY_PATH, post(stability))
        .route(CLIPDROP_PATH, post(clipdrop))
        .with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn recorder() -> (Arc<Mutex<Vec<String>>>, impl nexus_art::Notifier + 'static) {
    let alerts = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&alerts);
    (alerts, move |msg: &str| sink.lock().unwrap().push(msg.to_string()))
}

fn header<'a>(recorded: &'a Recorded, name: &str) -> &'a str {
    recorded
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn stability_success_renders_data_uri() {
    let stub = Stub::new(
        200,
        "application/json",
        r#"{"artifacts":[{"base64":"QQ==","seed":7,"finishReason":"SUCCESS"}]}"#,
    );
    let base = serve(stub.clone()).await;
    let provider = StabilityProvider::builder()
        .api_key("sk-test")
        .base_url(base)
        .build()
        .unwrap();

    let (alerts, notifier) = recorder();
    let (mut client, mut rx) = GenerationClient::new(Arc::new(provider), notifier);
    client.set_prompt("A cyberpunk warrior in neon rain");
    client.submit();

    assert_eq!(client.settle(&mut rx).await, GenerationStatus::Done);
    let image = client.image().unwrap();
    assert_eq!(image.src(), "data:image/png;base64,QQ==");
    assert_eq!(image.download_filename(), "nexus-art.png");
    assert_eq!(image.image().metadata.seed, Some(7));
    assert!(alerts.lock().unwrap().is_empty());

    let seen = stub.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(header(&seen[0], "authorization"), "Bearer sk-test");
    assert_eq!(header(&seen[0], "accept"), "application/json");
    assert_eq!(header(&seen[0], "content-type"), "application/json");
    assert_eq!(
        seen[0].json,
        Some(json!({
            "text_prompts": [{"text": "A cyberpunk warrior in neon rain"}],
            "cfg_scale": 7,
            "height": 1024,
            "width": 1024,
            "steps": 30,
            "samples": 1
        }))
    );
}

#[tokio::test]
async fn stability_http_errors_alert_once_and_reset() {
    for status in [401u16, 403, 429, 500] {
        let stub = Stub::new(status, "application/json", r#"{"message":"nope"}"#);
        let base = serve(stub.clone()).await;
        let provider = StabilityProvider::builder()
            .api_key("sk-test")
            .base_url(base)
            .build()
            .unwrap();

        let (alerts, notifier) = recorder();
        let (mut client, mut rx) = GenerationClient::new(Arc::new(provider), notifier);
        client.set_prompt("a fox");
        client.submit();

        assert_eq!(client.settle(&mut rx).await, GenerationStatus::Idle);
        assert!(client.image().is_none());
        assert_eq!(*alerts.lock().unwrap(), vec![STABILITY_ALERT.to_string()]);
        assert_eq!(stub.hits(), 1);
    }
}

#[tokio::test]
async fn stability_error_kinds_are_classified() {
    let stub = Stub::new(429, "application/json", r#"{"message":"out of credits"}"#);
    let base = serve(stub).await;
    let provider = StabilityProvider::builder()
        .api_key("sk-test")
        .base_url(base)
        .build()
        .unwrap();

    let err = provider
        .generate(&GenerationRequest::new("a fox"))
        .await
        .unwrap_err();
    assert!(matches!(err, NexusError::RateLimited(ref m) if m.contains("out of credits")));
}

#[tokio::test]
async fn stability_without_key_is_rejected_by_provider() {
    let stub = Stub::new(401, "application/json", r#"{"message":"missing key"}"#);
    let base = serve(stub.clone()).await;
    let provider = StabilityProvider::builder().base_url(base).build().unwrap();

    let err = provider
        .generate(&GenerationRequest::new("a fox"))
        .await
        .unwrap_err();
    assert!(matches!(err, NexusError::Auth(_)));
    assert_eq!(stub.hits(), 1);

    let seen = stub.seen.lock().unwrap();
    assert!(header(&seen[0], "authorization").starts_with("Bearer"));
}

#[tokio::test]
async fn stability_without_artifacts_is_an_error() {
    let stub = Stub::new(200, "application/json", r#"{"artifacts":[]}"#);
    let base = serve(stub).await;
    let provider = StabilityProvider::builder()
        .api_key("sk-test")
        .base_url(base)
        .build()
        .unwrap();

    let err = provider
        .generate(&GenerationRequest::new("a fox"))
        .await
        .unwrap_err();
    assert!(matches!(err, NexusError::UnexpectedResponse(_)));
}

#[tokio::test]
async fn stability_unpadded_artifact_renders_as_sent() {
    let stub = Stub::new(200, "application/json", r#"{"artifacts":[{"base64":"QQ"}]}"#);
    let base = serve(stub).await;
    let provider = StabilityProvider::builder()
        .api_key("sk-test")
        .base_url(base)
        .build()
        .unwrap();

    let (alerts, notifier) = recorder();
    let (mut client, mut rx) = GenerationClient::new(Arc::new(provider), notifier);
    client.set_prompt("a fox");
    client.submit();

    assert_eq!(client.settle(&mut rx).await, GenerationStatus::Done);
    let image = client.image().unwrap();
    assert_eq!(image.src(), "data:image/png;base64,QQ");
    assert_eq!(image.image().data, b"A");
    assert!(alerts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn stability_response_without_artifacts_field_resets_quietly() {
    let stub = Stub::new(200, "application/json", r#"{"id":"x"}"#);
    let base = serve(stub.clone()).await;
    let provider = StabilityProvider::builder()
        .api_key("sk-test")
        .base_url(base)
        .build()
        .unwrap();

    let (alerts, notifier) = recorder();
    let (mut client, mut rx) = GenerationClient::new(Arc::new(provider), notifier);
    client.set_prompt("a fox");
    client.submit();

    assert_eq!(client.settle(&mut rx).await, GenerationStatus::Idle);
    assert!(client.image().is_none());
    assert!(alerts.lock().unwrap().is_empty());
    assert_eq!(stub.hits(), 1);
}

#[tokio::test]
async fn clipdrop_success_renders_object_url() {
    let jpeg: Vec<u8> = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
    let stub = Stub::new(200, "image/jpeg", jpeg.clone());
    let base = serve(stub.clone()).await;
    let provider = ClipdropProvider::builder()
        .api_key("cd-test")
        .base_url(base)
        .build()
        .unwrap();

    let (alerts, notifier) = recorder();
    let (mut client, mut rx) = GenerationClient::new(Arc::new(provider), notifier);
    client.set_prompt("a fox");
    client.submit();

    assert_eq!(client.settle(&mut rx).await, GenerationStatus::Done);
    let image = client.image().unwrap();
    assert!(image.src().starts_with("blob:"));
    assert_eq!(client.store().fetch(image.src()).unwrap(), jpeg);
    assert_eq!(image.download_filename(), "nexus-art.jpg");
    assert!(alerts.lock().unwrap().is_empty());

    let seen = stub.seen.lock().unwrap();
    assert_eq!(header(&seen[0], "x-api-key"), "cd-test");
    assert!(header(&seen[0], "content-type").starts_with("multipart/form-data"));
    assert!(seen[0].headers.get("authorization").is_none());
    assert_eq!(
        seen[0].fields,
        vec![("prompt".to_string(), "a fox".to_string())]
    );
}

#[tokio::test]
async fn clipdrop_missing_key_skips_network() {
    let stub = Stub::new(200, "image/png", b"\x89PNG\r\n\x1a\n".to_vec());
    let base = serve(stub.clone()).await;
    let provider = ClipdropProvider::builder().base_url(base).build().unwrap();

    let (alerts, notifier) = recorder();
    let (mut client, mut rx) = GenerationClient::new(Arc::new(provider), notifier);
    client.set_prompt("a fox");
    client.submit();

    assert_eq!(client.settle(&mut rx).await, GenerationStatus::Idle);
    assert_eq!(stub.hits(), 0);
    let alerts = alerts.lock().unwrap();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("CLIPDROP_API_KEY"));
}

#[tokio::test]
async fn clipdrop_failure_surfaces_underlying_text() {
    let stub = Stub::new(402, "application/json", "insufficient credits");
    let base = serve(stub).await;
    let provider = ClipdropProvider::builder()
        .api_key("cd-test")
        .base_url(base)
        .build()
        .unwrap();

    let (alerts, notifier) = recorder();
    let (mut client, mut rx) = GenerationClient::new(Arc::new(provider), notifier);
    client.set_prompt("a fox");
    client.submit();

    assert_eq!(client.settle(&mut rx).await, GenerationStatus::Idle);
    assert_eq!(
        *alerts.lock().unwrap(),
        vec!["API error: 402 - insufficient credits".to_string()]
    );
}

#[tokio::test]
async fn slow_provider_times_out() {
    let stub = Stub::new(200, "image/png", b"\x89PNG\r\n\x1a\n".to_vec())
        .with_delay(Duration::from_secs(5));
    let base = serve(stub).await;
    let timeout = Duration::from_millis(200);
    let provider = ClipdropProvider::builder()
        .api_key("cd-test")
        .base_url(base)
        .timeout(timeout)
        .build()
        .unwrap();

    let err = provider
        .generate(&GenerationRequest::new("a fox"))
        .await
        .unwrap_err();
    assert!(matches!(err, NexusError::Timeout(t) if t == timeout));
}

#[tokio::test]
async fn network_failure_alerts_and_resets() {
    // Reserve a port, then free it so nothing is listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let provider = StabilityProvider::builder()
        .api_key("sk-test")
        .base_url(format!("http://{addr}"))
        .build()
        .unwrap();

    let (alerts, notifier) = recorder();
    let (mut client, mut rx) = GenerationClient::new(Arc::new(provider), notifier);
    client.set_prompt("a fox");
    client.submit();

    assert_eq!(client.settle(&mut rx).await, GenerationStatus::Idle);
    assert_eq!(*alerts.lock().unwrap(), vec![STABILITY_ALERT.to_string()]);
}
