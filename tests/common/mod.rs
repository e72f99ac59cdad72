//! Shared fakes for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use parking_lot::Mutex;
use pdf_speech_server::pdf::{PdfBackend, RenderedPage};
use pdf_speech_server::speech::{SpeechProvider, SynthesisRequest, SynthesizedAudio};
use pdf_speech_server::{router, AppState, Error, Result, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

/// Page text that makes `FakeBackend::extract_text` fail
pub const BROKEN_PAGE: &str = "<broken>";

pub const FAKE_AUDIO: &[u8] = b"ID3\x04\x00fake-mpeg-frames";

/// In-memory stand-in for PDFium: one string per page
pub struct FakeBackend {
    pages: Vec<String>,
}

impl FakeBackend {
    pub fn new(pages: &[&str]) -> Self {
        Self {
            pages: pages.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl PdfBackend for FakeBackend {
    fn page_count(&self, _data: &[u8]) -> Result<u32> {
        Ok(self.pages.len() as u32)
    }

    fn extract_text(&self, _data: &[u8], page: u32) -> Result<String> {
        let text = &self.pages[(page - 1) as usize];
        if text == BROKEN_PAGE {
            return Err(Error::Extraction {
                page,
                reason: "content stream is corrupt".to_string(),
            });
        }
        Ok(text.clone())
    }

    fn render(&self, _data: &[u8], page: u32, scale: f32) -> Result<RenderedPage> {
        let width = (61.2 * scale).round() as u32;
        let height = (79.2 * scale).round() as u32;
        Ok(RenderedPage::blank(page, scale, width, height))
    }
}

/// How `FakeProvider` answers
#[derive(Debug, Clone, Copy)]
pub enum ProviderMode {
    Audio,
    Status(u16),
    Unreachable,
}

/// Records every request and answers according to its mode
pub struct FakeProvider {
    mode: Mutex<ProviderMode>,
    pub calls: Mutex<Vec<SynthesisRequest>>,
}

impl FakeProvider {
    pub fn new(mode: ProviderMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_mode(&self, mode: ProviderMode) {
        *self.mode.lock() = mode;
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl SpeechProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedAudio> {
        self.calls.lock().push(request.clone());
        let mode = *self.mode.lock();
        match mode {
            ProviderMode::Audio => Ok(SynthesizedAudio {
                data: FAKE_AUDIO.to_vec(),
                content_type: "audio/mpeg".to_string(),
            }),
            ProviderMode::Status(status) => Err(Error::Upstream { status }),
            ProviderMode::Unreachable => Err(Error::Gateway {
                reason: "connection refused".to_string(),
            }),
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub provider: Arc<FakeProvider>,
}

pub fn test_app(pages: &[&str]) -> TestApp {
    let provider = Arc::new(FakeProvider::new(ProviderMode::Audio));
    let state = AppState::new(
        ServerConfig::default(),
        Arc::new(FakeBackend::new(pages)),
        provider.clone(),
    );
    TestApp {
        router: router(state),
        provider,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    TestResponse {
        status,
        content_type,
        body,
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

const BOUNDARY: &str = "pdf-speech-boundary";

/// Multipart upload with a single file field
pub fn upload(uri: &str, field: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"book.pdf\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Minimal bytes that pass the PDF header check
pub fn pdf_bytes() -> Vec<u8> {
    b"%PDF-1.4\n%fake document for tests\n%%EOF\n".to_vec()
}

pub fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}
