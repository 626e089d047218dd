//! In-process VisionXaid backend for integration tests
//!
//! Serves `/predict`, `/report` and `/health` on an ephemeral localhost port
//! with scripted responses, and records what it received.

use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use super::fixtures::glaucoma_body;

/// Scripted response for one route
#[derive(Debug, Clone)]
pub enum Respond {
    Json(StatusCode, Value),
    Text(StatusCode, &'static str),
    Pdf(Vec<u8>),
}

impl IntoResponse for Respond {
    fn into_response(self) -> Response {
        match self {
            Respond::Json(status, body) => (status, Json(body)).into_response(),
            Respond::Text(status, body) => (status, body).into_response(),
            Respond::Pdf(bytes) => {
                ([(header::CONTENT_TYPE, "application/pdf")], bytes).into_response()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub predict: Respond,
    pub report: Respond,
    pub health: Respond,
    /// Hold `/predict` responses back this long
    pub predict_delay: Option<Duration>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            predict: Respond::Json(StatusCode::OK, glaucoma_body()),
            report: Respond::Pdf(b"%PDF-1.4 mock report".to_vec()),
            health: Respond::Json(
                StatusCode::OK,
                json!({
                    "status": "healthy",
                    "message": "VisionXaid API running",
                    "model_loaded": true,
                    "model_path": "models/fundus.h5",
                    "last_conv_layer": "conv5_block3_out",
                    "gradcam_enabled": true
                }),
            ),
            predict_delay: None,
        }
    }
}

/// One multipart field received by `/predict`
#[derive(Debug, Clone)]
pub struct Upload {
    pub field: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub size: usize,
}

struct MockState {
    config: MockConfig,
    predict_calls: AtomicUsize,
    uploads: Mutex<Vec<Upload>>,
    report_bodies: Mutex<Vec<Value>>,
}

pub struct MockBackend {
    addr: SocketAddr,
    state: Arc<MockState>,
    server: tokio::task::JoinHandle<()>,
}

impl MockBackend {
    pub async fn start(config: MockConfig) -> Self {
        let state = Arc::new(MockState {
            config,
            predict_calls: AtomicUsize::new(0),
            uploads: Mutex::new(Vec::new()),
            report_bodies: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/predict", post(predict))
            .route("/report", post(report))
            .route("/health", get(health))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            server,
        }
    }

    /// Base URL with a trailing slash, as users tend to configure it
    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn predict_calls(&self) -> usize {
        self.state.predict_calls.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.state.uploads.lock().unwrap().clone()
    }

    pub fn report_bodies(&self) -> Vec<Value> {
        self.state.report_bodies.lock().unwrap().clone()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// URL of a localhost port nothing listens on
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

async fn predict(State(state): State<Arc<MockState>>, mut multipart: Multipart) -> Response {
    state.predict_calls.fetch_add(1, Ordering::SeqCst);

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let size = field.bytes().await.map(|b| b.len()).unwrap_or(0);
        state.uploads.lock().unwrap().push(Upload {
            field: name,
            filename,
            content_type,
            size,
        });
    }

    if let Some(delay) = state.config.predict_delay {
        tokio::time::sleep(delay).await;
    }

    state.config.predict.clone().into_response()
}

async fn report(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.report_bodies.lock().unwrap().push(body);
    state.config.report.clone().into_response()
}

async fn health(State(state): State<Arc<MockState>>) -> Response {
    state.config.health.clone().into_response()
}
