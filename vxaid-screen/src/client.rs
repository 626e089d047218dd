//! VisionXaid backend API client
//!
//! Wraps the classify, report and health operations of the remote service.
//! Every transport or HTTP failure comes back as a [`ClientError`]; nothing is
//! retried and no client-side timeout is imposed.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use thiserror::Error;
use tracing::{debug, info, warn};
use vxaid_common::config::normalize_base_url;

use crate::intake::SelectedImage;
use crate::models::{ErrorBody, HealthStatus, PredictionResult, ReportPayload};

const USER_AGENT: &str = concat!("vxaid-screen/", env!("CARGO_PKG_VERSION"));

const PREDICT_FALLBACK: &str = "Prediction failed";
const REPORT_FALLBACK: &str = "PDF generation failed";
const HEALTH_FALLBACK: &str = "Health check failed";

/// Backend client errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// Non-2xx response; `message` is the server's or a fallback
    #[error("{message}")]
    RequestFailed { status: u16, message: String },

    /// No response at all
    #[error("Backend not reachable: {0}")]
    NetworkUnreachable(String),

    /// 2xx response whose body is not what the operation returns
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid backend URL: {0}")]
    InvalidBaseUrl(String),
}

/// Operations of the classification backend
#[async_trait]
pub trait ScreeningBackend: Send + Sync {
    /// Submit an image and return the classification
    async fn classify(&self, image: &SelectedImage) -> Result<PredictionResult, ClientError>;

    /// Request a PDF report; returns the document bytes
    async fn generate_report(&self, payload: &ReportPayload) -> Result<Vec<u8>, ClientError>;

    /// Backend liveness check
    async fn check_health(&self) -> Result<HealthStatus, ClientError>;
}

/// HTTP client for the VisionXaid backend
#[derive(Debug, Clone)]
pub struct ApiClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client; trailing slashes on `base_url` are dropped
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = normalize_base_url(base_url);

        let parsed = reqwest::Url::parse(&base_url)
            .map_err(|e| ClientError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::InvalidBaseUrl(format!(
                "{base_url}: scheme must be http or https"
            )));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(setup_error)?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl ScreeningBackend for ApiClient {
    async fn classify(&self, image: &SelectedImage) -> Result<PredictionResult, ClientError> {
        let url = self.endpoint("predict");

        let part = Part::bytes(image.bytes().to_vec())
            .file_name(image.filename().to_string())
            .mime_str(image.mime_type())
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        let form = Form::new().part("file", part);

        debug!(
            url = %url,
            filename = image.filename(),
            size = image.size_bytes(),
            "Sending classify request"
        );

        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::NetworkUnreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(request_failed(response, PREDICT_FALLBACK).await);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::NetworkUnreachable(e.to_string()))?;

        let result: PredictionResult = serde_json::from_slice(&body).map_err(|e| {
            warn!(error = %e, "Classify response did not parse");
            ClientError::MalformedResponse(e.to_string())
        })?;

        result.validate().map_err(|reason| {
            warn!(reason = %reason, "Classify response failed validation");
            ClientError::MalformedResponse(reason)
        })?;

        info!(
            prediction = %result.predicted_class,
            top_confidence = result.top_confidence,
            heatmap = result.heatmap().is_some(),
            "Classify succeeded"
        );

        Ok(result)
    }

    async fn generate_report(&self, payload: &ReportPayload) -> Result<Vec<u8>, ClientError> {
        let url = self.endpoint("report");

        debug!(
            url = %url,
            filename = %payload.filename,
            prediction = %payload.prediction,
            "Sending report request"
        );

        let response = self
            .http_client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| ClientError::NetworkUnreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(request_failed(response, REPORT_FALLBACK).await);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::NetworkUnreachable(e.to_string()))?;

        info!(
            size = bytes.len(),
            content_type = ?content_type,
            "Report received"
        );

        Ok(bytes.to_vec())
    }

    async fn check_health(&self) -> Result<HealthStatus, ClientError> {
        let url = self.endpoint("health");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::NetworkUnreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(request_failed(response, HEALTH_FALLBACK).await);
        }

        response
            .json::<HealthStatus>()
            .await
            .map_err(|e| ClientError::MalformedResponse(e.to_string()))
    }
}

/// The HTTP client could not be built; nothing was sent
fn setup_error(err: reqwest::Error) -> ClientError {
    ClientError::InvalidRequest(format!("HTTP client setup failed: {err}"))
}

/// Turn a non-2xx response into `RequestFailed`
///
/// Uses the JSON body's `message` when present and non-blank, else `fallback`.
async fn request_failed(response: reqwest::Response, fallback: &str) -> ClientError {
    let status = response.status().as_u16();

    let message = response
        .bytes()
        .await
        .ok()
        .and_then(|body| serde_json::from_slice::<ErrorBody>(&body).ok())
        .and_then(|body| body.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string());

    warn!(status, message = %message, "Backend request failed");

    ClientError::RequestFailed { status, message }
}
