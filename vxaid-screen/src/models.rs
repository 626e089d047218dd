//! Wire types exchanged with the classification backend

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Filename sent in a report request when the backend did not echo one
pub const DEFAULT_REPORT_FILENAME: &str = "image.jpg";

/// Result of one classify call
///
/// Required fields fail deserialization when absent; `heatmap` and `filename`
/// are optional. Unknown fields (e.g. `success`) are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Predicted label (DR, Glaucoma, AMD, Normal, or an unrecognized label)
    #[serde(rename = "prediction")]
    pub predicted_class: String,

    /// Probability of `predicted_class` (0.0 to 1.0)
    pub top_confidence: f64,

    /// Per-class probabilities; neither sorted nor guaranteed to sum to 1
    #[serde(rename = "probs")]
    pub class_probabilities: BTreeMap<String, f64>,

    /// Base64 JPEG Grad-CAM overlay, absent when no explanation is available
    #[serde(rename = "heatmap", default, skip_serializing_if = "Option::is_none")]
    pub heatmap_image: Option<String>,

    /// Uploaded filename echoed back for report naming
    #[serde(rename = "filename", default, skip_serializing_if = "Option::is_none")]
    pub source_filename: Option<String>,
}

impl PredictionResult {
    /// Check the semantic constraints serde cannot express
    pub fn validate(&self) -> Result<(), String> {
        if self.predicted_class.trim().is_empty() {
            return Err("prediction label is empty".to_string());
        }

        if !is_probability(self.top_confidence) {
            return Err(format!(
                "top_confidence {} is outside [0, 1]",
                self.top_confidence
            ));
        }

        if let Some((label, value)) = self
            .class_probabilities
            .iter()
            .find(|(_, v)| !is_probability(**v))
        {
            return Err(format!("probability for {label} ({value}) is outside [0, 1]"));
        }

        Ok(())
    }

    /// Heatmap payload, treating an empty string as absent
    pub fn heatmap(&self) -> Option<&str> {
        self.heatmap_image.as_deref().filter(|h| !h.is_empty())
    }
}

fn is_probability(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

/// JSON body of a report request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    /// Original image as a data URI
    pub original_image: String,
    /// Heatmap as a `data:image/jpeg;base64,` URI, or null
    pub heatmap: Option<String>,
    pub filename: String,
    pub prediction: String,
    pub top_confidence: f64,
}

impl ReportPayload {
    /// Combine the original preview with a stored result
    pub fn new(original_image: &str, result: &PredictionResult) -> Self {
        Self {
            original_image: original_image.to_string(),
            heatmap: result
                .heatmap()
                .map(|h| format!("data:image/jpeg;base64,{h}")),
            filename: result
                .source_filename
                .clone()
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| DEFAULT_REPORT_FILENAME.to_string()),
            prediction: result.predicted_class.clone(),
            top_confidence: result.top_confidence,
        }
    }
}

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// "healthy", "degraded", ...
    #[serde(default = "unknown_status")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_loaded: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradcam_enabled: Option<bool>,
    /// Any further fields the backend reports
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn unknown_status() -> String {
    "unknown".to_string()
}

/// Error body returned with non-2xx responses
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}
