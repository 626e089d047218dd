//! # VisionXaid Screening Client (vxaid-screen)
//!
//! Client for the VisionXaid retinal fundus screening backend.
//!
//! **Purpose:** Submit a fundus photograph for classification (DR, Glaucoma,
//! AMD, Normal), present the predicted condition with per-class probabilities
//! and the Grad-CAM heatmap, and save the PDF report the backend renders.
//!
//! **Architecture:** [`session::ScreeningSession`] drives one screening
//! against any [`client::ScreeningBackend`]; [`client::ApiClient`] is the HTTP
//! implementation. Views in [`presentation`] are pure functions of the stored
//! result.

pub mod client;
pub mod intake;
pub mod models;
pub mod presentation;
pub mod report;
pub mod session;

pub use client::{ApiClient, ClientError, ScreeningBackend};
pub use intake::{ImageCandidate, IntakeError, SelectedImage};
pub use models::{HealthStatus, PredictionResult, ReportPayload};
pub use presentation::{ResultPane, ScreeningOutput};
pub use report::ReportWriter;
pub use session::{
    Notice, NoticeKind, PredictOutcome, ReportOutcome, ScreeningSession, ScreeningState,
    SelectOutcome, SkipReason,
};
