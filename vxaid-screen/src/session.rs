//! Screening session
//!
//! Coordinates one screening: image intake, the classify call, result
//! storage and report generation.
//!
//! **State machine:**
//! IDLE → IMAGE_READY → PREDICTING → RESULT_READY → REPORT_GENERATING → RESULT_READY
//!
//! - PREDICTING falls back to IMAGE_READY when classify fails.
//! - `remove_image` returns to IDLE from any state.
//! - At most one backend request is in flight; a trigger while one is running
//!   is skipped rather than queued.
//! - Every selection or removal bumps a generation counter. A response is only
//!   applied if the generation it was issued under is still current.
//!
//! Failures never escape as errors: they become a [`Notice`], are stored as
//! the session's last notice, and are published on the event bus.

use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;
use vxaid_common::config::DEFAULT_MAX_UPLOAD_BYTES;
use vxaid_common::events::{EventBus, ScreeningEvent};

use crate::client::{ClientError, ScreeningBackend};
use crate::intake::{self, ImageCandidate, IntakeError, SelectedImage};
use crate::models::{PredictionResult, ReportPayload};
use crate::presentation::ResultPane;
use crate::report::{ReportError, ReportWriter};

pub const PREDICT_UNREACHABLE: &str = "Prediction failed. Backend not reachable.";
pub const REPORT_UNREACHABLE: &str = "Report generation failed. Backend not reachable.";
pub const RUN_PREDICTION_FIRST: &str = "Run prediction first";
const UNEXPECTED_RESPONSE: &str = "Unexpected response from backend.";

/// Observable session state, derived from what the session holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScreeningState {
    /// No image selected
    Idle,
    /// Image selected, no result
    ImageReady,
    /// Classify call in flight
    Predicting,
    /// Result present
    ResultReady,
    /// Report call in flight, result still present
    ReportGenerating,
}

/// Request currently owning the loading flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Classify,
    Report,
}

/// Category of a user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoticeKind {
    /// Bad file type, empty or unreadable file
    Validation,
    /// Backend answered with a failure
    RequestFailed,
    /// Backend did not answer
    NetworkUnreachable,
    /// Action not possible yet (e.g. report before prediction)
    Precondition,
    /// Report could not be written to disk
    SaveFailed,
}

/// Message for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Map a backend error; `unreachable` is shown when there was no response
    fn from_client_error(err: &ClientError, unreachable: &str) -> Self {
        match err {
            ClientError::RequestFailed { message, .. } => {
                Notice::new(NoticeKind::RequestFailed, message.clone())
            }
            ClientError::NetworkUnreachable(_) => {
                Notice::new(NoticeKind::NetworkUnreachable, unreachable)
            }
            ClientError::MalformedResponse(_) => {
                Notice::new(NoticeKind::RequestFailed, UNEXPECTED_RESPONSE)
            }
            ClientError::InvalidRequest(detail) | ClientError::InvalidBaseUrl(detail) => {
                Notice::new(NoticeKind::RequestFailed, detail.clone())
            }
        }
    }
}

/// Why a trigger did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No image selected
    NoImage,
    /// Another request is in flight
    Busy,
}

/// Result of [`ScreeningSession::select_image`]
#[derive(Debug, Clone, PartialEq)]
pub enum SelectOutcome {
    /// Image adopted; any previous image and result are gone
    Selected(SelectedImage),
    /// File refused; the current selection is untouched
    Rejected(Notice),
    /// A later selection or a removal landed while this file was being read
    Superseded,
}

impl SelectOutcome {
    pub fn selected(self) -> Option<SelectedImage> {
        match self {
            SelectOutcome::Selected(image) => Some(image),
            _ => None,
        }
    }

    pub fn rejection(self) -> Option<Notice> {
        match self {
            SelectOutcome::Rejected(notice) => Some(notice),
            _ => None,
        }
    }
}

/// Result of [`ScreeningSession::predict`]
#[derive(Debug, Clone, PartialEq)]
pub enum PredictOutcome {
    /// Result stored and ready to present
    Completed(PredictionResult),
    /// Classify failed; the image is kept for a retry
    Failed(Notice),
    /// Nothing was sent
    Skipped(SkipReason),
    /// The image was removed or replaced before the response arrived
    Superseded,
}

/// Result of [`ScreeningSession::generate_report`]
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    /// Report written to this path
    Saved(PathBuf),
    /// Report not produced; includes the "run prediction first" precondition
    Failed(Notice),
    /// Nothing was sent
    Skipped(SkipReason),
    /// The image was removed or replaced before the response arrived
    Superseded,
}

#[derive(Debug, Default)]
struct SessionInner {
    image: Option<SelectedImage>,
    result: Option<PredictionResult>,
    in_flight: Option<Operation>,
    generation: u64,
    last_notice: Option<Notice>,
    /// Last ticket handed to a selection
    selection_issued: u64,
    /// Selections holding a lower ticket are stale
    selection_floor: u64,
}

impl SessionInner {
    fn state(&self) -> ScreeningState {
        match (&self.image, self.in_flight, &self.result) {
            (None, _, _) => ScreeningState::Idle,
            (Some(_), Some(Operation::Classify), _) => ScreeningState::Predicting,
            (Some(_), Some(Operation::Report), _) => ScreeningState::ReportGenerating,
            (Some(_), None, Some(_)) => ScreeningState::ResultReady,
            (Some(_), None, None) => ScreeningState::ImageReady,
        }
    }
}

/// Holds the loading flag for one request
///
/// Dropping it without [`InFlight::finish`] (the request future was abandoned)
/// still clears the flag, so an abandoned request cannot lock the session.
struct InFlight<'a> {
    inner: &'a Mutex<SessionInner>,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn new(inner: &'a Mutex<SessionInner>) -> Self {
        Self { inner, armed: true }
    }

    fn finish(mut self, inner: &mut SessionInner) {
        inner.in_flight = None;
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("Request abandoned before completion, clearing loading flag");
            lock(self.inner).in_flight = None;
        }
    }
}

fn lock(inner: &Mutex<SessionInner>) -> MutexGuard<'_, SessionInner> {
    inner
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One screening session against a backend
pub struct ScreeningSession<B: ScreeningBackend> {
    session_id: Uuid,
    backend: B,
    writer: ReportWriter,
    max_upload_bytes: u64,
    event_bus: EventBus,
    inner: Mutex<SessionInner>,
}

impl<B: ScreeningBackend> ScreeningSession<B> {
    pub fn new(backend: B, writer: ReportWriter, event_bus: EventBus) -> Self {
        let session_id = Uuid::new_v4();
        debug!(session_id = %session_id, "Screening session created");
        Self {
            session_id,
            backend,
            writer,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            event_bus,
            inner: Mutex::new(SessionInner::default()),
        }
    }

    /// Override the upload size limit
    pub fn with_max_upload_bytes(mut self, max_upload_bytes: u64) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn state(&self) -> ScreeningState {
        lock(&self.inner).state()
    }

    /// True while a classify or report request is in flight
    pub fn is_loading(&self) -> bool {
        lock(&self.inner).in_flight.is_some()
    }

    pub fn selected_image(&self) -> Option<SelectedImage> {
        lock(&self.inner).image.clone()
    }

    /// Data-URI preview of the selected image
    pub fn preview(&self) -> Option<String> {
        lock(&self.inner)
            .image
            .as_ref()
            .map(|i| i.preview_data_uri().to_string())
    }

    pub fn result(&self) -> Option<PredictionResult> {
        lock(&self.inner).result.clone()
    }

    pub fn last_notice(&self) -> Option<Notice> {
        lock(&self.inner).last_notice.clone()
    }

    pub fn generation(&self) -> u64 {
        lock(&self.inner).generation
    }

    /// Result pane for the current state
    pub fn result_pane(&self) -> ResultPane {
        ResultPane::from_result(lock(&self.inner).result.as_ref())
    }

    /// Validate and adopt a new image
    ///
    /// On rejection the current selection is left as it was. On acceptance
    /// the previous image and any result are replaced. When selections
    /// overlap, only the most recently started one can be adopted.
    pub async fn select_image(&self, candidate: ImageCandidate) -> SelectOutcome {
        let ticket = self.issue_selection_ticket();
        let filename = candidate.filename().to_string();
        let accepted = intake::accept(candidate, self.max_upload_bytes).await;
        self.settle_selection(ticket, filename, accepted)
    }

    /// Read an image file from disk and select it
    ///
    /// A file that cannot be read is rejected like any other invalid file.
    pub async fn select_path(&self, path: &Path) -> SelectOutcome {
        let ticket = self.issue_selection_ticket();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let accepted = match ImageCandidate::from_path(path).await {
            Ok(candidate) => intake::accept(candidate, self.max_upload_bytes).await,
            Err(err) => Err(err),
        };
        self.settle_selection(ticket, filename, accepted)
    }

    fn issue_selection_ticket(&self) -> u64 {
        let mut inner = lock(&self.inner);
        inner.selection_issued += 1;
        inner.selection_issued
    }

    fn settle_selection(
        &self,
        ticket: u64,
        filename: String,
        accepted: Result<SelectedImage, IntakeError>,
    ) -> SelectOutcome {
        let mut inner = lock(&self.inner);
        if ticket < inner.selection_floor {
            debug!(
                filename = %filename,
                ticket,
                floor = inner.selection_floor,
                "Selection overtaken by a later one"
            );
            return SelectOutcome::Superseded;
        }

        let image = match accepted {
            Ok(image) => image,
            Err(err) => {
                let notice = Notice::new(NoticeKind::Validation, err.user_message());
                info!(filename = %filename, reason = %err, "Image rejected");
                inner.last_notice = Some(notice.clone());
                drop(inner);
                self.event_bus.emit_lossy(ScreeningEvent::ImageRejected {
                    session_id: self.session_id,
                    filename,
                    reason: notice.message.clone(),
                    timestamp: Utc::now(),
                });
                return SelectOutcome::Rejected(notice);
            }
        };

        inner.selection_floor = ticket + 1;
        inner.generation += 1;
        inner.image = Some(image.clone());
        inner.result = None;
        inner.last_notice = None;
        info!(
            filename = %image.filename(),
            mime = %image.mime_type(),
            size = image.size_bytes(),
            generation = inner.generation,
            "Image selected"
        );
        drop(inner);

        self.event_bus.emit_lossy(ScreeningEvent::ImageSelected {
            session_id: self.session_id,
            filename: image.filename().to_string(),
            mime_type: image.mime_type().to_string(),
            size_bytes: image.size_bytes(),
            timestamp: Utc::now(),
        });

        SelectOutcome::Selected(image)
    }

    /// Clear image, preview and result
    ///
    /// Returns false (and changes nothing) when there was nothing to clear.
    /// A request still in flight keeps the loading flag until it returns;
    /// its response is then discarded.
    pub fn remove_image(&self) -> bool {
        {
            let mut inner = lock(&self.inner);
            inner.selection_floor = inner.selection_issued + 1;
            if inner.image.is_none() && inner.result.is_none() {
                return false;
            }
            inner.generation += 1;
            inner.image = None;
            inner.result = None;
            inner.last_notice = None;
            info!(generation = inner.generation, "Image removed");
        }

        self.event_bus.emit_lossy(ScreeningEvent::ImageRemoved {
            session_id: self.session_id,
            timestamp: Utc::now(),
        });
        true
    }

    /// Run the classify call for the selected image
    pub async fn predict(&self) -> PredictOutcome {
        let (image, generation) = {
            let mut inner = lock(&self.inner);
            if inner.in_flight.is_some() {
                debug!("Predict ignored: request in flight");
                return PredictOutcome::Skipped(SkipReason::Busy);
            }
            let Some(image) = inner.image.clone() else {
                debug!("Predict ignored: no image selected");
                return PredictOutcome::Skipped(SkipReason::NoImage);
            };
            inner.in_flight = Some(Operation::Classify);
            inner.result = None;
            (image, inner.generation)
        };
        let in_flight = InFlight::new(&self.inner);

        self.event_bus.emit_lossy(ScreeningEvent::PredictionStarted {
            session_id: self.session_id,
            generation,
            timestamp: Utc::now(),
        });

        let response = self.backend.classify(&image).await;

        let outcome = {
            let mut inner = lock(&self.inner);
            in_flight.finish(&mut inner);

            if inner.generation != generation {
                let current = inner.generation;
                drop(inner);
                self.discard(generation, current);
                return PredictOutcome::Superseded;
            }

            match response {
                Ok(result) => {
                    inner.result = Some(result.clone());
                    inner.last_notice = None;
                    PredictOutcome::Completed(result)
                }
                Err(err) => {
                    let notice = Notice::from_client_error(&err, PREDICT_UNREACHABLE);
                    warn!(error = %err, "Prediction failed");
                    inner.last_notice = Some(notice.clone());
                    PredictOutcome::Failed(notice)
                }
            }
        };

        match &outcome {
            PredictOutcome::Completed(result) => {
                self.event_bus.emit_lossy(ScreeningEvent::PredictionCompleted {
                    session_id: self.session_id,
                    generation,
                    prediction: result.predicted_class.clone(),
                    top_confidence: result.top_confidence,
                    timestamp: Utc::now(),
                });
            }
            PredictOutcome::Failed(notice) => {
                self.event_bus.emit_lossy(ScreeningEvent::PredictionFailed {
                    session_id: self.session_id,
                    generation,
                    message: notice.message.clone(),
                    timestamp: Utc::now(),
                });
            }
            PredictOutcome::Skipped(_) | PredictOutcome::Superseded => {}
        }

        outcome
    }

    /// Request a report for the stored result and save it
    pub async fn generate_report(&self) -> ReportOutcome {
        let (payload, generation) = {
            let mut inner = lock(&self.inner);
            if inner.in_flight.is_some() {
                debug!("Report ignored: request in flight");
                return ReportOutcome::Skipped(SkipReason::Busy);
            }
            let payload = match (&inner.image, &inner.result) {
                (Some(image), Some(result)) => {
                    ReportPayload::new(image.preview_data_uri(), result)
                }
                _ => {
                    let notice = Notice::new(NoticeKind::Precondition, RUN_PREDICTION_FIRST);
                    inner.last_notice = Some(notice.clone());
                    return ReportOutcome::Failed(notice);
                }
            };
            inner.in_flight = Some(Operation::Report);
            (payload, inner.generation)
        };
        let in_flight = InFlight::new(&self.inner);

        let response = self.backend.generate_report(&payload).await;

        let current = self.generation();
        if current != generation {
            in_flight.finish(&mut lock(&self.inner));
            self.discard(generation, current);
            return ReportOutcome::Superseded;
        }

        let saved = match response {
            Ok(bytes) => match self.writer.save(&bytes).await {
                Ok(path) => Ok((path, bytes.len())),
                Err(err) => Err(save_notice(&err)),
            },
            Err(err) => {
                warn!(error = %err, "Report generation failed");
                Err(Notice::from_client_error(&err, REPORT_UNREACHABLE))
            }
        };

        self.settle_report(in_flight, generation, saved).await
    }

    /// Apply a finished report request, unless the image changed meanwhile
    ///
    /// A report saved for an image that is no longer selected is deleted again.
    async fn settle_report(
        &self,
        in_flight: InFlight<'_>,
        generation: u64,
        saved: Result<(PathBuf, usize), Notice>,
    ) -> ReportOutcome {
        let current = {
            let mut inner = lock(&self.inner);
            in_flight.finish(&mut inner);
            if inner.generation == generation {
                inner.last_notice = saved.as_ref().err().cloned();
            }
            inner.generation
        };

        if current != generation {
            if let Ok((path, _)) = &saved {
                if let Err(err) = self.writer.remove(path).await {
                    warn!(error = %err, "Could not remove report for a replaced image");
                }
            }
            self.discard(generation, current);
            return ReportOutcome::Superseded;
        }

        match saved {
            Ok((path, size)) => {
                self.event_bus.emit_lossy(ScreeningEvent::ReportSaved {
                    session_id: self.session_id,
                    path: path.clone(),
                    size_bytes: size as u64,
                    timestamp: Utc::now(),
                });
                ReportOutcome::Saved(path)
            }
            Err(notice) => {
                self.event_bus.emit_lossy(ScreeningEvent::ReportFailed {
                    session_id: self.session_id,
                    message: notice.message.clone(),
                    timestamp: Utc::now(),
                });
                ReportOutcome::Failed(notice)
            }
        }
    }

    fn discard(&self, generation: u64, current_generation: u64) {
        info!(
            generation,
            current_generation, "Discarding response for a replaced image"
        );
        self.event_bus.emit_lossy(ScreeningEvent::ResponseDiscarded {
            session_id: self.session_id,
            generation,
            current_generation,
            timestamp: Utc::now(),
        });
    }
}

fn save_notice(err: &ReportError) -> Notice {
    warn!(error = %err, "Saving report failed");
    Notice::new(NoticeKind::SaveFailed, err.to_string())
}
