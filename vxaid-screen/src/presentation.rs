//! Result presentation
//!
//! Pure views over an already fetched [`PredictionResult`]: the prediction
//! summary, the probability comparison and the heatmap panel. Each view has a
//! plain-text `Display` used by the terminal front end.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use vxaid_common::format_percent;

use crate::models::PredictionResult;
use crate::session::Notice;

/// Smallest bar width (percent) so near-zero classes stay visible
pub const MIN_BAR_WIDTH: f64 = 2.0;

/// Character cells used for a full-width text bar
const TEXT_BAR_CELLS: usize = 30;

pub const PROBABILITY_PLACEHOLDER: &str = "Prediction results will be shown here.";
pub const HEATMAP_PLACEHOLDER: &str = "Grad-CAM heatmap will appear here after prediction.";
pub const RESULT_PLACEHOLDER: &str =
    "Results will be displayed here. Upload an image and run prediction.";

/// Visual treatment of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Red,
    Teal,
    Amber,
    Emerald,
    /// Unrecognized labels
    Neutral,
}

impl Tone {
    pub fn name(&self) -> &'static str {
        match self {
            Tone::Red => "red",
            Tone::Teal => "teal",
            Tone::Amber => "amber",
            Tone::Emerald => "emerald",
            Tone::Neutral => "neutral",
        }
    }
}

/// Known fundus conditions; anything else is carried through as `Other`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Amd,
    Dr,
    Glaucoma,
    Normal,
    Other(String),
}

impl Condition {
    pub fn from_label(label: &str) -> Self {
        match label {
            "AMD" => Condition::Amd,
            "DR" => Condition::Dr,
            "Glaucoma" => Condition::Glaucoma,
            "Normal" => Condition::Normal,
            other => Condition::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Condition::Amd => "AMD",
            Condition::Dr => "DR",
            Condition::Glaucoma => "Glaucoma",
            Condition::Normal => "Normal",
            Condition::Other(label) => label,
        }
    }

    pub fn full_name(&self) -> &str {
        match self {
            Condition::Amd => "Age-Related Macular Degeneration",
            Condition::Dr => "Diabetic Retinopathy",
            Condition::Glaucoma => "Glaucoma",
            Condition::Normal => "Normal Retina",
            Condition::Other(label) => label,
        }
    }

    pub fn tone(&self) -> Tone {
        match self {
            Condition::Amd => Tone::Red,
            Condition::Dr => Tone::Teal,
            Condition::Glaucoma => Tone::Amber,
            Condition::Normal => Tone::Emerald,
            Condition::Other(_) => Tone::Neutral,
        }
    }
}

/// Whether the summary reads as reassuring or as a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    /// Emerald border: `Normal`
    Positive,
    /// Red border: any other label
    Alert,
}

/// Prediction headline with formatted confidence
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryView {
    pub condition: Condition,
    pub confidence: String,
    pub indicator: Indicator,
}

impl SummaryView {
    pub fn from_result(result: &PredictionResult) -> Self {
        let condition = Condition::from_label(&result.predicted_class);
        let indicator = if condition == Condition::Normal {
            Indicator::Positive
        } else {
            Indicator::Alert
        };

        Self {
            confidence: format_percent(Some(result.top_confidence)),
            condition,
            indicator,
        }
    }
}

impl fmt::Display for SummaryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.indicator {
            Indicator::Positive => "[ok]",
            Indicator::Alert => "[!!]",
        };
        write!(
            f,
            "{} {} ({})  Confidence {}",
            marker,
            self.condition.label(),
            self.condition.full_name(),
            self.confidence
        )
    }
}

/// One bar in the probability comparison
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityRow {
    pub condition: Condition,
    /// Probability as given, non-finite values shown as 0
    pub value: f64,
    /// Bar width in percent, at least [`MIN_BAR_WIDTH`]
    pub bar_width: f64,
    /// Formatted percentage
    pub percent: String,
}

impl ProbabilityRow {
    fn new(label: &str, raw: f64) -> Self {
        let value = if raw.is_finite() { raw } else { 0.0 };
        Self {
            condition: Condition::from_label(label),
            value,
            bar_width: bar_width(value),
            percent: format_percent(Some(value)),
        }
    }

    pub fn label(&self) -> &str {
        self.condition.label()
    }

    pub fn tone(&self) -> Tone {
        self.condition.tone()
    }
}

/// Bar width for a probability, clamped to `[MIN_BAR_WIDTH, 100]`
pub fn bar_width(value: f64) -> f64 {
    if !value.is_finite() {
        return MIN_BAR_WIDTH;
    }
    (value * 100.0).clamp(MIN_BAR_WIDTH, 100.0)
}

/// Probability comparison panel
#[derive(Debug, Clone, PartialEq)]
pub enum ProbabilityView {
    Placeholder,
    /// Sorted by descending probability, ties by label
    Rows(Vec<ProbabilityRow>),
}

impl ProbabilityView {
    pub fn from_probabilities(probabilities: Option<&BTreeMap<String, f64>>) -> Self {
        let Some(probabilities) = probabilities else {
            return ProbabilityView::Placeholder;
        };

        let mut rows: Vec<ProbabilityRow> = probabilities
            .iter()
            .map(|(label, value)| ProbabilityRow::new(label, *value))
            .collect();

        rows.sort_by(|a, b| {
            b.value
                .partial_cmp(&a.value)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.label().cmp(b.label()))
        });

        ProbabilityView::Rows(rows)
    }

    pub fn from_result(result: Option<&PredictionResult>) -> Self {
        Self::from_probabilities(result.map(|r| &r.class_probabilities))
    }
}

impl fmt::Display for ProbabilityView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = match self {
            ProbabilityView::Placeholder => return write!(f, "{PROBABILITY_PLACEHOLDER}"),
            ProbabilityView::Rows(rows) => rows,
        };

        writeln!(f, "Condition Probabilities")?;
        let label_width = rows.iter().map(|r| r.label().len()).max().unwrap_or(0);
        for row in rows {
            // ceil keeps the 2% minimum visible as at least one cell
            let filled = ((row.bar_width / 100.0) * TEXT_BAR_CELLS as f64).ceil() as usize;
            let filled = filled.min(TEXT_BAR_CELLS);
            writeln!(
                f,
                "  {:<label_width$}  {}{}  {:>6}",
                row.label(),
                "#".repeat(filled),
                ".".repeat(TEXT_BAR_CELLS - filled),
                row.percent,
            )?;
        }
        Ok(())
    }
}

/// Grad-CAM panel
#[derive(Debug, Clone, PartialEq)]
pub enum HeatmapView {
    /// Overlay ready to display
    Overlay { data_uri: String },
    /// No explanation available; not an error
    Unavailable,
}

impl HeatmapView {
    pub fn from_base64(heatmap: Option<&str>) -> Self {
        match heatmap.filter(|h| !h.is_empty()) {
            Some(h) => HeatmapView::Overlay {
                data_uri: format!("data:image/jpeg;base64,{h}"),
            },
            None => HeatmapView::Unavailable,
        }
    }

    pub fn from_result(result: Option<&PredictionResult>) -> Self {
        Self::from_base64(result.and_then(PredictionResult::heatmap))
    }
}

impl fmt::Display for HeatmapView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeatmapView::Overlay { data_uri } => write!(
                f,
                "Grad-CAM Explanation: overlay available ({} bytes encoded). \
                 Highlighted regions indicate where the model focused.",
                data_uri.len()
            ),
            HeatmapView::Unavailable => write!(f, "{HEATMAP_PLACEHOLDER}"),
        }
    }
}

/// Everything the result pane shows
#[derive(Debug, Clone, PartialEq)]
pub enum ResultPane {
    Placeholder,
    Ready {
        summary: SummaryView,
        probabilities: ProbabilityView,
        heatmap: HeatmapView,
    },
}

impl ResultPane {
    pub fn from_result(result: Option<&PredictionResult>) -> Self {
        match result {
            None => ResultPane::Placeholder,
            Some(r) => ResultPane::Ready {
                summary: SummaryView::from_result(r),
                probabilities: ProbabilityView::from_result(Some(r)),
                heatmap: HeatmapView::from_result(Some(r)),
            },
        }
    }
}

impl fmt::Display for ResultPane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultPane::Placeholder => write!(f, "{RESULT_PLACEHOLDER}"),
            ResultPane::Ready {
                summary,
                probabilities,
                heatmap,
            } => {
                writeln!(f, "Prediction Summary")?;
                writeln!(f, "  {summary}")?;
                writeln!(f)?;
                write!(f, "{probabilities}")?;
                writeln!(f)?;
                write!(f, "{heatmap}")
            }
        }
    }
}

/// Machine-readable outcome of one screening run
///
/// Absent parts are omitted, so a run that stopped at a notice serializes as
/// `{"notice": {...}}` alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScreeningOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<PredictionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}
