//! Display formatting helpers

/// Format a fractional probability as a one-decimal percentage.
///
/// `Some(0.1234)` renders as `"12.3%"`. A missing or non-finite value renders
/// as `"0.0%"` rather than failing, so partially populated results still display.
pub fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.1}%", v * 100.0),
        _ => "0.0%".to_string(),
    }
}
