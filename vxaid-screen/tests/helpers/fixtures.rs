//! Test fixtures: image bytes and backend bodies

use serde_json::{json, Value};
use vxaid_screen::ImageCandidate;

/// Minimal PNG-signature content
pub fn fundus_png() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend((0u8..56).map(|b| b.wrapping_mul(7)));
    bytes
}

pub fn fundus_candidate() -> ImageCandidate {
    ImageCandidate::from_bytes("fundus.png", Some("image/png".to_string()), fundus_png())
}

/// Successful `/predict` body as the backend sends it
pub fn glaucoma_body() -> Value {
    json!({
        "success": true,
        "prediction": "Glaucoma",
        "top_confidence": 0.72,
        "probs": {"AMD": 0.03, "DR": 0.05, "Glaucoma": 0.72, "Normal": 0.2},
        "heatmap": "SGVhdG1hcA==",
        "filename": "fundus.png"
    })
}
