// src/classifier.rs

use serde::{Deserialize, Serialize};

/// Discrete posture label. Serialized form is the persisted `Position`
/// string ("Standing" / "Sitting").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoseLabel {
    Standing,
    Sitting,
}

impl PoseLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standing => "Standing",
            Self::Sitting => "Sitting",
        }
    }
}

/// Map a shoulder–hip–knee angle to a posture label.
///
/// Strictly greater than the threshold is standing; an angle exactly at
/// the threshold is sitting.
pub fn classify(angle_deg: f64, standing_threshold_deg: f64) -> PoseLabel {
    if angle_deg > standing_threshold_deg {
        PoseLabel::Standing
    } else {
        PoseLabel::Sitting
    }
}
