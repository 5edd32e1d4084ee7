use serde::{Deserialize, Serialize};

use crate::classifier::PoseLabel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub input: InputConfig,
    pub tracking: TrackingConfig,
    pub history: HistoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub observations_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Hip angle (shoulder–hip–knee, degrees) above which a person counts
    /// as standing. Ties go to sitting.
    pub standing_threshold_deg: f64,
    /// Emit a progress log line every N ticks.
    pub progress_interval_ticks: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            standing_threshold_deg: 145.0,
            progress_interval_ticks: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// One entity in one frame, as exported by the external detector/tracker.
/// Keypoints use COCO indexing; only shoulder/hip/knee are read here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityObservation {
    pub id: i64,
    pub keypoints: Vec<[f64; 2]>,
}

/// One tick of the observation stream: everything the tracker saw in one
/// frame, stamped with the frame's capture time (epoch seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseFrame {
    pub timestamp: f64,
    pub entities: Vec<EntityObservation>,
}

/// A closed posture interval. Immutable once created; field names are the
/// persisted file layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalRecord {
    #[serde(rename = "PersonID")]
    pub person_id: i64,
    #[serde(rename = "Position")]
    pub position: PoseLabel,
    #[serde(rename = "Duration_sec")]
    pub duration_sec: f64,
    #[serde(rename = "Start")]
    pub start: String,
    #[serde(rename = "End")]
    pub end: String,
}
