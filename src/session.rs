// src/session.rs
//
// Per-person posture state machine. One TrackingSession is constructed per
// observation stream and owns all mutable tracking state: the per-person
// state table and the list of intervals closed so far. A posture interval
// only materializes when the label changes (or at finalization); unchanged
// ticks accumulate silently in the table.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use chrono::{Local, TimeZone};
use tracing::{debug, info};

use crate::classifier::{classify, PoseLabel};
use crate::geometry::joint_angle;
use crate::types::{EntityObservation, IntervalRecord};

// COCO keypoint indices read by the posture angle.
const LEFT_SHOULDER: usize = 5;
const LEFT_HIP: usize = 11;
const LEFT_KNEE: usize = 13;

#[derive(Debug, Clone, Copy)]
struct EntityState {
    label: PoseLabel,
    /// Epoch seconds of the tick on which the current label was entered.
    entered_at: f64,
}

/// Why one person's observation was ignored on one tick. A skip leaves the
/// person's state entry untouched and never affects other people in the
/// same frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The tracker exported fewer keypoints than the posture angle needs.
    MissingKeypoints { got: usize },
    /// A required keypoint carries a NaN or infinite coordinate.
    NonFiniteKeypoint { index: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKeypoints { got } => {
                write!(f, "only {got} keypoint(s), need index {LEFT_KNEE}")
            }
            Self::NonFiniteKeypoint { index } => {
                write!(f, "non-finite coordinate at keypoint {index}")
            }
        }
    }
}

/// Result of evaluating one person on one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObservationOutcome {
    /// First sighting of this person; a state entry was opened.
    Entered(PoseLabel),
    /// Same label as before; nothing emitted.
    Unchanged(PoseLabel),
    /// Label changed; the previous interval was closed.
    Transitioned { from: PoseLabel, to: PoseLabel },
    Skipped(SkipReason),
}

/// Per-tick aggregate returned to the replay loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickSummary {
    pub observed: usize,
    pub skipped: usize,
    pub transitions: usize,
}

pub struct TrackingSession {
    standing_threshold_deg: f64,
    states: HashMap<i64, EntityState>,
    closed: Vec<IntervalRecord>,
}

impl TrackingSession {
    pub fn new(standing_threshold_deg: f64) -> Self {
        Self {
            standing_threshold_deg,
            states: HashMap::new(),
            closed: Vec::new(),
        }
    }

    /// Evaluate every person observed on this tick. `now` is the frame's
    /// capture time in epoch seconds and must not decrease across ticks.
    pub fn process_tick(&mut self, entities: &[EntityObservation], now: f64) -> TickSummary {
        let mut summary = TickSummary::default();

        for obs in entities {
            match self.observe(obs, now) {
                ObservationOutcome::Entered(label) => {
                    summary.observed += 1;
                    debug!("Person {} entered as {}", obs.id, label.as_str());
                }
                ObservationOutcome::Unchanged(_) => summary.observed += 1,
                ObservationOutcome::Transitioned { from, to } => {
                    summary.observed += 1;
                    summary.transitions += 1;
                    info!("🔀 Person {}: {} → {}", obs.id, from.as_str(), to.as_str());
                }
                ObservationOutcome::Skipped(reason) => {
                    summary.skipped += 1;
                    debug!("Person {} skipped this tick: {}", obs.id, reason);
                }
            }
        }

        summary
    }

    fn observe(&mut self, obs: &EntityObservation, now: f64) -> ObservationOutcome {
        let angle = match posture_angle(&obs.keypoints) {
            Ok(angle) => angle,
            Err(reason) => return ObservationOutcome::Skipped(reason),
        };
        let label = classify(angle, self.standing_threshold_deg);

        match self.states.entry(obs.id) {
            Entry::Vacant(slot) => {
                slot.insert(EntityState {
                    label,
                    entered_at: now,
                });
                ObservationOutcome::Entered(label)
            }
            Entry::Occupied(mut slot) => {
                let state = slot.get_mut();
                if state.label == label {
                    return ObservationOutcome::Unchanged(label);
                }
                let from = state.label;
                self.closed
                    .push(close_interval(obs.id, from, state.entered_at, now));
                state.label = label;
                state.entered_at = now;
                ObservationOutcome::Transitioned { from, to: label }
            }
        }
    }

    /// Force-close every still-open interval at stream end and hand back
    /// the full list of intervals in emission order. Consuming `self`
    /// guarantees each open interval is closed exactly once.
    pub fn finalize(mut self, now: f64) -> Vec<IntervalRecord> {
        let mut open: Vec<(i64, EntityState)> = self.states.drain().collect();
        open.sort_by_key(|(id, _)| *id);

        for (id, state) in open {
            debug!(
                "Closing open {} interval for person {} at stream end",
                state.label.as_str(),
                id
            );
            self.closed
                .push(close_interval(id, state.label, state.entered_at, now));
        }

        self.closed
    }

    /// Distinct persons seen so far. Entries are never removed during a
    /// run, so this is a lifetime count.
    pub fn entity_count(&self) -> usize {
        self.states.len()
    }

    /// Persons currently holding `label`.
    pub fn label_count(&self, label: PoseLabel) -> usize {
        self.states.values().filter(|s| s.label == label).count()
    }

    pub fn closed_count(&self) -> usize {
        self.closed.len()
    }
}

/// Shoulder–hip–knee angle from a tracker keypoint set.
fn posture_angle(keypoints: &[[f64; 2]]) -> Result<f64, SkipReason> {
    let mut joints = [[0.0; 2]; 3];
    for (slot, index) in joints.iter_mut().zip([LEFT_SHOULDER, LEFT_HIP, LEFT_KNEE]) {
        let point = keypoints.get(index).ok_or(SkipReason::MissingKeypoints {
            got: keypoints.len(),
        })?;
        if !point[0].is_finite() || !point[1].is_finite() {
            return Err(SkipReason::NonFiniteKeypoint { index });
        }
        *slot = *point;
    }
    let [shoulder, hip, knee] = joints;
    Ok(joint_angle(shoulder, hip, knee))
}

fn close_interval(id: i64, label: PoseLabel, entered_at: f64, now: f64) -> IntervalRecord {
    IntervalRecord {
        person_id: id,
        position: label,
        duration_sec: round2(now - entered_at),
        start: format_timestamp(entered_at),
        end: format_timestamp(now),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// ctime-style local timestamp, e.g. `Thu Aug  7 12:34:56 2026`.
fn format_timestamp(epoch_secs: f64) -> String {
    let secs = epoch_secs.floor() as i64;
    let nanos = (((epoch_secs - secs as f64) * 1e9) as u32).min(999_999_999);
    match Local.timestamp_opt(secs, nanos) {
        chrono::LocalResult::Single(dt) => dt.format("%a %b %e %H:%M:%S %Y").to_string(),
        _ => format!("{epoch_secs:.3}"),
    }
}

// ============================================================================
// TESTS
// ============================================================================
