use log::{debug, info};

use crate::config::MonitorConfig;
use crate::geometry::FeatureSample;

/// Per-user thresholds frozen at the end of calibration. Read-only for the
/// rest of the session.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationBaseline {
    pub shoulder_threshold: f64,
    pub neck_threshold: f64,
    pub lean_threshold: f64,
    pub sample_count: usize,
}

/// Outcome of offering one frame's features to the calibration engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Sample passed the plausibility gates and was recorded.
    Accepted,
    /// Low confidence or implausible angles; nothing recorded.
    Rejected,
    /// Calibration already finished; the sample was ignored.
    AlreadyComplete,
}

/// Accumulates a bounded warm-up sample of posture features and derives the
/// session baseline once enough frames have been accepted.
///
/// Thresholds come from a low percentile of the observed distribution rather
/// than fixed absolute angles, so sensitivity adapts to each person's natural
/// resting posture. Outlier rejection against the median keeps a handful of
/// mis-tracked frames from skewing the whole session.
pub struct CalibrationEngine {
    shoulder_angles: Vec<f64>,
    neck_angles: Vec<f64>,
    lean_angles: Vec<f64>,
    target: usize,
    complete: bool,
}

impl CalibrationEngine {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            shoulder_angles: Vec::with_capacity(config.calibration_samples),
            neck_angles: Vec::with_capacity(config.calibration_samples),
            lean_angles: Vec::with_capacity(config.calibration_samples),
            target: config.calibration_samples,
            complete: false,
        }
    }

    pub fn ingest(&mut self, sample: &FeatureSample, config: &MonitorConfig) -> IngestOutcome {
        if self.complete {
            return IngestOutcome::AlreadyComplete;
        }

        let (shoulder, neck, lean) = match (
            sample.shoulder_angle,
            sample.neck_angle,
            sample.lean_angle,
        ) {
            (Some(s), Some(n), Some(l)) => (s, n, l),
            _ => return IngestOutcome::Rejected,
        };

        let plausible = |angle: f64| angle > 0.0 && angle < 180.0;
        if sample.confidence < config.confidence_threshold
            || !plausible(shoulder)
            || !plausible(neck)
            || !plausible(lean)
        {
            return IngestOutcome::Rejected;
        }

        self.shoulder_angles.push(shoulder);
        self.neck_angles.push(neck);
        self.lean_angles.push(lean);

        if self.shoulder_angles.len() % 10 == 0 {
            debug!(
                "calibration progress: {}/{}",
                self.shoulder_angles.len(),
                self.target
            );
        }

        IngestOutcome::Accepted
    }

    /// (collected, target), for rendering a progress indicator.
    pub fn progress(&self) -> (usize, usize) {
        (self.shoulder_angles.len(), self.target)
    }

    pub fn ready(&self) -> bool {
        !self.complete && self.shoulder_angles.len() >= self.target
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Freeze the baseline. Call once after `ready()` turns true.
    pub fn finalize(&mut self, config: &MonitorConfig) -> CalibrationBaseline {
        let sample_count = self.shoulder_angles.len();

        let shoulder_threshold = derive_threshold(
            &self.shoulder_angles,
            config,
            config.fallback_shoulder_threshold,
        );
        let neck_threshold =
            derive_threshold(&self.neck_angles, config, config.fallback_neck_threshold);

        self.complete = true;
        info!(
            "calibration complete: shoulder {:.1}, neck {:.1}, lean {:.1} ({} samples)",
            shoulder_threshold, neck_threshold, config.lean_threshold, sample_count
        );

        CalibrationBaseline {
            shoulder_threshold,
            neck_threshold,
            // Fixed allowance, not derived from data: lean is judged as
            // deviation from 90° rather than against a resting angle.
            lean_threshold: config.lean_threshold,
            sample_count,
        }
    }
}

/// Percentile threshold with outlier rejection, or the conservative fallback
/// when too few samples survive filtering.
fn derive_threshold(angles: &[f64], config: &MonitorConfig, fallback: f64) -> f64 {
    if angles.is_empty() {
        return fallback;
    }
    let med = median(angles);
    let filtered: Vec<f64> = angles
        .iter()
        .copied()
        .filter(|a| (a - med).abs() < config.outlier_deviation)
        .collect();

    if filtered.len() < config.min_filtered_samples {
        debug!(
            "only {} samples survived outlier filtering, using fallback threshold {fallback}",
            filtered.len()
        );
        return fallback;
    }

    percentile(&filtered, config.threshold_percentile) - config.threshold_buffer
}

fn median(values: &[f64]) -> f64 {
    percentile(values, 50.0)
}

/// Linearly interpolated percentile of an unsorted, non-empty slice.
fn percentile(values: &[f64], pct: f64) -> f64 {
    debug_assert!(!values.is_empty());
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("angle values are finite"));

    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = rank - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}
