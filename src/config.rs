use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};

/// Every tunable of the monitoring engine, with defaults matching the
/// behavior the thresholds were originally tuned against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Accepted samples required before calibration finalizes.
    pub calibration_samples: usize,
    /// Minimum mean landmark visibility for a frame to count at all.
    pub confidence_threshold: f64,
    /// Subtracted from the calibration percentile to get the live threshold.
    pub threshold_buffer: f64,
    /// Calibration samples farther than this (degrees) from the collection
    /// median are discarded as mis-tracked frames.
    pub outlier_deviation: f64,
    /// Percentile of the filtered calibration sample used as the threshold.
    pub threshold_percentile: f64,
    /// Survivors required after outlier filtering; below this the fallback
    /// thresholds are used instead of trusting a tiny sample.
    pub min_filtered_samples: usize,
    pub fallback_shoulder_threshold: f64,
    pub fallback_neck_threshold: f64,
    /// Fixed allowance (degrees of deviation from 90°) for torso lean.
    pub lean_threshold: f64,

    /// Margin below the threshold before a frame's shoulder/neck flag trips.
    pub angle_margin: f64,
    /// Margin above the lean threshold before the lean flag trips.
    pub lean_margin: f64,
    /// Frames of history kept in the verdict window.
    pub window_size: usize,
    /// Bad frames within the window that make the verdict "sustained".
    pub bad_frame_trigger: usize,
    /// A flagged dimension must deviate from its threshold by more than this
    /// percentage to be named as a cause in the alert text.
    pub min_deviation_pct: f64,

    pub alert_cooldown_secs: u64,
    pub positive_feedback_secs: u64,
    pub notification_timeout_secs: u64,

    pub work_interval_secs: u64,
    pub break_duration_secs: u64,

    /// Proxy constants for the inter-eye distance estimate. Uncalibrated;
    /// treat as tunables, not physical units.
    pub known_face_width: f64,
    pub focal_length: f64,
    /// Below this estimated distance the user is warned they sit too close.
    pub distance_close_bound: f64,
    pub distance_far_bound: f64,

    /// Chime played alongside alerts; a missing file is a silent no-op.
    pub sound_clip: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            calibration_samples: 50,
            confidence_threshold: 0.6,
            threshold_buffer: 3.0,
            outlier_deviation: 20.0,
            threshold_percentile: 25.0,
            min_filtered_samples: 5,
            fallback_shoulder_threshold: 160.0,
            fallback_neck_threshold: 100.0,
            lean_threshold: 15.0,
            angle_margin: 3.0,
            lean_margin: 2.0,
            window_size: 15,
            bad_frame_trigger: 4,
            min_deviation_pct: 5.0,
            alert_cooldown_secs: 10,
            positive_feedback_secs: 120,
            notification_timeout_secs: 5,
            work_interval_secs: 20 * 60,
            break_duration_secs: 5 * 60,
            known_face_width: 14.0,
            focal_length: 600.0,
            distance_close_bound: 70.0,
            distance_far_bound: 120.0,
            sound_clip: None,
        }
    }
}

impl MonitorConfig {
    /// Load from a JSON file, falling back to defaults when it is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    pub fn alert_cooldown(&self) -> Duration {
        Duration::from_secs(self.alert_cooldown_secs)
    }

    pub fn positive_feedback_interval(&self) -> Duration {
        Duration::from_secs(self.positive_feedback_secs)
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_secs(self.notification_timeout_secs)
    }

    pub fn work_interval(&self) -> Duration {
        Duration::from_secs(self.work_interval_secs)
    }

    pub fn break_duration(&self) -> Duration {
        Duration::from_secs(self.break_duration_secs)
    }
}
