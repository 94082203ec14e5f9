use std::collections::VecDeque;

use crate::calibration::CalibrationBaseline;
use crate::config::MonitorConfig;
use crate::geometry::FeatureSample;

/// A posture dimension that contributed to a sustained-bad verdict and
/// deviated far enough to be worth naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostureCause {
    ShouldersHunched,
    ForwardHead,
    BodyLeaning,
}

impl PostureCause {
    pub fn phrase(&self) -> &'static str {
        match self {
            PostureCause::ShouldersHunched => "Shoulders hunched.",
            PostureCause::ForwardHead => "Forward head posture.",
            PostureCause::BodyLeaning => "Body leaning.",
        }
    }
}

/// Per-frame boolean flags against the calibrated thresholds, evaluated with
/// a margin so classification does not flip-flop right at the boundary.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameFlags {
    pub shoulder_bad: bool,
    pub neck_bad: bool,
    pub lean_bad: bool,
    shoulder_angle: f64,
    neck_angle: f64,
    lean_angle: f64,
}

impl FrameFlags {
    /// `None` when a required angle is missing this frame; the caller must
    /// treat that as insufficient signal, not as good posture.
    pub fn evaluate(
        sample: &FeatureSample,
        baseline: &CalibrationBaseline,
        config: &MonitorConfig,
    ) -> Option<Self> {
        let shoulder_angle = sample.shoulder_angle?;
        let neck_angle = sample.neck_angle?;
        let lean_angle = sample.lean_angle?;

        Some(Self {
            shoulder_bad: shoulder_angle < baseline.shoulder_threshold - config.angle_margin,
            neck_bad: neck_angle < baseline.neck_threshold - config.angle_margin,
            lean_bad: (90.0 - lean_angle).abs() > baseline.lean_threshold + config.lean_margin,
            shoulder_angle,
            neck_angle,
            lean_angle,
        })
    }

    pub fn any(&self) -> bool {
        self.shoulder_bad || self.neck_bad || self.lean_bad
    }

    /// Causes worth reporting: a flagged dimension must deviate from its
    /// threshold by more than the minimum relative percentage, so marginal
    /// crossings do not generate verbose alerts.
    pub fn causes(
        &self,
        baseline: &CalibrationBaseline,
        config: &MonitorConfig,
    ) -> Vec<PostureCause> {
        let mut causes = Vec::new();

        if self.shoulder_bad {
            let deviation_pct = (baseline.shoulder_threshold - self.shoulder_angle)
                / baseline.shoulder_threshold
                * 100.0;
            if deviation_pct > config.min_deviation_pct {
                causes.push(PostureCause::ShouldersHunched);
            }
        }

        if self.neck_bad {
            let deviation_pct =
                (baseline.neck_threshold - self.neck_angle) / baseline.neck_threshold * 100.0;
            if deviation_pct > config.min_deviation_pct {
                causes.push(PostureCause::ForwardHead);
            }
        }

        if self.lean_bad {
            let deviation = (90.0 - self.lean_angle).abs();
            if deviation > baseline.lean_threshold {
                causes.push(PostureCause::BodyLeaning);
            }
        }

        causes
    }
}

/// Smoothed classification of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ok,
    SustainedBad,
}

/// Ring buffer of the last W per-frame flags. A minority of bad frames
/// already flips the verdict (K < W): the bias is toward catching developing
/// bad posture quickly rather than waiting for majority consensus.
pub struct VerdictWindow {
    flags: VecDeque<bool>,
    capacity: usize,
    bad_trigger: usize,
}

impl VerdictWindow {
    /// Starts pre-filled with good frames so monitoring does not open with a
    /// partially-empty window.
    pub fn new(config: &MonitorConfig) -> Self {
        let mut flags = VecDeque::with_capacity(config.window_size);
        flags.extend(std::iter::repeat(false).take(config.window_size));
        Self {
            flags,
            capacity: config.window_size,
            bad_trigger: config.bad_frame_trigger,
        }
    }

    /// Record one frame's flag and return the smoothed verdict.
    pub fn observe(&mut self, bad_frame: bool) -> Verdict {
        self.flags.push_back(bad_frame);
        while self.flags.len() > self.capacity {
            self.flags.pop_front();
        }

        if self.bad_count() >= self.bad_trigger {
            Verdict::SustainedBad
        } else {
            Verdict::Ok
        }
    }

    pub fn bad_count(&self) -> usize {
        self.flags.iter().filter(|&&bad| bad).count()
    }

    /// True when not a single recent frame was bad; gates positive feedback.
    pub fn all_clear(&self) -> bool {
        self.flags.iter().all(|&bad| !bad)
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}
