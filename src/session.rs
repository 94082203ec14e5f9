use std::time::Instant;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::alerts::{AlertScheduler, DistanceZone, Dispatcher};
use crate::breaks::{BreakReminder, BreakScheduler};
use crate::calibration::{CalibrationBaseline, CalibrationEngine};
use crate::config::MonitorConfig;
use crate::geometry::{extract_features, FeatureSample};
use crate::hysteresis::{FrameFlags, PostureCause, Verdict, VerdictWindow};
use crate::landmarks::{FrameSource, LandmarkProvider, LandmarkSet};

/// How often the loop polls the frame source. Capture itself runs at the
/// device's native rate; this only paces the pull.
const FRAME_POLL_INTERVAL_MS: u64 = 33;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Calibrating,
    Monitoring,
}

/// What the landmark provider gave us this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalQuality {
    /// Landmarks present with usable confidence.
    Detected,
    /// Provider found nobody in frame.
    NoDetection,
    /// Landmarks present but below the confidence threshold, or missing a
    /// required angle; classification was skipped rather than guessed.
    Insufficient,
}

/// Everything a render layer needs to draw one frame's indicators. The
/// engine itself never draws.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub phase: SessionPhase,
    pub signal: SignalQuality,
    /// (collected, target) while calibrating.
    pub calibration_progress: Option<(usize, usize)>,
    pub verdict: Option<Verdict>,
    pub causes: Vec<PostureCause>,
    pub alert_dispatched: bool,
    pub distance_zone: Option<DistanceZone>,
    pub break_started: Option<BreakReminder>,
    pub on_break: bool,
    pub features: Option<FeatureSample>,
}

impl FrameReport {
    fn skipped(phase: SessionPhase, signal: SignalQuality, on_break: bool) -> Self {
        Self {
            phase,
            signal,
            calibration_progress: None,
            verdict: None,
            causes: Vec::new(),
            alert_dispatched: false,
            distance_zone: None,
            break_started: None,
            on_break,
            features: None,
        }
    }
}

/// All mutable session state, owned in one place and threaded through the
/// loop explicitly.
pub struct SessionState {
    pub id: String,
    pub started_at: DateTime<Utc>,
    config: MonitorConfig,
    phase: SessionPhase,
    calibration: CalibrationEngine,
    baseline: Option<CalibrationBaseline>,
    window: Option<VerdictWindow>,
    alerts: AlertScheduler,
    breaks: BreakScheduler,
}

impl SessionState {
    pub fn new(config: MonitorConfig, dispatcher: Dispatcher, now: Instant) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            phase: SessionPhase::Calibrating,
            calibration: CalibrationEngine::new(&config),
            baseline: None,
            window: None,
            alerts: AlertScheduler::new(&config, dispatcher, now),
            breaks: BreakScheduler::new(&config, now),
            config,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn baseline(&self) -> Option<&CalibrationBaseline> {
        self.baseline.as_ref()
    }

    /// Announce that monitoring has begun. Called once by the loop.
    pub fn announce_start(&self) {
        self.alerts.notify_startup();
    }

    /// Process one captured frame's detection result.
    ///
    /// Never fails: per-frame problems (no detection, low confidence) are
    /// reported, not raised. The break scheduler advances on every frame
    /// regardless of what the camera saw.
    pub fn process_frame(
        &mut self,
        detection: Option<&LandmarkSet>,
        now: Instant,
    ) -> FrameReport {
        let break_started = self.breaks.tick(now);
        if let Some(reminder) = &break_started {
            self.alerts.notify_break(reminder);
        }
        let on_break = self.breaks.on_break();

        let Some(landmarks) = detection else {
            let mut report =
                FrameReport::skipped(self.phase, SignalQuality::NoDetection, on_break);
            report.break_started = break_started;
            return report;
        };

        let features = extract_features(landmarks, &self.config);

        let mut report = match self.phase {
            SessionPhase::Calibrating => self.calibrate_frame(&features),
            SessionPhase::Monitoring => self.monitor_frame(&features, now),
        };
        report.on_break = on_break;
        report.break_started = break_started;
        report.features = Some(features);
        report
    }

    fn calibrate_frame(&mut self, features: &FeatureSample) -> FrameReport {
        self.calibration.ingest(features, &self.config);

        if self.calibration.ready() {
            let baseline = self.calibration.finalize(&self.config);
            self.baseline = Some(baseline);
            self.window = Some(VerdictWindow::new(&self.config));
            self.phase = SessionPhase::Monitoring;
            self.alerts.notify_setup_complete();
        }

        let signal = if features.confidence >= self.config.confidence_threshold {
            SignalQuality::Detected
        } else {
            SignalQuality::Insufficient
        };
        let mut report = FrameReport::skipped(self.phase, signal, false);
        report.calibration_progress = Some(self.calibration.progress());
        report
    }

    fn monitor_frame(&mut self, features: &FeatureSample, now: Instant) -> FrameReport {
        let baseline = self
            .baseline
            .expect("monitoring phase always has a baseline");

        // Distance is derived from the eyes alone, so it is checked even
        // when the body landmarks are too uncertain to classify posture.
        let distance_zone = features
            .viewing_distance
            .map(|distance| self.alerts.on_viewing_distance(distance, now));

        if features.confidence < self.config.confidence_threshold {
            let mut report =
                FrameReport::skipped(self.phase, SignalQuality::Insufficient, false);
            report.distance_zone = distance_zone;
            return report;
        }

        let Some(flags) = FrameFlags::evaluate(features, &baseline, &self.config) else {
            let mut report =
                FrameReport::skipped(self.phase, SignalQuality::Insufficient, false);
            report.distance_zone = distance_zone;
            return report;
        };

        let window = self
            .window
            .as_mut()
            .expect("monitoring phase always has a window");
        let verdict = window.observe(flags.any());

        let (causes, dispatched) = match verdict {
            Verdict::SustainedBad => {
                let causes = flags.causes(&baseline, &self.config);
                let dispatched = self.alerts.on_sustained_bad(&causes, now);
                (causes, dispatched)
            }
            Verdict::Ok => {
                let all_clear = window.all_clear();
                let dispatched = self.alerts.on_good_posture(all_clear, now);
                (Vec::new(), dispatched)
            }
        };

        FrameReport {
            phase: self.phase,
            signal: SignalQuality::Detected,
            calibration_progress: None,
            verdict: Some(verdict),
            causes,
            alert_dispatched: dispatched,
            distance_zone,
            break_started: None,
            on_break: false,
            features: None,
        }
    }
}

/// Per-frame pull-process-report loop. Runs until cancelled or until the
/// frame source is exhausted; per-frame errors never end the session, only
/// capture loss does.
pub async fn run_monitor_loop<S, P>(
    mut source: S,
    mut provider: P,
    mut state: SessionState,
    cancel_token: CancellationToken,
) where
    S: FrameSource,
    P: LandmarkProvider,
{
    let mut ticker = tokio::time::interval(Duration::from_millis(FRAME_POLL_INTERVAL_MS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("monitor loop starting for session {}", state.id);
    state.announce_start();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let frame = match source.next_frame() {
                    Ok(Some(frame)) => frame,
                    Ok(None) => {
                        info!("capture source exhausted, ending session {}", state.id);
                        break;
                    }
                    Err(err) => {
                        error!("capture failed for session {}: {err:?}", state.id);
                        break;
                    }
                };

                let detection = match provider.detect(&frame) {
                    Ok(detection) => detection,
                    Err(err) => {
                        // Treated like a frame with nobody in it; the loop
                        // must survive a flaky provider.
                        warn!("landmark detection failed: {err:?}");
                        None
                    }
                };

                let report = state.process_frame(detection.as_ref(), Instant::now());
                debug!(
                    "frame processed: phase={:?} signal={:?} verdict={:?}",
                    report.phase, report.signal, report.verdict
                );
            }
            _ = cancel_token.cancelled() => {
                info!("stop requested, ending session {}", state.id);
                break;
            }
        }
    }
}

/// Owns the lifecycle of a monitoring session task: spawn on start, cancel
/// and join on stop. Any delivery still in flight at shutdown is left to
/// finish on its own; the session is over either way.
pub struct MonitorController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl MonitorController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn start<S, P>(&mut self, source: S, provider: P, state: SessionState) -> Result<()>
    where
        S: FrameSource + Send + 'static,
        P: LandmarkProvider + Send + 'static,
    {
        if self.handle.is_some() {
            bail!("monitoring already active");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        let handle = tokio::spawn(run_monitor_loop(source, provider, state, token_clone));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("monitor loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for MonitorController {
    fn default() -> Self {
        Self::new()
    }
}
