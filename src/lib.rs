//! Continuous posture monitoring engine.
//!
//! Feed it one landmark detection per captured frame and it takes care of
//! the rest: calibrating per-user baseline thresholds during a warm-up
//! window, smoothing noisy per-frame geometry into a stable verdict through
//! a hysteresis buffer, debouncing corrective and positive-reinforcement
//! alerts behind cooldowns, and reminding the user to take wall-clock
//! breaks. Cameras, pose models, rendering and the notification backend
//! stay outside the crate, behind the traits in [`landmarks`] and
//! [`alerts`].

pub mod alerts;
pub mod breaks;
pub mod calibration;
pub mod config;
pub mod geometry;
pub mod hysteresis;
pub mod landmarks;
pub mod session;
pub mod sound;

pub use alerts::{AlertScheduler, Dispatcher, DistanceZone, NotificationSink, SoundSink};
pub use breaks::{BreakReminder, BreakScheduler, STRETCHING_EXERCISES};
pub use calibration::{CalibrationBaseline, CalibrationEngine, IngestOutcome};
pub use config::MonitorConfig;
pub use geometry::{angle_between, estimate_viewing_distance, extract_features, FeatureSample};
pub use hysteresis::{FrameFlags, PostureCause, Verdict, VerdictWindow};
pub use landmarks::{Frame, FrameSource, Landmark, LandmarkId, LandmarkProvider, LandmarkSet};
pub use session::{
    run_monitor_loop, FrameReport, MonitorController, SessionPhase, SessionState, SignalQuality,
};
pub use sound::ChimePlayer;
