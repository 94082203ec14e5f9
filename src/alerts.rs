use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Result;
use log::{debug, warn};
use tokio::sync::Semaphore;

use crate::breaks::BreakReminder;
use crate::config::MonitorConfig;
use crate::hysteresis::PostureCause;

/// Desktop notification boundary. Best-effort: failures are logged by the
/// dispatcher and never reach the monitoring loop.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, title: &str, message: &str, timeout: Duration) -> Result<()>;
}

/// Audio cue boundary. A missing clip file is a no-op, not a failure.
pub trait SoundSink: Send + Sync {
    fn play(&self, clip: &Path) -> Result<()>;
}

/// Fire-and-forget delivery off the critical path.
///
/// A one-permit semaphore is the single-slot occupancy: while a delivery is
/// in flight, further triggers are dropped rather than queued, so a slow sink
/// can neither stall frame processing nor build up a notification storm.
#[derive(Clone)]
pub struct Dispatcher {
    notifications: Arc<dyn NotificationSink>,
    sound: Arc<dyn SoundSink>,
    sound_clip: Option<PathBuf>,
    slot: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(
        notifications: Arc<dyn NotificationSink>,
        sound: Arc<dyn SoundSink>,
        sound_clip: Option<PathBuf>,
    ) -> Self {
        Self {
            notifications,
            sound,
            sound_clip,
            slot: Arc::new(Semaphore::new(1)),
        }
    }

    /// Hand a notification (and optionally the chime) to the background.
    /// Returns false when a delivery was already in flight and this one was
    /// dropped. Must be called from within a tokio runtime.
    pub fn dispatch(&self, title: &str, message: &str, timeout: Duration, with_sound: bool) -> bool {
        let permit = match self.slot.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                debug!("notification delivery in flight, dropping '{title}'");
                return false;
            }
        };

        let notifications = Arc::clone(&self.notifications);
        let sound = Arc::clone(&self.sound);
        let clip = if with_sound { self.sound_clip.clone() } else { None };
        let title = title.to_string();
        let message = message.to_string();

        tokio::spawn(async move {
            let delivery = tokio::task::spawn_blocking(move || {
                if let Err(err) = notifications.notify(&title, &message, timeout) {
                    warn!("notification delivery failed: {err:?}");
                }
                if let Some(clip) = clip {
                    if let Err(err) = sound.play(&clip) {
                        warn!("sound playback failed: {err:?}");
                    }
                }
            })
            .await;

            if let Err(err) = delivery {
                warn!("delivery worker join failed: {err:?}");
            }
            drop(permit);
        });

        true
    }
}

/// How close the face sits to the screen, from the viewing-distance proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceZone {
    TooClose,
    Good,
    TooFar,
}

/// Decides when corrective, positive-reinforcement and distance alerts are
/// allowed to fire, all debounced against a shared cooldown timestamp.
pub struct AlertScheduler {
    dispatcher: Dispatcher,
    cooldown: Duration,
    positive_interval: Duration,
    notification_timeout: Duration,
    distance_close_bound: f64,
    distance_far_bound: f64,
    session_start: Instant,
    last_alert: Option<Instant>,
    last_good_feedback: Option<Instant>,
}

impl AlertScheduler {
    pub fn new(config: &MonitorConfig, dispatcher: Dispatcher, now: Instant) -> Self {
        Self {
            dispatcher,
            cooldown: config.alert_cooldown(),
            positive_interval: config.positive_feedback_interval(),
            notification_timeout: config.notification_timeout(),
            distance_close_bound: config.distance_close_bound,
            distance_far_bound: config.distance_far_bound,
            session_start: now,
            last_alert: None,
            last_good_feedback: None,
        }
    }

    fn cooldown_elapsed(&self, now: Instant) -> bool {
        self.last_alert
            .map(|last| now.saturating_duration_since(last) > self.cooldown)
            .unwrap_or(true)
    }

    /// Corrective alert for a sustained-bad verdict. Fires only when at
    /// least one cause passed the deviation floor and the cooldown elapsed.
    pub fn on_sustained_bad(&mut self, causes: &[PostureCause], now: Instant) -> bool {
        if causes.is_empty() || !self.cooldown_elapsed(now) {
            return false;
        }

        let mut message = String::new();
        for cause in causes {
            message.push_str(cause.phrase());
            message.push(' ');
        }
        message.push_str("Please adjust your position.");

        self.dispatcher.dispatch(
            "Poor Posture Detected!",
            &message,
            self.notification_timeout,
            true,
        );
        self.last_alert = Some(now);
        true
    }

    /// Positive reinforcement after a long stretch without any alert.
    /// Requires the whole verdict window to be clear; stamps the shared
    /// cooldown so it does not immediately re-fire.
    pub fn on_good_posture(&mut self, window_all_clear: bool, now: Instant) -> bool {
        if !window_all_clear {
            return false;
        }
        let anchor = self.last_alert.unwrap_or(self.session_start);
        if now.saturating_duration_since(anchor) <= self.positive_interval {
            return false;
        }

        self.dispatcher.dispatch(
            "Good Posture!",
            "Great job maintaining proper posture. Keep it up!",
            self.notification_timeout,
            false,
        );
        self.last_alert = Some(now);
        self.last_good_feedback = Some(now);
        true
    }

    /// Classify the viewing distance and warn when the user leans into the
    /// screen. Shares the corrective cooldown.
    pub fn on_viewing_distance(&mut self, distance: f64, now: Instant) -> DistanceZone {
        let zone = if distance < self.distance_close_bound {
            DistanceZone::TooClose
        } else if distance <= self.distance_far_bound {
            DistanceZone::Good
        } else {
            DistanceZone::TooFar
        };

        if zone == DistanceZone::TooClose && self.cooldown_elapsed(now) {
            self.dispatcher.dispatch(
                "Distance Alert",
                "You're too close to the screen! Please move back.",
                self.notification_timeout,
                true,
            );
            self.last_alert = Some(now);
        }

        zone
    }

    /// One-time notification when calibration finishes.
    pub fn notify_setup_complete(&self) {
        self.dispatcher.dispatch(
            "Setup Complete",
            "Calibration complete! Your posture will now be monitored.",
            self.notification_timeout,
            false,
        );
    }

    /// Fired once when the monitoring loop starts.
    pub fn notify_startup(&self) {
        self.dispatcher.dispatch(
            "Posture Monitoring Started",
            "The application is now monitoring your posture.",
            Duration::from_secs(3),
            false,
        );
    }

    pub fn notify_break(&self, reminder: &BreakReminder) {
        let message = format!(
            "You've been working for {} minutes. Time for a {} minute break!\n\nTry this: {}",
            reminder.work_minutes, reminder.break_minutes, reminder.exercise
        );
        self.dispatcher
            .dispatch("Break Time!", &message, Duration::from_secs(10), true);
    }

    pub fn last_alert(&self) -> Option<Instant> {
        self.last_alert
    }

    pub fn last_good_feedback(&self) -> Option<Instant> {
        self.last_good_feedback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        titles: Mutex<Vec<String>>,
        delay: Option<Duration>,
    }

    impl NotificationSink for RecordingSink {
        fn notify(&self, title: &str, _message: &str, _timeout: Duration) -> Result<()> {
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            self.titles.lock().unwrap().push(title.to_string());
            Ok(())
        }
    }

    struct FailingSink {
        attempts: AtomicUsize,
    }

    impl NotificationSink for FailingSink {
        fn notify(&self, _title: &str, _message: &str, _timeout: Duration) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("sink unavailable")
        }
    }

    struct NullSound;

    impl SoundSink for NullSound {
        fn play(&self, _clip: &Path) -> Result<()> {
            Ok(())
        }
    }

    fn scheduler_with_sink(sink: Arc<RecordingSink>) -> AlertScheduler {
        let dispatcher = Dispatcher::new(sink, Arc::new(NullSound), None);
        AlertScheduler::new(&MonitorConfig::default(), dispatcher, Instant::now())
    }

    async fn drain_deliveries() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn cooldown_allows_one_alert_per_window() {
        let sink = Arc::new(RecordingSink::default());
        let mut scheduler = scheduler_with_sink(Arc::clone(&sink));
        let causes = [PostureCause::ShouldersHunched];
        let t0 = Instant::now();

        assert!(scheduler.on_sustained_bad(&causes, t0));
        drain_deliveries().await;
        // Within the 10 s cooldown: suppressed.
        assert!(!scheduler.on_sustained_bad(&causes, t0 + Duration::from_secs(5)));
        assert!(!scheduler.on_sustained_bad(&causes, t0 + Duration::from_secs(10)));
        // Past the cooldown: allowed again.
        assert!(scheduler.on_sustained_bad(&causes, t0 + Duration::from_secs(11)));

        drain_deliveries().await;
        assert_eq!(sink.titles.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn no_causes_means_no_alert() {
        let sink = Arc::new(RecordingSink::default());
        let mut scheduler = scheduler_with_sink(Arc::clone(&sink));
        assert!(!scheduler.on_sustained_bad(&[], Instant::now()));
        drain_deliveries().await;
        assert!(sink.titles.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn positive_feedback_waits_for_the_interval() {
        let sink = Arc::new(RecordingSink::default());
        let mut scheduler = scheduler_with_sink(Arc::clone(&sink));
        let start = scheduler.session_start;

        assert!(!scheduler.on_good_posture(true, start + Duration::from_secs(60)));
        assert!(scheduler.on_good_posture(true, start + Duration::from_secs(121)));
        drain_deliveries().await;
        // Re-anchored on the feedback it just gave.
        assert!(!scheduler.on_good_posture(true, start + Duration::from_secs(180)));
        assert!(scheduler.on_good_posture(true, start + Duration::from_secs(243)));

        drain_deliveries().await;
        assert_eq!(sink.titles.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn positive_feedback_requires_clear_window() {
        let sink = Arc::new(RecordingSink::default());
        let mut scheduler = scheduler_with_sink(Arc::clone(&sink));
        let start = scheduler.session_start;
        assert!(!scheduler.on_good_posture(false, start + Duration::from_secs(500)));
    }

    #[tokio::test]
    async fn distance_zones_classify_and_only_too_close_alerts() {
        let sink = Arc::new(RecordingSink::default());
        let mut scheduler = scheduler_with_sink(Arc::clone(&sink));
        let t0 = Instant::now();

        assert_eq!(scheduler.on_viewing_distance(90.0, t0), DistanceZone::Good);
        assert_eq!(
            scheduler.on_viewing_distance(150.0, t0),
            DistanceZone::TooFar
        );
        assert_eq!(
            scheduler.on_viewing_distance(50.0, t0),
            DistanceZone::TooClose
        );

        drain_deliveries().await;
        let titles = sink.titles.lock().unwrap();
        assert_eq!(titles.as_slice(), ["Distance Alert"]);
    }

    #[tokio::test]
    async fn second_trigger_while_delivery_in_flight_is_dropped() {
        let sink = Arc::new(RecordingSink {
            titles: Mutex::new(Vec::new()),
            delay: Some(Duration::from_millis(200)),
        });
        let dispatcher = Dispatcher::new(
            Arc::clone(&sink) as Arc<dyn NotificationSink>,
            Arc::new(NullSound),
            None,
        );

        assert!(dispatcher.dispatch("first", "m", Duration::from_secs(5), false));
        tokio::time::sleep(Duration::from_millis(50)).await;
        // Slot still occupied by the slow delivery.
        assert!(!dispatcher.dispatch("second", "m", Duration::from_secs(5), false));

        tokio::time::sleep(Duration::from_millis(400)).await;
        let titles = sink.titles.lock().unwrap();
        assert_eq!(titles.as_slice(), ["first"]);

        // Slot freed after delivery completed.
        drop(titles);
        assert!(dispatcher.dispatch("third", "m", Duration::from_secs(5), false));
    }

    #[tokio::test]
    async fn delivery_failure_is_swallowed_and_frees_the_slot() {
        let sink = Arc::new(FailingSink {
            attempts: AtomicUsize::new(0),
        });
        let dispatcher = Dispatcher::new(
            Arc::clone(&sink) as Arc<dyn NotificationSink>,
            Arc::new(NullSound),
            None,
        );

        assert!(dispatcher.dispatch("a", "m", Duration::from_secs(5), false));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(dispatcher.dispatch("b", "m", Duration::from_secs(5), false));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(sink.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn corrective_message_names_every_cause() {
        #[derive(Default)]
        struct MessageSink {
            messages: Mutex<Vec<String>>,
        }
        impl NotificationSink for MessageSink {
            fn notify(&self, _title: &str, message: &str, _timeout: Duration) -> Result<()> {
                self.messages.lock().unwrap().push(message.to_string());
                Ok(())
            }
        }

        let sink = Arc::new(MessageSink::default());
        let dispatcher = Dispatcher::new(
            Arc::clone(&sink) as Arc<dyn NotificationSink>,
            Arc::new(NullSound),
            None,
        );
        let mut scheduler =
            AlertScheduler::new(&MonitorConfig::default(), dispatcher, Instant::now());

        scheduler.on_sustained_bad(
            &[PostureCause::ShouldersHunched, PostureCause::ForwardHead],
            Instant::now(),
        );
        drain_deliveries().await;

        let messages = sink.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Shoulders hunched."));
        assert!(messages[0].contains("Forward head posture."));
        assert!(messages[0].ends_with("Please adjust your position."));
    }
}
