use std::time::{Duration, Instant};

use log::info;
use rand::seq::SliceRandom;

use crate::config::MonitorConfig;

/// Fixed catalog of stretching suggestions, one picked at random per break.
pub const STRETCHING_EXERCISES: [&str; 7] = [
    "Stand up and stretch your arms above your head",
    "Roll your shoulders backward and forward",
    "Gently tilt your head toward each shoulder",
    "Clasp hands behind back for a chest stretch",
    "Look away from the screen at something 20 feet away for 20 seconds",
    "Do neck rotations - slowly move your chin toward each shoulder",
    "Stretch your wrists and fingers",
];

/// Emitted once per work-interval crossing.
#[derive(Debug, Clone)]
pub struct BreakReminder {
    pub exercise: String,
    pub work_minutes: u64,
    pub break_minutes: u64,
}

#[derive(Debug, Clone, Copy)]
enum BreakPhase {
    Working { since: Instant },
    OnBreak { since: Instant },
}

/// Wall-clock break reminder, independent of posture classification.
///
/// Transitions are purely time-based: after the work interval a reminder is
/// emitted and the scheduler goes ON_BREAK; after the break duration it
/// silently returns to WORKING. Monitoring never pauses during a break.
pub struct BreakScheduler {
    phase: BreakPhase,
    work_interval: Duration,
    break_duration: Duration,
}

impl BreakScheduler {
    pub fn new(config: &MonitorConfig, now: Instant) -> Self {
        Self {
            phase: BreakPhase::Working { since: now },
            work_interval: config.work_interval(),
            break_duration: config.break_duration(),
        }
    }

    /// Advance the clock. Returns a reminder exactly once per interval
    /// crossing.
    pub fn tick(&mut self, now: Instant) -> Option<BreakReminder> {
        match self.phase {
            BreakPhase::Working { since } => {
                if now.saturating_duration_since(since) < self.work_interval {
                    return None;
                }
                self.phase = BreakPhase::OnBreak { since: now };
                let exercise = STRETCHING_EXERCISES
                    .choose(&mut rand::thread_rng())
                    .copied()
                    .unwrap_or(STRETCHING_EXERCISES[0]);
                info!("break reminder due, suggesting: {exercise}");
                Some(BreakReminder {
                    exercise: exercise.to_string(),
                    work_minutes: self.work_interval.as_secs() / 60,
                    break_minutes: self.break_duration.as_secs() / 60,
                })
            }
            BreakPhase::OnBreak { since } => {
                if now.saturating_duration_since(since) >= self.break_duration {
                    info!("break over, back to work");
                    self.phase = BreakPhase::Working { since: now };
                }
                None
            }
        }
    }

    pub fn on_break(&self) -> bool {
        matches!(self.phase, BreakPhase::OnBreak { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minutes(m: u64) -> Duration {
        Duration::from_secs(m * 60)
    }

    #[test]
    fn no_reminder_before_the_work_interval() {
        let cfg = MonitorConfig::default();
        let t0 = Instant::now();
        let mut scheduler = BreakScheduler::new(&cfg, t0);

        assert!(scheduler.tick(t0).is_none());
        assert!(scheduler.tick(t0 + minutes(19)).is_none());
        assert!(!scheduler.on_break());
    }

    #[test]
    fn exactly_one_reminder_per_interval_crossing() {
        let cfg = MonitorConfig::default();
        let t0 = Instant::now();
        let mut scheduler = BreakScheduler::new(&cfg, t0);

        let reminder = scheduler.tick(t0 + minutes(20)).expect("reminder due");
        assert!(STRETCHING_EXERCISES.contains(&reminder.exercise.as_str()));
        assert_eq!(reminder.work_minutes, 20);
        assert_eq!(reminder.break_minutes, 5);
        assert!(scheduler.on_break());

        // Repeated ticks during the break stay silent.
        assert!(scheduler.tick(t0 + minutes(21)).is_none());
        assert!(scheduler.tick(t0 + minutes(24)).is_none());
    }

    #[test]
    fn returns_to_working_after_break_duration_without_user_action() {
        let cfg = MonitorConfig::default();
        let t0 = Instant::now();
        let mut scheduler = BreakScheduler::new(&cfg, t0);

        scheduler.tick(t0 + minutes(20)).expect("first break");
        assert!(scheduler.tick(t0 + minutes(25)).is_none());
        assert!(!scheduler.on_break());

        // Next work interval counts from the end of the break.
        assert!(scheduler.tick(t0 + minutes(44)).is_none());
        let second = scheduler.tick(t0 + minutes(45)).expect("second break");
        assert!(STRETCHING_EXERCISES.contains(&second.exercise.as_str()));
    }

    #[test]
    fn one_reminder_per_crossing_over_a_long_simulated_session() {
        let cfg = MonitorConfig::default();
        let t0 = Instant::now();
        let mut scheduler = BreakScheduler::new(&cfg, t0);

        // Two hours of one-minute ticks.
        let mut reminders = 0;
        for minute in 0..=120 {
            if scheduler.tick(t0 + minutes(minute)).is_some() {
                reminders += 1;
            }
        }
        // Work 20 + break 5 = one reminder per 25 minutes.
        assert_eq!(reminders, 120 / 25 + 1);
    }
}
