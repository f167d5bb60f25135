use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::core::error::UsageError;
use crate::core::models::usage::UsageStatus;

const COOLDOWN: Duration = Duration::from_secs(300);
const IN_PROGRESS_HOLD: Duration = Duration::from_secs(1);

/// What prompted a notification check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Periodic poll from the watch loop.
    Auto,
    /// Explicit user refresh. Skips duplicate-data suppression only; the
    /// cooldown and edge rules still apply.
    Manual,
}

/// Delivery sink for desktop alerts.
pub trait Notifier: Send + Sync {
    fn deliver(&self, title: &str, body: &str) -> Result<(), UsageError>;
}

fn which(binary: &str) -> Option<std::path::PathBuf> {
    let paths = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&paths) {
        let candidate = dir.join(binary);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Notifier backed by the platform's notification command: `osascript` on
/// macOS, `notify-send` elsewhere. Missing tooling degrades to a debug log.
pub struct DesktopNotifier;

impl DesktopNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for DesktopNotifier {
    fn deliver(&self, title: &str, body: &str) -> Result<(), UsageError> {
        if cfg!(target_os = "macos") {
            if which("osascript").is_none() {
                return Err(UsageError::NotifierUnsupported);
            }
            let script = format!(
                "display notification \"{}\" with title \"{}\"",
                body.replace('"', "\\\""),
                title.replace('"', "\\\"")
            );
            Command::new("osascript").args(["-e", &script]).status()?;
            Ok(())
        } else {
            if which("notify-send").is_none() {
                return Err(UsageError::NotifierUnsupported);
            }
            Command::new("notify-send").args([title, body]).status()?;
            Ok(())
        }
    }
}

#[derive(Debug, Clone)]
struct GateState {
    last_fire_time: Option<Instant>,
    last_level: UsageStatus,
    last_data_identifier: String,
    in_progress: bool,
}

impl Default for GateState {
    fn default() -> Self {
        Self {
            last_fire_time: None,
            last_level: UsageStatus::Safe,
            last_data_identifier: String::new(),
            in_progress: false,
        }
    }
}

/// Outcome of a gate evaluation, retained for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Fired,
    DuplicateData,
    InProgress,
    CoolingDown,
    NoEdge,
}

/// Decides whether a threshold alert should fire for a given reading.
///
/// Ordering of checks matters: duplicate-data and in-progress suppression
/// come first and leave the gate state untouched, then the 5-minute
/// cooldown, and only then the rising-edge rule. Any call that reaches the
/// edge check records the observed level, so a steady critical reading does
/// not re-alert but a dip and recovery does.
pub struct NotificationGate {
    notifier: Arc<dyn Notifier>,
    state: Arc<Mutex<GateState>>,
}

impl NotificationGate {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            state: Arc::new(Mutex::new(GateState::default())),
        }
    }

    /// Evaluate one usage reading and fire a desktop alert if the gate
    /// allows it. `percent` is the five-hour window utilization. A manual
    /// trigger skips only the duplicate-data check; everything else,
    /// including the no-alert-at-safe rule, applies to every reading.
    pub fn check_and_notify(&self, percent: f64, trigger: Trigger) -> GateDecision {
        let status = UsageStatus::from_percent(percent);
        let identifier = format!("{}-{}", status.label(), percent.round() as i64);

        let decision = {
            let mut state = self.state.lock().unwrap();

            if trigger == Trigger::Auto && state.last_data_identifier == identifier {
                return GateDecision::DuplicateData;
            }
            if state.in_progress {
                return GateDecision::InProgress;
            }
            if let Some(fired_at) = state.last_fire_time {
                if fired_at.elapsed() < COOLDOWN {
                    return GateDecision::CoolingDown;
                }
            }

            let is_edge = match status {
                UsageStatus::Critical => state.last_level != UsageStatus::Critical,
                UsageStatus::Warning => state.last_level == UsageStatus::Safe,
                UsageStatus::Safe => false,
            };
            state.last_level = status;

            if is_edge {
                // Recorded under the same lock as the decision so a racing
                // caller cannot also reach Fired before the flag is set.
                state.in_progress = true;
                state.last_fire_time = Some(Instant::now());
                state.last_data_identifier = identifier;
                GateDecision::Fired
            } else {
                GateDecision::NoEdge
            }
        };

        if decision == GateDecision::Fired {
            self.deliver_alert(status, percent);
            self.schedule_release();
        }
        decision
    }

    fn deliver_alert(&self, status: UsageStatus, percent: f64) {
        let (title, body) = alert_text(status, percent);
        match self.notifier.deliver(&title, &body) {
            Ok(()) => debug!(percent, "notification delivered"),
            Err(UsageError::NotifierUnsupported) => {
                debug!("no notification tooling available, skipping alert")
            }
            Err(err) => warn!(error = %err, "notification delivery failed"),
        }
    }

    /// Release the in-progress hold after a short delay so a burst of
    /// polls during delivery cannot double-fire.
    fn schedule_release(&self) {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            tokio::time::sleep(IN_PROGRESS_HOLD).await;
            state.lock().unwrap().in_progress = false;
        });
    }

    /// Deliver an on-demand usage summary, bypassing the gate.
    pub fn notify_summary(&self, percent: f64, cost: f64) {
        let title = "Usage summary".to_string();
        let body = format!("5h window at {:.0}%, ${:.2} spent today", percent, cost);
        match self.notifier.deliver(&title, &body) {
            Ok(()) => debug!("summary notification delivered"),
            Err(UsageError::NotifierUnsupported) => {
                debug!("no notification tooling available, skipping summary")
            }
            Err(err) => warn!(error = %err, "summary notification failed"),
        }
    }
}

fn alert_text(status: UsageStatus, percent: f64) -> (String, String) {
    match status {
        UsageStatus::Critical => (
            "Usage critical".to_string(),
            format!("5h window at {:.0}%. Limits are close.", percent),
        ),
        UsageStatus::Warning => (
            "Usage warning".to_string(),
            format!("5h window at {:.0}%.", percent),
        ),
        UsageStatus::Safe => (
            "Usage update".to_string(),
            format!("5h window at {:.0}%.", percent),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingNotifier {
        delivered: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn new() -> Self {
            Self {
                delivered: Mutex::new(Vec::new()),
            }
        }

        fn titles(&self) -> Vec<String> {
            self.delivered.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn deliver(&self, title: &str, _body: &str) -> Result<(), UsageError> {
            self.delivered.lock().unwrap().push(title.to_string());
            Ok(())
        }
    }

    fn gate() -> (NotificationGate, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::new());
        let gate = NotificationGate::new(Arc::clone(&notifier) as Arc<dyn Notifier>);
        (gate, notifier)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1100)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn first_critical_fires() {
        let (gate, notifier) = gate();
        assert_eq!(
            gate.check_and_notify(95.0, Trigger::Auto),
            GateDecision::Fired
        );
        assert_eq!(notifier.titles(), vec!["Usage critical"]);
    }

    #[tokio::test(start_paused = true)]
    async fn identical_reading_is_deduplicated() {
        let (gate, _) = gate();
        gate.check_and_notify(95.0, Trigger::Auto);
        settle().await;
        assert_eq!(
            gate.check_and_notify(95.0, Trigger::Auto),
            GateDecision::DuplicateData
        );
        // Rounds to the same identifier.
        assert_eq!(
            gate.check_and_notify(95.2, Trigger::Auto),
            GateDecision::DuplicateData
        );
    }

    #[tokio::test(start_paused = true)]
    async fn in_progress_blocks_until_released() {
        let (gate, _) = gate();
        gate.check_and_notify(95.0, Trigger::Auto);
        // Different identifier but delivery hold still active.
        assert_eq!(
            gate.check_and_notify(97.0, Trigger::Auto),
            GateDecision::InProgress
        );
        settle().await;
        // Hold released; now the cooldown is the blocker.
        assert_eq!(
            gate.check_and_notify(97.0, Trigger::Auto),
            GateDecision::CoolingDown
        );
    }

    #[tokio::test(start_paused = true)]
    async fn safe_never_fires() {
        let (gate, notifier) = gate();
        assert_eq!(
            gate.check_and_notify(10.0, Trigger::Auto),
            GateDecision::NoEdge
        );
        assert!(notifier.titles().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn warning_fires_only_from_safe() {
        let (gate, _) = gate();
        gate.check_and_notify(95.0, Trigger::Auto);
        settle().await;
        tokio::time::advance(COOLDOWN).await;
        // Critical -> Warning is a de-escalation, not an edge.
        assert_eq!(
            gate.check_and_notify(75.0, Trigger::Auto),
            GateDecision::NoEdge
        );
        // Warning -> Safe -> Warning is an edge again.
        gate.check_and_notify(10.0, Trigger::Auto);
        assert_eq!(
            gate.check_and_notify(80.0, Trigger::Auto),
            GateDecision::Fired
        );
    }

    #[tokio::test(start_paused = true)]
    async fn full_escalation_sequence_fires_twice() {
        let (gate, notifier) = gate();
        let readings = [10.0, 75.0, 92.0, 93.0, 75.0, 10.0, 95.0];
        for percent in readings {
            gate.check_and_notify(percent, Trigger::Auto);
            settle().await;
            tokio::time::advance(COOLDOWN).await;
        }
        // warning at 75, critical at 92, then critical again at 95 after the
        // dip back to safe re-arms the edge.
        assert_eq!(
            notifier.titles(),
            vec!["Usage warning", "Usage critical", "Usage critical"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_suppresses_then_allows_later_edge() {
        let (gate, notifier) = gate();
        gate.check_and_notify(75.0, Trigger::Auto);
        settle().await;
        // Escalation to critical inside the cooldown is suppressed and the
        // level is not recorded, so the edge survives.
        assert_eq!(
            gate.check_and_notify(92.0, Trigger::Auto),
            GateDecision::CoolingDown
        );
        tokio::time::advance(COOLDOWN).await;
        assert_eq!(
            gate.check_and_notify(93.0, Trigger::Auto),
            GateDecision::Fired
        );
        assert_eq!(notifier.titles(), vec!["Usage warning", "Usage critical"]);
    }

    #[tokio::test(start_paused = true)]
    async fn steady_critical_does_not_realert() {
        let (gate, notifier) = gate();
        gate.check_and_notify(92.0, Trigger::Auto);
        settle().await;
        tokio::time::advance(COOLDOWN).await;
        assert_eq!(
            gate.check_and_notify(93.0, Trigger::Auto),
            GateDecision::NoEdge
        );
        assert_eq!(notifier.titles().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_trigger_never_fires_at_safe_level() {
        let (gate, notifier) = gate();
        assert_eq!(
            gate.check_and_notify(10.0, Trigger::Manual),
            GateDecision::NoEdge
        );
        assert!(notifier.titles().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_trigger_still_honors_cooldown() {
        let (gate, notifier) = gate();
        gate.check_and_notify(92.0, Trigger::Auto);
        settle().await;
        assert_eq!(
            gate.check_and_notify(97.0, Trigger::Manual),
            GateDecision::CoolingDown
        );
        assert_eq!(notifier.titles().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_trigger_skips_only_the_dedup_check() {
        let (gate, notifier) = gate();
        gate.check_and_notify(95.0, Trigger::Auto);
        settle().await;
        tokio::time::advance(COOLDOWN).await;
        // Dip to safe re-arms the edge but leaves the identifier intact.
        gate.check_and_notify(10.0, Trigger::Auto);
        assert_eq!(
            gate.check_and_notify(95.0, Trigger::Auto),
            GateDecision::DuplicateData
        );
        assert_eq!(
            gate.check_and_notify(95.0, Trigger::Manual),
            GateDecision::Fired
        );
        assert_eq!(notifier.titles(), vec!["Usage critical", "Usage critical"]);
    }

    #[tokio::test(start_paused = true)]
    async fn summary_is_ungated() {
        let (gate, notifier) = gate();
        gate.notify_summary(42.0, 1.25);
        gate.notify_summary(42.0, 1.25);
        assert_eq!(notifier.titles(), vec!["Usage summary", "Usage summary"]);
    }
}
