//! Inactivity scheduling: decides when the screensaver overlay shows and hides.
//!
//! A checker task polls a platform [`ActivityProbe`] for system-wide idle time
//! and broadcasts [`OverlayState`] transitions. Input events delivered to the
//! overlay window itself are fed in through [`IdleScheduler::touch`].

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
pub use linux::SystemActivity;
#[cfg(target_os = "macos")]
pub use macos::SystemActivity;
#[cfg(target_os = "windows")]
pub use windows::SystemActivity;

use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Overlay visibility state, broadcast on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    /// Overlay is dismissed; the inactivity countdown is running.
    Hidden,
    /// Overlay is covering the screen.
    Shown,
}

/// Source of system-wide idle time, polled by the checker task.
///
/// Needed because the overlay window is invisible while dismissed and
/// therefore sees no input events of its own.
pub trait ActivityProbe: Send + 'static {
    /// Time since the last user input anywhere on the system, if known.
    fn poll_idle(&mut self) -> Option<Duration>;
}

/// Shared scheduler state.
struct SchedulerState {
    /// Timestamp of last activity (Unix epoch milliseconds).
    last_activity_ms: AtomicU64,
    /// Whether the overlay is currently shown.
    shown: AtomicBool,
    /// Whether the screensaver is armed.
    enabled: AtomicBool,
    /// Whether the checker task is running.
    running: AtomicBool,
}

impl SchedulerState {
    fn new(enabled: bool) -> Self {
        let now_ms = Utc::now().timestamp_millis() as u64;
        Self {
            last_activity_ms: AtomicU64::new(now_ms),
            shown: AtomicBool::new(false),
            enabled: AtomicBool::new(enabled),
            running: AtomicBool::new(false),
        }
    }

    fn mark_activity(&self) {
        let now_ms = Utc::now().timestamp_millis() as u64;
        self.last_activity_ms.store(now_ms, Ordering::SeqCst);
    }

    fn idle_duration(&self) -> Duration {
        let last_ms = self.last_activity_ms.load(Ordering::SeqCst);
        let now_ms = Utc::now().timestamp_millis() as u64;
        Duration::from_millis(now_ms.saturating_sub(last_ms))
    }

    /// Record user activity. Returns the transition to broadcast, if any:
    /// activity while shown dismisses the overlay, activity while hidden
    /// only restarts the countdown.
    fn on_activity(&self) -> Option<OverlayState> {
        self.mark_activity();
        if self.shown.swap(false, Ordering::SeqCst) {
            Some(OverlayState::Hidden)
        } else {
            None
        }
    }

    /// Evaluate the idle clock against the timeout. Returns a transition
    /// at most once per state change.
    fn on_tick(&self, timeout: Duration) -> Option<OverlayState> {
        if !self.enabled.load(Ordering::SeqCst) {
            return if self.shown.swap(false, Ordering::SeqCst) {
                Some(OverlayState::Hidden)
            } else {
                None
            };
        }

        let is_idle = self.idle_duration() >= timeout;
        let was_shown = self.shown.load(Ordering::SeqCst);
        if is_idle != was_shown {
            self.shown.store(is_idle, Ordering::SeqCst);
            Some(if is_idle {
                OverlayState::Shown
            } else {
                OverlayState::Hidden
            })
        } else {
            None
        }
    }
}

/// Schedules the overlay around user inactivity.
pub struct IdleScheduler {
    /// Inactivity duration before the overlay shows.
    timeout: Duration,
    /// Poll interval of the checker task.
    check_interval: Duration,
    /// Shared state.
    state: Arc<SchedulerState>,
    /// Broadcast sender for visibility transitions.
    state_tx: broadcast::Sender<OverlayState>,
}

impl IdleScheduler {
    pub fn new(timeout: Duration, check_interval: Duration, enabled: bool) -> Self {
        let (state_tx, _) = broadcast::channel(16);
        Self {
            timeout,
            check_interval,
            state: Arc::new(SchedulerState::new(enabled)),
            state_tx,
        }
    }

    /// Subscribe to visibility transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<OverlayState> {
        self.state_tx.subscribe()
    }

    /// Whether the overlay is currently shown.
    pub fn is_shown(&self) -> bool {
        self.state.shown.load(Ordering::SeqCst)
    }

    /// Record a user-activity event from the overlay window.
    pub fn touch(&self) {
        if let Some(transition) = self.state.on_activity() {
            debug!("Activity dismissed the overlay");
            let _ = self.state_tx.send(transition);
        }
    }

    /// Arm or disarm the screensaver. Disarming dismisses a shown overlay;
    /// re-arming restarts the countdown from now.
    pub fn set_enabled(&self, enabled: bool) {
        self.state.enabled.store(enabled, Ordering::SeqCst);
        self.state.mark_activity();
        if !enabled {
            if self.state.shown.swap(false, Ordering::SeqCst) {
                let _ = self.state_tx.send(OverlayState::Hidden);
            }
            info!("Screensaver disarmed");
        } else {
            info!("Screensaver armed with timeout {:?}", self.timeout);
        }
    }

    /// Start the checker task on the given runtime.
    pub fn start(&self, handle: &tokio::runtime::Handle, probe: Option<Box<dyn ActivityProbe>>) {
        if self.state.running.swap(true, Ordering::SeqCst) {
            return; // Already running
        }

        info!(
            "Starting idle scheduler: timeout {:?}, check interval {:?}",
            self.timeout, self.check_interval
        );

        let state = self.state.clone();
        let state_tx = self.state_tx.clone();
        let timeout = self.timeout;
        let check_interval = self.check_interval;
        let mut probe = probe;

        handle.spawn(async move {
            let mut ticker = tokio::time::interval(check_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            while state.running.load(Ordering::SeqCst) {
                ticker.tick().await;

                // A small system idle time means input happened since the
                // last tick, wherever the focus was.
                if let Some(probe) = probe.as_mut() {
                    if let Some(idle) = probe.poll_idle() {
                        if idle < check_interval {
                            state.mark_activity();
                        }
                    }
                }

                if let Some(transition) = state.on_tick(timeout) {
                    match transition {
                        OverlayState::Shown => {
                            debug!("Idle timeout reached, showing overlay")
                        }
                        OverlayState::Hidden => debug!("Activity resumed, hiding overlay"),
                    }
                    let _ = state_tx.send(transition);
                }
            }

            debug!("Idle checker task exiting");
        });
    }

    /// Stop the checker task.
    pub fn stop(&self) {
        self.state.running.store(false, Ordering::SeqCst);
        info!("Idle scheduler stopped");
    }
}

impl Drop for IdleScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Cancel-and-reschedule deadline used to debounce window resizes.
/// Repeated triggers within the delay collapse into a single fire.
#[derive(Debug)]
pub struct Debounce {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self { delay, deadline: None }
    }

    /// Arm (or re-arm) the deadline at `now + delay`.
    pub fn trigger(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// Returns true exactly once when the deadline has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Time left until the deadline, if one is armed.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Probe that always reports the system as long idle.
    struct QuietProbe;

    impl ActivityProbe for QuietProbe {
        fn poll_idle(&mut self) -> Option<Duration> {
            Some(Duration::from_secs(3600))
        }
    }

    fn backdated_state(enabled: bool, idle_for: Duration) -> SchedulerState {
        let state = SchedulerState::new(enabled);
        let past = Utc::now().timestamp_millis() as u64 - idle_for.as_millis() as u64;
        state.last_activity_ms.store(past, Ordering::SeqCst);
        state
    }

    #[test]
    fn timeout_shows_exactly_once() {
        let state = backdated_state(true, Duration::from_secs(10));
        let timeout = Duration::from_secs(5);

        assert_eq!(state.on_tick(timeout), Some(OverlayState::Shown));
        assert_eq!(state.on_tick(timeout), None);
        assert_eq!(state.on_tick(timeout), None);
    }

    #[test]
    fn activity_while_hidden_only_resets_the_clock() {
        let state = backdated_state(true, Duration::from_secs(10));

        assert_eq!(state.on_activity(), None);
        assert!(state.idle_duration() < Duration::from_secs(1));
        assert_eq!(state.on_tick(Duration::from_secs(5)), None);
    }

    #[test]
    fn activity_while_shown_hides() {
        let state = backdated_state(true, Duration::from_secs(10));
        assert_eq!(state.on_tick(Duration::from_secs(5)), Some(OverlayState::Shown));

        assert_eq!(state.on_activity(), Some(OverlayState::Hidden));
        assert_eq!(state.on_tick(Duration::from_secs(5)), None);
    }

    #[test]
    fn disabled_scheduler_never_shows() {
        let state = backdated_state(false, Duration::from_secs(10));
        assert_eq!(state.on_tick(Duration::from_secs(5)), None);
    }

    #[test]
    fn disarming_hides_a_shown_overlay() {
        let scheduler = IdleScheduler::new(
            Duration::from_secs(5),
            Duration::from_millis(100),
            true,
        );
        let mut rx = scheduler.subscribe();

        scheduler.state.shown.store(true, Ordering::SeqCst);
        scheduler.set_enabled(false);

        assert_eq!(rx.try_recv().unwrap(), OverlayState::Hidden);
        assert!(!scheduler.is_shown());
    }

    #[tokio::test(start_paused = true)]
    async fn checker_task_shows_then_touch_hides() {
        let scheduler = IdleScheduler::new(
            Duration::from_secs(2),
            Duration::from_millis(100),
            true,
        );
        let mut rx = scheduler.subscribe();
        scheduler.start(&tokio::runtime::Handle::current(), Some(Box::new(QuietProbe)));

        // Paused time auto-advances through the ticker, but the wall clock
        // backing the idle duration does not, so backdate it by hand.
        let past = Utc::now().timestamp_millis() as u64 - 5000;
        scheduler.state.last_activity_ms.store(past, Ordering::SeqCst);

        let shown = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("checker never fired")
            .unwrap();
        assert_eq!(shown, OverlayState::Shown);
        assert!(scheduler.is_shown());

        scheduler.touch();
        assert_eq!(rx.try_recv().unwrap(), OverlayState::Hidden);
        assert!(!scheduler.is_shown());

        scheduler.stop();
    }

    #[test]
    fn debounce_collapses_rapid_triggers() {
        let delay = Duration::from_millis(250);
        let mut debounce = Debounce::new(delay);
        let t0 = Instant::now();

        debounce.trigger(t0);
        debounce.trigger(t0 + Duration::from_millis(100));
        debounce.trigger(t0 + Duration::from_millis(200));

        // Not yet: the last trigger pushed the deadline out.
        assert!(!debounce.fire(t0 + Duration::from_millis(300)));
        // Fires once, then stays quiet.
        assert!(debounce.fire(t0 + Duration::from_millis(450)));
        assert!(!debounce.fire(t0 + Duration::from_millis(500)));
    }

    #[test]
    fn debounce_remaining_counts_down() {
        let mut debounce = Debounce::new(Duration::from_millis(250));
        let t0 = Instant::now();
        assert_eq!(debounce.remaining(t0), None);

        debounce.trigger(t0);
        assert_eq!(
            debounce.remaining(t0 + Duration::from_millis(100)),
            Some(Duration::from_millis(150))
        );
    }
}
