//! Today's activity, kept current from a [`HealthSnapshotProvider`].
//!
//! Read failures never reach the caller: the value reads as zero, the
//! failure is logged, and a soft warning is published alongside the state.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast::error::RecvError, watch};

use super::provider::{HealthMetric, HealthSnapshotProvider};
use crate::clock::Clock;
use crate::debounce::Debouncer;
use crate::error::{HealthError, ValidationError};
use crate::records::NewStepSnapshot;

/// Step notifications arrive in bursts while walking; distance ones don't.
pub const DEFAULT_STEP_DEBOUNCE: Duration = Duration::from_secs(5);

/// 0.04 kcal per step.
const STEPS_PER_KCAL: u64 = 25;

/// Rough energy estimate for a step count, rounded down.
pub fn calories_for_steps(steps: u64) -> u64 {
    steps / STEPS_PER_KCAL
}

/// Published tracker state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityState {
    /// False means the UI should offer to request access.
    pub authorized: bool,
    pub steps: u64,
    pub distance_km: f64,
    /// Derived from `steps`, see [`calories_for_steps`].
    #[serde(default)]
    pub calories_kcal: u64,
    /// Message from the most recent failed read or authorization.
    pub warning: Option<String>,
}

pub struct StepTracker<P> {
    provider: P,
    clock: Arc<dyn Clock>,
    state: watch::Sender<ActivityState>,
    failing: HashSet<HealthMetric>,
}

impl<P: HealthSnapshotProvider> StepTracker<P> {
    pub fn new(provider: P, clock: Arc<dyn Clock>) -> Self {
        let (state, _) = watch::channel(ActivityState {
            authorized: provider.is_authorized(),
            ..ActivityState::default()
        });
        Self {
            provider,
            clock,
            state,
            failing: HashSet::new(),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    pub fn subscribe(&self) -> watch::Receiver<ActivityState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ActivityState {
        self.state.borrow().clone()
    }

    /// Request access if it hasn't been granted yet. No retries.
    pub fn ensure_authorized(&mut self) -> bool {
        if !self.provider.is_available() {
            let err = HealthError::Unavailable;
            tracing::warn!(error = %err, "health data unavailable");
            self.state.send_modify(|s| {
                s.authorized = false;
                s.warning = Some(err.to_string());
            });
            return false;
        }
        if self.provider.is_authorized() {
            self.state.send_if_modified(|s| !std::mem::replace(&mut s.authorized, true));
            return true;
        }
        match self.provider.authorize() {
            Ok(()) => {
                tracing::info!("health data access granted");
                self.state.send_modify(|s| {
                    s.authorized = true;
                    s.warning = None;
                });
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "health data authorization failed");
                self.state.send_modify(|s| {
                    s.authorized = false;
                    s.warning = Some(err.to_string());
                });
                false
            }
        }
    }

    /// Authorize if needed, then read both totals.
    pub fn appear(&mut self) {
        if self.ensure_authorized() {
            self.refresh();
        }
    }

    pub fn refresh(&mut self) {
        self.refresh_steps();
        self.refresh_distance();
    }

    pub fn refresh_steps(&mut self) {
        let read = self.provider.today_steps();
        let steps = self.settle(HealthMetric::Steps, read);
        self.state.send_modify(|s| {
            s.steps = steps;
            s.calories_kcal = calories_for_steps(steps);
        });
    }

    pub fn refresh_distance(&mut self) {
        let read = self.provider.today_distance_km();
        let distance_km = self.settle(HealthMetric::Distance, read);
        self.state.send_modify(|s| s.distance_km = distance_km);
    }

    pub fn new_snapshot(&self) -> Result<NewStepSnapshot, ValidationError> {
        self.new_snapshot_at(self.clock.now())
    }

    /// The record a "save" stores: the currently published totals.
    pub fn new_snapshot_at(&self, now: DateTime<Utc>) -> Result<NewStepSnapshot, ValidationError> {
        let state = self.state.borrow();
        NewStepSnapshot::new(now, state.steps, state.distance_km)
    }

    /// Follow provider notifications until its channel closes.
    ///
    /// Step changes are coalesced over `step_debounce`; distance changes
    /// refresh immediately.
    pub async fn run(&mut self, step_debounce: Duration) {
        let mut changes = self.provider.subscribe();
        let mut debounce = Debouncer::new(step_debounce);
        loop {
            tokio::select! {
                change = changes.recv() => match change {
                    Ok(HealthMetric::Steps) => debounce.trigger(),
                    Ok(HealthMetric::Distance) => self.refresh_distance(),
                    Err(RecvError::Lagged(missed)) => {
                        tracing::debug!(missed, "health notifications lagged, refreshing all");
                        debounce.cancel();
                        self.refresh();
                    }
                    Err(RecvError::Closed) => break,
                },
                () = debounce.ready() => self.refresh_steps(),
            }
        }
        if debounce.is_pending() {
            self.refresh_steps();
        }
    }

    fn settle<T: Default>(&mut self, metric: HealthMetric, read: Result<T, HealthError>) -> T {
        match read {
            Ok(value) => {
                if self.failing.remove(&metric) && self.failing.is_empty() {
                    self.state.send_modify(|s| s.warning = None);
                }
                value
            }
            Err(err) => {
                tracing::warn!(%metric, error = %err, "health query failed, showing zero");
                self.failing.insert(metric);
                let authorized = !matches!(err, HealthError::NotAuthorized);
                self.state.send_modify(|s| {
                    s.authorized &= authorized;
                    s.warning = Some(err.to_string());
                });
                T::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Mutex;
    use tokio::sync::broadcast;

    #[derive(Default)]
    struct Inner {
        grant: bool,
        authorized: bool,
        authorize_calls: u32,
        steps: u64,
        distance_km: f64,
        steps_reads: u32,
        distance_reads: u32,
        fail_steps: bool,
        unavailable: bool,
    }

    #[derive(Clone)]
    struct FakeHealth {
        inner: Arc<Mutex<Inner>>,
        changes: broadcast::Sender<HealthMetric>,
    }

    impl FakeHealth {
        fn new(grant: bool) -> Self {
            let (changes, _) = broadcast::channel(16);
            Self {
                inner: Arc::new(Mutex::new(Inner {
                    grant,
                    ..Inner::default()
                })),
                changes,
            }
        }

        fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
            f(&mut self.inner.lock().unwrap())
        }

        fn notify(&self, metric: HealthMetric) {
            let _ = self.changes.send(metric);
        }
    }

    impl HealthSnapshotProvider for FakeHealth {
        fn is_available(&self) -> bool {
            self.with(|i| !i.unavailable)
        }

        fn is_authorized(&self) -> bool {
            self.with(|i| i.authorized)
        }

        fn authorize(&mut self) -> Result<(), HealthError> {
            self.with(|i| {
                i.authorize_calls += 1;
                if i.grant {
                    i.authorized = true;
                    Ok(())
                } else {
                    Err(HealthError::AuthorizationFailed("denied".into()))
                }
            })
        }

        fn today_steps(&self) -> Result<u64, HealthError> {
            self.with(|i| {
                i.steps_reads += 1;
                if i.fail_steps {
                    Err(HealthError::QueryFailed {
                        metric: HealthMetric::Steps,
                        message: "no data".into(),
                    })
                } else {
                    Ok(i.steps)
                }
            })
        }

        fn today_distance_km(&self) -> Result<f64, HealthError> {
            self.with(|i| {
                i.distance_reads += 1;
                Ok(i.distance_km)
            })
        }

        fn subscribe(&self) -> broadcast::Receiver<HealthMetric> {
            self.changes.subscribe()
        }
    }

    fn tracker(health: &FakeHealth) -> StepTracker<FakeHealth> {
        let clock = ManualClock::new(DateTime::from_timestamp(1_750_000_000, 0).unwrap());
        StepTracker::new(health.clone(), Arc::new(clock))
    }

    #[test]
    fn appear_authorizes_once_and_reads_totals() {
        let health = FakeHealth::new(true);
        health.with(|i| {
            i.steps = 4_321;
            i.distance_km = 3.2;
        });
        let mut tracker = tracker(&health);
        tracker.appear();
        tracker.appear();

        let state = tracker.state();
        assert!(state.authorized);
        assert_eq!(state.steps, 4_321);
        assert_eq!(state.distance_km, 3.2);
        assert_eq!(state.calories_kcal, 172);
        assert_eq!(state.warning, None);
        assert_eq!(health.with(|i| i.authorize_calls), 1);
    }

    #[test]
    fn denied_authorization_publishes_request_access_state() {
        let health = FakeHealth::new(false);
        let mut tracker = tracker(&health);
        tracker.appear();

        let state = tracker.state();
        assert!(!state.authorized);
        assert!(state.warning.as_deref().unwrap().contains("denied"));
        assert_eq!(health.with(|i| i.steps_reads), 0);
    }

    #[test]
    fn unavailable_provider_is_never_asked_for_access() {
        let health = FakeHealth::new(true);
        health.with(|i| i.unavailable = true);
        let mut tracker = tracker(&health);
        tracker.appear();

        let state = tracker.state();
        assert!(!state.authorized);
        assert_eq!(
            state.warning.as_deref(),
            Some("Health data is not available on this device")
        );
        assert_eq!(health.with(|i| i.authorize_calls), 0);
        assert_eq!(health.with(|i| i.steps_reads), 0);
    }

    #[test]
    fn calories_follow_step_count() {
        assert_eq!(calories_for_steps(0), 0);
        assert_eq!(calories_for_steps(24), 0);
        assert_eq!(calories_for_steps(1_500), 60);
        assert_eq!(calories_for_steps(10_000), 400);
    }

    #[test]
    fn failed_query_reads_as_zero_with_warning() {
        let health = FakeHealth::new(true);
        health.with(|i| {
            i.steps = 900;
            i.distance_km = 0.5;
        });
        let mut tracker = tracker(&health);
        tracker.appear();
        assert_eq!(tracker.state().steps, 900);

        health.with(|i| i.fail_steps = true);
        tracker.refresh_steps();
        let state = tracker.state();
        assert_eq!(state.steps, 0);
        assert_eq!(state.calories_kcal, 0);
        assert!(state.authorized);
        assert!(state.warning.is_some());

        health.with(|i| i.fail_steps = false);
        tracker.refresh_steps();
        assert_eq!(tracker.state().warning, None);
    }

    #[test]
    fn successful_distance_read_keeps_step_warning() {
        let health = FakeHealth::new(true);
        let mut tracker = tracker(&health);
        tracker.ensure_authorized();
        health.with(|i| i.fail_steps = true);
        tracker.refresh();
        assert!(tracker.state().warning.is_some());
        assert_eq!(health.with(|i| i.distance_reads), 1);
    }

    #[test]
    fn snapshot_uses_published_totals() {
        let health = FakeHealth::new(true);
        health.with(|i| {
            i.steps = 10_000;
            i.distance_km = 7.25;
        });
        let mut tracker = tracker(&health);
        tracker.appear();

        let at = DateTime::from_timestamp(1_750_000_500, 0).unwrap();
        let snapshot = tracker.new_snapshot_at(at).unwrap();
        assert_eq!(snapshot.date(), at);
        assert_eq!(snapshot.steps(), 10_000);
        assert_eq!(snapshot.distance_km(), 7.25);
    }

    #[tokio::test(start_paused = true)]
    async fn step_notifications_are_coalesced() {
        let health = FakeHealth::new(true);
        let mut tracker = tracker(&health);
        tracker.ensure_authorized();
        let rx = tracker.subscribe();

        let driver = async {
            health.with(|i| i.steps = 500);
            for _ in 0..3 {
                health.notify(HealthMetric::Steps);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            // Last notification at t=2s; the refresh is due at t=7s.
            tokio::time::sleep(Duration::from_millis(3_500)).await;
            assert_eq!(health.with(|i| i.steps_reads), 0);
            assert_eq!(rx.borrow().steps, 0);

            tokio::time::sleep(Duration::from_secs(1)).await;
            assert_eq!(health.with(|i| i.steps_reads), 1);
            assert_eq!(rx.borrow().steps, 500);
        };

        tokio::select! {
            biased;
            () = tracker.run(DEFAULT_STEP_DEBOUNCE) => panic!("tracker stopped early"),
            () = driver => {}
        }
    }

    #[tokio::test(start_paused = true)]
    async fn distance_notifications_refresh_immediately() {
        let health = FakeHealth::new(true);
        let mut tracker = tracker(&health);
        tracker.ensure_authorized();
        let rx = tracker.subscribe();

        let driver = async {
            health.with(|i| i.distance_km = 1.4);
            health.notify(HealthMetric::Distance);
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert_eq!(health.with(|i| i.distance_reads), 1);
            assert_eq!(rx.borrow().distance_km, 1.4);
        };

        tokio::select! {
            biased;
            () = tracker.run(DEFAULT_STEP_DEBOUNCE) => panic!("tracker stopped early"),
            () = driver => {}
        }
    }

    #[tokio::test]
    async fn run_returns_when_provider_closes() {
        struct Closed;
        impl HealthSnapshotProvider for Closed {
            fn is_authorized(&self) -> bool {
                true
            }
            fn authorize(&mut self) -> Result<(), HealthError> {
                Ok(())
            }
            fn today_steps(&self) -> Result<u64, HealthError> {
                Ok(0)
            }
            fn today_distance_km(&self) -> Result<f64, HealthError> {
                Ok(0.0)
            }
            fn subscribe(&self) -> broadcast::Receiver<HealthMetric> {
                broadcast::channel(1).1
            }
        }

        let clock = ManualClock::new(DateTime::from_timestamp(0, 0).unwrap());
        let mut tracker = StepTracker::new(Closed, Arc::new(clock));
        tracker.run(DEFAULT_STEP_DEBOUNCE).await;
    }
}
