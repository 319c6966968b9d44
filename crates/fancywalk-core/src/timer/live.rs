//! Periodic driver for [`FastingTimer`].
//!
//! Ticks run as a local task on the caller's [`tokio::task::LocalSet`], so
//! they interleave with user commands on one thread and never race a state
//! read. Each `LiveTimer` owns at most one tick task.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::engine::{FastingStatus, FastingTimer};
use crate::clock::Clock;
use crate::events::Event;
use crate::records::NewFastingSession;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

pub struct LiveTimer {
    engine: Rc<RefCell<FastingTimer>>,
    clock: Arc<dyn Clock>,
    tick_every: Duration,
    status: Rc<watch::Sender<FastingStatus>>,
    ticker: Option<JoinHandle<()>>,
}

impl LiveTimer {
    pub fn new(engine: FastingTimer, clock: Arc<dyn Clock>, tick_every: Duration) -> Self {
        let (tx, _rx) = watch::channel(engine.status());
        Self {
            engine: Rc::new(RefCell::new(engine)),
            clock,
            tick_every: tick_every.max(Duration::from_millis(1)),
            status: Rc::new(tx),
            ticker: None,
        }
    }

    /// Receive every published status, starting with the current one.
    pub fn subscribe(&self) -> watch::Receiver<FastingStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> FastingStatus {
        self.engine.borrow().status()
    }

    pub fn can_save(&self) -> bool {
        self.engine.borrow().can_save()
    }

    pub fn completed_session(&self) -> Option<NewFastingSession> {
        self.engine.borrow().completed_session()
    }

    /// A copy of the engine, e.g. for persisting between runs.
    pub fn engine(&self) -> FastingTimer {
        self.engine.borrow().clone()
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start or stop the fast.
    ///
    /// Must be called from within a `LocalSet` when it starts a fast.
    pub fn toggle(&mut self) -> Event {
        self.stop_ticker();
        let event = self.engine.borrow_mut().toggle_at(self.clock.now());
        self.publish();
        if self.engine.borrow().is_active() {
            self.start_ticker();
        }
        event
    }

    /// Pick up ticking for an engine that was restored mid-fast.
    pub fn resume(&mut self) {
        if self.engine.borrow().is_active() && !self.is_ticking() {
            self.engine.borrow_mut().tick_at(self.clock.now());
            self.publish();
            self.start_ticker();
        }
    }

    fn publish(&self) {
        self.status.send_replace(self.engine.borrow().status());
    }

    fn start_ticker(&mut self) {
        self.stop_ticker();
        let engine = Rc::clone(&self.engine);
        let status = Rc::clone(&self.status);
        let clock = Arc::clone(&self.clock);
        let period = self.tick_every;

        self.ticker = Some(tokio::task::spawn_local(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let snapshot = {
                    let mut engine = engine.borrow_mut();
                    if !engine.is_active() {
                        break;
                    }
                    engine.tick_at(clock.now());
                    engine.status()
                };
                status.send_replace(snapshot);
            }
            tracing::trace!("tick loop finished");
        }));
    }

    fn stop_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

impl Drop for LiveTimer {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::timer::FastState;
    use chrono::{DateTime, Utc};
    use tokio::task::LocalSet;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_750_000_000, 0).unwrap()
    }

    fn live(clock: &ManualClock, engine: FastingTimer) -> LiveTimer {
        LiveTimer::new(engine, Arc::new(clock.clone()), DEFAULT_TICK_INTERVAL)
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_while_running() {
        LocalSet::new()
            .run_until(async {
                let clock = ManualClock::new(t0());
                let mut timer = live(&clock, FastingTimer::new());
                let rx = timer.subscribe();

                timer.toggle();
                assert!(timer.is_ticking());
                assert!(rx.borrow().is_active);

                clock.advance(chrono::Duration::seconds(3_600));
                tokio::time::sleep(Duration::from_millis(1_500)).await;

                let status = rx.borrow().clone();
                assert_eq!(status.elapsed, "01:00:00");
                assert_eq!(status.status_text, "6% of target");
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_ends_the_tick_loop() {
        LocalSet::new()
            .run_until(async {
                let clock = ManualClock::new(t0());
                let mut timer = live(&clock, FastingTimer::new());
                let rx = timer.subscribe();

                timer.toggle();
                clock.advance(chrono::Duration::seconds(90));
                timer.toggle();
                assert!(!timer.is_ticking());
                assert!(timer.can_save());

                clock.advance(chrono::Duration::seconds(600));
                tokio::time::sleep(Duration::from_secs(5)).await;

                let status = rx.borrow().clone();
                assert_eq!(status.state, FastState::Completed);
                assert_eq!(status.elapsed, "00:01:30");
                assert_eq!(status.last_duration.as_deref(), Some("00:01:30"));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn restart_publishes_cleared_state_before_first_tick() {
        LocalSet::new()
            .run_until(async {
                let clock = ManualClock::new(t0());
                let mut timer = live(&clock, FastingTimer::new());
                let rx = timer.subscribe();

                timer.toggle();
                clock.advance(chrono::Duration::hours(2));
                timer.toggle();
                clock.advance(chrono::Duration::minutes(5));
                timer.toggle();

                let status = rx.borrow().clone();
                assert!(status.is_active);
                assert_eq!(status.ended_at, None);
                assert_eq!(status.last_duration, None);
                assert_eq!(status.elapsed, "00:00:00");
                assert!(timer.is_ticking());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn resume_restarts_ticking_for_restored_engine() {
        LocalSet::new()
            .run_until(async {
                let clock = ManualClock::new(t0());
                let mut engine = FastingTimer::new();
                engine.toggle_at(t0());
                clock.advance(chrono::Duration::seconds(59));

                let mut timer = live(&clock, engine);
                assert!(!timer.is_ticking());
                timer.resume();
                assert!(timer.is_ticking());
                assert_eq!(timer.status().elapsed, "00:00:59");

                clock.advance(chrono::Duration::seconds(2));
                tokio::time::sleep(Duration::from_millis(1_100)).await;
                assert_eq!(timer.status().elapsed, "00:01:01");
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn resume_is_noop_when_idle() {
        LocalSet::new()
            .run_until(async {
                let clock = ManualClock::new(t0());
                let mut timer = live(&clock, FastingTimer::new());
                timer.resume();
                assert!(!timer.is_ticking());
                assert_eq!(timer.status().state, FastState::Idle);
            })
            .await;
    }
}
