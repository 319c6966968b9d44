//! Fasting timer engine.
//!
//! The engine is a wall-clock-based state machine. It does not use
//! internal threads - the caller is responsible for calling `tick()`
//! periodically (see [`super::LiveTimer`] for a driver that does).
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> Completed -> Running -> ...
//! ```
//!
//! `toggle()` is the only user command; it fires exactly one transition.
//!
//! ## Usage
//!
//! ```ignore
//! let mut timer = FastingTimer::new();
//! timer.toggle();
//! // Once per second:
//! timer.tick();
//! // Later:
//! timer.toggle();
//! if let Some(session) = timer.completed_session() {
//!     db.append_fasting_session(&session)?;
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::format::{format_hms, progress_status};
use crate::clock::{truncate_to_millis, Clock, SystemClock};
use crate::events::Event;
use crate::records::{duration_secs_between, NewFastingSession};

/// Sixteen hours.
pub const DEFAULT_GOAL_SECS: u64 = 16 * 60 * 60;

const STATUS_READY: &str = "Ready to start";
const STATUS_RUNNING: &str = "Fasting in progress";
const STATUS_COMPLETE: &str = "Fast complete!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FastState {
    Idle,
    Running,
    /// Stopped with a finished cycle that can be saved.
    Completed,
}

/// Published view of the timer, what a screen renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastingStatus {
    pub state: FastState,
    pub is_active: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// `HH:MM:SS`
    pub elapsed: String,
    pub elapsed_secs: f64,
    pub progress: f64,
    pub status_text: String,
    /// `HH:MM:SS` of the last completed fast.
    pub last_duration: Option<String>,
    pub goal_secs: u64,
    pub can_save: bool,
}

/// Core fasting timer.
///
/// Operates on wall-clock deltas -- no internal thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastingTimer {
    goal_secs: u64,
    state: FastState,
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    last_duration_secs: Option<f64>,
    #[serde(default)]
    elapsed_secs: f64,
    #[serde(default)]
    progress: f64,
    status_text: String,
}

impl Default for FastingTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FastingTimer {
    /// A timer with the default 16 hour goal, in the `Idle` state.
    pub fn new() -> Self {
        Self::with_goal(DEFAULT_GOAL_SECS)
    }

    pub fn with_goal(goal_secs: u64) -> Self {
        Self {
            goal_secs: goal_secs.max(1),
            state: FastState::Idle,
            started_at: None,
            ended_at: None,
            last_duration_secs: None,
            elapsed_secs: 0.0,
            progress: 0.0,
            status_text: STATUS_READY.to_string(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> FastState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == FastState::Running
    }

    pub fn goal_secs(&self) -> u64 {
        self.goal_secs
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_secs
    }

    /// 0.0 ..= 1.0 progress toward the goal.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn last_duration_secs(&self) -> Option<f64> {
        self.last_duration_secs
    }

    /// True once a full start/stop cycle has finished and the timer is idle.
    pub fn can_save(&self) -> bool {
        self.started_at.is_some() && self.ended_at.is_some() && !self.is_active()
    }

    /// The record to persist for the completed cycle, if there is one.
    pub fn completed_session(&self) -> Option<NewFastingSession> {
        if !self.can_save() {
            return None;
        }
        NewFastingSession::new(self.started_at?, self.ended_at?).ok()
    }

    pub fn status(&self) -> FastingStatus {
        FastingStatus {
            state: self.state,
            is_active: self.is_active(),
            started_at: self.started_at,
            ended_at: self.ended_at,
            elapsed: format_hms(self.elapsed_secs),
            elapsed_secs: self.elapsed_secs,
            progress: self.progress,
            status_text: self.status_text.clone(),
            last_duration: self.last_duration_secs.map(format_hms),
            goal_secs: self.goal_secs,
            can_save: self.can_save(),
        }
    }

    pub fn snapshot(&self) -> Event {
        self.snapshot_at(SystemClock.now())
    }

    /// Build a full state snapshot event.
    pub fn snapshot_at(&self, now: DateTime<Utc>) -> Event {
        Event::StateSnapshot {
            state: self.state,
            started_at: self.started_at,
            ended_at: self.ended_at,
            elapsed_secs: self.elapsed_secs,
            progress: self.progress,
            status_text: self.status_text.clone(),
            at: now,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn toggle(&mut self) -> Event {
        self.toggle_at(SystemClock.now())
    }

    /// Start a fast when idle, stop it when running.
    pub fn toggle_at(&mut self, now: DateTime<Utc>) -> Event {
        let now = truncate_to_millis(now);
        match (self.state, self.started_at) {
            (FastState::Running, Some(started_at)) => self.stop(started_at, now),
            _ => self.start(now),
        }
    }

    pub fn tick(&mut self) -> Option<Event> {
        self.tick_at(SystemClock.now())
    }

    /// Call periodically while running. Returns `Some(Event::GoalReached)`
    /// on the tick that first reaches the goal.
    pub fn tick_at(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.state != FastState::Running {
            return None;
        }
        let started_at = self.started_at?;
        let was_reached = self.progress >= 1.0;
        self.flush_elapsed(started_at, now);
        self.status_text = progress_status(self.progress);

        if !was_reached && self.progress >= 1.0 {
            tracing::info!(goal_secs = self.goal_secs, "fasting goal reached");
            return Some(Event::GoalReached {
                started_at,
                goal_secs: self.goal_secs,
                at: now,
            });
        }
        None
    }

    /// Change the goal between fasts. A running fast keeps its goal, and
    /// this returns false.
    pub fn set_goal(&mut self, goal_secs: u64) -> bool {
        if self.is_active() {
            return false;
        }
        self.goal_secs = goal_secs.max(1);
        self.progress = (self.elapsed_secs / self.goal_secs as f64).min(1.0);
        true
    }

    pub fn reset(&mut self) -> Event {
        self.reset_at(SystemClock.now())
    }

    /// Back to `Idle`, dropping any running or completed cycle.
    pub fn reset_at(&mut self, now: DateTime<Utc>) -> Event {
        *self = Self::with_goal(self.goal_secs);
        Event::TimerReset { at: now }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn start(&mut self, now: DateTime<Utc>) -> Event {
        self.state = FastState::Running;
        self.started_at = Some(now);
        self.ended_at = None;
        self.last_duration_secs = None;
        self.elapsed_secs = 0.0;
        self.progress = 0.0;
        self.status_text = STATUS_RUNNING.to_string();
        tracing::debug!(started_at = %now, "fast started");
        Event::FastStarted { at: now }
    }

    fn stop(&mut self, started_at: DateTime<Utc>, now: DateTime<Utc>) -> Event {
        // A clock that stepped backwards must not produce end < start.
        let ended_at = now.max(started_at);
        self.flush_elapsed(started_at, ended_at);
        let duration_secs = duration_secs_between(started_at, ended_at);
        self.state = FastState::Completed;
        self.ended_at = Some(ended_at);
        self.last_duration_secs = Some(duration_secs);
        self.status_text = STATUS_COMPLETE.to_string();
        tracing::debug!(duration_secs, "fast ended");
        Event::FastEnded {
            started_at,
            ended_at,
            duration_secs,
        }
    }

    fn flush_elapsed(&mut self, started_at: DateTime<Utc>, now: DateTime<Utc>) {
        let elapsed = duration_secs_between(started_at, now).max(0.0);
        self.elapsed_secs = self.elapsed_secs.max(elapsed);
        self.progress = (self.elapsed_secs / self.goal_secs as f64).min(1.0);
    }
}
