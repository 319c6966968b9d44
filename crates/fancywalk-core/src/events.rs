use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::records::{FastingSession, StepSnapshot};
use crate::timer::FastState;

/// Every state change in the system produces an Event.
/// The CLI prints them; front ends may log or forward them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    FastStarted {
        at: DateTime<Utc>,
    },
    FastEnded {
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        duration_secs: f64,
    },
    /// First tick at or past the goal.
    GoalReached {
        started_at: DateTime<Utc>,
        goal_secs: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: FastState,
        started_at: Option<DateTime<Utc>>,
        ended_at: Option<DateTime<Utc>>,
        elapsed_secs: f64,
        progress: f64,
        status_text: String,
        at: DateTime<Utc>,
    },
    FastingSessionSaved {
        session: FastingSession,
    },
    StepSnapshotSaved {
        snapshot: StepSnapshot,
    },
    RecordDeleted {
        collection: String,
        id: i64,
        existed: bool,
    },
}
