mod engine;
mod format;
mod live;

pub use engine::{FastState, FastingStatus, FastingTimer, DEFAULT_GOAL_SECS};
pub use format::{format_hms, format_hours_minutes, progress_status};
pub use live::{LiveTimer, DEFAULT_TICK_INTERVAL};
