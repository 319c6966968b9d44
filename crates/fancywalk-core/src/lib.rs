//! # fancywalk Core Library
//!
//! Business logic for fancywalk, a personal step tracker and fasting timer.
//! All operations are available through the `fancywalk` CLI; any other front
//! end is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Fasting timer**: a wall-clock-based state machine that requires the
//!   caller to periodically invoke `tick()`, plus [`LiveTimer`] which does so
//!   once per second on a local task set
//! - **Health**: the [`HealthSnapshotProvider`] seam over a platform health
//!   service and the [`StepTracker`] that publishes today's totals
//! - **Storage**: SQLite-based record storage and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`FastingTimer`]: Core timer state machine
//! - [`Database`]: Fasting session and step snapshot persistence
//! - [`Config`]: Application configuration management
//! - [`Debouncer`]: Notification coalescing

pub mod clock;
pub mod debounce;
pub mod error;
pub mod events;
pub mod health;
pub mod records;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use debounce::Debouncer;
pub use error::{ConfigError, CoreError, HealthError, StorageError, ValidationError};
pub use events::Event;
pub use health::{
    calories_for_steps, ActivityState, HealthMetric, HealthSample, HealthSnapshotProvider,
    SampleLogProvider, StepTracker,
};
pub use records::{FastingSession, NewFastingSession, NewStepSnapshot, StepSnapshot};
pub use storage::{Config, Database, FastingStats};
pub use timer::{FastState, FastingStatus, FastingTimer, LiveTimer};
