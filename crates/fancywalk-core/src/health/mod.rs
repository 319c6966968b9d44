//! Health-data access: the provider seam, a sample-log provider, and the
//! step tracker that keeps today's totals published.

mod provider;
mod samples;
mod tracker;

pub use provider::{HealthMetric, HealthSnapshotProvider};
pub use samples::{start_of_day, HealthSample, SampleLogProvider};
pub use tracker::{calories_for_steps, ActivityState, StepTracker, DEFAULT_STEP_DEBOUNCE};
