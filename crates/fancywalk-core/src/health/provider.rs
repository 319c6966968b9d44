use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::HealthError;

/// Which daily total changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthMetric {
    Steps,
    Distance,
}

impl fmt::Display for HealthMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthMetric::Steps => f.write_str("steps"),
            HealthMetric::Distance => f.write_str("distance"),
        }
    }
}

/// Source of today's activity totals.
///
/// Implemented by platform health services; the tracker only talks to this
/// trait so tests can substitute a fake.
pub trait HealthSnapshotProvider {
    /// Whether the device has a health data service at all.
    fn is_available(&self) -> bool {
        true
    }

    fn is_authorized(&self) -> bool;

    /// Ask the user for read access. Called at most once per tracker unless
    /// it fails.
    fn authorize(&mut self) -> Result<(), HealthError>;

    /// Steps since local midnight.
    fn today_steps(&self) -> Result<u64, HealthError>;

    /// Walking/running distance since local midnight, in kilometres.
    fn today_distance_km(&self) -> Result<f64, HealthError>;

    /// Notifications for data changes during the current day.
    fn subscribe(&self) -> broadcast::Receiver<HealthMetric>;
}
