//! A health provider over a log of recorded samples.
//!
//! Daily totals are the sum of samples recorded between local midnight and
//! now, the same window a platform statistics query uses.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::provider::{HealthMetric, HealthSnapshotProvider};
use crate::clock::{truncate_to_millis, Clock};
use crate::error::{HealthError, ValidationError};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// One reading. Steps are counts, distance is metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthSample {
    pub metric: HealthMetric,
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}

impl HealthSample {
    pub fn steps(count: u64, recorded_at: DateTime<Utc>) -> Self {
        Self {
            metric: HealthMetric::Steps,
            value: count as f64,
            recorded_at: truncate_to_millis(recorded_at),
        }
    }

    pub fn distance_m(metres: f64, recorded_at: DateTime<Utc>) -> Self {
        Self {
            metric: HealthMetric::Distance,
            value: metres,
            recorded_at: truncate_to_millis(recorded_at),
        }
    }
}

pub struct SampleLogProvider {
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    available: bool,
    grant_access: bool,
    authorized: bool,
    samples: Vec<HealthSample>,
    changes: broadcast::Sender<HealthMetric>,
}

impl SampleLogProvider {
    /// Days start at midnight in `offset`.
    pub fn new(clock: Arc<dyn Clock>, offset: FixedOffset) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            clock,
            offset,
            available: true,
            grant_access: true,
            authorized: false,
            samples: Vec::new(),
            changes,
        }
    }

    /// Days start at midnight in the machine's current timezone.
    pub fn local(clock: Arc<dyn Clock>) -> Self {
        Self::new(clock, *Local::now().offset())
    }

    pub fn with_samples(mut self, samples: impl IntoIterator<Item = HealthSample>) -> Self {
        self.samples.extend(samples);
        self
    }

    /// Whether `authorize()` succeeds.
    pub fn with_access(mut self, grant: bool) -> Self {
        self.grant_access = grant;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn samples(&self) -> &[HealthSample] {
        &self.samples
    }

    /// Add a reading and notify subscribers of its metric.
    ///
    /// # Errors
    /// Returns [`ValidationError::InvalidValue`] for negative or non-finite
    /// values.
    pub fn record(&mut self, sample: HealthSample) -> Result<(), ValidationError> {
        if !sample.value.is_finite() || sample.value < 0.0 {
            return Err(ValidationError::InvalidValue {
                field: sample.metric.to_string(),
                message: format!("must be a non-negative number, got {}", sample.value),
            });
        }
        self.samples.push(sample);
        // No subscribers is fine.
        let _ = self.changes.send(sample.metric);
        Ok(())
    }

    fn today_total(&self, metric: HealthMetric) -> Result<f64, HealthError> {
        if !self.available {
            return Err(HealthError::Unavailable);
        }
        if !self.authorized {
            return Err(HealthError::NotAuthorized);
        }
        let now = self.clock.now();
        let since = start_of_day(now, self.offset);
        Ok(self
            .samples
            .iter()
            .filter(|s| s.metric == metric && s.recorded_at >= since && s.recorded_at <= now)
            .map(|s| s.value)
            .sum())
    }
}

impl HealthSnapshotProvider for SampleLogProvider {
    fn is_available(&self) -> bool {
        self.available
    }

    fn is_authorized(&self) -> bool {
        self.authorized
    }

    fn authorize(&mut self) -> Result<(), HealthError> {
        if !self.available {
            return Err(HealthError::Unavailable);
        }
        if !self.grant_access {
            return Err(HealthError::AuthorizationFailed(
                "read access to steps and distance was denied".into(),
            ));
        }
        self.authorized = true;
        Ok(())
    }

    fn today_steps(&self) -> Result<u64, HealthError> {
        Ok(self.today_total(HealthMetric::Steps)?.round() as u64)
    }

    fn today_distance_km(&self) -> Result<f64, HealthError> {
        Ok(self.today_total(HealthMetric::Distance)? / 1000.0)
    }

    fn subscribe(&self) -> broadcast::Receiver<HealthMetric> {
        self.changes.subscribe()
    }
}

/// Midnight of `now`'s calendar day in `offset`, as UTC.
pub fn start_of_day(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    let midnight = now
        .with_timezone(&offset)
        .date_naive()
        .and_time(NaiveTime::MIN);
    offset
        .from_local_datetime(&midnight)
        .single()
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(now)
}
