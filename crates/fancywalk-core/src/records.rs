//! Persisted record types.
//!
//! `New*` values are what callers hand to the store; the store answers with
//! the full record carrying its assigned identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::truncate_to_millis;
use crate::error::ValidationError;

/// A completed fast, ready to be stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewFastingSession {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

impl NewFastingSession {
    /// # Errors
    /// Returns [`ValidationError::InvalidTimeRange`] if `end_time` is before
    /// `start_time`.
    pub fn new(
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let start_time = truncate_to_millis(start_time);
        let end_time = truncate_to_millis(end_time);
        if end_time < start_time {
            return Err(ValidationError::InvalidTimeRange {
                start: start_time,
                end: end_time,
            });
        }
        Ok(Self {
            start_time,
            end_time,
        })
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn duration_secs(&self) -> f64 {
        duration_secs_between(self.start_time, self.end_time)
    }
}

/// A stored fast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastingSession {
    pub id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_secs: f64,
}

/// A step/distance capture, ready to be stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewStepSnapshot {
    date: DateTime<Utc>,
    steps: u64,
    distance_km: f64,
}

impl NewStepSnapshot {
    /// # Errors
    /// Returns [`ValidationError::InvalidValue`] for a negative or non-finite
    /// distance.
    pub fn new(date: DateTime<Utc>, steps: u64, distance_km: f64) -> Result<Self, ValidationError> {
        if !distance_km.is_finite() || distance_km < 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "distance_km".into(),
                message: format!("must be a non-negative number, got {distance_km}"),
            });
        }
        Ok(Self {
            date: truncate_to_millis(date),
            steps,
            distance_km,
        })
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }
}

/// A stored step/distance capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSnapshot {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub steps: u64,
    pub distance_km: f64,
}

pub(crate) fn duration_secs_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0
}
