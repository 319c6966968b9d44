use std::sync::Arc;

use chrono::{Local, Utc};
use clap::Subcommand;
use fancywalk_core::error::Result;
use fancywalk_core::health::start_of_day;
use fancywalk_core::storage::STEP_SNAPSHOTS;
use fancywalk_core::{
    Clock, Config, CoreError, Database, Event, HealthSample, SampleLogProvider, StepSnapshot,
    StepTracker, StorageError, SystemClock, ValidationError,
};

use super::print_json;

#[derive(Subcommand)]
pub enum StepsAction {
    /// Grant (or revoke) read access to recorded steps and distance
    Authorize {
        #[arg(long)]
        revoke: bool,
    },
    /// Record activity, as a step counter would
    Record {
        /// Steps taken
        #[arg(long, default_value = "0")]
        steps: u64,
        /// Distance walked or run, in metres
        #[arg(long, default_value = "0")]
        distance_m: f64,
    },
    /// Print today's totals as JSON
    Today,
    /// Save today's totals as a snapshot
    Save,
    /// List saved snapshots
    History {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a saved snapshot
    Delete {
        /// Snapshot id
        id: i64,
        /// Fail if no such snapshot exists
        #[arg(long)]
        strict: bool,
    },
}

/// A tracker over today's recorded samples, already refreshed.
fn open_tracker(db: &Database, config: &Config) -> Result<StepTracker<SampleLogProvider>> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let offset = *Local::now().offset();
    let samples = db.health_samples_since(start_of_day(clock.now(), offset))?;
    let provider = SampleLogProvider::new(Arc::clone(&clock), offset)
        .with_samples(samples)
        .with_access(config.health.access_granted);
    let mut tracker = StepTracker::new(provider, clock);
    tracker.appear();
    Ok(tracker)
}

pub fn run(action: StepsAction) -> Result<()> {
    match action {
        StepsAction::Authorize { revoke } => {
            let mut config = Config::load()?;
            config.health.access_granted = !revoke;
            config.save()?;
            if revoke {
                println!("health data access revoked");
            } else {
                println!("health data access granted");
            }
        }
        StepsAction::Record { steps, distance_m } => {
            if !distance_m.is_finite() || distance_m < 0.0 {
                return Err(ValidationError::InvalidValue {
                    field: "distance_m".to_string(),
                    message: format!("must be a non-negative number, got {distance_m}"),
                }
                .into());
            }
            if steps == 0 && distance_m == 0.0 {
                return Err(CoreError::Custom(
                    "nothing to record; pass --steps and/or --distance-m".to_string(),
                ));
            }
            let db = Database::open()?;
            let now = Utc::now();
            if steps > 0 {
                db.record_health_sample(&HealthSample::steps(steps, now))?;
            }
            if distance_m > 0.0 {
                db.record_health_sample(&HealthSample::distance_m(distance_m, now))?;
            }
            println!("recorded");
        }
        StepsAction::Today => {
            let config = Config::load_or_default();
            let db = Database::open()?;
            let tracker = open_tracker(&db, &config)?;
            print_json(&tracker.state())?;
        }
        StepsAction::Save => {
            let config = Config::load_or_default();
            let db = Database::open()?;
            let tracker = open_tracker(&db, &config)?;
            if !tracker.state().authorized {
                return Err(CoreError::Custom(
                    "health data access not granted; run `fancywalk steps authorize` first"
                        .to_string(),
                ));
            }
            let snapshot = db.append_step_snapshot(&tracker.new_snapshot()?)?;
            print_json(&Event::StepSnapshotSaved { snapshot })?;
        }
        StepsAction::History { json } => {
            let db = Database::open()?;
            let snapshots = db.list_step_snapshots()?;
            if json {
                print_json(&snapshots)?;
            } else {
                print_history(&snapshots);
            }
        }
        StepsAction::Delete { id, strict } => {
            let db = Database::open()?;
            let existed = db.delete_step_snapshot(id)?;
            if strict {
                StorageError::require_deleted(existed, STEP_SNAPSHOTS, id)?;
            }
            print_json(&Event::RecordDeleted {
                collection: STEP_SNAPSHOTS.to_string(),
                id,
                existed,
            })?;
        }
    }
    Ok(())
}

fn print_history(snapshots: &[StepSnapshot]) {
    if snapshots.is_empty() {
        println!("No step snapshots yet");
        return;
    }
    for snapshot in snapshots {
        println!(
            "{:>5}  {}  {:>7} steps  {:>6.2} km",
            snapshot.id,
            snapshot.date.with_timezone(&Local).format("%b %e, %Y %H:%M"),
            snapshot.steps,
            snapshot.distance_km,
        );
    }
}
