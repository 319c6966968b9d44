use std::sync::Arc;

use chrono::Local;
use clap::Subcommand;
use fancywalk_core::error::Result;
use fancywalk_core::storage::FASTING_SESSIONS;
use fancywalk_core::timer::format_hours_minutes;
use fancywalk_core::{
    Config, CoreError, Database, Event, FastingSession, FastingTimer, LiveTimer, StorageError,
    SystemClock,
};

use super::print_json;

const TIMER_KEY: &str = "fasting_timer";

#[derive(Subcommand)]
pub enum FastAction {
    /// Start a fast, or end the running one
    Toggle,
    /// Print current timer state as JSON
    Status,
    /// Save the completed fast to history
    Save,
    /// Follow the running fast until interrupted
    Watch,
    /// Discard the current fast without saving
    Reset,
    /// List saved fasts, most recent first
    History {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a saved fast
    Delete {
        /// Session id
        id: i64,
        /// Fail if no such session exists
        #[arg(long)]
        strict: bool,
    },
}

/// The stored timer, with the configured goal applied unless a fast is
/// running.
fn load_timer(db: &Database, config: &Config) -> FastingTimer {
    match db.kv_get(TIMER_KEY) {
        Ok(Some(json)) => match serde_json::from_str::<FastingTimer>(&json) {
            Ok(mut timer) => {
                timer.set_goal(config.goal_secs());
                return timer;
            }
            Err(e) => tracing::warn!(error = %e, "discarding unreadable timer state"),
        },
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "could not read timer state"),
    }
    FastingTimer::with_goal(config.goal_secs())
}

fn save_timer(db: &Database, timer: &FastingTimer) -> Result<()> {
    let json = serde_json::to_string(timer)?;
    db.kv_set(TIMER_KEY, &json)?;
    Ok(())
}

pub fn run(action: FastAction) -> Result<()> {
    let config = Config::load_or_default();
    let db = Database::open()?;
    let mut timer = load_timer(&db, &config);

    // Only toggle and reset write the timer back; status and watch are
    // read-only.
    match action {
        FastAction::Toggle => {
            let event = timer.toggle();
            save_timer(&db, &timer)?;
            print_json(&event)?;
        }
        FastAction::Status => {
            if let Some(event) = timer.tick() {
                tracing::info!(?event, "goal reached");
            }
            print_json(&timer.status())?;
        }
        FastAction::Save => {
            let session = timer.completed_session().ok_or_else(|| {
                CoreError::Custom(
                    "no completed fast to save; end the running fast first".to_string(),
                )
            })?;
            let session = db.append_fasting_session(&session)?;
            print_json(&Event::FastingSessionSaved { session })?;
        }
        FastAction::Watch => watch(timer, &config)?,
        FastAction::Reset => {
            let event = timer.reset();
            save_timer(&db, &timer)?;
            print_json(&event)?;
        }
        FastAction::History { json } => {
            let sessions = db.list_fasting_sessions()?;
            if json {
                print_json(&sessions)?;
            } else {
                print_history(&sessions);
            }
        }
        FastAction::Delete { id, strict } => {
            let existed = db.delete_fasting_session(id)?;
            if strict {
                StorageError::require_deleted(existed, FASTING_SESSIONS, id)?;
            }
            print_json(&Event::RecordDeleted {
                collection: FASTING_SESSIONS.to_string(),
                id,
                existed,
            })?;
        }
    }
    Ok(())
}

/// Print a status line on every tick until Ctrl-C. Read-only: another
/// process may toggle the fast meanwhile.
fn watch(timer: FastingTimer, config: &Config) -> Result<()> {
    if !timer.is_active() {
        print_json(&timer.status())?;
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let local = tokio::task::LocalSet::new();

    local.block_on(&runtime, async {
        let mut live = LiveTimer::new(timer, Arc::new(SystemClock), config.tick_interval());
        let mut status = live.subscribe();
        live.resume();
        loop {
            tokio::select! {
                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = status.borrow_and_update().clone();
                    println!(
                        "{}  {:>5.1}%  {}",
                        current.elapsed,
                        current.progress * 100.0,
                        current.status_text
                    );
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }
    });
    Ok(())
}

fn print_history(sessions: &[FastingSession]) {
    if sessions.is_empty() {
        println!("No fasting sessions yet");
        return;
    }
    for session in sessions {
        let start = session.start_time.with_timezone(&Local);
        let end = session.end_time.with_timezone(&Local);
        println!(
            "{:>5}  {}  {} - {}  {}",
            session.id,
            start.format("%b %e, %Y"),
            start.format("%H:%M"),
            end.format("%H:%M"),
            format_hours_minutes(session.duration_secs),
        );
    }
}
