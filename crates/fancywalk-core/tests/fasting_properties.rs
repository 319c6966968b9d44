//! Property tests for the fasting timer and the session ordering contract.

use chrono::{DateTime, Duration, Utc};
use fancywalk_core::timer::{format_hms, DEFAULT_GOAL_SECS};
use fancywalk_core::{Database, FastingTimer, NewFastingSession};
use proptest::collection::vec;
use proptest::prelude::*;

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

proptest! {
    #[test]
    fn toggle_alternates_and_gates_saving(gaps in vec(0i64..200_000_000, 0..24)) {
        let mut timer = FastingTimer::new();
        let mut now = t0();
        prop_assert!(!timer.is_active());
        prop_assert!(!timer.can_save());

        for (i, gap) in gaps.iter().enumerate() {
            now += Duration::milliseconds(*gap);
            timer.toggle_at(now);
            let calls = i + 1;
            prop_assert_eq!(timer.is_active(), calls % 2 == 1);
            prop_assert_eq!(timer.can_save(), calls % 2 == 0);
        }
    }

    #[test]
    fn completed_duration_is_exact_span(gap_ms in 0i64..400_000_000) {
        let mut timer = FastingTimer::new();
        timer.toggle_at(t0());
        timer.toggle_at(t0() + Duration::milliseconds(gap_ms));

        let session = timer.completed_session().unwrap();
        let span = session.end_time() - session.start_time();
        prop_assert!(session.duration_secs() >= 0.0);
        prop_assert_eq!(session.duration_secs(), span.num_milliseconds() as f64 / 1000.0);
        prop_assert_eq!(timer.last_duration_secs(), Some(session.duration_secs()));
    }

    #[test]
    fn progress_is_monotonic_and_saturates(ticks in vec(0i64..10_000, 1..60)) {
        let mut timer = FastingTimer::new();
        timer.toggle_at(t0());
        let mut now = t0();
        let mut last = 0.0;
        for step in ticks {
            // Occasionally step the clock backwards.
            now += Duration::seconds(step * 2 - 5_000);
            timer.tick_at(now);
            let progress = timer.progress();
            prop_assert!(progress >= last);
            prop_assert!(progress <= 1.0);
            if timer.elapsed_secs() >= DEFAULT_GOAL_SECS as f64 {
                prop_assert_eq!(progress, 1.0);
                prop_assert_eq!(timer.status_text(), "Goal reached!");
            }
            last = progress;
        }
    }

    #[test]
    fn hms_fields_round_trip(secs in 0u64..1_000_000) {
        let text = format_hms(secs as f64);
        let parts: Vec<u64> = text.split(':').map(|p| p.parse().unwrap()).collect();
        prop_assert_eq!(parts.len(), 3);
        prop_assert!(parts[1] < 60 && parts[2] < 60);
        prop_assert_eq!(parts[0] * 3600 + parts[1] * 60 + parts[2], secs);
    }

    #[test]
    fn sessions_list_newest_start_first(starts in vec(0i64..10_000_000, 1..16)) {
        let db = Database::open_in_memory().unwrap();
        for start in &starts {
            let start = t0() + Duration::seconds(*start);
            let session = NewFastingSession::new(start, start + Duration::hours(1)).unwrap();
            db.append_fasting_session(&session).unwrap();
        }

        let listed = db.list_fasting_sessions().unwrap();
        prop_assert_eq!(listed.len(), starts.len());
        for pair in listed.windows(2) {
            prop_assert!(pair[0].start_time >= pair[1].start_time);
        }
    }
}

#[test]
fn three_sessions_list_in_reverse_start_order() {
    let db = Database::open_in_memory().unwrap();
    let t1 = t0();
    let t2 = t0() + Duration::hours(24);
    let t3 = t0() + Duration::hours(48);
    for start in [t2, t1, t3] {
        let session = NewFastingSession::new(start, start + Duration::hours(16)).unwrap();
        db.append_fasting_session(&session).unwrap();
    }

    let starts: Vec<_> = db
        .list_fasting_sessions()
        .unwrap()
        .into_iter()
        .map(|s| s.start_time)
        .collect();
    assert_eq!(starts, vec![t3, t2, t1]);
}
