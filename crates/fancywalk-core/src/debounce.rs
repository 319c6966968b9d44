//! Trailing-edge coalescing of bursty notifications.
//!
//! ```ignore
//! let mut debounce = Debouncer::new(Duration::from_secs(5));
//! loop {
//!     tokio::select! {
//!         Some(_) = changes.recv() => debounce.trigger(),
//!         _ = debounce.ready() => refresh(),
//!     }
//! }
//! ```

use std::future::pending;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Longest supported delay; longer ones are clamped so deadlines can't
/// overflow `Instant`.
pub const MAX_DELAY: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Collapses every `trigger()` inside a `delay` window into one firing,
/// `delay` after the last trigger.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay: delay.min(MAX_DELAY),
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm the debouncer, pushing back a pending deadline.
    pub fn trigger(&mut self) {
        self.deadline = Some(Instant::now() + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolves once the armed deadline passes, then disarms.
    /// Never resolves while disarmed.
    ///
    /// Cancel-safe: dropping the future leaves the deadline armed.
    pub async fn ready(&mut self) {
        match self.deadline {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.deadline = None;
            }
            None => pending::<()>().await,
        }
    }
}
