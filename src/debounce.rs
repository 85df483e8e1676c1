//! Single-timer debounce
//!
//! A [`Debouncer`] owns at most one pending deadline. Every
//! [`Debouncer::reschedule`] replaces it, so only the most recent schedule
//! can fire. There is no maximum wait: a steady stream of reschedules keeps
//! pushing the deadline out.

use std::future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{self, Instant, Sleep};

/// Stand-in deadline for windows too large to represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

pub struct Debouncer {
    window: Duration,
    sleep: Pin<Box<Sleep>>,
    armed: bool,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            sleep: Box::pin(time::sleep(window)),
            armed: false,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Cancel any pending deadline and arm a new one `window` from now.
    pub fn reschedule(&mut self) {
        self.reschedule_from(Instant::now());
    }

    /// Like [`Debouncer::reschedule`], but counting the window from `trigger`.
    /// A trigger already older than the window fires on the next poll.
    pub fn reschedule_from(&mut self, trigger: Instant) {
        let deadline = trigger
            .checked_add(self.window)
            .unwrap_or_else(|| trigger + FAR_FUTURE);
        self.sleep.as_mut().reset(deadline);
        self.armed = true;
    }

    pub fn cancel(&mut self) {
        self.armed = false;
    }

    pub fn is_pending(&self) -> bool {
        self.armed
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.armed.then(|| self.sleep.deadline())
    }

    /// Resolves once the pending deadline elapses and disarms the debouncer.
    ///
    /// Never resolves while nothing is scheduled. Cancel safe: dropping the
    /// future leaves the schedule untouched.
    pub async fn fired(&mut self) {
        if !self.armed {
            future::pending::<()>().await;
        }
        self.sleep.as_mut().await;
        self.armed = false;
    }
}
