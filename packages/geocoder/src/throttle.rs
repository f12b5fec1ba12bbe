//! Minimum spacing between outbound requests.

use std::time::Duration;

use tokio::time::Instant;

/// Enforces at least `interval` between the starts of consecutive
/// requests. Used from a single task, so at most one request is ever in
/// flight.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last_start: Option<Instant>,
}

impl Throttle {
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_start: None,
        }
    }

    /// Waits until a request may start, then records the start time.
    ///
    /// The first call returns immediately.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_start {
            tokio::time::sleep_until(last + self.interval).await;
        }
        self.last_start = Some(Instant::now());
    }

    /// Pushes the next permitted start out by `delay` from now, e.g. after
    /// the service reports rate limiting.
    pub fn back_off(&mut self, delay: Duration) {
        let resume = Instant::now() + delay;
        self.last_start = Some(resume.checked_sub(self.interval).unwrap_or(resume));
    }
}
