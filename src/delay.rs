//! Blocking delay abstraction.
//!
//! The self-test holds each indicator for a settle interval. Production code
//! sleeps; tests inject [`NoDelay`] and inspect what was requested.

use std::time::Duration;

/// Blocking delay provider.
pub trait Delay {
    fn delay(&mut self, duration: Duration);
}

/// Sleeps the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Returns immediately, remembering every requested delay.
#[derive(Debug, Clone, Default)]
pub struct NoDelay {
    pub requested: Vec<Duration>,
}

impl NoDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of all requested delays.
    pub fn total(&self) -> Duration {
        self.requested.iter().sum()
    }
}

impl Delay for NoDelay {
    fn delay(&mut self, duration: Duration) {
        self.requested.push(duration);
    }
}

impl<D: Delay + ?Sized> Delay for &mut D {
    fn delay(&mut self, duration: Duration) {
        (**self).delay(duration)
    }
}
