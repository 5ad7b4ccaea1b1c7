use std::time::{Duration, Instant};

/// Abstraction over where frame timestamps originate from.
pub trait TimeSource {
    /// Restarts the clock at zero.
    fn reset(&mut self);
    /// Monotonic time since the last reset.
    fn sample(&mut self) -> Duration;
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
    last: Duration,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            last: Duration::ZERO,
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn reset(&mut self) {
        self.origin = Instant::now();
        self.last = Duration::ZERO;
    }

    fn sample(&mut self) -> Duration {
        // Never report a timestamp earlier than the previous sample.
        self.last = self.last.max(self.origin.elapsed());
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_time_is_monotonic() {
        let mut clock = SystemTimeSource::new();
        let first = clock.sample();
        let second = clock.sample();
        assert!(second >= first);
        clock.reset();
        assert!(clock.sample() <= second + Duration::from_secs(1));
    }
}
