use core::time::Duration;

use super::{clock::SharedClock, ticker::Ticker};

/// Tracks elapsed time and manages time-based delays.
///
/// # Examples
/// ```
/// use autocore::utils::{clock::ManualClock, timer::Timer};
/// use core::time::Duration;
/// let clock = ManualClock::new();
/// let mut timer = Timer::new(clock.clone(), Duration::from_secs(5));
/// clock.advance(Duration::from_secs(5));
/// assert!(timer.is_done());
/// ```
#[derive(Clone)]
pub struct Timer {
    clock: SharedClock,
    period: Duration,
    elapsed_duration: Duration,
    previous_instant: Duration,
    paused: bool,
}

impl Timer {
    /// Creates a new timer with the specified duration.
    pub fn new(clock: SharedClock, period: Duration) -> Self {
        let previous_instant = clock.now();
        Self {
            clock,
            period,
            elapsed_duration: Duration::ZERO,
            previous_instant,
            paused: false,
        }
    }

    /// Returns the timer's configured period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Returns the remaining time until the timer expires.
    pub fn remaining_time(&mut self) -> Duration {
        self.update();
        self.period.saturating_sub(self.elapsed_duration)
    }

    /// Returns the elapsed time since the timer started.
    pub fn elapsed_time(&mut self) -> Duration {
        self.update();
        self.elapsed_duration
    }

    /// Checks if the timer has completed its period.
    pub fn is_done(&mut self) -> bool {
        self.update();
        self.period.saturating_sub(self.elapsed_duration) == Duration::ZERO
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Pauses the timer, freezing elapsed time.
    pub fn pause(&mut self) {
        if !self.paused {
            self.update();
        }
        self.paused = true;
    }

    pub fn resume(&mut self) {
        if self.paused {
            self.previous_instant = self.clock.now();
        }
        self.paused = false;
    }

    /// Resets the timer to zero elapsed time.
    pub fn reset(&mut self) {
        self.elapsed_duration = Duration::ZERO;
        self.previous_instant = self.clock.now();
    }

    /// Updates the timer's period and resets it.
    pub fn set_period(&mut self, period: Duration) {
        self.period = period;
        self.reset();
    }

    /// Waits until the timer completes, checking once per tick.
    pub async fn wait_until_complete(&mut self, ticker: &mut dyn Ticker) {
        while !self.is_done() {
            ticker.tick(Duration::from_millis(5)).await;
        }
    }

    fn update(&mut self) {
        let current_instant = self.clock.now();
        if !self.paused {
            self.elapsed_duration += current_instant.saturating_sub(self.previous_instant);
        }
        self.previous_instant = current_instant;
    }
}
