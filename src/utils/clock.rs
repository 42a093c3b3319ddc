use alloc::rc::Rc;
use core::{cell::Cell, time::Duration};

/// A monotonic time source.
///
/// Everything that measures elapsed time (timeouts, PID dwell, odometry
/// velocity estimates) reads it through this trait so the same code runs on
/// the brain and under a simulated clock.
pub trait Clock {
    /// Time since an arbitrary, fixed epoch.
    fn now(&self) -> Duration;
}

pub type SharedClock = Rc<dyn Clock>;

/// A clock that only moves when told to.
#[derive(Default, Debug)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }

    pub fn set(&self, now: Duration) {
        self.now.set(now);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Wall clock backed by the brain's high resolution timer.
#[cfg(target_os = "vexos")]
pub struct SystemClock {
    epoch: vexide::time::Instant,
}

#[cfg(target_os = "vexos")]
impl SystemClock {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            epoch: vexide::time::Instant::now(),
        })
    }
}

#[cfg(target_os = "vexos")]
impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_only_moves_when_advanced() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        clock.advance(Duration::from_millis(20));
        clock.advance(Duration::from_millis(20));
        assert_eq!(clock.now(), Duration::from_millis(40));
        clock.set(Duration::from_secs(3));
        assert_eq!(clock.now(), Duration::from_secs(3));
    }
}
