use alloc::{boxed::Box, rc::Rc};
use core::time::Duration;

use async_trait::async_trait;

use super::clock::ManualClock;

/// Paces a control loop.
///
/// Loops await `tick` once per cycle, which is the only place they yield.
#[async_trait(?Send)]
pub trait Ticker {
    async fn tick(&mut self, period: Duration);
}

/// Moves a [`ManualClock`] forward instead of sleeping.
pub struct SimulatedTicker {
    clock: Rc<ManualClock>,
    ticks: usize,
}

impl SimulatedTicker {
    pub fn new(clock: Rc<ManualClock>) -> Self {
        Self { clock, ticks: 0 }
    }

    /// Number of ticks awaited so far.
    pub fn ticks(&self) -> usize {
        self.ticks
    }
}

#[async_trait(?Send)]
impl Ticker for SimulatedTicker {
    async fn tick(&mut self, period: Duration) {
        self.clock.advance(period);
        self.ticks += 1;
    }
}

/// Sleeps on the vexide executor, letting other tasks run in between.
#[cfg(target_os = "vexos")]
pub struct SleepTicker;

#[cfg(target_os = "vexos")]
#[async_trait(?Send)]
impl Ticker for SleepTicker {
    async fn tick(&mut self, period: Duration) {
        vexide::time::sleep(period).await;
    }
}
