use alloc::rc::Rc;

use super::{AutoCommand, CommandContext};
use crate::subsystems::flywheel::Flywheel;

/// Sets the flywheel target and finishes at once. The flywheel's own loop
/// does the spinning.
#[derive(Clone)]
pub struct SpinRpm {
    flywheel: Rc<Flywheel>,
    rpm: f64,
}

impl SpinRpm {
    pub fn new(flywheel: Rc<Flywheel>, rpm: f64) -> Self {
        Self { flywheel, rpm }
    }
}

impl AutoCommand for SpinRpm {
    fn run(&mut self, _ctx: &mut CommandContext) -> bool {
        self.flywheel.spin_rpm(self.rpm);
        true
    }
}

/// Waits until the flywheel is within `threshold` rpm of its target.
#[derive(Clone)]
pub struct WaitUntilUpToSpeed {
    flywheel: Rc<Flywheel>,
    threshold: f64,
}

impl WaitUntilUpToSpeed {
    pub fn new(flywheel: Rc<Flywheel>, threshold: f64) -> Self {
        Self {
            flywheel,
            threshold,
        }
    }
}

impl AutoCommand for WaitUntilUpToSpeed {
    fn run(&mut self, _ctx: &mut CommandContext) -> bool {
        self.flywheel.is_up_to_speed(self.threshold)
    }
}

#[derive(Clone)]
pub struct FlywheelStop {
    flywheel: Rc<Flywheel>,
}

impl FlywheelStop {
    pub fn new(flywheel: Rc<Flywheel>) -> Self {
        Self { flywheel }
    }
}

impl AutoCommand for FlywheelStop {
    fn run(&mut self, _ctx: &mut CommandContext) -> bool {
        self.flywheel.stop();
        true
    }
}
