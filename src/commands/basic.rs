use alloc::boxed::Box;
use core::time::Duration;

use super::{conditions::Condition, AutoCommand, CommandContext};

/// Waits until `condition` tests true.
#[derive(Clone)]
pub struct WaitUntilCondition {
    condition: Box<dyn Condition>,
}

impl WaitUntilCondition {
    pub fn new(condition: impl Condition + 'static) -> Self {
        Self {
            condition: Box::new(condition),
        }
    }
}

impl AutoCommand for WaitUntilCondition {
    fn run(&mut self, _ctx: &mut CommandContext) -> bool {
        self.condition.test()
    }
}

/// Waits for a fixed time, counted from the first step.
#[derive(Clone, Debug)]
pub struct Delay {
    duration: Duration,
    started: Option<Duration>,
}

impl Delay {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            started: None,
        }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }
}

impl AutoCommand for Delay {
    fn run(&mut self, ctx: &mut CommandContext) -> bool {
        let started = *self.started.get_or_insert(ctx.now());
        ctx.now().saturating_sub(started) >= self.duration
    }

    // A delay is its own deadline.
    fn timeout(&self) -> Option<f64> {
        None
    }
}

/// Calls a closure every tick until it returns `true`.
#[derive(Clone)]
pub struct FunctionCommand<F> {
    function: F,
}

impl<F: FnMut() -> bool + Clone> FunctionCommand<F> {
    pub fn new(function: F) -> Self {
        Self { function }
    }
}

impl<F: FnMut() -> bool + Clone> AutoCommand for FunctionCommand<F> {
    fn run(&mut self, _ctx: &mut CommandContext) -> bool {
        (self.function)()
    }
}
