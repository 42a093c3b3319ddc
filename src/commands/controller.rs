use alloc::{boxed::Box, collections::VecDeque, vec::Vec};
use core::time::Duration;

use log::{info, warn};

use super::{
    basic::Delay, AutoCommand, AutoCommandExt, BackgroundPool, CommandContext, Progress, Scheduled,
};
use crate::{
    error::{ConfigError, Result},
    utils::{clock::SharedClock, ticker::Ticker, CancelToken},
};

/// How often [`CommandController::run`] steps the routine.
pub const CONTROL_PERIOD: Duration = Duration::from_millis(20);

/// Runs a queue of commands, one at a time, each under its own timeout.
///
/// ```
/// # use autocore::commands::{CommandController, Delay, AutoCommandExt};
/// # use autocore::utils::clock::ManualClock;
/// let clock = ManualClock::new();
/// let mut controller = CommandController::new(clock.clone());
/// controller.add(Delay::from_millis(40).boxed(), 1.0).unwrap();
/// assert!(controller.add(Delay::from_millis(40).boxed(), 0.0).is_err());
/// ```
pub struct CommandController {
    clock: SharedClock,
    period: Duration,
    queue: VecDeque<Scheduled>,
    active: Option<Scheduled>,
    pool: BackgroundPool,

    cancel: CancelToken,
    cancel_handled: bool,
    on_cancel: Vec<Box<dyn FnMut()>>,
    last_timed_out: bool,
}

impl CommandController {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            period: CONTROL_PERIOD,
            queue: VecDeque::new(),
            active: None,
            pool: BackgroundPool::default(),
            cancel: CancelToken::new(),
            cancel_handled: false,
            on_cancel: Vec::new(),
            last_timed_out: false,
        }
    }

    pub fn set_period(&mut self, period: Duration) {
        self.period = period;
    }

    /// Queues `command` with a timeout in seconds, replacing its own.
    pub fn add(&mut self, command: Box<dyn AutoCommand>, timeout: f64) -> Result<()> {
        if !(timeout > 0.0) {
            return Err(ConfigError::NonPositiveTimeout(timeout));
        }
        self.queue
            .push_back(Scheduled::with_timeout(command, Some(timeout)));
        Ok(())
    }

    /// Queues `command` under its own timeout.
    pub fn add_default(&mut self, command: Box<dyn AutoCommand>) {
        self.queue.push_back(Scheduled::new(command));
    }

    pub fn add_all(&mut self, commands: impl IntoIterator<Item = Box<dyn AutoCommand>>) {
        for command in commands {
            self.add_default(command);
        }
    }

    pub fn add_delay(&mut self, millis: u64) {
        self.add_default(Delay::from_millis(millis).boxed());
    }

    /// Registers a callback to run once if the routine is cancelled.
    pub fn on_cancel(&mut self, callback: impl FnMut() + 'static) {
        self.on_cancel.push(Box::new(callback));
    }

    /// A handle that cancels this routine from anywhere, e.g. a
    /// competition state change.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the last command to end did so by timing out.
    pub fn last_command_timed_out(&self) -> bool {
        self.last_timed_out
    }

    /// Commands still waiting to start.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn detached(&self) -> usize {
        self.pool.len()
    }

    /// Advances the routine by one tick. Returns `true` once nothing is left
    /// to run, in the queue or in the background, or after cancellation.
    pub fn step(&mut self) -> bool {
        if self.cancel.is_cancelled() {
            if !self.cancel_handled {
                self.handle_cancel();
            }
            return true;
        }

        let now = self.clock.now();
        if self.active.is_none() {
            self.active = self.queue.pop_front();
        }
        if let Some(active) = &mut self.active {
            let mut ctx = CommandContext::new(now, &mut self.pool);
            match active.step(&mut ctx) {
                Progress::Running => {}
                Progress::Done => {
                    self.last_timed_out = false;
                    self.active = None;
                }
                Progress::TimedOut => {
                    warn!("command timed out, moving on");
                    self.last_timed_out = true;
                    self.active = None;
                }
            }
        }
        self.pool.step(now);

        self.active.is_none() && self.queue.is_empty() && self.pool.is_empty()
    }

    /// Steps the routine every period until it is finished or cancelled.
    pub async fn run(&mut self, ticker: &mut dyn Ticker) {
        info!("autonomous started with {} commands", self.queue.len());
        while !self.step() {
            ticker.tick(self.period).await;
        }
        if self.cancel.is_cancelled() {
            info!("autonomous stopped early");
        } else {
            info!("autonomous finished");
        }
    }

    fn handle_cancel(&mut self) {
        info!("autonomous cancelled");
        if let Some(mut active) = self.active.take() {
            active.cancel();
        }
        self.queue.clear();
        self.pool.cancel_all();
        for callback in &mut self.on_cancel {
            callback();
        }
        self.cancel_handled = true;
    }
}

/// Dropping a controller with work left, e.g. when the competition state
/// changes under a running routine, cancels that work.
impl Drop for CommandController {
    fn drop(&mut self) {
        let unfinished = self.active.is_some() || !self.queue.is_empty() || !self.pool.is_empty();
        if unfinished && !self.cancel_handled {
            self.handle_cancel();
        }
    }
}
