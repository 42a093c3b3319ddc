//! Autonomous command scheduling.
//!
//! A routine is a tree of [`AutoCommand`]s. The [`CommandController`] steps
//! the active command once per control tick; composites step their children
//! the same way. Nothing here blocks, so a whole routine runs on one
//! cooperative loop.

pub mod basic;
pub mod composites;
pub mod conditions;
pub mod controller;
pub mod drive;
pub mod flywheel;

use alloc::{boxed::Box, vec::Vec};
use core::time::Duration;

use dyn_clone::DynClone;
use log::{debug, warn};

pub use basic::{Delay, FunctionCommand, WaitUntilCondition};
pub use composites::{Async, Branch, InOrder, Parallel, ParallelPolicy, RepeatUntil};
pub use conditions::{Condition, ConditionExt, FunctionCondition, IfTimePassed, TimesTested};
pub use controller::CommandController;

use crate::utils::CancelToken;

/// Timeout in seconds for commands that don't pick their own.
pub const DEFAULT_TIMEOUT: f64 = 10.0;

dyn_clone::clone_trait_object!(AutoCommand);

/// One unit of autonomous work.
///
/// `run` is called once per tick and returns `true` once the command has
/// finished. It must never block.
pub trait AutoCommand: DynClone {
    fn run(&mut self, ctx: &mut CommandContext) -> bool;

    /// Called once when the command runs out of time, instead of another
    /// `run`. Commands that drive actuators should leave them safe here.
    fn on_timeout(&mut self) {}

    /// Called when the routine is aborted while this command is active.
    fn cancel(&mut self) {}

    /// Seconds this command may run for, measured from its first step.
    /// `None` never times out.
    fn timeout(&self) -> Option<f64> {
        Some(DEFAULT_TIMEOUT)
    }
}

impl AutoCommand for Box<dyn AutoCommand> {
    fn run(&mut self, ctx: &mut CommandContext) -> bool {
        (**self).run(ctx)
    }

    fn on_timeout(&mut self) {
        (**self).on_timeout()
    }

    fn cancel(&mut self) {
        (**self).cancel()
    }

    fn timeout(&self) -> Option<f64> {
        (**self).timeout()
    }
}

/// Decorators available on every command.
pub trait AutoCommandExt: AutoCommand + Clone + Sized + 'static {
    /// Replaces the command's own timeout. A non-positive value disables it.
    fn with_timeout(self, seconds: f64) -> WithTimeout<Self> {
        WithTimeout {
            command: self,
            timeout: (seconds > 0.0).then_some(seconds),
        }
    }

    /// Ends the command early, cancelling it, once `condition` tests true.
    /// Ending this way counts as finishing.
    fn with_cancel_condition(self, condition: impl Condition + 'static) -> CancelWhen<Self> {
        CancelWhen {
            command: self,
            condition: Box::new(condition),
        }
    }

    fn boxed(self) -> Box<dyn AutoCommand> {
        Box::new(self)
    }
}

impl<C: AutoCommand + Clone + 'static> AutoCommandExt for C {}

#[derive(Clone)]
pub struct WithTimeout<C> {
    command: C,
    timeout: Option<f64>,
}

impl<C: AutoCommand + Clone> AutoCommand for WithTimeout<C> {
    fn run(&mut self, ctx: &mut CommandContext) -> bool {
        self.command.run(ctx)
    }

    fn on_timeout(&mut self) {
        self.command.on_timeout();
    }

    fn cancel(&mut self) {
        self.command.cancel();
    }

    fn timeout(&self) -> Option<f64> {
        self.timeout
    }
}

#[derive(Clone)]
pub struct CancelWhen<C> {
    command: C,
    condition: Box<dyn Condition>,
}

impl<C: AutoCommand + Clone> AutoCommand for CancelWhen<C> {
    fn run(&mut self, ctx: &mut CommandContext) -> bool {
        if self.condition.test() {
            debug!("cancel condition met, ending command early");
            self.command.cancel();
            return true;
        }
        self.command.run(ctx)
    }

    fn on_timeout(&mut self) {
        self.command.on_timeout();
    }

    fn cancel(&mut self) {
        self.command.cancel();
    }

    fn timeout(&self) -> Option<f64> {
        self.command.timeout()
    }
}

/// What a command sees of the scheduler during one step.
pub struct CommandContext<'a> {
    now: Duration,
    pool: &'a mut BackgroundPool,
}

impl<'a> CommandContext<'a> {
    pub fn new(now: Duration, pool: &'a mut BackgroundPool) -> Self {
        Self { now, pool }
    }

    /// Scheduler time of the current tick.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Hands `command` to the background pool. It is stepped every tick from
    /// now on until it finishes, times out, or `token` is cancelled.
    pub fn detach(&mut self, command: Box<dyn AutoCommand>, token: CancelToken) {
        self.pool.push(Scheduled::new(command), token);
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Progress {
    Running,
    Done,
    TimedOut,
}

impl Progress {
    pub(crate) fn is_finished(self) -> bool {
        self != Progress::Running
    }
}

/// A command plus the bookkeeping needed to time it out.
#[derive(Clone)]
pub(crate) struct Scheduled {
    pub command: Box<dyn AutoCommand>,
    timeout: Option<f64>,
    started: Option<Duration>,
}

impl Scheduled {
    pub fn new(command: Box<dyn AutoCommand>) -> Self {
        let timeout = command.timeout();
        Self::with_timeout(command, timeout)
    }

    pub fn with_timeout(command: Box<dyn AutoCommand>, timeout: Option<f64>) -> Self {
        Self {
            command,
            timeout: timeout.filter(|seconds| *seconds > 0.0),
            started: None,
        }
    }

    pub fn step(&mut self, ctx: &mut CommandContext) -> Progress {
        let started = *self.started.get_or_insert(ctx.now());
        if let Some(timeout) = self.timeout {
            if ctx.now().saturating_sub(started).as_secs_f64() >= timeout {
                self.command.on_timeout();
                return Progress::TimedOut;
            }
        }

        if self.command.run(ctx) {
            Progress::Done
        } else {
            Progress::Running
        }
    }

    pub fn cancel(&mut self) {
        self.command.cancel();
    }

    pub fn on_timeout(&mut self) {
        self.command.on_timeout();
    }
}

/// Commands detached from the main sequence by [`Async`].
#[derive(Default)]
pub struct BackgroundPool {
    tasks: Vec<(Scheduled, CancelToken)>,
}

impl BackgroundPool {
    fn push(&mut self, task: Scheduled, token: CancelToken) {
        self.tasks.push((task, token));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Steps every detached command once, dropping the ones that finished.
    pub fn step(&mut self, now: Duration) {
        // Commands detached while stepping start on the next tick.
        let mut spawned = BackgroundPool::default();
        let mut ctx = CommandContext::new(now, &mut spawned);

        self.tasks.retain_mut(|(task, token)| {
            if token.is_cancelled() {
                task.cancel();
                debug!("detached command cancelled");
                return false;
            }
            match task.step(&mut ctx) {
                Progress::Running => true,
                Progress::Done => false,
                Progress::TimedOut => {
                    warn!("detached command timed out");
                    false
                }
            }
        });
        self.tasks.append(&mut spawned.tasks);
    }

    /// Cancels every detached command, in the order they were detached.
    pub fn cancel_all(&mut self) {
        for (mut task, token) in self.tasks.drain(..) {
            token.cancel();
            task.cancel();
        }
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    //! Commands that record what the scheduler did to them.

    use alloc::{rc::Rc, string::String, vec::Vec};
    use core::cell::RefCell;

    use super::{AutoCommand, CommandContext};

    pub type Log = Rc<RefCell<Vec<String>>>;

    /// Finishes on its `steps`-th run and logs every hook call.
    #[derive(Clone)]
    pub struct Scripted {
        pub name: &'static str,
        pub steps: usize,
        pub timeout: Option<f64>,
        pub log: Log,
        runs: usize,
    }

    impl Scripted {
        pub fn new(name: &'static str, steps: usize, log: &Log) -> Self {
            Self {
                name,
                steps,
                timeout: Some(super::DEFAULT_TIMEOUT),
                log: log.clone(),
                runs: 0,
            }
        }

        fn record(&self, event: &str) {
            self.log.borrow_mut().push(alloc::format!("{}:{event}", self.name));
        }
    }

    impl AutoCommand for Scripted {
        fn run(&mut self, _ctx: &mut CommandContext) -> bool {
            self.runs += 1;
            self.record("run");
            self.runs >= self.steps
        }

        fn on_timeout(&mut self) {
            self.record("timeout");
        }

        fn cancel(&mut self) {
            self.record("cancel");
        }

        fn timeout(&self) -> Option<f64> {
            self.timeout
        }
    }

    pub fn count(log: &Log, event: &str) -> usize {
        log.borrow().iter().filter(|e| e.as_str() == event).count()
    }
}
