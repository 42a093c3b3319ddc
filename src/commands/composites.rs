use alloc::{boxed::Box, collections::VecDeque, vec::Vec};

use log::debug;

use super::{
    conditions::{Condition, TimesTested},
    AutoCommand, CommandContext, Progress, Scheduled,
};
use crate::utils::CancelToken;

/// Runs its children one after another.
///
/// A child that finishes or times out hands over to the next child on the
/// following tick. Each child keeps its own timeout; the sequence as a whole
/// has none unless one is set with `with_timeout`.
#[derive(Clone)]
pub struct InOrder {
    queue: VecDeque<Scheduled>,
    current: Option<Scheduled>,
}

impl InOrder {
    pub fn new(commands: Vec<Box<dyn AutoCommand>>) -> Self {
        Self {
            queue: commands.into_iter().map(Scheduled::new).collect(),
            current: None,
        }
    }

    pub fn then(mut self, command: Box<dyn AutoCommand>) -> Self {
        self.queue.push_back(Scheduled::new(command));
        self
    }
}

impl AutoCommand for InOrder {
    fn run(&mut self, ctx: &mut CommandContext) -> bool {
        if self.current.is_none() {
            self.current = self.queue.pop_front();
        }
        let Some(current) = &mut self.current else {
            return true;
        };

        if current.step(ctx).is_finished() {
            self.current = None;
            self.queue.is_empty()
        } else {
            false
        }
    }

    fn on_timeout(&mut self) {
        if let Some(current) = &mut self.current {
            current.on_timeout();
        }
    }

    fn cancel(&mut self) {
        if let Some(current) = &mut self.current {
            current.cancel();
        }
        self.queue.clear();
    }

    fn timeout(&self) -> Option<f64> {
        None
    }
}

/// When a [`Parallel`] group counts as finished.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ParallelPolicy {
    /// Every child runs to completion.
    #[default]
    RaceNone,
    /// The first child to finish ends the group and the rest are cancelled.
    RaceOne,
}

/// Steps all of its children on every tick.
///
/// Children are stepped in the order given. Only one of them should drive
/// the chassis.
#[derive(Clone)]
pub struct Parallel {
    children: Vec<Option<Scheduled>>,
    policy: ParallelPolicy,
}

impl Parallel {
    pub fn new(commands: Vec<Box<dyn AutoCommand>>, policy: ParallelPolicy) -> Self {
        Self {
            children: commands
                .into_iter()
                .map(|command| Some(Scheduled::new(command)))
                .collect(),
            policy,
        }
    }

    pub fn all(commands: Vec<Box<dyn AutoCommand>>) -> Self {
        Self::new(commands, ParallelPolicy::RaceNone)
    }

    pub fn race(commands: Vec<Box<dyn AutoCommand>>) -> Self {
        Self::new(commands, ParallelPolicy::RaceOne)
    }

    fn running(&mut self) -> impl Iterator<Item = &mut Scheduled> {
        self.children.iter_mut().flatten()
    }
}

impl AutoCommand for Parallel {
    fn run(&mut self, ctx: &mut CommandContext) -> bool {
        let mut any_finished = false;
        for slot in &mut self.children {
            if let Some(child) = slot {
                if child.step(ctx).is_finished() {
                    *slot = None;
                    any_finished = true;
                }
            }
        }

        if self.policy == ParallelPolicy::RaceOne && any_finished {
            debug!("parallel race won, cancelling the rest");
            self.cancel();
            return true;
        }
        self.children.iter().all(Option::is_none)
    }

    fn on_timeout(&mut self) {
        self.running().for_each(Scheduled::on_timeout);
    }

    fn cancel(&mut self) {
        self.running().for_each(Scheduled::cancel);
        self.children.clear();
    }

    fn timeout(&self) -> Option<f64> {
        None
    }
}

/// Picks one of two commands by testing a condition once, on the first step.
#[derive(Clone)]
pub struct Branch {
    condition: Box<dyn Condition>,
    if_true: Scheduled,
    if_false: Option<Scheduled>,
    choice: Option<bool>,
}

impl Branch {
    pub fn new(
        condition: impl Condition + 'static,
        if_true: Box<dyn AutoCommand>,
        if_false: Box<dyn AutoCommand>,
    ) -> Self {
        Self {
            condition: Box::new(condition),
            if_true: Scheduled::new(if_true),
            if_false: Some(Scheduled::new(if_false)),
            choice: None,
        }
    }

    /// Runs `command` only if `condition` holds; otherwise finishes at once.
    pub fn when(condition: impl Condition + 'static, command: Box<dyn AutoCommand>) -> Self {
        Self {
            condition: Box::new(condition),
            if_true: Scheduled::new(command),
            if_false: None,
            choice: None,
        }
    }

    fn chosen(&mut self) -> Option<&mut Scheduled> {
        match self.choice? {
            true => Some(&mut self.if_true),
            false => self.if_false.as_mut(),
        }
    }
}

impl AutoCommand for Branch {
    fn run(&mut self, ctx: &mut CommandContext) -> bool {
        if self.choice.is_none() {
            let choice = self.condition.test();
            debug!("branch took the {choice} side");
            self.choice = Some(choice);
        }
        match self.chosen() {
            Some(branch) => branch.step(ctx).is_finished(),
            None => true,
        }
    }

    fn on_timeout(&mut self) {
        if let Some(branch) = self.chosen() {
            branch.on_timeout();
        }
    }

    fn cancel(&mut self) {
        if let Some(branch) = self.chosen() {
            branch.cancel();
        }
    }

    fn timeout(&self) -> Option<f64> {
        None
    }
}

/// Starts a command in the background and finishes immediately.
///
/// The child keeps running on the controller's background pool, with its own
/// timeout, until it finishes or [`Async::handle`] is cancelled.
pub struct Async {
    command: Option<Box<dyn AutoCommand>>,
    token: CancelToken,
}

impl Async {
    pub fn new(command: Box<dyn AutoCommand>) -> Self {
        Self {
            command: Some(command),
            token: CancelToken::new(),
        }
    }

    /// Cancelling this stops the detached child.
    pub fn handle(&self) -> CancelToken {
        self.token.clone()
    }
}

impl Clone for Async {
    // Each copy detaches its own child and gets its own handle.
    fn clone(&self) -> Self {
        Self {
            command: self.command.clone(),
            token: CancelToken::new(),
        }
    }
}

impl AutoCommand for Async {
    fn run(&mut self, ctx: &mut CommandContext) -> bool {
        if let Some(command) = self.command.take() {
            ctx.detach(command, self.token.clone());
        }
        true
    }

    fn cancel(&mut self) {
        self.command = None;
        self.token.cancel();
    }

    fn timeout(&self) -> Option<f64> {
        None
    }
}

/// Reruns a command until a condition holds.
///
/// The condition is tested each time the command finishes. Every rerun
/// starts from a fresh copy of the original command.
#[derive(Clone)]
pub struct RepeatUntil {
    template: Box<dyn AutoCommand>,
    current: Scheduled,
    condition: Box<dyn Condition>,
}

impl RepeatUntil {
    pub fn new(command: Box<dyn AutoCommand>, condition: impl Condition + 'static) -> Self {
        Self {
            current: Scheduled::new(command.clone()),
            template: command,
            condition: Box::new(condition),
        }
    }

    /// Runs `command` exactly `times` times.
    pub fn times(command: Box<dyn AutoCommand>, times: usize) -> Self {
        Self::new(command, TimesTested::new(times))
    }
}

impl AutoCommand for RepeatUntil {
    fn run(&mut self, ctx: &mut CommandContext) -> bool {
        if self.current.step(ctx) == Progress::Running {
            return false;
        }
        if self.condition.test() {
            return true;
        }
        self.current = Scheduled::new(self.template.clone());
        false
    }

    fn on_timeout(&mut self) {
        self.current.on_timeout();
    }

    fn cancel(&mut self) {
        self.current.cancel();
    }

    fn timeout(&self) -> Option<f64> {
        None
    }
}
