use alloc::{boxed::Box, collections::VecDeque, rc::Rc, vec::Vec};
use core::{cell::RefCell, time::Duration};

use async_trait::async_trait;
use log::{debug, warn};

use super::AutonRoutine;
use crate::{
    commands::controller::CONTROL_PERIOD,
    utils::{clock::SharedClock, ticker::Ticker, timer::Timer},
};

type Step = Box<dyn FnMut() -> bool>;

/// A quick named routine built from closures that return `true` when done.
///
/// Lighter than a [`CommandController`](crate::commands::CommandController)
/// for one-off sequences: no timeouts, no cancellation.
pub struct GenericAuto {
    name: &'static str,
    clock: SharedClock,
    steps: RefCell<VecDeque<Step>>,
    background: Rc<RefCell<Vec<Step>>>,
    period: Duration,
    /// Paces the routine when it runs from an [`AutoChooser`](super::AutoChooser).
    ticker: RefCell<Option<Box<dyn Ticker>>>,
}

impl GenericAuto {
    pub fn new(name: &'static str, clock: SharedClock) -> Self {
        Self {
            name,
            clock,
            steps: RefCell::default(),
            background: Rc::default(),
            period: CONTROL_PERIOD,
            ticker: RefCell::new(None),
        }
    }

    /// Lets the routine run on its own as an [`AutonRoutine`].
    pub fn with_ticker(self, ticker: Box<dyn Ticker>) -> Self {
        *self.ticker.borrow_mut() = Some(ticker);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn add(&mut self, step: impl FnMut() -> bool + 'static) -> &mut Self {
        self.steps.get_mut().push_back(Box::new(step));
        self
    }

    /// Adds a step that is reached in sequence but then runs alongside the
    /// rest of the routine until it reports done.
    pub fn add_async(&mut self, step: impl FnMut() -> bool + 'static) -> &mut Self {
        let mut pending: Option<Step> = Some(Box::new(step));
        let background = self.background.clone();
        self.add(move || {
            if let Some(step) = pending.take() {
                background.borrow_mut().push(step);
            }
            true
        })
    }

    /// Adds a pause of `ms` milliseconds, timed from when the step is reached.
    pub fn add_delay(&mut self, ms: u64) -> &mut Self {
        let clock = self.clock.clone();
        let mut timer: Option<Timer> = None;
        self.add(move || {
            timer
                .get_or_insert_with(|| Timer::new(clock.clone(), Duration::from_millis(ms)))
                .is_done()
        })
    }

    pub fn is_finished(&self) -> bool {
        self.steps.borrow().is_empty() && self.background.borrow().is_empty()
    }

    /// Steps the current entry and every started async step once.
    pub fn step(&self) -> bool {
        {
            let mut steps = self.steps.borrow_mut();
            if let Some(step) = steps.front_mut() {
                if step() {
                    steps.pop_front();
                }
            }
        }
        self.background.borrow_mut().retain_mut(|step| !step());
        self.is_finished()
    }

    /// Without `blocking`, runs a single [`GenericAuto::step`] and returns
    /// whether the routine is finished. With it, keeps stepping once per
    /// period until everything, async steps included, is done.
    pub async fn run(&self, blocking: bool, ticker: &mut dyn Ticker) -> bool {
        if !blocking {
            return self.step();
        }
        debug!("running {} ({} steps)", self.name, self.steps.borrow().len());
        while !self.step() {
            ticker.tick(self.period).await;
        }
        true
    }
}

#[async_trait(?Send)]
impl<R> AutonRoutine<R> for GenericAuto {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn run(&self, _robot: &mut R) {
        let Some(mut ticker) = self.ticker.borrow_mut().take() else {
            warn!("{} has no ticker to run with", self.name);
            return;
        };
        GenericAuto::run(self, true, ticker.as_mut()).await;
        *self.ticker.borrow_mut() = Some(ticker);
    }
}
