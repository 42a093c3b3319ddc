use alloc::boxed::Box;
use core::time::Duration;

use dyn_clone::DynClone;

use crate::utils::clock::SharedClock;

dyn_clone::clone_trait_object!(Condition);

/// A yes/no question asked by the scheduler, e.g. when to stop repeating.
///
/// Some conditions keep state between tests, so `test` takes `&mut self`.
pub trait Condition: DynClone {
    fn test(&mut self) -> bool;
}

impl Condition for Box<dyn Condition> {
    fn test(&mut self) -> bool {
        (**self).test()
    }
}

pub trait ConditionExt: Condition + Clone + Sized + 'static {
    /// Both sides are always tested, so stateful conditions keep counting.
    fn and(self, other: impl Condition + 'static) -> And {
        And(Box::new(self), Box::new(other))
    }

    /// Both sides are always tested, so stateful conditions keep counting.
    fn or(self, other: impl Condition + 'static) -> Or {
        Or(Box::new(self), Box::new(other))
    }

    fn boxed(self) -> Box<dyn Condition> {
        Box::new(self)
    }
}

impl<C: Condition + Clone + 'static> ConditionExt for C {}

#[derive(Clone)]
pub struct And(Box<dyn Condition>, Box<dyn Condition>);

impl Condition for And {
    fn test(&mut self) -> bool {
        let a = self.0.test();
        let b = self.1.test();
        a && b
    }
}

#[derive(Clone)]
pub struct Or(Box<dyn Condition>, Box<dyn Condition>);

impl Condition for Or {
    fn test(&mut self) -> bool {
        let a = self.0.test();
        let b = self.1.test();
        a || b
    }
}

#[derive(Clone)]
pub struct FunctionCondition<F> {
    function: F,
}

impl<F: FnMut() -> bool + Clone> FunctionCondition<F> {
    pub fn new(function: F) -> Self {
        Self { function }
    }
}

impl<F: FnMut() -> bool + Clone> Condition for FunctionCondition<F> {
    fn test(&mut self) -> bool {
        (self.function)()
    }
}

/// True from the `times`-th test onward.
#[derive(Clone, Debug)]
pub struct TimesTested {
    times: usize,
    tested: usize,
}

impl TimesTested {
    pub fn new(times: usize) -> Self {
        Self { times, tested: 0 }
    }
}

impl Condition for TimesTested {
    fn test(&mut self) -> bool {
        self.tested = self.tested.saturating_add(1);
        self.tested >= self.times
    }
}

/// True once `seconds` have passed since the first test.
#[derive(Clone)]
pub struct IfTimePassed {
    clock: SharedClock,
    duration: Duration,
    first_tested: Option<Duration>,
}

impl IfTimePassed {
    pub fn new(clock: SharedClock, seconds: f64) -> Self {
        Self {
            clock,
            duration: Duration::from_secs_f64(seconds.max(0.0)),
            first_tested: None,
        }
    }
}

impl Condition for IfTimePassed {
    fn test(&mut self) -> bool {
        let now = self.clock.now();
        let since = *self.first_tested.get_or_insert(now);
        now.saturating_sub(since) >= self.duration
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use core::cell::Cell;

    use super::*;
    use crate::utils::clock::ManualClock;

    #[test]
    fn times_tested_counts_tests() {
        let mut condition = TimesTested::new(3);
        assert!(!condition.test());
        assert!(!condition.test());
        assert!(condition.test());
        assert!(condition.test());
    }

    #[test]
    fn time_passed_starts_on_first_test() {
        let clock = ManualClock::new();
        clock.advance(Duration::from_secs(4));
        let mut condition = IfTimePassed::new(clock.clone(), 0.5);
        assert!(!condition.test());
        clock.advance(Duration::from_millis(400));
        assert!(!condition.test());
        clock.advance(Duration::from_millis(100));
        assert!(condition.test());
    }

    #[test]
    fn combinators_test_both_sides() {
        let calls = Rc::new(Cell::new(0));
        let counting = {
            let calls = calls.clone();
            FunctionCondition::new(move || {
                calls.set(calls.get() + 1);
                true
            })
        };

        let mut either = counting.clone().or(TimesTested::new(2));
        assert!(either.test());
        assert_eq!(calls.get(), 1);

        let mut both = TimesTested::new(2).and(counting);
        assert!(!both.test());
        assert!(both.test());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn clones_keep_independent_state() {
        let mut template = TimesTested::new(2).boxed();
        let mut copy = template.clone();
        assert!(!template.test());
        assert!(template.test());
        assert!(!copy.test());
    }
}
