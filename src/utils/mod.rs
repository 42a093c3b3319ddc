#[macro_use]
pub mod math;
pub mod clock;
pub mod filter;
pub mod ticker;
pub mod timer;

use alloc::rc::Rc;
use core::cell::Cell;

/// A shared flag used to ask a running task to stop.
///
/// Clones observe the same flag. Cancelling twice has no further effect.
#[derive(Clone, Default, Debug)]
pub struct CancelToken {
    cancelled: Rc<Cell<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}
