use alloc::{boxed::Box, rc::Rc};
use core::{
    cell::{Cell, RefCell},
    time::Duration,
};

use log::{debug, info};

use crate::{
    controllers::Feedback,
    utils::{ticker::Ticker, CancelToken},
};

/// How often the background loop updates the flywheel controller.
pub const FLYWHEEL_PERIOD: Duration = Duration::from_millis(10);

/// The motor side of a flywheel.
pub trait FlywheelMotor {
    /// Output as a fraction of full power in [-1, 1].
    fn set_output(&mut self, output: f64);

    /// Current speed, or `None` if the read failed.
    fn rpm(&self) -> Option<f64>;

    fn stop(&mut self) {
        self.set_output(0.0);
    }
}

/// A velocity-controlled flywheel.
///
/// [`Flywheel::spin_rpm`] only sets the target; the controller runs from
/// [`Flywheel::update`], normally on the background loop.
pub struct Flywheel {
    motor: RefCell<Box<dyn FlywheelMotor>>,
    controller: RefCell<Box<dyn Feedback>>,
    target_rpm: Cell<Option<f64>>,
    last_rpm: Cell<f64>,
}

impl Flywheel {
    /// `controller` should already be limited to the motor's output range.
    pub fn new(motor: Box<dyn FlywheelMotor>, controller: Box<dyn Feedback>) -> Rc<Self> {
        Rc::new(Self {
            motor: RefCell::new(motor),
            controller: RefCell::new(controller),
            target_rpm: Cell::new(None),
            last_rpm: Cell::new(0.0),
        })
    }

    /// Latest speed reading. A failed read repeats the previous one.
    pub fn rpm(&self) -> f64 {
        if let Some(rpm) = self.motor.borrow().rpm() {
            self.last_rpm.set(rpm);
        }
        self.last_rpm.get()
    }

    pub fn target_rpm(&self) -> Option<f64> {
        self.target_rpm.get()
    }

    pub fn spin_rpm(&self, rpm: f64) {
        debug!("flywheel target {rpm:.0} rpm");
        self.controller.borrow_mut().init(self.rpm(), rpm);
        self.target_rpm.set(Some(rpm));
    }

    pub fn stop(&self) {
        self.target_rpm.set(None);
        self.motor.borrow_mut().stop();
    }

    /// Whether the wheel is spinning within `threshold` rpm of its target.
    pub fn is_up_to_speed(&self, threshold: f64) -> bool {
        self.target_rpm
            .get()
            .is_some_and(|target| (target - self.rpm()).abs() < threshold)
    }

    /// Runs one controller step.
    pub fn update(&self) {
        if self.target_rpm.get().is_none() {
            return;
        }
        let rpm = self.rpm();
        let output = self.controller.borrow_mut().update(rpm);
        self.motor.borrow_mut().set_output(output);
    }

    /// Runs [`Flywheel::update`] every period until `cancel` is set, then
    /// stops the wheel.
    pub async fn run(&self, ticker: &mut dyn Ticker, cancel: &CancelToken) {
        info!("flywheel loop started");
        while !cancel.is_cancelled() {
            self.update();
            ticker.tick(FLYWHEEL_PERIOD).await;
        }
        self.stop();
    }

    #[cfg(target_os = "vexos")]
    pub fn spawn(self: &Rc<Self>, cancel: CancelToken) -> vexide::task::Task<()> {
        let flywheel = self.clone();
        vexide::task::spawn(async move {
            let mut ticker = crate::utils::ticker::SleepTicker;
            flywheel.run(&mut ticker, &cancel).await;
        })
    }
}
