pub mod odom;

use alloc::rc::Rc;
use core::{
    cell::{Cell, RefCell},
    time::Duration,
};

use log::info;
use num_traits::Float;

use crate::{
    differential::pose::Pose,
    utils::{
        clock::SharedClock,
        filter::{Filter, MovingAverage},
        math::wrap_angle,
        ticker::Ticker,
        CancelToken,
    },
};

/// How often the background cycle refreshes the pose.
pub const ODOMETRY_PERIOD: Duration = Duration::from_millis(10);

/// Velocity and acceleration estimates are refreshed at most this often,
/// since differentiating every 10 ms sample is mostly noise.
pub const ESTIMATE_PERIOD: Duration = Duration::from_millis(100);

/// A wheel travel sensor.
pub trait Encoder {
    /// Total distance travelled in inches, or `None` if the read failed.
    fn position(&self) -> Option<f64>;

    fn reset(&mut self) {}
}

/// An inertial heading source.
pub trait HeadingSensor {
    /// Continuous counter-clockwise heading in radians, or `None` if the read
    /// failed.
    fn heading(&self) -> Option<f64>;

    fn reset(&mut self) {}
}

/// A byte stream from a tracking coprocessor.
pub trait SerialPort {
    /// The next received byte, if one is waiting. Never blocks.
    fn read_byte(&mut self) -> Option<u8>;
}

#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct MotionEstimate {
    /// Inches per second.
    pub speed: f64,
    /// Inches per second squared.
    pub accel: f64,
    pub angular_speed_deg: f64,
    pub angular_accel_deg: f64,
}

/// Read access to the robot's pose, shared by everything that steers.
///
/// Only the odometry's own update cycle writes the pose; `set_position`
/// re-anchors it.
pub trait OdometryBase {
    fn pose(&self) -> Pose;

    /// Replaces the pose estimate, e.g. against a known field landmark.
    fn set_position(&self, pose: Pose);

    /// Integrates one round of sensor readings. Called by the background
    /// cycle, not by commands.
    fn update(&self) -> Pose;

    fn motion(&self) -> MotionEstimate;

    fn speed(&self) -> f64 {
        self.motion().speed
    }

    fn accel(&self) -> f64 {
        self.motion().accel
    }

    fn angular_speed_deg(&self) -> f64 {
        self.motion().angular_speed_deg
    }

    fn angular_accel_deg(&self) -> f64 {
        self.motion().angular_accel_deg
    }
}

/// The sensor fusion step that differs between odometry setups.
pub trait OdometryVariant {
    /// Produces the next pose from the previous one and fresh readings.
    fn update(&mut self, previous: Pose) -> Pose;

    /// Called when the pose is re-anchored so the next update does not jump.
    fn set_position(&mut self, _pose: &Pose) {}

    /// Velocities reported directly by the sensor, if it has them.
    fn reported_motion(&self) -> Option<MotionEstimate> {
        None
    }
}

/// Pose estimator that owns a sensor setup and publishes its pose.
///
/// The pose lives in a `Cell`, so any number of readers copy it out without
/// blocking the update cycle.
pub struct Odometry<V: OdometryVariant> {
    variant: RefCell<V>,
    clock: SharedClock,
    pose: Cell<Pose>,
    motion: Cell<MotionEstimate>,
    last_sample: Cell<Option<(Duration, Pose)>>,
    speed_average: RefCell<MovingAverage>,
    angular_average: RefCell<MovingAverage>,
}

impl<V: OdometryVariant> Odometry<V> {
    pub fn new(variant: V, clock: SharedClock) -> Rc<Self> {
        Self::with_smoothing(variant, clock, 1)
    }

    /// Averages the estimated speeds over the last `samples` estimate
    /// periods. Accelerations are taken from the averaged speeds.
    pub fn with_smoothing(variant: V, clock: SharedClock, samples: usize) -> Rc<Self> {
        Rc::new(Self {
            variant: RefCell::new(variant),
            clock,
            pose: Cell::new(Pose::default()),
            motion: Cell::new(MotionEstimate::default()),
            last_sample: Cell::new(None),
            speed_average: RefCell::new(MovingAverage::new(samples)),
            angular_average: RefCell::new(MovingAverage::new(samples)),
        })
    }

    /// Runs the update cycle until `cancel` is set.
    pub async fn run(&self, ticker: &mut dyn Ticker, cancel: &CancelToken) {
        info!("odometry cycle started");
        while !cancel.is_cancelled() {
            self.update();
            ticker.tick(ODOMETRY_PERIOD).await;
        }
        info!("odometry cycle stopped");
    }

    /// Spawns [`Odometry::run`] on the vexide executor.
    #[cfg(target_os = "vexos")]
    pub fn spawn(self: &Rc<Self>, cancel: CancelToken) -> vexide::task::Task<()>
    where
        V: 'static,
    {
        let odometry = self.clone();
        vexide::task::spawn(async move {
            let mut ticker = crate::utils::ticker::SleepTicker;
            odometry.run(&mut ticker, &cancel).await;
        })
    }

    fn refresh_estimate(&self, pose: Pose) {
        let now = self.clock.now();
        let Some((sample_time, sample_pose)) = self.last_sample.get() else {
            self.last_sample.set(Some((now, pose)));
            return;
        };
        let elapsed = now.saturating_sub(sample_time);
        if elapsed < ESTIMATE_PERIOD {
            return;
        }

        let dt = elapsed.as_secs_f64();
        let previous = self.motion.get();
        let speed = {
            let mut average = self.speed_average.borrow_mut();
            average.add_entry(sample_pose.distance_to(&pose) / dt);
            average.value()
        };
        let angular_speed_deg = {
            let mut average = self.angular_average.borrow_mut();
            average.add_entry(wrap_angle(pose.orientation - sample_pose.orientation).to_degrees() / dt);
            average.value()
        };
        self.motion.set(MotionEstimate {
            speed,
            accel: (speed - previous.speed) / dt,
            angular_speed_deg,
            angular_accel_deg: (angular_speed_deg - previous.angular_speed_deg) / dt,
        });
        self.last_sample.set(Some((now, pose)));
    }
}

impl<V: OdometryVariant> OdometryBase for Odometry<V> {
    fn pose(&self) -> Pose {
        self.pose.get()
    }

    fn set_position(&self, pose: Pose) {
        self.variant.borrow_mut().set_position(&pose);
        self.pose.set(pose);
        self.last_sample.set(Some((self.clock.now(), pose)));
    }

    fn update(&self) -> Pose {
        let pose = {
            let mut variant = self.variant.borrow_mut();
            let pose = variant.update(self.pose.get());
            if let Some(reported) = variant.reported_motion() {
                self.motion.set(reported);
            }
            pose
        };
        self.pose.set(pose);
        if self.variant.borrow().reported_motion().is_none() {
            self.refresh_estimate(pose);
        }
        pose
    }

    fn motion(&self) -> MotionEstimate {
        self.motion.get()
    }
}
