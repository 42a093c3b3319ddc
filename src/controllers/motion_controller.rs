use alloc::vec::Vec;
use core::time::Duration;

use log::info;
use num_traits::Float;

use super::{FeedForward, FeedForwardConfig, Feedback, Pid};
use crate::{
    differential::chassis::TankDrive,
    motion_profile::{MotionState, TrapezoidProfile},
    tracking::OdometryBase,
    utils::{
        clock::SharedClock,
        filter::{Filter, MovingAverage},
        math::{clamp_limits, linear_regression},
        ticker::Ticker,
    },
};

/// Samples from the first part of a tuning run are dropped, while the motors
/// are still building up current.
const TUNING_SETTLE_TIME: f64 = 0.25;

/// How far the chassis must move before it counts as moving, in inches.
const TUNING_BREAKAWAY: f64 = 0.05;

/// Follows a trapezoidal profile instead of chasing the final target.
///
/// Every update samples the profile at the time since `init`, points the
/// inner PID at the sampled position and adds feedforward for the sampled
/// velocity and acceleration.
#[derive(Clone)]
pub struct MotionController {
    pid: Pid,
    feedforward: FeedForward,
    profile: TrapezoidProfile,
    clock: SharedClock,

    start_time: Duration,
    end: f64,
    measurement: f64,
    current: MotionState,
    output: f64,
    lower_limit: f64,
    upper_limit: f64,
}

impl MotionController {
    pub fn new(pid: Pid, feedforward: FeedForward, profile: TrapezoidProfile, clock: SharedClock) -> Self {
        let start_time = clock.now();
        Self {
            pid,
            feedforward,
            profile,
            clock,
            start_time,
            end: 0.0,
            measurement: 0.0,
            current: MotionState::default(),
            output: 0.0,
            lower_limit: 0.0,
            upper_limit: 0.0,
        }
    }

    /// Starts a move that begins and ends at the given speeds.
    pub fn init_with_velocity(&mut self, start: f64, end: f64, start_vel: f64, end_vel: f64) {
        self.profile.set_endpts(start, end);
        self.profile.set_vel_endpts(start_vel, end_vel);
        self.pid.init(start, start);
        self.start_time = self.clock.now();
        self.end = end;
        self.measurement = start;
        self.current = self.profile.calculate(0.0);
    }

    /// The profile sample used by the last update.
    pub fn motion(&self) -> MotionState {
        self.current
    }

    pub fn profile(&self) -> &TrapezoidProfile {
        &self.profile
    }

    fn elapsed(&self) -> f64 {
        self.clock.now().saturating_sub(self.start_time).as_secs_f64()
    }

    /// Measures feedforward constants by driving `drive` straight ahead, so
    /// it needs clear floor in front of the robot.
    ///
    /// Output is raised from zero until the chassis starts to move, giving
    /// `ks`. It then drives at `power` for `duration` seconds and the rest
    /// comes from [`fit_feedforward`].
    pub async fn tune_feedforward(
        drive: &TankDrive,
        clock: &SharedClock,
        ticker: &mut dyn Ticker,
        power: f64,
        duration: f64,
    ) -> FeedForwardConfig {
        let odometry = drive.odometry().clone();
        let start = odometry.pose();
        let mut ks = 0.0;
        while odometry.pose().distance_to(&start) < TUNING_BREAKAWAY && ks < 1.0 {
            drive.drive_tank(ks, ks);
            ks += 0.001;
            ticker.tick(Duration::from_millis(100)).await;
        }
        drive.stop();
        info!("chassis breaks away at {ks:.3}");

        let mut speed = MovingAverage::new(3);
        let mut accel = MovingAverage::new(3);
        let mut max_speed: f64 = 0.0;
        let mut samples = Vec::new();
        let started = clock.now();
        drive.drive_tank(power, power);
        loop {
            let t = clock.now().saturating_sub(started).as_secs_f64();
            if t >= duration {
                break;
            }
            speed.add_entry(odometry.speed());
            accel.add_entry(odometry.accel());
            max_speed = max_speed.max(speed.value());
            if t > TUNING_SETTLE_TIME {
                samples.push((speed.value(), accel.value()));
            }
            ticker.tick(Duration::from_millis(10)).await;
        }
        drive.stop();
        info!("max speed {max_speed:.2} in/s over {} samples", samples.len());

        fit_feedforward(ks, power, max_speed, &samples)
    }
}

/// Fits `kv` and `ka` to a run at constant `power`.
///
/// `kv` is the output per unit of the top speed once `ks` is paid. `ka` is
/// the inverse slope of acceleration against the output left over after `ks`
/// and `kv`, from `(speed, accel)` samples. A fit without spread leaves `ka`
/// at zero.
pub fn fit_feedforward(ks: f64, power: f64, max_speed: f64, samples: &[(f64, f64)]) -> FeedForwardConfig {
    let kv = if max_speed > 0.0 {
        (power - ks) / max_speed
    } else {
        0.0
    };
    let leftover: Vec<(f64, f64)> = samples
        .iter()
        .map(|&(speed, accel)| (power - ks - speed * kv, accel))
        .collect();
    let ka = match linear_regression(&leftover) {
        Some((slope, _)) if slope.abs() > 1e-9 => 1.0 / slope,
        _ => 0.0,
    };
    FeedForwardConfig::builder().ks(ks).kv(kv).ka(ka).build()
}

impl Feedback for MotionController {
    fn init(&mut self, start: f64, target: f64) {
        self.init_with_velocity(start, target, 0.0, 0.0);
    }

    fn update(&mut self, measurement: f64) -> f64 {
        self.measurement = measurement;
        self.current = self.profile.calculate(self.elapsed());
        self.pid.set_target(self.current.pos);
        let feedback = self.pid.update_with_velocity(measurement, self.current.vel);
        let output = feedback
            + self
                .feedforward
                .calculate_with_hint(self.current.vel, self.current.accel, feedback);
        self.output = clamp_limits(output, self.lower_limit, self.upper_limit);
        self.output
    }

    fn get(&self) -> f64 {
        self.output
    }

    fn set_limits(&mut self, lower: f64, upper: f64) {
        self.lower_limit = lower;
        self.upper_limit = upper;
    }

    fn is_on_target(&self) -> bool {
        self.elapsed() > self.profile.total_time()
            && self.pid.is_on_target()
            && (self.end - self.measurement).abs() < self.pid.config().deadband
    }
}

#[cfg(test)]
mod tests {
    use alloc::{boxed::Box, rc::Rc};

    use approx::assert_relative_eq;

    use super::*;
    use crate::{
        commands::controller::CONTROL_PERIOD,
        controllers::PidConfig,
        differential::{chassis::sim::Rig, pose::Pose},
        utils::clock::{Clock, ManualClock},
    };

    fn controller(clock: &Rc<ManualClock>) -> MotionController {
        let pid = Pid::new(
            PidConfig::builder()
                .p(0.05)
                .deadband(0.5)
                .on_target_time(0.1)
                .build(),
            clock.clone(),
        );
        let ff = FeedForward::new(FeedForwardConfig::builder().kv(1.0 / 40.0).build());
        let profile = TrapezoidProfile::new(40.0, 80.0).unwrap();
        MotionController::new(pid, ff, profile, clock.clone())
    }

    #[test]
    fn tracks_profile_reference() {
        let clock = ManualClock::new();
        let mut mc = controller(&clock);
        mc.init(0.0, 24.0);

        clock.advance(Duration::from_millis(250));
        let expected = mc.profile().calculate(0.25);
        // Exactly on the reference: output is pure feedforward.
        let output = mc.update(expected.pos);
        assert_relative_eq!(output, expected.vel / 40.0, epsilon = 1e-9);
        assert_relative_eq!(mc.motion().vel, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn simulated_axis_settles_on_target() {
        let clock = ManualClock::new();
        let mut mc = controller(&clock);
        mc.set_limits(-1.0, 1.0);
        mc.init(0.0, 24.0);

        // A plant whose velocity follows the output, 1.0 = 40 in/s.
        let mut position = 0.0;
        let mut done_at = None;
        for tick in 0..200 {
            clock.advance(Duration::from_millis(10));
            let output = mc.update(position);
            position += output * 40.0 * 0.01;
            if mc.is_on_target() {
                done_at = Some(tick);
                break;
            }
        }
        assert!(done_at.is_some());
        assert!(mc.elapsed() > mc.profile().total_time());
        assert_relative_eq!(position, 24.0, epsilon = 0.5);
    }

    #[test]
    fn feedforward_fit_recovers_first_order_plant() {
        // Top speed 50 in/s at 0.5 past friction, time constant 0.2 s.
        let (ks, power, top, tau) = (0.1, 0.6, 50.0, 0.2);
        let samples: Vec<(f64, f64)> = (30..200)
            .map(|i| {
                let t = i as f64 * 0.01;
                let speed = top * (1.0 - (-t / tau).exp());
                (speed, (top - speed) / tau)
            })
            .collect();
        let config = fit_feedforward(ks, power, top, &samples);
        assert_relative_eq!(config.ks, 0.1);
        assert_relative_eq!(config.kv, 0.01, epsilon = 1e-12);
        assert_relative_eq!(config.ka, 0.002, epsilon = 1e-9);
    }

    #[test]
    fn feedforward_fit_without_spread() {
        let config = fit_feedforward(0.05, 0.5, 0.0, &[]);
        assert_eq!((config.kv, config.ka), (0.0, 0.0));
    }

    /// Moves the simulated chassis one control period per elapsed period.
    struct RigTicker<'a>(&'a Rig);

    #[async_trait::async_trait(?Send)]
    impl Ticker for RigTicker<'_> {
        async fn tick(&mut self, period: Duration) {
            let steps = (period.as_millis() / CONTROL_PERIOD.as_millis()).max(1);
            for _ in 0..steps {
                self.0.advance();
            }
        }
    }

    #[test]
    fn tunes_simulated_chassis() {
        let rig = Rig::new(Pose::default());
        let clock: SharedClock = rig.clock.clone();
        let config = futures::executor::block_on(MotionController::tune_feedforward(
            &rig.drive,
            &clock,
            &mut RigTicker(&rig),
            0.6,
            2.0,
        ));

        // The simulated wheels have no friction to break.
        assert!(config.ks > 0.0 && config.ks < 0.02, "ks = {}", config.ks);
        // Full output moves the simulated wheels at 60 in/s.
        assert_relative_eq!(config.kv, (0.6 - config.ks) / 36.0, epsilon = 1e-6);
        assert!(config.ka.is_finite());
        assert!(rig.state.is_stopped());
        assert!(rig.odometry.pose().x() > 36.0);
        assert!(rig.clock.now() >= Duration::from_secs(2));
    }
}
