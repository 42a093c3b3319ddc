#![cfg_attr(target_os = "vexos", no_main, no_std)]

#[cfg(target_os = "vexos")]
extern crate alloc;

#[cfg(target_os = "vexos")]
mod robot {
    use alloc::{boxed::Box, rc::Rc, vec, vec::Vec};
    use core::{cell::RefCell, time::Duration};

    use async_trait::async_trait;
    use autocore::{
        autons::{AutoChooser, AutonRoutine},
        commands::{
            drive::{DriveForward, DriveToPoint, OdomSetPosition, TurnToHeading},
            flywheel::{FlywheelStop, SpinRpm, WaitUntilUpToSpeed},
            AutoCommandExt, CommandController,
        },
        config::{serializer, ConfigStore},
        controllers::{Feedback, Pid, PidConfig, TakeBackHalf},
        devices::{CoprocessorPort, Imu, MotorGroup, OdomWheel, TankMotors},
        differential::{
            chassis::{self, TankDrive, TankDriveConfig},
            pose::Pose,
        },
        logger::SerialLogger,
        pursuit::{Path, PurePursuit, PurePursuitConfig},
        subsystems::Flywheel,
        tracking::{
            odom::{
                serial::SerialOdometry,
                tank::{TankOdometry, TankOdometryConfig},
            },
            Odometry, OdometryBase,
        },
        utils::{
            clock::{SharedClock, SystemClock},
            ticker::SleepTicker,
            CancelToken,
        },
    };
    use log::{error, info, LevelFilter};
    use nalgebra::Vector2;
    use vexide::{devices::smart::serial::SerialPort, prelude::*};

    const CONFIG_PATH: &str = "autocore.cfg";
    const TRACK_WIDTH: f64 = 11.5;

    static LOGGER: SerialLogger = SerialLogger::new(LevelFilter::Info);

    /// What each routine gets to drive the robot with.
    pub struct Handles {
        clock: SharedClock,
        drive: Rc<TankDrive>,
        odometry: Rc<dyn OdometryBase>,
        flywheel: Rc<Flywheel>,
    }

    struct ShootPreloads;

    #[async_trait(?Send)]
    impl AutonRoutine<Handles> for ShootPreloads {
        fn name(&self) -> &'static str {
            "shoot preloads"
        }

        async fn run(&self, robot: &mut Handles) {
            let mut controller = CommandController::new(robot.clock.clone());
            let (drive, flywheel) = (robot.drive.clone(), robot.flywheel.clone());
            controller.on_cancel(move || {
                drive.stop();
                flywheel.stop();
            });
            controller.add_all(vec![
                OdomSetPosition::new(robot.odometry.clone(), Pose::from_degrees(-60.0, -36.0, 0.0)).boxed(),
                SpinRpm::new(robot.flywheel.clone(), 2800.0).boxed(),
                DriveForward::new(robot.drive.clone(), 24.0, 0.8).boxed(),
                TurnToHeading::new(robot.drive.clone(), 45.0, 0.6).boxed(),
                WaitUntilUpToSpeed::new(robot.flywheel.clone(), 50.0).with_timeout(3.0).boxed(),
                FlywheelStop::new(robot.flywheel.clone()).boxed(),
                DriveToPoint::new(robot.drive.clone(), -36.0, -36.0, chassis::Direction::Reverse, 0.8).boxed(),
            ]);
            controller.run(&mut SleepTicker).await;
        }
    }

    struct SweepPath;

    #[async_trait(?Send)]
    impl AutonRoutine<Handles> for SweepPath {
        fn name(&self) -> &'static str {
            "sweep path"
        }

        async fn run(&self, robot: &mut Handles) {
            let path = match Path::from_points([
                Vector2::new(0.0, 0.0),
                Vector2::new(36.0, 0.0),
                Vector2::new(48.0, 24.0),
            ])
            .and_then(|path| path.inject(2.0))
            .and_then(|path| path.smooth(0.1, 0.3, 1e-3))
            {
                Ok(path) => path,
                Err(err) => {
                    error!("{err}");
                    return;
                }
            };
            let follower = match PurePursuit::new(
                robot.drive.clone(),
                path,
                PurePursuitConfig::builder().lookahead(10.0).max_speed(0.7).build(),
            ) {
                Ok(follower) => follower,
                Err(err) => {
                    error!("{err}");
                    return;
                }
            };
            let mut controller = CommandController::new(robot.clock.clone());
            let drive = robot.drive.clone();
            controller.on_cancel(move || drive.stop());
            controller.add_all([
                OdomSetPosition::new(robot.odometry.clone(), Pose::default()).boxed(),
                follower.with_timeout(8.0).boxed(),
            ]);
            controller.run(&mut SleepTicker).await;
        }
    }

    pub struct Robot {
        handles: Handles,
        chooser: AutoChooser<Handles>,
        controller: Controller,
        _background: Vec<vexide::task::Task<()>>,
    }

    impl Robot {
        pub async fn new(peripherals: Peripherals) -> Self {
            let clock: SharedClock = SystemClock::new();
            let mut settings = serializer::load(CONFIG_PATH);

            let left = Rc::new(RefCell::new(MotorGroup::new(vec![
                Motor::new(peripherals.port_1, Gearset::Blue, Direction::Reverse),
                Motor::new(peripherals.port_2, Gearset::Blue, Direction::Reverse),
                Motor::new(peripherals.port_3, Gearset::Blue, Direction::Reverse),
            ])));
            let right = Rc::new(RefCell::new(MotorGroup::new(vec![
                Motor::new(peripherals.port_8, Gearset::Blue, Direction::Forward),
                Motor::new(peripherals.port_9, Gearset::Blue, Direction::Forward),
                Motor::new(peripherals.port_10, Gearset::Blue, Direction::Forward),
            ])));

            let cancel = CancelToken::new();
            let mut background = Vec::new();
            let odometry: Rc<dyn OdometryBase> = if settings.bool_or("serial odometry", false) {
                let port = SerialPort::open(peripherals.port_20, 115200).await;
                let odometry = Odometry::new(
                    SerialOdometry::new(Box::new(CoprocessorPort::new(port))),
                    clock.clone(),
                );
                background.push(odometry.spawn(cancel.clone()));
                odometry as Rc<dyn OdometryBase>
            } else {
                let mut imu = Imu::new(InertialSensor::new(peripherals.port_13), 1.004);
                imu.calibrate().await;
                let ratio = settings.double_or("drive ratio", 0.75);
                let odometry = Odometry::new(
                    TankOdometry::new(
                        Box::new(OdomWheel::from_motors(left.clone(), 3.25, ratio)),
                        Box::new(OdomWheel::from_motors(right.clone(), 3.25, ratio)),
                        Some(Box::new(imu)),
                        TankOdometryConfig::builder().track_width(TRACK_WIDTH).build(),
                    ),
                    clock.clone(),
                );
                background.push(odometry.spawn(cancel.clone()));
                odometry as Rc<dyn OdometryBase>
            };

            let drive_pid = PidConfig::builder()
                .p(settings.double_or("drive kp", 0.08))
                .d(settings.double_or("drive kd", 0.005))
                .deadband(0.5)
                .on_target_time(0.1)
                .build();
            let turn_pid = PidConfig::builder()
                .p(settings.double_or("turn kp", 0.015))
                .d(settings.double_or("turn kd", 0.001))
                .deadband(1.0)
                .on_target_time(0.1)
                .build();
            let drive = Rc::new(TankDrive::new(
                Box::new(TankMotors::new(left, right)),
                odometry.clone(),
                Box::new(Pid::new(drive_pid, clock.clone())),
                Box::new(Pid::new(turn_pid, clock.clone())),
                TankDriveConfig::builder().track_width(TRACK_WIDTH).build(),
            ));

            let mut tbh = TakeBackHalf::new(settings.double_or("flywheel gain", 0.00005), 0.4, 50.0);
            tbh.set_limits(0.0, 1.0);
            let flywheel = Flywheel::new(
                Box::new(MotorGroup::new(vec![Motor::new(
                    peripherals.port_15,
                    Gearset::Blue,
                    Direction::Forward,
                )])),
                Box::new(tbh),
            );
            background.push(flywheel.spawn(cancel));

            let mut chooser = AutoChooser::new();
            for routine in [Box::new(ShootPreloads) as Box<dyn AutonRoutine<Handles>>, Box::new(SweepPath)] {
                if let Err(err) = chooser.register(routine) {
                    error!("{err}");
                }
            }
            let choice = settings.string_or("auton", "shoot preloads");
            if let Err(err) = chooser.select(&choice) {
                error!("{err}");
            }
            serializer::save(CONFIG_PATH, &settings);

            Self {
                handles: Handles {
                    clock,
                    drive,
                    odometry,
                    flywheel,
                },
                chooser,
                controller: peripherals.primary_controller,
                _background: background,
            }
        }
    }

    impl Compete for Robot {
        async fn autonomous(&mut self) {
            if !self.chooser.run(&mut self.handles).await {
                info!("no autonomous registered");
            }
            self.handles.drive.stop();
        }

        async fn driver(&mut self) {
            loop {
                let state = self.controller.state().unwrap_or_default();
                self.handles
                    .drive
                    .drive_arcade(state.left_stick.y(), -state.right_stick.x());
                sleep(Duration::from_millis(20)).await;
            }
        }
    }

    pub async fn start(peripherals: Peripherals) {
        if LOGGER.init().is_err() {
            println!("logger already installed");
        }
        info!("starting up");
        Robot::new(peripherals).await.compete().await;
    }
}

#[cfg(target_os = "vexos")]
#[vexide::main]
async fn main(peripherals: vexide::prelude::Peripherals) {
    robot::start(peripherals).await;
}

#[cfg(not(target_os = "vexos"))]
fn main() {}
