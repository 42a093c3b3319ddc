//! Autonomous control for a tank-drive competition robot: a command
//! scheduler, odometry, feedback loops and a pure-pursuit path follower.
//!
//! Everything outside `devices` and `logger` is hardware independent and
//! runs on the host.

#![no_std]
extern crate alloc;

#[macro_use]
pub mod utils;

pub mod autons;
pub mod commands;
pub mod config;
pub mod controllers;
#[cfg(target_os = "vexos")]
pub mod devices;
pub mod differential;
pub mod error;
#[cfg(target_os = "vexos")]
pub mod logger;
pub mod motion_profile;
pub mod pursuit;
pub mod subsystems;
pub mod tracking;

pub use error::{ConfigError, Result};
