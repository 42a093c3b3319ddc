use alloc::string::String;

use thiserror::Error;

/// Mistakes in how a routine was put together.
///
/// These are reported when the routine is built, before anything moves.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("command timeout must be positive, got {0} s")]
    NonPositiveTimeout(f64),

    #[error("a path needs at least two control points, got {0}")]
    PathTooShort(usize),

    #[error("motion profile needs positive limits (max velocity {max_v}, acceleration {accel})")]
    InvalidProfile { max_v: f64, accel: f64 },

    #[error("no routine named {0:?} is registered")]
    UnknownRoutine(String),

    #[error("a routine named {0:?} is already registered")]
    DuplicateRoutine(String),

    #[error("malformed configuration data: {0}")]
    Malformed(&'static str),
}

pub type Result<T> = core::result::Result<T, ConfigError>;
