//! Log output over the brain's serial console.

use core::time::Duration;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use vexide::io::println;

/// Colour for each level, indexed by `Level as usize`.
const COLORS: [&str; 6] = ["", "\x1B[31m", "\x1B[33m", "\x1B[34m", "\x1B[36m", "\x1B[37m"];

/// Prints records with the time since the program started and the module
/// that emitted them.
pub struct SerialLogger {
    level: LevelFilter,
}

impl SerialLogger {
    pub const fn new(level: LevelFilter) -> Self {
        Self { level }
    }

    /// Installs the logger. Fails if one is already installed.
    pub fn init(&'static self) -> Result<(), SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(self.level);
        Ok(())
    }
}

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let uptime = Duration::from_micros(unsafe { vex_sdk::vexSystemHighResTimeGet() });
        let target = record.target();
        let module = target.strip_prefix("autocore::").unwrap_or(target);
        println!(
            "{:>4}.{:03} {}{:<5}\x1B[0m {}: {}",
            uptime.as_secs(),
            uptime.subsec_millis(),
            COLORS[record.level() as usize],
            record.level(),
            module,
            record.args()
        );
    }

    fn flush(&self) {}
}
