use chrono::{DateTime, Utc};

/// Verbosity ladder. Each level is a superset of the ones below it:
/// `Info ⊃ Transactions ⊃ Debug ⊃ Warning ⊃ None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    None,
    Warning,
    Debug,
    Transactions,
    Info,
}

/// Gated stdout logger. Lines are timestamped with *simulated* time, not
/// wall-clock:
///
/// ```text
/// 2021-05-03 09:30:00.100 ~~~~ filled ord-000001 at 9.5
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Logger {
    verbosity: Verbosity,
}

impl Logger {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    pub fn enabled(&self, level: Verbosity) -> bool {
        level != Verbosity::None && self.verbosity >= level
    }

    pub fn log(&self, time: DateTime<Utc>, level: Verbosity, message: &str) {
        if self.enabled(level) {
            println!("{} ~~~~ {}", time.format("%Y-%m-%d %H:%M:%S%.3f"), message);
        }
    }
}
