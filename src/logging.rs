//! Logging bootstrap for the `rfid-capture` binary.
//!
//! The library only emits through the `log` facade. The binary installs a
//! flexi_logger backend writing to stderr, so stdout stays reserved for the
//! operator prompt and the captured identifier.

use flexi_logger::{Logger, LoggerHandle};
use log::LevelFilter;

use crate::error::Result;

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Suppress all output except errors.
    Quiet,
    /// Normal output level (info and above).
    #[default]
    Normal,
    /// Verbose output (debug and above).
    Verbose,
    /// Every register access (trace level).
    Trace,
}

impl Verbosity {
    #[must_use]
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::Error,
            Self::Normal => LevelFilter::Info,
            Self::Verbose => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
        }
    }

    /// Log specification for this crate at this verbosity.
    #[must_use]
    pub fn spec(self) -> String {
        format!(
            "{}={}",
            env!("CARGO_CRATE_NAME"),
            self.to_level_filter().as_str().to_lowercase()
        )
    }
}

/// Start logging to stderr. `RUST_LOG` takes precedence over `verbosity`.
///
/// Keep the returned handle alive for the lifetime of the process.
///
/// # Errors
///
/// Returns [`crate::Error::Logging`] if the specification is invalid or a
/// logger is already installed.
pub fn init_logging(verbosity: Verbosity) -> Result<LoggerHandle> {
    let handle = Logger::try_with_env_or_str(verbosity.spec())?
        .log_to_stderr()
        .format(flexi_logger::default_format)
        .start()?;
    Ok(handle)
}
