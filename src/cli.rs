//! Command-line interface for the `rfid-capture` binary.

use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;
use crate::logging::Verbosity;

/// rfid-capture - store the identifier of the next RFID tag presented
///
/// Waits for a tag on the MFRC522 reader and writes its identifier, as
/// decimal digits, to the output file. Every flag is optional.
#[derive(Debug, Parser)]
#[command(name = "rfid-capture")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// File that receives the identifier (overrides the configuration)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Stop waiting after this many seconds
    #[arg(short, long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::Trace,
            }
        }
    }

    /// Apply flag overrides on top of loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(output) = &self.output {
            config.output.clone_from(output);
        }
        if let Some(timeout) = self.timeout {
            config.capture.timeout_secs = Some(timeout);
        }
    }
}
