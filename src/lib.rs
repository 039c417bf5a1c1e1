//! Capture the identifier of an RFID tag held against an MFRC522 reader and
//! store it as decimal text.
//!
//! # Features
//!
//! - `rpi` (default) - SPI transport for Raspberry Pi using rppal
//! - `serial` - UART transport through a serial port using the serialport crate
//!
//! # Example
//!
//! ```ignore
//! use rfid_capture::{capture_and_store, CancelToken, Mfrc522, SpiTransport};
//! use std::path::Path;
//!
//! let transport = SpiTransport::new(0, 0, 1_000_000, Some(25))?;
//! let mut reader = Mfrc522::new(transport)?;
//!
//! println!("Present a tag to the reader...");
//! let id = capture_and_store(&mut reader, Path::new("rfid_data.txt"), &CancelToken::new())?;
//! println!("Stored {id}");
//! ```

mod cancel;
mod capture;
mod error;
mod reader;
mod transport;
mod types;

pub mod cli;
pub mod config;
pub mod logging;

#[cfg(feature = "rpi")]
mod spi;

#[cfg(feature = "serial")]
mod serial;

// Re-exports
pub use cancel::CancelToken;
pub use capture::{CaptureState, DEFAULT_OUTPUT, TagSource, capture_and_store, write_record};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use reader::{DEFAULT_KEY, Mfrc522};
pub use transport::RfidTransport;
pub use types::{RfidError, TagId, TagRead, Uid};

#[cfg(feature = "rpi")]
pub use spi::SpiTransport;

#[cfg(feature = "serial")]
pub use serial::SerialTransport;
