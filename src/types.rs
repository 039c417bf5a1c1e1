//! Types for RFID operations

use std::fmt;

use thiserror::Error;

/// Answer to cascade level 1 anticollision: four UID bytes followed by the BCC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uid(pub [u8; 5]);

impl Uid {
    /// The four serial number bytes, without the check byte
    pub fn serial(&self) -> &[u8] {
        &self.0[..4]
    }

    /// XOR of the serial bytes must equal the trailing check byte
    pub fn is_valid(&self) -> bool {
        self.serial().iter().fold(0u8, |acc, &b| acc ^ b) == self.0[4]
    }
}

/// Numeric identifier of a tag, as written to the output record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagId(pub u64);

impl TagId {
    /// Accumulate all five anticollision bytes, check byte included, big-endian
    pub fn from_uid(uid: &Uid) -> Self {
        Self(uid.0.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
    }
}

impl From<Uid> for TagId {
    fn from(uid: Uid) -> Self {
        Self::from_uid(&uid)
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tag presented to the reader
#[derive(Debug, Clone)]
pub struct TagRead {
    pub id: TagId,
    /// Text stored in the data blocks of sector 2, empty if it could not be read
    pub text: String,
}

impl PartialEq for TagRead {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Errors that can occur during RFID operations
#[derive(Debug, Error)]
pub enum RfidError {
    /// Transport layer error (SPI, UART, etc.)
    #[error("transport error: {0}")]
    Transport(String),
    /// The chip did not answer with a plausible version
    #[error("no MFRC522 detected (version register reads 0x{0:02X})")]
    NotDetected(u8),
    /// No tag answered before the chip timer expired
    #[error("no tag in range")]
    NoTag,
    /// The chip never raised the expected interrupt
    #[error("timed out waiting for the reader")]
    Timeout,
    /// More than one tag answered
    #[error("tag collision")]
    Collision,
    /// The chip flagged a protocol, parity or buffer error
    #[error("protocol error (error register 0x{0:02X})")]
    Protocol(u8),
    /// Invalid response received from a tag
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// Sector authentication was rejected
    #[error("authentication failed for block {0}")]
    Authentication(u8),
    /// Invalid parameter passed to a function
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// The wait for a tag was cancelled
    #[error("cancelled while waiting for a tag")]
    Cancelled,
}

impl RfidError {
    /// Whether the error comes from the bus rather than from the air interface.
    ///
    /// Air interface failures just mean no usable tag answered this round.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::NotDetected(_) | Self::InvalidParameter(_) | Self::Cancelled
        )
    }
}

/// Render bytes as characters, one per byte
pub(crate) fn bytes_to_text(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
