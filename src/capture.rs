//! Read one tag and persist its identifier.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use log::{debug, info};

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::reader::Mfrc522;
use crate::transport::RfidTransport;
use crate::types::{RfidError, TagId, TagRead};

/// Default output record, relative to the working directory.
pub const DEFAULT_OUTPUT: &str = "rfid_data.txt";

/// Anything that can block until a tag is presented.
pub trait TagSource {
    /// Wait for a tag and return its identifier and payload.
    ///
    /// # Errors
    ///
    /// Returns [`RfidError::Cancelled`] when `cancel` fires, or the driver
    /// error when the reader fails.
    fn read_tag(&mut self, cancel: &CancelToken) -> std::result::Result<TagRead, RfidError>;
}

impl<T: RfidTransport> TagSource for Mfrc522<T> {
    fn read_tag(&mut self, cancel: &CancelToken) -> std::result::Result<TagRead, RfidError> {
        self.wait_for_tag(cancel)
    }
}

impl<S: TagSource + ?Sized> TagSource for Box<S> {
    fn read_tag(&mut self, cancel: &CancelToken) -> std::result::Result<TagRead, RfidError> {
        (**self).read_tag(cancel)
    }
}

/// Progress of a capture run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    WaitingForTag,
    Done,
}

/// Block until `source` reports a tag, then overwrite `output` with its identifier.
///
/// The tag's text payload is not stored. The output file is only touched
/// after a successful read, and a failed write does not trigger another read.
///
/// # Errors
///
/// - [`Error::PeripheralUnavailable`] when the reader fails.
/// - [`Error::Cancelled`] when `cancel` fires first.
/// - [`Error::Io`] when the output record cannot be written.
pub fn capture_and_store<S: TagSource + ?Sized>(
    source: &mut S,
    output: &Path,
    cancel: &CancelToken,
) -> Result<TagId> {
    let mut state = CaptureState::WaitingForTag;
    debug!("Capture state: {:?}", state);

    let tag = source.read_tag(cancel)?;
    debug!(
        "Read tag {} ({} payload characters discarded)",
        tag.id,
        tag.text.chars().count()
    );

    write_record(output, tag.id)?;
    state = CaptureState::Done;
    debug!("Capture state: {:?}", state);
    info!("Stored tag {} in {}", tag.id, output.display());

    Ok(tag.id)
}

/// Truncate `path` and write the decimal form of `id`, with nothing after it.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be created, written or synced.
pub fn write_record(path: &Path, id: TagId) -> Result<()> {
    let mut file = File::create(path).map_err(|e| Error::io(path, e))?;
    file.write_all(id.to_string().as_bytes())
        .and_then(|()| file.sync_all())
        .map_err(|e| Error::io(path, e))
}
