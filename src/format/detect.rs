//! Format detection for tagged raster files.
//!
//! Detection looks only at the first bytes of a stream:
//!
//! - **DICOM with preamble**: `DICM` at offset 128
//! - **DICOM without preamble**: `DICM` at offset 0, or a first tag that is a
//!   known dictionary entry under either byte order
//!
//! Unrecognized streams return [`FormatError::UnsupportedFormat`].

use serde::Serialize;

use crate::error::FormatError;
use crate::io::RangeReader;

use super::dicom::{sniff, DICOM_FORMAT_ID};

/// Smallest stream any format can be detected from: one tag header.
const MIN_HEADER_BYTES: u64 = 8;

/// Result of a successful detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Detection {
    /// Registry identifier of the detected format
    pub format: &'static str,
    /// Offset of the first attribute record
    pub header_offset: u64,
    /// The stream carries the `DICM` marker
    pub has_marker: bool,
}

/// Detect the format of a stream.
///
/// # Arguments
/// * `reader` - Range reader for the stream
///
/// # Returns
/// * `Ok(Detection)` - The detected format and where its records start
/// * `Err(FormatError::UnsupportedFormat)` - Not a recognized format
/// * `Err(FormatError::Io)` - Error reading the first bytes
pub fn detect_format<R: RangeReader + ?Sized>(reader: &R) -> Result<Detection, FormatError> {
    if reader.size() < MIN_HEADER_BYTES {
        return Err(FormatError::UnsupportedFormat {
            reason: format!("{}: stream too small to hold a tag", reader.identifier()),
        });
    }

    match sniff(reader)? {
        Some((header_offset, has_marker)) => Ok(Detection {
            format: DICOM_FORMAT_ID,
            header_offset,
            has_marker,
        }),
        None => Err(FormatError::UnsupportedFormat {
            reason: format!(
                "{}: no DICM marker and no known leading tag",
                reader.identifier()
            ),
        }),
    }
}

// =============================================================================
// Tests
// =============================================================================
