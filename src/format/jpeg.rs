//! JPEG-family codestream markers and marker scanning.
//!
//! Compressed frames are located by their start-of-image marker rather than
//! by parsing container offsets:
//!
//! - JPEG and JPEG-LS codestreams start with SOI (FFD8) followed by another
//!   marker (FF..)
//! - JPEG 2000 codestreams start with SOC (FF4F) followed by SIZ (FF51)
//!
//! Scanning reads a bounded window at a time. When a window holds no marker
//! the next one starts 4 bytes before the end of the previous one, so a
//! marker split across two windows is still found.

use tracing::trace;

use crate::error::IoError;
use crate::io::RangeReader;
use crate::raster::CompressionScheme;

// =============================================================================
// Markers
// =============================================================================

/// Start of a JPEG or JPEG-LS frame: SOI and the first byte of the next marker.
pub const JPEG_FRAME_START: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// Start of a JPEG 2000 codestream: SOC followed by SIZ.
pub const J2K_FRAME_START: [u8; 4] = [0xFF, 0x4F, 0xFF, 0x51];

/// Bytes retained between consecutive scan windows.
pub const WINDOW_OVERLAP: usize = 4;

/// Frame-start marker for a compression scheme, if frames of that scheme are
/// located by scanning.
pub fn frame_start_marker(scheme: CompressionScheme) -> Option<&'static [u8]> {
    match scheme {
        CompressionScheme::Jpeg | CompressionScheme::JpegLs => Some(&JPEG_FRAME_START),
        CompressionScheme::Jpeg2000 => Some(&J2K_FRAME_START),
        _ => None,
    }
}

// =============================================================================
// Scanning
// =============================================================================

/// Position of the first occurrence of `marker` in `data`.
pub fn find_marker(data: &[u8], marker: &[u8]) -> Option<usize> {
    if marker.is_empty() || data.len() < marker.len() {
        return None;
    }
    data.windows(marker.len()).position(|w| w == marker)
}

/// Scan `reader` from `from` for `marker`, reading `window` bytes at a time.
///
/// Returns the absolute offset of the marker, or `None` if the stream ends
/// first.
///
/// # Arguments
/// * `reader` - Byte source to scan
/// * `from` - Offset where scanning begins
/// * `marker` - Byte pattern of at most `WINDOW_OVERLAP` bytes
/// * `window` - Bytes read per step; must exceed `WINDOW_OVERLAP`
pub fn scan_for_marker<R: RangeReader + ?Sized>(
    reader: &R,
    from: u64,
    marker: &[u8],
    window: usize,
) -> Result<Option<u64>, IoError> {
    debug_assert!(marker.len() <= WINDOW_OVERLAP);
    let size = reader.size();
    let window = window.max(WINDOW_OVERLAP + 1) as u64;
    let mut pos = from;

    while pos < size {
        let len = window.min(size - pos);
        let buf = reader.read_exact_at(pos, len as usize)?;
        if let Some(i) = find_marker(&buf, marker) {
            return Ok(Some(pos + i as u64));
        }
        if pos + len >= size {
            break;
        }
        pos += len - WINDOW_OVERLAP as u64;
        trace!(pos, "marker window slid");
    }

    Ok(None)
}

// =============================================================================
// Tests
// =============================================================================
