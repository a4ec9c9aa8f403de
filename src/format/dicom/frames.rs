//! Frame offset tables.
//!
//! After the header has been decoded, each frame's position in the pixel
//! data is resolved according to the compression scheme:
//!
//! - Uncompressed: frames are contiguous and fixed-size
//! - RLE: one item per frame, each starting with a 64-byte segment header
//! - JPEG family: frames are found by scanning for their start marker
//!
//! # Encapsulated Layout
//!
//! ```text
//! [item: basic offset table][item: frame 0 fragment][item: frame 1 ...]...[seq delimiter]
//! ```

use serde::Serialize;
use tracing::debug;

use crate::error::DecodeError;
use crate::format::jpeg::{frame_start_marker, scan_for_marker};
use crate::io::{read_u16_le, read_u32_le, RangeReader};
use crate::raster::{frame_byte_size, ByteOrder, CompressionScheme, ImageDescriptor, Padding};

use super::tags::{Tag, ITEM, ROWS, SEQUENCE_DELIMITER};

/// Size of the RLE segment header that precedes each frame.
pub const RLE_HEADER_SIZE: u64 = 64;

/// Maximum number of segments an RLE header can describe.
pub const RLE_MAX_SEGMENTS: usize = 15;

/// Item and delimiter headers: key plus a 4-byte length.
const ITEM_HEADER_SIZE: u64 = 8;

/// Key bytes of the sequence delimiter, little endian.
const SEQUENCE_DELIMITER_BYTES: [u8; 4] = [0xFE, 0xFF, 0xDD, 0xE0];

// =============================================================================
// FrameOffsetTable
// =============================================================================

/// Position of one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameEntry {
    pub offset: u64,
    /// Byte length, when it can be determined
    pub length: Option<u64>,
    /// RLE segment start offsets in byte-order sequence
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<u64>,
}

impl FrameEntry {
    pub fn new(offset: u64, length: Option<u64>) -> Self {
        Self {
            offset,
            length,
            segments: Vec::new(),
        }
    }
}

/// Ordered frame positions, one per declared frame.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FrameOffsetTable {
    scheme: CompressionScheme,
    entries: Vec<FrameEntry>,
}

impl FrameOffsetTable {
    pub fn new(scheme: CompressionScheme, entries: Vec<FrameEntry>) -> Self {
        Self { scheme, entries }
    }

    pub fn scheme(&self) -> CompressionScheme {
        self.scheme
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FrameEntry> {
        self.entries.get(index)
    }

    pub fn offsets(&self) -> Vec<u64> {
        self.entries.iter().map(|e| e.offset).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameEntry> {
        self.entries.iter()
    }
}

// =============================================================================
// FrameLocating
// =============================================================================

/// Capability of resolving frame positions in pixel data.
pub trait FrameLocating {
    fn locate(
        &self,
        reader: &dyn RangeReader,
        pixel_data_start: u64,
        scheme: CompressionScheme,
        frame_count: usize,
        descriptor: &ImageDescriptor,
    ) -> Result<FrameOffsetTable, DecodeError>;
}

/// Frame locator for uncompressed, RLE and JPEG-family pixel data.
#[derive(Debug, Clone, Copy)]
pub struct CompressedFrameLocator {
    scan_window: usize,
    padding: Padding,
}

impl Default for CompressedFrameLocator {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SCAN_WINDOW)
    }
}

impl CompressedFrameLocator {
    pub fn new(scan_window: usize) -> Self {
        Self {
            scan_window,
            padding: Padding::NONE,
        }
    }

    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    /// Contiguous fixed-size frames.
    ///
    /// # Errors
    /// `CorruptTagStream` on the rows key when the frame geometry or a frame
    /// offset does not fit in a `u64`.
    pub fn locate_uncompressed<R: RangeReader + ?Sized>(
        &self,
        reader: &R,
        start: u64,
        frame_count: usize,
        descriptor: &ImageDescriptor,
    ) -> Result<FrameOffsetTable, DecodeError> {
        let overflow = || DecodeError::CorruptTagStream {
            tag: ROWS.to_string(),
            offset: start,
            length: descriptor.height,
            remaining: reader.size().saturating_sub(start),
        };

        let size = frame_byte_size(descriptor, self.padding).ok_or_else(overflow)?;
        let entries = (0..frame_count as u64)
            .map(|i| {
                i.checked_mul(size)
                    .and_then(|o| o.checked_add(start))
                    .map(|offset| FrameEntry::new(offset, Some(size)))
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(overflow)?;
        Ok(FrameOffsetTable::new(CompressionScheme::None, entries))
    }

    /// One item per frame, each with a 64-byte RLE segment header.
    ///
    /// The first frame also skips the basic offset table item.
    pub fn locate_rle<R: RangeReader + ?Sized>(
        &self,
        reader: &R,
        start: u64,
        frame_count: usize,
        descriptor: &ImageDescriptor,
    ) -> Result<FrameOffsetTable, DecodeError> {
        let scheme = CompressionScheme::Rle;
        let size = reader.size();

        let (tag, table_len) = read_item_header(reader, start)?;
        if tag != ITEM {
            return Err(DecodeError::MissingFrameMarker {
                scheme,
                frame: 0,
                offset: start,
            });
        }
        let mut cursor = start + ITEM_HEADER_SIZE + table_len;

        let mut entries = Vec::with_capacity(frame_count);
        for frame in 0..frame_count {
            let missing = DecodeError::MissingFrameMarker {
                scheme,
                frame,
                offset: cursor,
            };
            if cursor + ITEM_HEADER_SIZE + RLE_HEADER_SIZE > size {
                return Err(missing);
            }
            let (tag, item_len) = read_item_header(reader, cursor)?;
            if tag != ITEM {
                return Err(missing);
            }

            let header_start = cursor + ITEM_HEADER_SIZE;
            let item_end = (header_start + item_len).min(size);
            let header = reader.read_exact_at(header_start, RLE_HEADER_SIZE as usize)?;

            let mut segments = rle_segments(&header, header_start, item_end);
            if segments.is_empty() {
                // Header offsets unusable: the first segment begins at the
                // first non-zero byte after the header.
                let data_start = header_start + RLE_HEADER_SIZE;
                segments.push(first_non_zero(reader, data_start, item_end)?);
            }
            order_segments(
                &mut segments,
                descriptor.bytes_per_sample(),
                descriptor.byte_order,
            );

            let offset = segments.iter().copied().min().unwrap_or(item_end);
            entries.push(FrameEntry {
                offset,
                length: Some(item_end - offset),
                segments,
            });
            cursor = header_start + item_len;
        }

        debug!(frames = entries.len(), "RLE frame table built");
        Ok(FrameOffsetTable::new(scheme, entries))
    }

    /// Frames found by scanning for the scheme's start marker.
    ///
    /// Frame 0 is searched from `start`; each later frame from three bytes
    /// past the previous one. A frame's length runs to the end of its
    /// fragment (or to the next frame when it is not wrapped in items), and
    /// the last one's to the sequence delimiter or end of stream.
    pub fn locate_by_marker<R: RangeReader + ?Sized>(
        &self,
        reader: &R,
        start: u64,
        scheme: CompressionScheme,
        frame_count: usize,
    ) -> Result<FrameOffsetTable, DecodeError> {
        let marker = frame_start_marker(scheme)
            .ok_or(DecodeError::UnsupportedCompressionScheme(scheme))?;

        let mut offsets = Vec::with_capacity(frame_count);
        let mut from = start;
        for frame in 0..frame_count {
            match scan_for_marker(reader, from, marker, self.scan_window)? {
                Some(offset) => {
                    offsets.push(offset);
                    from = offset + 3;
                }
                None => {
                    return Err(DecodeError::MissingFrameMarker {
                        scheme,
                        frame,
                        offset: from,
                    })
                }
            }
        }

        let end = match offsets.last() {
            Some(&last) => {
                scan_for_marker(reader, last + 3, &SEQUENCE_DELIMITER_BYTES, self.scan_window)?
                    .unwrap_or(reader.size())
            }
            None => reader.size(),
        };

        let mut entries = Vec::with_capacity(offsets.len());
        for (i, &offset) in offsets.iter().enumerate() {
            let stop = match offsets.get(i + 1) {
                Some(&next) => codestream_end(reader, offset, next)?,
                None => end,
            };
            entries.push(FrameEntry::new(offset, Some(stop.saturating_sub(offset))));
        }

        debug!(frames = entries.len(), %scheme, "frame table built by marker scan");
        Ok(FrameOffsetTable::new(scheme, entries))
    }
}

impl FrameLocating for CompressedFrameLocator {
    fn locate(
        &self,
        reader: &dyn RangeReader,
        pixel_data_start: u64,
        scheme: CompressionScheme,
        frame_count: usize,
        descriptor: &ImageDescriptor,
    ) -> Result<FrameOffsetTable, DecodeError> {
        match scheme {
            CompressionScheme::None => {
                self.locate_uncompressed(reader, pixel_data_start, frame_count, descriptor)
            }
            CompressionScheme::Rle => {
                self.locate_rle(reader, pixel_data_start, frame_count, descriptor)
            }
            CompressionScheme::Jpeg | CompressionScheme::JpegLs | CompressionScheme::Jpeg2000 => {
                self.locate_by_marker(reader, pixel_data_start, scheme, frame_count)
            }
            CompressionScheme::Deflate | CompressionScheme::Mpeg => {
                Err(DecodeError::UnsupportedCompressionScheme(scheme))
            }
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Read an item or delimiter header; encapsulated data is always little endian.
fn read_item_header<R: RangeReader + ?Sized>(
    reader: &R,
    offset: u64,
) -> Result<(Tag, u64), DecodeError> {
    if offset + ITEM_HEADER_SIZE > reader.size() {
        return Err(DecodeError::UnexpectedEndOfStream {
            offset,
            needed: offset + ITEM_HEADER_SIZE - reader.size(),
        });
    }
    let bytes = reader.read_exact_at(offset, ITEM_HEADER_SIZE as usize)?;
    let tag = Tag::new(read_u16_le(&bytes[0..2]), read_u16_le(&bytes[2..4]));
    let length = read_u32_le(&bytes[4..8]) as u64;
    if tag == SEQUENCE_DELIMITER {
        return Ok((tag, 0));
    }
    Ok((tag, length))
}

/// End of the codestream that precedes the frame starting at `next`.
///
/// When `next` opens a new fragment, the item header in front of it belongs
/// to the container and is left out.
fn codestream_end<R: RangeReader + ?Sized>(
    reader: &R,
    offset: u64,
    next: u64,
) -> Result<u64, DecodeError> {
    if next >= offset + ITEM_HEADER_SIZE {
        let header_at = next - ITEM_HEADER_SIZE;
        let (tag, length) = read_item_header(reader, header_at)?;
        if tag == ITEM && header_at + ITEM_HEADER_SIZE + length >= next {
            return Ok(header_at);
        }
    }
    Ok(next)
}

/// Absolute segment offsets from an RLE header, or empty if the header is
/// unusable.
fn rle_segments(header: &[u8], header_start: u64, item_end: u64) -> Vec<u64> {
    let count = read_u32_le(&header[0..4]) as usize;
    if count == 0 || count > RLE_MAX_SEGMENTS {
        return Vec::new();
    }

    let mut segments = Vec::with_capacity(count);
    let mut previous = 0u64;
    for i in 0..count {
        let at = 4 + i * 4;
        let relative = read_u32_le(&header[at..at + 4]) as u64;
        if relative < RLE_HEADER_SIZE || relative <= previous || header_start + relative > item_end {
            return Vec::new();
        }
        segments.push(header_start + relative);
        previous = relative;
    }
    segments
}

/// Offset of the first non-zero byte in `[from, end)`, or `end`.
fn first_non_zero<R: RangeReader + ?Sized>(
    reader: &R,
    from: u64,
    end: u64,
) -> Result<u64, DecodeError> {
    const CHUNK: u64 = 4096;
    let mut pos = from;
    while pos < end {
        let len = CHUNK.min(end - pos);
        let bytes = reader.read_exact_at(pos, len as usize)?;
        if let Some(i) = bytes.iter().position(|b| *b != 0) {
            return Ok(pos + i as u64);
        }
        pos += len;
    }
    Ok(end)
}

/// RLE stores each sample most significant byte first. For little-endian
/// output, reverse the segment order within each sample.
fn order_segments(segments: &mut [u64], bytes_per_sample: usize, order: ByteOrder) {
    if order == ByteOrder::BigEndian || bytes_per_sample < 2 {
        return;
    }
    for sample in segments.chunks_mut(bytes_per_sample) {
        sample.reverse();
    }
}
