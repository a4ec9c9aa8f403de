//! Test utilities for integration tests.
//!
//! This module provides a synthetic tag-stream builder, a request-tracking
//! reader, and a pass-through decompressor for compressed-frame tests.

use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sci_raster::error::{FormatError, IoError};
use sci_raster::{ByteOrder, CodecOptions, CompressionScheme, Decompressor, RangeReader};

// =============================================================================
// Transfer syntax UIDs
// =============================================================================

pub const IMPLICIT_LE: &str = "1.2.840.10008.1.2";
pub const EXPLICIT_LE: &str = "1.2.840.10008.1.2.1";
pub const EXPLICIT_BE: &str = "1.2.840.10008.1.2.2";
pub const RLE_LOSSLESS: &str = "1.2.840.10008.1.2.5";
pub const JPEG_BASELINE: &str = "1.2.840.10008.1.2.4.50";
pub const JPEG_2000: &str = "1.2.840.10008.1.2.4.90";
pub const MPEG2: &str = "1.2.840.10008.1.2.4.100";

/// VRs encoded with a reserved field and a 4-byte length in explicit streams.
const LONG_VRS: &[&str] = &[
    "OB", "OD", "OF", "OL", "OV", "OW", "SQ", "SV", "UC", "UN", "UR", "UT", "UV",
];

// =============================================================================
// Stream Builder
// =============================================================================

/// Builds synthetic tag streams element by element.
///
/// The meta group is always written explicit little endian; everything else
/// follows the encoding selected with [`StreamBuilder::encoding`].
#[derive(Debug, Clone)]
pub struct StreamBuilder {
    data: Vec<u8>,
    order: ByteOrder,
    explicit: bool,
}

impl Default for StreamBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamBuilder {
    /// Empty stream, explicit VR little endian, no preamble.
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            order: ByteOrder::LittleEndian,
            explicit: true,
        }
    }

    /// Stream starting with the 128-byte preamble and `DICM`.
    pub fn with_preamble() -> Self {
        let mut builder = Self::new();
        builder.data.resize(128, 0);
        builder.data.extend_from_slice(b"DICM");
        builder
    }

    /// Write the transfer syntax element and switch to its encoding.
    pub fn transfer_syntax(mut self, uid: &str) -> Self {
        let mut value = uid.as_bytes().to_vec();
        if value.len() % 2 == 1 {
            value.push(0);
        }
        self.header_with(0x0002, 0x0010, Some("UI"), value.len() as u32, ByteOrder::LittleEndian);
        self.data.extend_from_slice(&value);

        let (order, explicit) = match uid {
            IMPLICIT_LE => (ByteOrder::LittleEndian, false),
            EXPLICIT_BE => (ByteOrder::BigEndian, true),
            _ => (ByteOrder::LittleEndian, true),
        };
        self.encoding(order, explicit)
    }

    /// Select the encoding of subsequent data-set elements.
    pub fn encoding(mut self, order: ByteOrder, explicit: bool) -> Self {
        self.order = order;
        self.explicit = explicit;
        self
    }

    /// Element with raw value bytes.
    pub fn element(mut self, group: u16, element: u16, vr: &str, value: &[u8]) -> Self {
        let vr = self.explicit.then_some(vr);
        self.header_with(group, element, vr, value.len() as u32, self.order);
        self.data.extend_from_slice(value);
        self
    }

    /// Unsigned short element in the current byte order.
    pub fn us(self, group: u16, element: u16, value: u16) -> Self {
        let bytes = match self.order {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        };
        self.element(group, element, "US", &bytes)
    }

    /// Text element, space padded to even length.
    pub fn text(self, group: u16, element: u16, vr: &str, value: &str) -> Self {
        let mut bytes = value.as_bytes().to_vec();
        if bytes.len() % 2 == 1 {
            bytes.push(b' ');
        }
        self.element(group, element, vr, &bytes)
    }

    /// Element header only, with an explicit length (`0xFFFFFFFF` for undefined).
    pub fn header(mut self, group: u16, element: u16, vr: &str, length: u32) -> Self {
        let vr = self.explicit.then_some(vr);
        self.header_with(group, element, vr, length, self.order);
        self
    }

    /// Item header with the given length.
    pub fn item(mut self, length: u32) -> Self {
        self.delimiter(0xE000, length);
        self
    }

    /// Item carrying `payload`, always little endian (encapsulated data).
    pub fn item_with(mut self, payload: &[u8]) -> Self {
        self.data.extend_from_slice(&[0xFE, 0xFF, 0x00, 0xE0]);
        self.data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.data.extend_from_slice(payload);
        self
    }

    pub fn item_delimiter(mut self) -> Self {
        self.delimiter(0xE00D, 0);
        self
    }

    pub fn sequence_delimiter(mut self) -> Self {
        self.delimiter(0xE0DD, 0);
        self
    }

    /// Append raw bytes.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    /// Current length; the offset the next element will start at.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }

    fn delimiter(&mut self, element: u16, length: u32) {
        self.push_u16(0xFFFE, self.order);
        self.push_u16(element, self.order);
        self.push_u32(length, self.order);
    }

    fn header_with(&mut self, group: u16, element: u16, vr: Option<&str>, length: u32, order: ByteOrder) {
        self.push_u16(group, order);
        self.push_u16(element, order);
        match vr {
            Some(vr) => {
                self.data.extend_from_slice(vr.as_bytes());
                if LONG_VRS.contains(&vr) {
                    self.data.extend_from_slice(&[0, 0]);
                    self.push_u32(length, order);
                } else {
                    self.push_u16(length as u16, order);
                }
            }
            None => self.push_u32(length, order),
        }
    }

    fn push_u16(&mut self, value: u16, order: ByteOrder) {
        match order {
            ByteOrder::LittleEndian => self.data.extend_from_slice(&value.to_le_bytes()),
            ByteOrder::BigEndian => self.data.extend_from_slice(&value.to_be_bytes()),
        }
    }

    fn push_u32(&mut self, value: u32, order: ByteOrder) {
        match order {
            ByteOrder::LittleEndian => self.data.extend_from_slice(&value.to_le_bytes()),
            ByteOrder::BigEndian => self.data.extend_from_slice(&value.to_be_bytes()),
        }
    }
}

/// Image pixel module for an uncompressed image, ending with pixel data.
///
/// The pixel data value is `pixels` verbatim.
pub fn image_stream(
    syntax: &str,
    rows: u16,
    columns: u16,
    samples: u16,
    bits: u16,
    planar: bool,
    pixels: &[u8],
) -> Vec<u8> {
    let mut builder = StreamBuilder::with_preamble()
        .transfer_syntax(syntax)
        .text(0x0008, 0x0060, "CS", "OT")
        .us(0x0028, 0x0002, samples)
        .text(
            0x0028,
            0x0004,
            "CS",
            if samples == 3 { "RGB" } else { "MONOCHROME2" },
        );
    if samples > 1 {
        builder = builder.us(0x0028, 0x0006, planar as u16);
    }
    builder
        .us(0x0028, 0x0010, rows)
        .us(0x0028, 0x0011, columns)
        .us(0x0028, 0x0100, bits)
        .us(0x0028, 0x0101, bits)
        .us(0x0028, 0x0103, 0)
        .element(0x7FE0, 0x0010, if bits > 8 { "OW" } else { "OB" }, pixels)
        .build()
}

/// Deterministic test pattern.
pub fn ramp(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

// =============================================================================
// Mock Range Reader with Request Tracking
// =============================================================================

/// An in-memory reader that records every read request.
///
/// Clones share the same request log, so a clone kept by the test observes
/// reads made through the original after it has been moved into a reader.
#[derive(Clone)]
pub struct TrackingReader {
    data: Bytes,
    identifier: String,
    request_count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<(u64, usize)>>>,
}

impl TrackingReader {
    pub fn new(data: Vec<u8>, identifier: impl Into<String>) -> Self {
        Self {
            data: Bytes::from(data),
            identifier: identifier.into(),
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(u64, usize)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn reset_tracking(&self) {
        self.request_count.store(0, Ordering::SeqCst);
        self.requests.lock().unwrap().clear();
    }
}

impl RangeReader for TrackingReader {
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push((offset, len));

        let start = offset as usize;
        let end = start + len;
        if end > self.data.len() {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.data.len() as u64,
            });
        }
        Ok(self.data.slice(start..end))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

// =============================================================================
// Decompressor
// =============================================================================

/// Treats compressed frame bytes as already decoded.
///
/// Records the scheme and input length of every call.
#[derive(Default)]
pub struct StoredDecompressor {
    pub calls: Mutex<Vec<(CompressionScheme, usize)>>,
}

impl Decompressor for StoredDecompressor {
    fn decompress(
        &self,
        data: Bytes,
        scheme: CompressionScheme,
        _options: &CodecOptions,
    ) -> Result<Bytes, FormatError> {
        self.calls.lock().unwrap().push((scheme, data.len()));
        Ok(data)
    }
}
