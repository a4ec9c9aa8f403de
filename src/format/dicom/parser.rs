//! Tag-stream decoder.
//!
//! Walks the attribute stream record by record with a single forward-only
//! cursor, filling in an [`ImageDescriptor`] until the pixel-data key is
//! reached or the stream runs out.
//!
//! # Record Layout
//!
//! ```text
//! Explicit VR, short form:  key(4) VR(2) length(2)          value
//! Explicit VR, long form:   key(4) VR(2) reserved(2) length(4) value
//! Implicit VR:              key(4) length(4)                 value
//! Item / delimiters:        key(4) length(4)
//! ```
//!
//! A length of `0xFFFFFFFF` is undefined: the value is a nested sequence
//! closed by a sequence delimiter.
//!
//! # Byte Order
//!
//! The meta group (0002) is always little endian. The rest of the stream uses
//! the byte order selected by the transfer syntax. When a record's length
//! does not fit in the remaining bytes, the record is re-read once with the
//! opposite byte order before the stream is declared corrupt.

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::config::DecoderOptions;
use crate::error::DecodeError;
use crate::io::{read_u16_le, RangeReader};
use crate::raster::{
    AttributeValue, ByteOrder, ChannelLayout, CompressionScheme, ImageDescriptor, Photometric,
    PixelType,
};

use super::dictionary::AttributeDictionary;
use super::tags::{
    Tag, TransferSyntax, Vr, BITS_ALLOCATED, COLUMNS, DOUBLE_FLOAT_PIXEL_DATA, FLOAT_PIXEL_DATA,
    ITEM, ITEM_DELIMITER, MAGIC, NUMBER_OF_FRAMES, PHOTOMETRIC_INTERPRETATION, PIXEL_DATA,
    PIXEL_REPRESENTATION, PLANAR_CONFIGURATION, PREAMBLE_SIZE, ROWS, SAMPLES_PER_PIXEL,
    SEQUENCE_DELIMITER, TRANSFER_SYNTAX_UID, UNDEFINED_LENGTH,
};
use super::values::{decode_text, decode_uint, decode_value};

/// Longest record header: key, VR, reserved bytes and a 4-byte length.
const MAX_HEADER_LEN: u64 = 12;

// =============================================================================
// Public types
// =============================================================================

/// Capability of turning a byte stream into an image description.
pub trait TagDecoding {
    fn decode_tags(&self, reader: &dyn RangeReader) -> Result<HeaderInfo, DecodeError>;
}

/// One record header as read from the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagRecord {
    pub tag: Tag,
    /// Resolved VR; `None` for items and delimiters
    pub vr: Option<Vr>,
    /// The VR was spelled out in the stream
    pub explicit: bool,
    /// Declared value length; `None` when undefined
    pub length: Option<u64>,
    /// Offset of the record's key
    pub offset: u64,
    /// Offset of the first value byte
    pub value_offset: u64,
    /// Byte order the header was read with
    pub byte_order: ByteOrder,
}

/// Where the pixel-data value starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PixelDataInfo {
    pub tag: Tag,
    /// First byte of the value; for encapsulated data this is the first
    /// item header.
    pub offset: u64,
    /// Declared length; `None` when encapsulated
    pub length: Option<u64>,
}

impl PixelDataInfo {
    pub fn is_encapsulated(&self) -> bool {
        self.length.is_none()
    }
}

/// Result of decoding a stream header.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderInfo {
    pub descriptor: ImageDescriptor,
    pub transfer_syntax: TransferSyntax,
    pub pixel_data: Option<PixelDataInfo>,
    /// The 128-byte preamble and marker were present
    pub has_preamble: bool,
    /// Records read, including nested ones
    pub records: usize,
}

/// Decoder phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    ExpectPreamble,
    ExpectTag,
    ExpectValue,
    AtPixelData,
    Exhausted,
}

// =============================================================================
// TagStreamDecoder
// =============================================================================

/// Decoder for DICOM-style tag streams.
#[derive(Debug, Clone, Default)]
pub struct TagStreamDecoder {
    options: DecoderOptions,
}

impl TagStreamDecoder {
    pub fn new(options: DecoderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }

    /// Decode the header of `reader`.
    ///
    /// # Errors
    /// - `NotRecognized` if the stream has neither a marker nor a known first key
    /// - `CorruptTagStream` if a length fits under neither byte order
    /// - `UnexpectedEndOfStream` if the stream ends inside a record header
    /// - `UnsupportedCompressionScheme` for deflated data sets
    pub fn decode<R: RangeReader + ?Sized>(&self, reader: &R) -> Result<HeaderInfo, DecodeError> {
        Session::new(reader, &self.options).run()
    }
}

impl TagDecoding for TagStreamDecoder {
    fn decode_tags(&self, reader: &dyn RangeReader) -> Result<HeaderInfo, DecodeError> {
        self.decode(reader)
    }
}

/// Check whether a stream looks like a tag stream.
///
/// The marker after the preamble wins; otherwise the first key at offset 0
/// must be a dictionary entry under either byte order. Returns the offset of
/// the first record.
pub fn sniff<R: RangeReader + ?Sized>(reader: &R) -> Result<Option<(u64, bool)>, DecodeError> {
    let size = reader.size();

    if size >= PREAMBLE_SIZE + 4 {
        let marker = reader.read_exact_at(PREAMBLE_SIZE, 4)?;
        if marker.as_ref() == MAGIC {
            return Ok(Some((PREAMBLE_SIZE + 4, true)));
        }
    }

    if size < 8 {
        return Ok(None);
    }
    let head = reader.read_exact_at(0, 8)?;
    // Marker without preamble
    if &head[..4] == MAGIC {
        return Ok(Some((4, true)));
    }

    let dict = AttributeDictionary::global();
    for order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
        let tag = Tag::new(order.read_u16(&head[0..2]), order.read_u16(&head[2..4]));
        if !tag.is_delimiter() && dict.lookup(tag).is_some() {
            return Ok(Some((0, false)));
        }
    }
    Ok(None)
}

// =============================================================================
// Session state
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NestKind {
    Sequence,
    Item,
    /// Encapsulated fragments: items are skipped whole
    Fragments,
}

#[derive(Debug, Clone, Copy)]
struct Nest {
    kind: NestKind,
    /// End offset for defined lengths
    end: Option<u64>,
}

/// Outcome of a top-level structural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Structural {
    /// Folded into the descriptor only
    Consumed,
    /// Also stored in the attribute map
    Attribute,
    /// Scanning restarts from offset 0
    Restart,
}

/// Structural values collected before they are folded into the descriptor.
#[derive(Debug, Clone, Default)]
struct Structure {
    rows: Option<u64>,
    columns: Option<u64>,
    samples: Option<u64>,
    bits_allocated: Option<u64>,
    planar: Option<u64>,
    pixel_representation: Option<u64>,
    frames: Option<u64>,
    photometric: Option<Photometric>,
    float_bits: Option<u16>,
}

impl Structure {
    fn apply(&self, descriptor: &mut ImageDescriptor, syntax: &TransferSyntax, order: ByteOrder) {
        descriptor.width = self.columns.unwrap_or(0);
        descriptor.height = self.rows.unwrap_or(0);
        descriptor.channels = self.samples.unwrap_or(1).max(1);
        descriptor.frame_count = self.frames.filter(|n| *n > 0).unwrap_or(1);
        descriptor.byte_order = order;
        descriptor.compression = syntax.compression;

        let signed = self.pixel_representation == Some(1);
        let bits = self.bits_allocated.unwrap_or(8);
        descriptor.pixel_type = match self.float_bits {
            Some(64) => PixelType::FLOAT64,
            Some(_) => PixelType::FLOAT32,
            None if bits == 24 && descriptor.channels == 1 => {
                descriptor.channels = 3;
                PixelType::UINT8
            }
            None => PixelType::from_bits(bits.min(u16::MAX as u64) as u16, signed),
        };

        descriptor.layout = if self.planar == Some(1) && descriptor.channels > 1 {
            ChannelLayout::Planar
        } else {
            ChannelLayout::Interleaved
        };

        if let Some(photometric) = &self.photometric {
            descriptor.photometric = photometric.clone();
            match photometric {
                Photometric::PaletteColor => {
                    descriptor.indexed = true;
                    descriptor.channels = 1;
                }
                Photometric::Monochrome1 => descriptor.inverted = true,
                _ => {}
            }
        }
    }
}

struct Session<'a, R: ?Sized> {
    reader: &'a R,
    options: &'a DecoderOptions,
    dict: &'static AttributeDictionary,
    size: u64,
    cursor: u64,
    state: DecoderState,
    pending: Option<TagRecord>,

    syntax: TransferSyntax,
    /// Byte order for records outside the meta group
    order: ByteOrder,
    /// Set once the transfer syntax has fixed the byte order
    order_locked: bool,
    odd_tolerant: bool,
    has_preamble: bool,
    restarted: bool,

    nesting: Vec<Nest>,
    structure: Structure,
    descriptor: ImageDescriptor,
    pixel_data: Option<PixelDataInfo>,
    records: usize,
}

impl<'a, R: RangeReader + ?Sized> Session<'a, R> {
    fn new(reader: &'a R, options: &'a DecoderOptions) -> Self {
        Self {
            reader,
            options,
            dict: AttributeDictionary::global(),
            size: reader.size(),
            cursor: 0,
            state: DecoderState::ExpectPreamble,
            pending: None,
            syntax: TransferSyntax::default(),
            order: ByteOrder::LittleEndian,
            order_locked: false,
            odd_tolerant: options.tolerate_odd_lengths,
            has_preamble: false,
            restarted: false,
            nesting: Vec::new(),
            structure: Structure::default(),
            descriptor: ImageDescriptor::new(),
            pixel_data: None,
            records: 0,
        }
    }

    fn run(mut self) -> Result<HeaderInfo, DecodeError> {
        loop {
            self.state = match self.state {
                DecoderState::ExpectPreamble => self.read_preamble()?,
                DecoderState::ExpectTag => self.read_tag()?,
                DecoderState::ExpectValue => self.read_value()?,
                DecoderState::AtPixelData | DecoderState::Exhausted => break,
            };
        }

        if self.state == DecoderState::Exhausted && !self.nesting.is_empty() {
            debug!(
                open = self.nesting.len(),
                "stream ended inside a nested sequence"
            );
        }

        self.structure
            .apply(&mut self.descriptor, &self.syntax, self.order);

        debug!(
            width = self.descriptor.width,
            height = self.descriptor.height,
            channels = self.descriptor.channels,
            pixel_type = %self.descriptor.pixel_type,
            frames = self.descriptor.frame_count,
            compression = %self.descriptor.compression,
            records = self.records,
            "decoded tag stream header"
        );

        Ok(HeaderInfo {
            descriptor: self.descriptor,
            transfer_syntax: self.syntax,
            pixel_data: self.pixel_data,
            has_preamble: self.has_preamble,
            records: self.records,
        })
    }

    // -------------------------------------------------------------------------
    // States
    // -------------------------------------------------------------------------

    fn read_preamble(&mut self) -> Result<DecoderState, DecodeError> {
        match sniff(self.reader)? {
            Some((start, has_preamble)) => {
                self.cursor = start;
                self.has_preamble = has_preamble;
                trace!(start, has_preamble, "stream recognized");
                Ok(DecoderState::ExpectTag)
            }
            None => Err(DecodeError::NotRecognized(format!(
                "{}: no marker and no known first tag",
                self.reader.identifier()
            ))),
        }
    }

    fn read_tag(&mut self) -> Result<DecoderState, DecodeError> {
        while let Some(Nest { end: Some(end), .. }) = self.nesting.last() {
            if self.cursor < *end {
                break;
            }
            self.nesting.pop();
        }

        if self.cursor >= self.size {
            return Ok(DecoderState::Exhausted);
        }

        if self.cursor % 2 == 1 && !self.odd_tolerant {
            debug!(offset = self.cursor, "record at odd offset, keeping odd lengths");
            self.odd_tolerant = true;
        }

        self.records += 1;
        if self.records > self.options.max_records {
            return Err(DecodeError::CorruptTagStream {
                tag: "record limit".to_string(),
                offset: self.cursor,
                length: self.records as u64,
                remaining: self.size - self.cursor,
            });
        }

        let avail = (self.size - self.cursor).min(MAX_HEADER_LEN);
        let header = self.reader.read_exact_at(self.cursor, avail as usize)?;
        let record = self.resolve_header(&header)?;

        trace!(
            tag = %record.tag,
            vr = ?record.vr,
            length = ?record.length,
            offset = record.offset,
            "record"
        );

        self.pending = Some(record);
        Ok(DecoderState::ExpectValue)
    }

    fn read_value(&mut self) -> Result<DecoderState, DecodeError> {
        let record = match self.pending.take() {
            Some(record) => record,
            None => return Ok(DecoderState::ExpectTag),
        };
        self.cursor = record.value_offset;

        if record.tag.is_delimiter() {
            self.handle_delimiter(&record);
            return Ok(DecoderState::ExpectTag);
        }

        let depth = self.sequence_depth();
        let is_pixel_data = matches!(
            record.tag,
            PIXEL_DATA | FLOAT_PIXEL_DATA | DOUBLE_FLOAT_PIXEL_DATA
        );

        if is_pixel_data && depth == 0 {
            self.structure.float_bits = match record.tag {
                FLOAT_PIXEL_DATA => Some(32),
                DOUBLE_FLOAT_PIXEL_DATA => Some(64),
                _ => None,
            };
            let info = PixelDataInfo {
                tag: record.tag,
                offset: record.value_offset,
                length: record.length,
            };
            debug!(
                offset = info.offset,
                length = ?info.length,
                encapsulated = info.is_encapsulated(),
                "pixel data located"
            );
            self.pixel_data = Some(info);
            return Ok(DecoderState::AtPixelData);
        }

        let vr = record.vr.unwrap_or(Vr::UN);
        let length = match record.length {
            Some(length) => length,
            None => {
                let kind = if is_pixel_data {
                    NestKind::Fragments
                } else {
                    NestKind::Sequence
                };
                self.insert_attribute(record.tag, depth, AttributeValue::Sequence);
                self.nesting.push(Nest { kind, end: None });
                return Ok(DecoderState::ExpectTag);
            }
        };

        if vr == Vr::SQ {
            self.insert_attribute(record.tag, depth, AttributeValue::Sequence);
            self.nesting.push(Nest {
                kind: NestKind::Sequence,
                end: Some(record.value_offset + length),
            });
            return Ok(DecoderState::ExpectTag);
        }

        let padded = self.padded_length(length);
        if depth == 0 {
            match self.apply_structural(&record, vr, length)? {
                Structural::Consumed => return Ok(self.advance(padded)),
                Structural::Restart => return Ok(DecoderState::ExpectTag),
                Structural::Attribute => {}
            }
        }

        let value = if length > self.options.max_value_bytes {
            AttributeValue::Skipped { length }
        } else {
            let bytes = self
                .reader
                .read_exact_at(record.value_offset, length as usize)?;
            decode_value(vr, &bytes, record.byte_order)
        };
        self.insert_attribute(record.tag, depth, value);

        Ok(self.advance(padded))
    }

    // -------------------------------------------------------------------------
    // Header resolution
    // -------------------------------------------------------------------------

    /// Resolve key, VR and length, retrying once with the opposite byte order
    /// when the length does not fit.
    fn resolve_header(&mut self, header: &[u8]) -> Result<TagRecord, DecodeError> {
        let offset = self.cursor;
        let first = parse_header(header, offset, self.order, false, self.dict)?;
        if self.fits(&first) {
            return Ok(first);
        }

        let retry = parse_header(header, offset, self.order.opposite(), true, self.dict)?;
        if self.fits(&retry) {
            warn!(
                tag = %retry.tag,
                offset,
                order = ?retry.byte_order,
                "length did not fit, re-read with opposite byte order"
            );
            if !self.order_locked {
                self.order = retry.byte_order;
            }
            return Ok(retry);
        }

        Err(DecodeError::CorruptTagStream {
            tag: first.tag.to_string(),
            offset,
            length: first.length.unwrap_or(0),
            remaining: self.size.saturating_sub(first.value_offset),
        })
    }

    fn fits(&self, record: &TagRecord) -> bool {
        match record.length {
            None => true,
            Some(length) => record
                .value_offset
                .checked_add(length)
                .map(|end| end <= self.size)
                .unwrap_or(false),
        }
    }

    fn padded_length(&self, length: u64) -> u64 {
        if length % 2 == 1 && !self.odd_tolerant {
            length + 1
        } else {
            length
        }
    }

    fn advance(&mut self, length: u64) -> DecoderState {
        self.cursor = (self.cursor + length).min(self.size);
        DecoderState::ExpectTag
    }

    // -------------------------------------------------------------------------
    // Nesting
    // -------------------------------------------------------------------------

    fn sequence_depth(&self) -> usize {
        self.nesting
            .iter()
            .filter(|n| n.kind != NestKind::Item)
            .count()
    }

    fn handle_delimiter(&mut self, record: &TagRecord) {
        match record.tag {
            ITEM => match self.nesting.last() {
                Some(Nest {
                    kind: NestKind::Fragments,
                    ..
                }) => {
                    // Fragment payloads are codec data, never records
                    let length = record.length.unwrap_or(0);
                    self.advance(length);
                }
                _ => self.nesting.push(Nest {
                    kind: NestKind::Item,
                    end: record.length.map(|l| record.value_offset + l),
                }),
            },
            ITEM_DELIMITER => {
                if let Some(i) = self.nesting.iter().rposition(|n| n.kind == NestKind::Item) {
                    self.nesting.truncate(i);
                }
            }
            SEQUENCE_DELIMITER => {
                if let Some(i) = self
                    .nesting
                    .iter()
                    .rposition(|n| n.kind != NestKind::Item)
                {
                    self.nesting.truncate(i);
                }
            }
            _ => {
                self.advance(record.length.unwrap_or(0));
            }
        }
    }

    fn insert_attribute(&mut self, tag: Tag, depth: usize, value: AttributeValue) {
        let name = self.dict.name_of(tag);
        let key = if depth == 0 {
            name
        } else {
            format!("{}{}", ">".repeat(depth), name)
        };
        self.descriptor.attributes.insert(key, value);
    }

    // -------------------------------------------------------------------------
    // Structural keys
    // -------------------------------------------------------------------------

    /// Apply a top-level structural key.
    fn apply_structural(
        &mut self,
        record: &TagRecord,
        vr: Vr,
        length: u64,
    ) -> Result<Structural, DecodeError> {
        let tag = record.tag;
        let consumed = matches!(
            tag,
            ROWS | COLUMNS
                | SAMPLES_PER_PIXEL
                | BITS_ALLOCATED
                | PLANAR_CONFIGURATION
                | PIXEL_REPRESENTATION
                | NUMBER_OF_FRAMES
        );
        if !consumed && tag != TRANSFER_SYNTAX_UID && tag != PHOTOMETRIC_INTERPRETATION {
            return Ok(Structural::Attribute);
        }
        if length > self.options.max_value_bytes {
            return Ok(Structural::Attribute);
        }

        let bytes = self
            .reader
            .read_exact_at(record.value_offset, length as usize)?;
        let value = decode_uint(vr, &bytes, record.byte_order);

        match tag {
            ROWS => self.structure.rows = value,
            COLUMNS => self.structure.columns = value,
            SAMPLES_PER_PIXEL => self.structure.samples = value,
            BITS_ALLOCATED => self.structure.bits_allocated = value,
            PLANAR_CONFIGURATION => self.structure.planar = value,
            PIXEL_REPRESENTATION => self.structure.pixel_representation = value,
            NUMBER_OF_FRAMES => self.structure.frames = value,
            PHOTOMETRIC_INTERPRETATION => {
                self.structure.photometric = Some(Photometric::parse(&decode_text(&bytes)));
            }
            TRANSFER_SYNTAX_UID => {
                if self.apply_transfer_syntax(&decode_text(&bytes))? {
                    return Ok(Structural::Restart);
                }
            }
            _ => {}
        }
        Ok(if consumed {
            Structural::Consumed
        } else {
            Structural::Attribute
        })
    }

    /// Returns `true` when scanning restarts from the stream start.
    fn apply_transfer_syntax(&mut self, uid: &str) -> Result<bool, DecodeError> {
        let syntax = TransferSyntax::from_uid(uid);
        debug!(
            uid,
            explicit_vr = syntax.explicit_vr,
            byte_order = ?syntax.byte_order,
            compression = %syntax.compression,
            "transfer syntax resolved"
        );

        if syntax.compression == CompressionScheme::Deflate {
            return Err(DecodeError::UnsupportedCompressionScheme(
                CompressionScheme::Deflate,
            ));
        }

        // The first transfer syntax fixes the encoding for the whole stream
        if self.order_locked {
            if syntax != self.syntax {
                warn!(
                    uid,
                    offset = self.cursor,
                    "second transfer syntax ignored, keeping the first"
                );
            }
            return Ok(false);
        }

        let changed = syntax.byte_order != self.order;
        self.syntax = syntax;
        self.order = syntax.byte_order;
        self.order_locked = true;

        // Without the marker, records before this one were read under a
        // guessed byte order; read them again under the declared one.
        if !self.has_preamble && !self.restarted && changed {
            debug!("no marker present, restarting scan from offset 0");
            self.restarted = true;
            self.nesting.clear();
            self.structure = Structure::default();
            self.descriptor.attributes.clear();
            self.records = 0;
            self.odd_tolerant = self.options.tolerate_odd_lengths;
            self.cursor = 0;
            self.pending = None;
            return Ok(true);
        }
        Ok(false)
    }
}

/// Parse a record header from `header`, read at `offset`.
///
/// Meta-group keys are read little endian unless `force` is set.
fn parse_header(
    header: &[u8],
    offset: u64,
    order: ByteOrder,
    force: bool,
    dict: &AttributeDictionary,
) -> Result<TagRecord, DecodeError> {
    if header.len() < 8 {
        return Err(DecodeError::UnexpectedEndOfStream {
            offset,
            needed: 8 - header.len() as u64,
        });
    }

    let order = if !force && read_u16_le(header) == 0x0002 {
        ByteOrder::LittleEndian
    } else {
        order
    };
    let tag = Tag::new(order.read_u16(&header[0..2]), order.read_u16(&header[2..4]));

    let undefined = |raw: u32| (raw != UNDEFINED_LENGTH).then_some(raw as u64);

    if tag.is_delimiter() {
        return Ok(TagRecord {
            tag,
            vr: None,
            explicit: false,
            length: undefined(order.read_u32(&header[4..8])),
            offset,
            value_offset: offset + 8,
            byte_order: order,
        });
    }

    let record = match Vr::from_bytes([header[4], header[5]]) {
        Some(vr) if vr.has_long_length() => {
            if header.len() < 12 {
                return Err(DecodeError::UnexpectedEndOfStream {
                    offset,
                    needed: 12 - header.len() as u64,
                });
            }
            TagRecord {
                tag,
                vr: Some(vr),
                explicit: true,
                length: undefined(order.read_u32(&header[8..12])),
                offset,
                value_offset: offset + 12,
                byte_order: order,
            }
        }
        Some(vr) => TagRecord {
            tag,
            vr: Some(vr),
            explicit: true,
            length: Some(order.read_u16(&header[6..8]) as u64),
            offset,
            value_offset: offset + 8,
            byte_order: order,
        },
        None => TagRecord {
            tag,
            vr: Some(dict.vr_of(tag)),
            explicit: false,
            length: undefined(order.read_u32(&header[4..8])),
            offset,
            value_offset: offset + 8,
            byte_order: order,
        },
    };
    Ok(record)
}
