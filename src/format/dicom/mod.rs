//! DICOM-style tag streams.
//!
//! Decoding happens in two passes over a [`RangeReader`](crate::io::RangeReader):
//!
//! 1. [`TagStreamDecoder`] walks the attribute records, resolving VR and byte
//!    order, and fills an [`ImageDescriptor`](crate::raster::ImageDescriptor)
//!    until the pixel-data key is reached.
//! 2. [`CompressedFrameLocator`] resolves one offset per frame inside the
//!    pixel data according to the compression scheme.
//!
//! [`DicomFormat`] composes both and plugs into the reader façade.

mod dictionary;
mod frames;
mod parser;
mod reader;
mod tags;
mod values;

pub use dictionary::{AttributeDictionary, DictionaryEntry};
pub use frames::{
    CompressedFrameLocator, FrameEntry, FrameLocating, FrameOffsetTable, RLE_HEADER_SIZE,
    RLE_MAX_SEGMENTS,
};
pub use parser::{
    sniff, DecoderState, HeaderInfo, PixelDataInfo, TagDecoding, TagRecord, TagStreamDecoder,
};
pub use reader::{open_dicom, sniff_dicom, DicomFormat, DICOM_FORMAT_ID};
pub use tags::{
    Tag, TransferSyntax, Vr, VrCategory, BITS_ALLOCATED, BITS_STORED, COLUMNS,
    DOUBLE_FLOAT_PIXEL_DATA, FLOAT_PIXEL_DATA, ITEM, ITEM_DELIMITER, MAGIC, NUMBER_OF_FRAMES,
    PHOTOMETRIC_INTERPRETATION, PIXEL_DATA, PIXEL_REPRESENTATION, PLANAR_CONFIGURATION,
    PREAMBLE_SIZE, ROWS, SAMPLES_PER_PIXEL, SEQUENCE_DELIMITER, TRANSFER_SYNTAX_UID,
    UNDEFINED_LENGTH,
};
pub use values::{decode_text, decode_uint, decode_value};
