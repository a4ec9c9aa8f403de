//! Container formats.
//!
//! # Format Detection
//!
//! Use [`detect::detect_format`] to identify a stream from its first bytes.
//! Currently supported formats:
//!
//! - **DICOM**: tag streams with or without the 128-byte preamble
//!
//! Compressed pixel data is never decoded here. Frames are located (see
//! [`jpeg`] for marker scanning) and handed to a [`codec::Decompressor`].

pub mod codec;
pub mod detect;
pub mod dicom;
pub mod jpeg;

pub use codec::{decompress, CodecOptions, Decompressor};
pub use detect::{detect_format, Detection};
pub use dicom::{
    AttributeDictionary, CompressedFrameLocator, DicomFormat, FrameEntry, FrameLocating,
    FrameOffsetTable, HeaderInfo, TagDecoding, TagStreamDecoder,
};
