//! DICOM format adapter for the reader façade.

use tracing::{debug, warn};

use crate::config::DecoderOptions;
use crate::error::{DecodeError, FormatError};
use crate::format::detect::detect_format;
use crate::io::RangeReader;
use crate::raster::{frame_byte_size, Padding, PixelLayoutEngine};
use crate::reader::{DecodedHeader, ImageFormat};

use super::frames::{CompressedFrameLocator, FrameLocating, FrameOffsetTable};
use super::parser::{HeaderInfo, TagDecoding, TagStreamDecoder};
use super::tags::{NUMBER_OF_FRAMES, ROWS};

/// Registry identifier of the DICOM format.
pub const DICOM_FORMAT_ID: &str = "dicom";

/// Tag-stream decoding composed with frame location.
#[derive(Debug, Clone)]
pub struct DicomFormat {
    decoder: TagStreamDecoder,
    locator: CompressedFrameLocator,
    max_block_bytes: u64,
}

impl DicomFormat {
    pub fn new(options: &DecoderOptions) -> Self {
        Self {
            decoder: TagStreamDecoder::new(options.clone()),
            locator: CompressedFrameLocator::new(options.scan_window),
            max_block_bytes: options.max_block_bytes,
        }
    }

    /// Decode the attribute stream only, without locating frames.
    pub fn decode_tags(&self, reader: &dyn RangeReader) -> Result<HeaderInfo, DecodeError> {
        self.decoder.decode_tags(reader)
    }

    /// Resolve the frame table for a decoded header.
    ///
    /// Header-only streams get an empty table.
    pub fn locate_frames(
        &self,
        reader: &dyn RangeReader,
        info: &HeaderInfo,
    ) -> Result<FrameOffsetTable, DecodeError> {
        let descriptor = &info.descriptor;
        let scheme = descriptor.compression;
        let Some(pixel_data) = info.pixel_data else {
            debug!("no pixel data in stream");
            return Ok(FrameOffsetTable::new(scheme, Vec::new()));
        };

        // Every frame takes at least one byte
        let remaining = reader.size().saturating_sub(pixel_data.offset);
        if descriptor.frame_count > remaining.max(1) {
            return Err(DecodeError::CorruptTagStream {
                tag: NUMBER_OF_FRAMES.to_string(),
                offset: pixel_data.offset,
                length: descriptor.frame_count,
                remaining,
            });
        }
        let frame_count = descriptor.frame_count as usize;

        // Decoded frames of any scheme must be addressable
        let frame_size = frame_byte_size(descriptor, Padding::NONE).ok_or_else(|| {
            DecodeError::CorruptTagStream {
                tag: ROWS.to_string(),
                offset: pixel_data.offset,
                length: descriptor.height,
                remaining,
            }
        })?;

        if !scheme.is_compressed() {
            if let (Some(length), Some(needed)) = (
                pixel_data.length,
                frame_size.checked_mul(descriptor.frame_count),
            ) {
                if needed > length {
                    warn!(needed, length, "pixel data shorter than declared frames");
                }
            }
        } else if !pixel_data.is_encapsulated() {
            warn!(%scheme, "compressed pixel data with a defined length");
        }

        self.locator
            .locate(reader, pixel_data.offset, scheme, frame_count, descriptor)
    }
}

impl ImageFormat for DicomFormat {
    fn id(&self) -> &'static str {
        DICOM_FORMAT_ID
    }

    fn decode_header(&self, reader: &dyn RangeReader) -> Result<DecodedHeader, FormatError> {
        let info = self.decode_tags(reader)?;
        let frames = self.locate_frames(reader, &info)?;
        Ok(DecodedHeader {
            format: DICOM_FORMAT_ID,
            pixel_data_start: info.pixel_data.map(|p| p.offset),
            descriptor: info.descriptor,
            frames,
        })
    }

    fn layout_engine(&self) -> PixelLayoutEngine {
        PixelLayoutEngine::new(self.max_block_bytes)
    }
}

/// Registry sniff function for DICOM streams.
pub fn sniff_dicom(reader: &dyn RangeReader) -> Result<bool, FormatError> {
    match detect_format(reader) {
        Ok(detection) => Ok(detection.format == DICOM_FORMAT_ID),
        Err(FormatError::UnsupportedFormat { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Registry constructor for DICOM streams.
pub fn open_dicom(options: &DecoderOptions) -> Box<dyn ImageFormat> {
    Box::new(DicomFormat::new(options))
}
