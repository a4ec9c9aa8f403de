//! Hand-off point to external pixel codecs.
//!
//! The decoder never decompresses pixel data itself. For a compressed frame it
//! resolves the frame's offset and length, reads those bytes, and passes them
//! to a [`Decompressor`] together with the frame geometry.

use bytes::Bytes;
use tracing::trace;

use crate::error::FormatError;
use crate::format::dicom::FrameEntry;
use crate::raster::{ByteOrder, ChannelLayout, CompressionScheme, ImageDescriptor, PixelType};

/// Frame geometry and container details a codec needs to decode one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecOptions {
    pub width: u64,
    pub height: u64,
    pub channels: u64,
    pub pixel_type: PixelType,
    pub layout: ChannelLayout,
    pub byte_order: ByteOrder,
    /// RLE segment starts relative to the first byte handed to the codec
    pub segments: Vec<u64>,
}

impl CodecOptions {
    /// Options for decoding `frame` of an image described by `descriptor`.
    pub fn for_frame(descriptor: &ImageDescriptor, frame: &FrameEntry) -> Self {
        Self {
            width: descriptor.width,
            height: descriptor.height,
            channels: descriptor.channels,
            pixel_type: descriptor.pixel_type,
            layout: descriptor.layout,
            byte_order: descriptor.byte_order,
            segments: frame
                .segments
                .iter()
                .map(|s| s.saturating_sub(frame.offset))
                .collect(),
        }
    }

    /// Bytes a fully decoded frame occupies.
    pub fn expected_len(&self) -> u64 {
        self.width
            .saturating_mul(self.height)
            .saturating_mul(self.channels)
            .saturating_mul(self.pixel_type.bytes_per_sample() as u64)
    }
}

/// External codec invoked for compressed frames.
pub trait Decompressor: Send + Sync {
    /// Decode one frame's compressed bytes.
    ///
    /// The output must hold at least [`CodecOptions::expected_len`] bytes laid
    /// out the way the descriptor says (planar or interleaved, no padding).
    fn decompress(
        &self,
        data: Bytes,
        scheme: CompressionScheme,
        options: &CodecOptions,
    ) -> Result<Bytes, FormatError>;
}

/// Run `decompressor` on one frame and check the size of what it produced.
///
/// # Errors
/// - `Decode(UnsupportedCompressionScheme)` for schemes whose frames are
///   never handed off
/// - `Codec` if the codec returns fewer bytes than a decoded frame needs
pub fn decompress(
    decompressor: &dyn Decompressor,
    data: Bytes,
    scheme: CompressionScheme,
    options: &CodecOptions,
) -> Result<Bytes, FormatError> {
    if !scheme.is_compressed() {
        return Ok(data);
    }
    if !scheme.is_supported() {
        return Err(crate::error::DecodeError::UnsupportedCompressionScheme(scheme).into());
    }

    let input_len = data.len();
    let decoded = decompressor.decompress(data, scheme, options)?;
    trace!(%scheme, input_len, output_len = decoded.len(), "frame decompressed");

    let expected = options.expected_len();
    if (decoded.len() as u64) < expected {
        return Err(FormatError::Codec {
            scheme,
            message: format!(
                "decoded {} bytes, frame needs {}",
                decoded.len(),
                expected
            ),
        });
    }
    Ok(decoded)
}

// =============================================================================
// Tests
// =============================================================================
