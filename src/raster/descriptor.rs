//! Image descriptor: geometry, pixel type, byte order and secondary attributes.
//!
//! A descriptor starts out at its [`Default`] state and is filled in by a tag
//! decoder. Once pixel data has been located it is treated as immutable and
//! shared by every region read against the image.

use std::fmt;

use serde::Serialize;

use crate::io::{read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le};

use super::attributes::AttributeMap;

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order (endianness) of multi-byte values in a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    /// The other byte order.
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            ByteOrder::LittleEndian => ByteOrder::BigEndian,
            ByteOrder::BigEndian => ByteOrder::LittleEndian,
        }
    }

    /// Read a u16 from a byte slice using this byte order.
    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            ByteOrder::LittleEndian => read_u16_le(bytes),
            ByteOrder::BigEndian => read_u16_be(bytes),
        }
    }

    /// Read a u32 from a byte slice using this byte order.
    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            ByteOrder::LittleEndian => read_u32_le(bytes),
            ByteOrder::BigEndian => read_u32_be(bytes),
        }
    }

    /// Read a u64 from a byte slice using this byte order.
    #[inline]
    pub fn read_u64(self, bytes: &[u8]) -> u64 {
        match self {
            ByteOrder::LittleEndian => read_u64_le(bytes),
            ByteOrder::BigEndian => read_u64_be(bytes),
        }
    }

    #[inline]
    pub fn read_f32(self, bytes: &[u8]) -> f32 {
        f32::from_bits(self.read_u32(bytes))
    }

    #[inline]
    pub fn read_f64(self, bytes: &[u8]) -> f64 {
        f64::from_bits(self.read_u64(bytes))
    }
}

// =============================================================================
// PixelType
// =============================================================================

/// Numeric type of one pixel sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PixelType {
    /// Storage width in bits
    pub bits: u16,
    pub signed: bool,
    pub float: bool,
}

impl PixelType {
    pub const INT8: PixelType = PixelType::int(8, true);
    pub const UINT8: PixelType = PixelType::int(8, false);
    pub const INT16: PixelType = PixelType::int(16, true);
    pub const UINT16: PixelType = PixelType::int(16, false);
    pub const INT32: PixelType = PixelType::int(32, true);
    pub const UINT32: PixelType = PixelType::int(32, false);
    pub const FLOAT32: PixelType = PixelType {
        bits: 32,
        signed: true,
        float: true,
    };
    pub const FLOAT64: PixelType = PixelType {
        bits: 64,
        signed: true,
        float: true,
    };

    const fn int(bits: u16, signed: bool) -> Self {
        PixelType {
            bits,
            signed,
            float: false,
        }
    }

    /// Integer pixel type for a storage width, rounding odd widths up to the
    /// next whole byte.
    pub fn from_bits(bits: u16, signed: bool) -> Self {
        let bits = match bits {
            0..=8 => 8,
            9..=16 => 16,
            _ => 32,
        };
        PixelType::int(bits, signed)
    }

    /// Bytes occupied by one sample.
    #[inline]
    pub const fn bytes_per_sample(&self) -> usize {
        ((self.bits as usize) + 7) / 8
    }

    pub fn name(&self) -> String {
        if self.float {
            if self.bits == 64 {
                "double".to_string()
            } else {
                "float".to_string()
            }
        } else if self.signed {
            format!("int{}", self.bits)
        } else {
            format!("uint{}", self.bits)
        }
    }
}

impl Default for PixelType {
    fn default() -> Self {
        PixelType::UINT8
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

// =============================================================================
// Layout and photometric
// =============================================================================

/// How the samples of a multi-channel pixel are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum ChannelLayout {
    /// Channel samples of one pixel are adjacent
    #[default]
    Interleaved,
    /// Each channel is stored as its own contiguous plane
    Planar,
}

/// Photometric interpretation of the stored samples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub enum Photometric {
    /// Minimum sample value displays as white
    Monochrome1,
    #[default]
    Monochrome2,
    Rgb,
    /// Samples index a color table
    PaletteColor,
    YbrFull,
    YbrFull422,
    Other(String),
}

impl Photometric {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "MONOCHROME1" => Photometric::Monochrome1,
            "MONOCHROME2" => Photometric::Monochrome2,
            "RGB" => Photometric::Rgb,
            "PALETTE COLOR" => Photometric::PaletteColor,
            "YBR_FULL" => Photometric::YbrFull,
            "YBR_FULL_422" => Photometric::YbrFull422,
            other => Photometric::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Photometric::Monochrome1 => "MONOCHROME1",
            Photometric::Monochrome2 => "MONOCHROME2",
            Photometric::Rgb => "RGB",
            Photometric::PaletteColor => "PALETTE COLOR",
            Photometric::YbrFull => "YBR_FULL",
            Photometric::YbrFull422 => "YBR_FULL_422",
            Photometric::Other(value) => value,
        }
    }
}

// =============================================================================
// CompressionScheme
// =============================================================================

/// Pixel-data compression scheme selected by a stream's transfer syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum CompressionScheme {
    #[default]
    None,
    Rle,
    Jpeg,
    JpegLs,
    Jpeg2000,
    Deflate,
    Mpeg,
}

impl CompressionScheme {
    pub const fn name(&self) -> &'static str {
        match self {
            CompressionScheme::None => "uncompressed",
            CompressionScheme::Rle => "RLE lossless",
            CompressionScheme::Jpeg => "JPEG",
            CompressionScheme::JpegLs => "JPEG-LS",
            CompressionScheme::Jpeg2000 => "JPEG 2000",
            CompressionScheme::Deflate => "deflate",
            CompressionScheme::Mpeg => "MPEG/HEVC video",
        }
    }

    #[inline]
    pub const fn is_compressed(&self) -> bool {
        !matches!(self, CompressionScheme::None)
    }

    /// Schemes whose frames can be located and handed to a codec.
    #[inline]
    pub const fn is_supported(&self) -> bool {
        !matches!(self, CompressionScheme::Deflate | CompressionScheme::Mpeg)
    }
}

impl fmt::Display for CompressionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Axes
// =============================================================================

/// Named image axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Axis {
    X,
    Y,
    Channel,
    Frame,
}

impl Axis {
    pub const fn name(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Channel => "c",
            Axis::Frame => "t",
        }
    }
}

/// Length of one named axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AxisLength {
    pub axis: Axis,
    pub length: u64,
}

// =============================================================================
// ImageDescriptor
// =============================================================================

/// Geometry and storage description of an image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageDescriptor {
    pub width: u64,
    pub height: u64,
    /// Samples per pixel as stored (1 for colortable-indexed images)
    pub channels: u64,
    pub pixel_type: PixelType,
    pub byte_order: ByteOrder,
    pub layout: ChannelLayout,
    /// Declared number of frames (at least 1)
    pub frame_count: u64,
    pub compression: CompressionScheme,
    pub photometric: Photometric,
    /// Samples are color-table indices
    pub indexed: bool,
    /// Minimum sample value displays as white
    pub inverted: bool,
    /// Secondary attributes in stream order; duplicate keys accumulate
    pub attributes: AttributeMap,
}

impl Default for ImageDescriptor {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            channels: 1,
            pixel_type: PixelType::default(),
            byte_order: ByteOrder::default(),
            layout: ChannelLayout::default(),
            frame_count: 1,
            compression: CompressionScheme::default(),
            photometric: Photometric::default(),
            indexed: false,
            inverted: false,
            attributes: AttributeMap::new(),
        }
    }
}

impl ImageDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return every field to its default state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Axis lengths in storage order: x, y, channel, frame.
    pub fn axes(&self) -> Vec<AxisLength> {
        vec![
            AxisLength {
                axis: Axis::X,
                length: self.width,
            },
            AxisLength {
                axis: Axis::Y,
                length: self.height,
            },
            AxisLength {
                axis: Axis::Channel,
                length: self.channels,
            },
            AxisLength {
                axis: Axis::Frame,
                length: self.frame_count,
            },
        ]
    }

    /// Length of a named axis.
    pub fn axis_length(&self, axis: Axis) -> u64 {
        match axis {
            Axis::X => self.width,
            Axis::Y => self.height,
            Axis::Channel => self.channels,
            Axis::Frame => self.frame_count,
        }
    }

    #[inline]
    pub fn bytes_per_sample(&self) -> usize {
        self.pixel_type.bytes_per_sample()
    }

    #[inline]
    pub fn is_rle(&self) -> bool {
        self.compression == CompressionScheme::Rle
    }

    #[inline]
    pub fn is_jpeg(&self) -> bool {
        matches!(
            self.compression,
            CompressionScheme::Jpeg | CompressionScheme::JpegLs
        )
    }

    #[inline]
    pub fn is_jpeg2000(&self) -> bool {
        self.compression == CompressionScheme::Jpeg2000
    }

    /// True when the descriptor has usable frame geometry.
    pub fn has_geometry(&self) -> bool {
        self.width > 0 && self.height > 0 && self.channels > 0
    }
}
