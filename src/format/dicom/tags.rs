//! Tag keys, value representations and transfer syntaxes.
//!
//! This module defines the vocabulary for tag-stream decoding:
//! - Composite tag keys (group, element) packed into a `u32`
//! - Value representation (VR) codes and their length-field form
//! - Transfer syntax UIDs and what each one implies for the rest of the stream

use std::fmt;

use serde::Serialize;

use crate::raster::{ByteOrder, CompressionScheme};

// =============================================================================
// Tag
// =============================================================================

/// Composite tag key: group in the high 16 bits, element in the low 16 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Tag(pub u32);

impl Tag {
    #[inline]
    pub const fn new(group: u16, element: u16) -> Self {
        Tag(((group as u32) << 16) | element as u32)
    }

    #[inline]
    pub const fn group(self) -> u16 {
        (self.0 >> 16) as u16
    }

    #[inline]
    pub const fn element(self) -> u16 {
        self.0 as u16
    }

    /// Item, item delimiter and sequence delimiter keys.
    ///
    /// These records are always a key followed by a 4-byte length, with no VR.
    #[inline]
    pub const fn is_delimiter(self) -> bool {
        self.group() == 0xFFFE
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.group(), self.element())
    }
}

// -----------------------------------------------------------------------------
// Structural keys
// -----------------------------------------------------------------------------

pub const TRANSFER_SYNTAX_UID: Tag = Tag::new(0x0002, 0x0010);
pub const SAMPLES_PER_PIXEL: Tag = Tag::new(0x0028, 0x0002);
pub const PHOTOMETRIC_INTERPRETATION: Tag = Tag::new(0x0028, 0x0004);
pub const PLANAR_CONFIGURATION: Tag = Tag::new(0x0028, 0x0006);
pub const NUMBER_OF_FRAMES: Tag = Tag::new(0x0028, 0x0008);
pub const ROWS: Tag = Tag::new(0x0028, 0x0010);
pub const COLUMNS: Tag = Tag::new(0x0028, 0x0011);
pub const BITS_ALLOCATED: Tag = Tag::new(0x0028, 0x0100);
pub const BITS_STORED: Tag = Tag::new(0x0028, 0x0101);
pub const PIXEL_REPRESENTATION: Tag = Tag::new(0x0028, 0x0103);
pub const FLOAT_PIXEL_DATA: Tag = Tag::new(0x7FE0, 0x0008);
pub const DOUBLE_FLOAT_PIXEL_DATA: Tag = Tag::new(0x7FE0, 0x0009);
pub const PIXEL_DATA: Tag = Tag::new(0x7FE0, 0x0010);

pub const ITEM: Tag = Tag::new(0xFFFE, 0xE000);
pub const ITEM_DELIMITER: Tag = Tag::new(0xFFFE, 0xE00D);
pub const SEQUENCE_DELIMITER: Tag = Tag::new(0xFFFE, 0xE0DD);

/// Length field value marking an undefined-length element.
pub const UNDEFINED_LENGTH: u32 = 0xFFFF_FFFF;

/// Bytes of the optional preamble before the `DICM` marker.
pub const PREAMBLE_SIZE: u64 = 128;

/// Marker following the preamble.
pub const MAGIC: &[u8; 4] = b"DICM";

// =============================================================================
// Value representation
// =============================================================================

/// Value representation: how a tag's bytes are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Vr {
    AE,
    AS,
    AT,
    CS,
    DA,
    DS,
    DT,
    FD,
    FL,
    IS,
    LO,
    LT,
    OB,
    OD,
    OF,
    OL,
    OV,
    OW,
    PN,
    SH,
    SL,
    SQ,
    SS,
    ST,
    SV,
    TM,
    UC,
    UI,
    UL,
    UN,
    UR,
    US,
    UT,
    UV,
}

/// Broad decoding category of a VR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VrCategory {
    /// Fixed-width binary integers
    Integer,
    /// Fixed-width binary floats
    Float,
    /// ASCII decimal or integer strings
    Decimal,
    Text,
    /// Nested sequence of items
    Nested,
    /// Opaque bytes
    Binary,
}

impl Vr {
    /// Parse a 2-byte mnemonic; `None` if the bytes are not a known VR.
    pub fn from_bytes(bytes: [u8; 2]) -> Option<Self> {
        let vr = match &bytes {
            b"AE" => Vr::AE,
            b"AS" => Vr::AS,
            b"AT" => Vr::AT,
            b"CS" => Vr::CS,
            b"DA" => Vr::DA,
            b"DS" => Vr::DS,
            b"DT" => Vr::DT,
            b"FD" => Vr::FD,
            b"FL" => Vr::FL,
            b"IS" => Vr::IS,
            b"LO" => Vr::LO,
            b"LT" => Vr::LT,
            b"OB" => Vr::OB,
            b"OD" => Vr::OD,
            b"OF" => Vr::OF,
            b"OL" => Vr::OL,
            b"OV" => Vr::OV,
            b"OW" => Vr::OW,
            b"PN" => Vr::PN,
            b"SH" => Vr::SH,
            b"SL" => Vr::SL,
            b"SQ" => Vr::SQ,
            b"SS" => Vr::SS,
            b"ST" => Vr::ST,
            b"SV" => Vr::SV,
            b"TM" => Vr::TM,
            b"UC" => Vr::UC,
            b"UI" => Vr::UI,
            b"UL" => Vr::UL,
            b"UN" => Vr::UN,
            b"UR" => Vr::UR,
            b"US" => Vr::US,
            b"UT" => Vr::UT,
            b"UV" => Vr::UV,
            _ => return None,
        };
        Some(vr)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Vr::AE => "AE",
            Vr::AS => "AS",
            Vr::AT => "AT",
            Vr::CS => "CS",
            Vr::DA => "DA",
            Vr::DS => "DS",
            Vr::DT => "DT",
            Vr::FD => "FD",
            Vr::FL => "FL",
            Vr::IS => "IS",
            Vr::LO => "LO",
            Vr::LT => "LT",
            Vr::OB => "OB",
            Vr::OD => "OD",
            Vr::OF => "OF",
            Vr::OL => "OL",
            Vr::OV => "OV",
            Vr::OW => "OW",
            Vr::PN => "PN",
            Vr::SH => "SH",
            Vr::SL => "SL",
            Vr::SQ => "SQ",
            Vr::SS => "SS",
            Vr::ST => "ST",
            Vr::SV => "SV",
            Vr::TM => "TM",
            Vr::UC => "UC",
            Vr::UI => "UI",
            Vr::UL => "UL",
            Vr::UN => "UN",
            Vr::UR => "UR",
            Vr::US => "US",
            Vr::UT => "UT",
            Vr::UV => "UV",
        }
    }

    /// Long-form VRs use 2 reserved bytes followed by a 4-byte length in
    /// explicit encodings; every other VR uses a 2-byte length.
    #[inline]
    pub const fn has_long_length(self) -> bool {
        matches!(
            self,
            Vr::OB
                | Vr::OW
                | Vr::OF
                | Vr::OD
                | Vr::OL
                | Vr::OV
                | Vr::SQ
                | Vr::UN
                | Vr::UC
                | Vr::UR
                | Vr::UT
                | Vr::SV
                | Vr::UV
        )
    }

    pub const fn category(self) -> VrCategory {
        match self {
            Vr::US | Vr::SS | Vr::UL | Vr::SL | Vr::UV | Vr::SV | Vr::AT => VrCategory::Integer,
            Vr::FL | Vr::FD => VrCategory::Float,
            Vr::DS | Vr::IS => VrCategory::Decimal,
            Vr::SQ => VrCategory::Nested,
            Vr::OB | Vr::OW | Vr::OF | Vr::OD | Vr::OL | Vr::OV | Vr::UN => VrCategory::Binary,
            _ => VrCategory::Text,
        }
    }
}

impl fmt::Display for Vr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Transfer syntax
// =============================================================================

/// Encoding selected by the transfer syntax UID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferSyntax {
    pub explicit_vr: bool,
    pub byte_order: ByteOrder,
    pub compression: CompressionScheme,
}

impl TransferSyntax {
    pub const IMPLICIT_VR_LITTLE_ENDIAN: &'static str = "1.2.840.10008.1.2";
    pub const EXPLICIT_VR_LITTLE_ENDIAN: &'static str = "1.2.840.10008.1.2.1";
    pub const EXPLICIT_VR_BIG_ENDIAN: &'static str = "1.2.840.10008.1.2.2";
    pub const DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN: &'static str = "1.2.840.10008.1.2.1.99";
    pub const RLE_LOSSLESS: &'static str = "1.2.840.10008.1.2.5";

    /// Encoding of the file meta group regardless of the data set's syntax.
    pub const META: TransferSyntax = TransferSyntax {
        explicit_vr: true,
        byte_order: ByteOrder::LittleEndian,
        compression: CompressionScheme::None,
    };

    const fn compressed(compression: CompressionScheme) -> Self {
        TransferSyntax {
            explicit_vr: true,
            byte_order: ByteOrder::LittleEndian,
            compression,
        }
    }

    /// Resolve a transfer syntax UID.
    ///
    /// Trailing NUL and space padding is ignored. Unknown UIDs fall back to
    /// explicit VR little endian, uncompressed.
    pub fn from_uid(uid: &str) -> Self {
        let uid = uid.trim_end_matches(['\0', ' ']).trim();
        match uid {
            Self::IMPLICIT_VR_LITTLE_ENDIAN => TransferSyntax {
                explicit_vr: false,
                byte_order: ByteOrder::LittleEndian,
                compression: CompressionScheme::None,
            },
            Self::EXPLICIT_VR_LITTLE_ENDIAN => Self::META,
            Self::EXPLICIT_VR_BIG_ENDIAN => TransferSyntax {
                explicit_vr: true,
                byte_order: ByteOrder::BigEndian,
                compression: CompressionScheme::None,
            },
            Self::DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN => {
                Self::compressed(CompressionScheme::Deflate)
            }
            Self::RLE_LOSSLESS => Self::compressed(CompressionScheme::Rle),
            _ => match uid
                .strip_prefix("1.2.840.10008.1.2.4.")
                .and_then(|suffix| suffix.split('.').next())
                .and_then(|n| n.parse::<u32>().ok())
            {
                Some(50..=79) => Self::compressed(CompressionScheme::Jpeg),
                Some(80 | 81) => Self::compressed(CompressionScheme::JpegLs),
                Some(90..=99) => Self::compressed(CompressionScheme::Jpeg2000),
                Some(100..) => Self::compressed(CompressionScheme::Mpeg),
                _ => Self::META,
            },
        }
    }
}

impl Default for TransferSyntax {
    fn default() -> Self {
        Self::META
    }
}
