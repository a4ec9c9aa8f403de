//! # sci-raster
//!
//! Decoding engine for scientific raster-image containers.
//!
//! A container starts with a tagged attribute stream describing the image
//! geometry and acquisition metadata, followed by one or more pixel frames
//! stored raw, run-length encoded, or wrapped in a block-based codec. This
//! library decodes the attribute stream, locates every frame, and extracts
//! arbitrary rectangular regions with the fewest possible positioned reads.
//!
//! ## Architecture
//!
//! - [`io`] - Positioned-read byte sources and block caching
//! - [`raster`] - Format-independent descriptor, region, block and layout engine
//! - [`mod@format`] - DICOM tag-stream decoder, frame locator and codec hand-off
//! - [`reader`] - Format registry and the [`ImageReader`] façade
//! - [`config`] - Decoder options and CLI types
//!
//! ## Example
//!
//! ```rust,no_run
//! use sci_raster::{DecoderOptions, FileReader, ImageReader, Region};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = FileReader::open("scan.dcm")?;
//!     let image = ImageReader::open(source, &DecoderOptions::default())?;
//!
//!     let descriptor = image.descriptor();
//!     println!("{} x {} {}", descriptor.width, descriptor.height, descriptor.pixel_type);
//!
//!     let block = image.read_region(0, Region::new(0, 0, 16, 16))?;
//!     println!("{} bytes", block.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod raster;
pub mod reader;

// Re-export commonly used types
pub use config::{Cli, DecoderOptions, OutputFormat};
pub use error::{DecodeError, FormatError, IoError, LayoutError};
pub use format::dicom::{
    AttributeDictionary, CompressedFrameLocator, DicomFormat, FrameEntry, FrameLocating,
    FrameOffsetTable, HeaderInfo, PixelDataInfo, Tag, TagDecoding, TagStreamDecoder,
    TransferSyntax, Vr,
};
pub use format::{detect_format, CodecOptions, Decompressor, Detection};
pub use io::{BlockCache, FileReader, MemoryReader, RangeReader};
pub use raster::{
    Attribute, AttributeMap, AttributeValue, Block, ByteOrder, ChannelLayout, CompressionScheme,
    ImageDescriptor, Padding, Photometric, PixelLayout, PixelLayoutEngine, PixelType, ReadPlan,
    Region,
};
pub use reader::{
    block_count, CancellationToken, DecodedHeader, FormatEntry, FormatRegistry, ImageFormat,
    ImageReader,
};
