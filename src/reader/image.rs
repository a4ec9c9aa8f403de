//! Format-agnostic image access.
//!
//! [`ImageFormat`] is implemented once per container format and turns a byte
//! source into a [`DecodedHeader`]. [`ImageReader`] owns the byte source and a
//! decoded header and serves region reads from it, routing compressed frames
//! through a [`Decompressor`].
//!
//! # Usage
//!
//! ```ignore
//! use sci_raster::{DecoderOptions, FileReader, ImageReader, Region};
//!
//! let source = FileReader::open("scan.dcm")?;
//! let image = ImageReader::open(source, &DecoderOptions::default())?;
//! let block = image.read_region(0, Region::new(100, 50, 100, 10))?;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::config::DecoderOptions;
use crate::error::{DecodeError, FormatError, LayoutError};
use crate::format::codec::{decompress, CodecOptions, Decompressor};
use crate::format::dicom::{FrameEntry, FrameOffsetTable};
use crate::io::{BlockCache, RangeReader};
use crate::raster::{Block, ImageDescriptor, PixelLayoutEngine, Region};

use super::registry::FormatRegistry;

// =============================================================================
// ImageFormat
// =============================================================================

/// Everything known about an image once its header has been decoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedHeader {
    /// Identifier of the format that decoded the header
    pub format: &'static str,
    pub descriptor: ImageDescriptor,
    pub frames: FrameOffsetTable,
    /// First byte of the pixel data; `None` for header-only streams
    pub pixel_data_start: Option<u64>,
}

/// A container format that can decode headers into image descriptions.
pub trait ImageFormat: Send + Sync {
    /// Short identifier, unique within a registry.
    fn id(&self) -> &'static str;

    /// Decode the stream header, resolving the descriptor and frame table.
    fn decode_header(&self, reader: &dyn RangeReader) -> Result<DecodedHeader, FormatError>;

    /// Layout engine configured for this format's frames.
    fn layout_engine(&self) -> PixelLayoutEngine;
}

/// Number of independently readable blocks: one per frame.
pub fn block_count(descriptor: &ImageDescriptor) -> usize {
    usize::try_from(descriptor.frame_count).unwrap_or(usize::MAX)
}

// =============================================================================
// Cancellation
// =============================================================================

/// Cooperative cancellation flag for multi-frame reads.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

// =============================================================================
// ImageReader
// =============================================================================

/// An opened image: byte source, decoded header and layout engine.
///
/// All reads take `&self` and go through positioned reads on the cached
/// source, so one reader can serve concurrent region requests.
pub struct ImageReader<R: RangeReader> {
    source: BlockCache<R>,
    header: DecodedHeader,
    engine: PixelLayoutEngine,
    decompressor: Option<Arc<dyn Decompressor>>,
}

impl<R: RangeReader> ImageReader<R> {
    /// Detect the format of `source` among the default formats and decode its
    /// header.
    pub fn open(source: R, options: &DecoderOptions) -> Result<Self, FormatError> {
        FormatRegistry::with_defaults().open(source, options)
    }

    /// Decode the header of an already cached source with a known format.
    pub fn with_format(source: BlockCache<R>, format: &dyn ImageFormat) -> Result<Self, FormatError> {
        let header = format.decode_header(&source)?;
        debug!(
            source = source.identifier(),
            format = header.format,
            width = header.descriptor.width,
            height = header.descriptor.height,
            frames = header.frames.len(),
            "image opened"
        );
        Ok(Self {
            source,
            header,
            engine: format.layout_engine(),
            decompressor: None,
        })
    }

    /// Attach the codec used for compressed frames.
    pub fn with_decompressor(mut self, decompressor: Arc<dyn Decompressor>) -> Self {
        self.decompressor = Some(decompressor);
        self
    }

    pub fn header(&self) -> &DecodedHeader {
        &self.header
    }

    pub fn descriptor(&self) -> &ImageDescriptor {
        &self.header.descriptor
    }

    pub fn frames(&self) -> &FrameOffsetTable {
        &self.header.frames
    }

    pub fn format(&self) -> &'static str {
        self.header.format
    }

    pub fn source(&self) -> &BlockCache<R> {
        &self.source
    }

    /// Number of blocks (frames) the image holds.
    pub fn block_count(&self) -> usize {
        block_count(&self.header.descriptor)
    }

    /// Allocate a zero-filled block for `extents` without reading anything.
    ///
    /// # Errors
    /// `RegionOutOfBounds` or `BlockTooLarge`, as for a read of the same region.
    pub fn create_block(&self, extents: Region) -> Result<Block, FormatError> {
        let descriptor = &self.header.descriptor;
        self.engine.check_region(descriptor, &extents)?;
        Ok(Block::allocate(
            extents,
            descriptor.channels,
            descriptor.pixel_type,
            descriptor.layout,
            descriptor.byte_order,
        ))
    }

    /// Read `region` of frame `frame_index`.
    ///
    /// The region is validated before any I/O. Compressed frames are read
    /// whole, decoded by the attached [`Decompressor`], and then cut down to
    /// the region.
    ///
    /// # Errors
    /// - `FrameOutOfRange` if the frame table has no such frame
    /// - `RegionOutOfBounds` / `BlockTooLarge` for invalid regions
    /// - `NotImplemented` for compressed frames when no decompressor is attached
    pub fn read_region(&self, frame_index: usize, region: Region) -> Result<Block, FormatError> {
        let descriptor = &self.header.descriptor;
        let frame = self.frame(frame_index)?;
        let scheme = descriptor.compression;

        if !scheme.is_compressed() {
            let plan = self.engine.plan(descriptor, region, descriptor.byte_order)?;
            return Ok(self.engine.assemble(&self.source, frame.offset, &plan)?);
        }

        // Decoded frames carry no row padding
        let engine = PixelLayoutEngine::new(self.engine.max_block_bytes());
        let plan = engine.plan(descriptor, region, descriptor.byte_order)?;

        let decompressor = self.decompressor.as_deref().ok_or_else(|| {
            DecodeError::NotImplemented(format!("no decompressor attached for {}", scheme))
        })?;

        let length = frame
            .length
            .unwrap_or_else(|| self.source.size().saturating_sub(frame.offset));
        let data = self.source.read_exact_at(frame.offset, length as usize)?;
        let decoded = decompress(
            decompressor,
            data,
            scheme,
            &CodecOptions::for_frame(descriptor, frame),
        )?;

        Ok(engine.assemble_from_bytes(&decoded, &plan)?)
    }

    /// Read the same region from several frames, checking `cancel` before
    /// each frame.
    ///
    /// # Errors
    /// `Cancelled` with the number of frames already read when the token
    /// fires; otherwise the first error of [`read_region`](Self::read_region).
    pub fn read_frames<I>(
        &self,
        frames: I,
        region: Region,
        cancel: &CancellationToken,
    ) -> Result<Vec<Block>, FormatError>
    where
        I: IntoIterator<Item = usize>,
    {
        let frames: Vec<usize> = frames.into_iter().collect();
        let total = frames.len();
        let mut blocks = Vec::with_capacity(total);

        for index in frames {
            if cancel.is_cancelled() {
                debug!(completed = blocks.len(), total, "frame batch cancelled");
                return Err(FormatError::Cancelled {
                    completed: blocks.len(),
                    total,
                });
            }
            blocks.push(self.read_region(index, region)?);
        }

        Ok(blocks)
    }

    /// Release the reader and return the underlying source.
    pub fn into_inner(self) -> R {
        self.source.into_inner()
    }

    fn frame(&self, index: usize) -> Result<&FrameEntry, LayoutError> {
        self.header
            .frames
            .get(index)
            .ok_or(LayoutError::FrameOutOfRange {
                index,
                count: self.header.frames.len(),
            })
    }
}

// =============================================================================
// Tests
// =============================================================================
