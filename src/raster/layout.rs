//! Pixel layout engine.
//!
//! Turns a frame geometry and a requested region into a sequence of
//! skip/read operations against the frame's stored bytes, then executes that
//! plan against a [`RangeReader`] (or an in-memory frame) to build a
//! [`Block`].
//!
//! # Stored Frame Layout
//!
//! ```text
//! Interleaved:  row 0: [p0c0 p0c1 .. p1c0 ..] [pad]
//!               row 1: ...
//! Planar:       channel 0: row 0 [samples] [pad], row 1 ...
//!               channel 1: row 0 [samples] [pad], ...
//! ```
//!
//! Padding bytes count toward skips and never toward reads, so a block never
//! contains padding.

use bytes::BytesMut;
use tracing::trace;

use crate::error::LayoutError;
use crate::io::RangeReader;

use super::block::{Block, Region};
use super::descriptor::{ByteOrder, ChannelLayout, ImageDescriptor, PixelType};

/// Default cap on the bytes one region request may produce: 2 GiB.
pub const DEFAULT_MAX_BLOCK_BYTES: u64 = 2 * 1024 * 1024 * 1024;

// =============================================================================
// PixelLayout
// =============================================================================

/// Geometry a frame exposes to the layout engine.
pub trait PixelLayout {
    fn frame_width(&self) -> u64;
    fn frame_height(&self) -> u64;
    /// Stored samples per pixel
    fn channels(&self) -> u64;
    fn pixel_type(&self) -> PixelType;
    fn channel_layout(&self) -> ChannelLayout;
}

impl PixelLayout for ImageDescriptor {
    fn frame_width(&self) -> u64 {
        self.width
    }

    fn frame_height(&self) -> u64 {
        self.height
    }

    fn channels(&self) -> u64 {
        self.channels
    }

    fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    fn channel_layout(&self) -> ChannelLayout {
        self.layout
    }
}

/// Trailing bytes appended to each stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Padding {
    pub per_row: u64,
}

impl Padding {
    pub const NONE: Padding = Padding { per_row: 0 };

    pub const fn per_row(bytes: u64) -> Self {
        Padding { per_row: bytes }
    }
}

/// Stored size of a whole frame, padding included.
///
/// `None` when the geometry does not fit in a `u64`.
pub fn frame_byte_size<L: PixelLayout + ?Sized>(layout: &L, padding: Padding) -> Option<u64> {
    let bps = layout.pixel_type().bytes_per_sample() as u64;
    let c = layout.channels();
    let row = layout.frame_width().checked_mul(bps)?;
    let h = layout.frame_height();
    match layout.channel_layout() {
        ChannelLayout::Interleaved => row
            .checked_mul(c)?
            .checked_add(padding.per_row)?
            .checked_mul(h),
        ChannelLayout::Planar => row
            .checked_add(padding.per_row)?
            .checked_mul(h)?
            .checked_mul(c),
    }
}

// =============================================================================
// ReadPlan
// =============================================================================

/// One step of a plan: advance the cursor by `skip`, then read `len` bytes
/// into the block at `dest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOp {
    pub skip: u64,
    pub len: usize,
    pub dest: usize,
}

/// Ordered skip/read operations satisfying one region request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadPlan {
    ops: Vec<ReadOp>,
    region: Region,
    channels: u64,
    pixel_type: PixelType,
    layout: ChannelLayout,
    byte_order: ByteOrder,
    total: usize,
}

impl ReadPlan {
    pub fn ops(&self) -> &[ReadOp] {
        &self.ops
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// Bytes the finished block will hold.
    pub fn total_read(&self) -> usize {
        self.total
    }

    /// Bytes from the frame start to the end of the last read.
    pub fn span(&self) -> u64 {
        self.ops.iter().map(|op| op.skip + op.len as u64).sum()
    }

    fn empty_block(&self) -> BytesMut {
        BytesMut::zeroed(self.total)
    }

    fn into_block(&self, data: BytesMut) -> Block {
        Block::from_parts(
            data.freeze(),
            self.region,
            self.channels,
            self.pixel_type,
            self.layout,
            self.byte_order,
        )
    }
}

/// Builds plans with strictly increasing source offsets, so every skip is
/// relative to the end of the previous read.
struct PlanBuilder {
    ops: Vec<ReadOp>,
    cursor: u64,
}

impl PlanBuilder {
    fn new() -> Self {
        Self {
            ops: Vec::new(),
            cursor: 0,
        }
    }

    fn read_at(&mut self, source: u64, len: u64, dest: u64) {
        debug_assert!(source >= self.cursor);
        self.ops.push(ReadOp {
            skip: source - self.cursor,
            len: len as usize,
            dest: dest as usize,
        });
        self.cursor = source + len;
    }
}

// =============================================================================
// PixelLayoutEngine
// =============================================================================

/// Plans and assembles region reads for uncompressed frames.
#[derive(Debug, Clone, Copy)]
pub struct PixelLayoutEngine {
    max_block_bytes: u64,
    padding: Padding,
}

impl Default for PixelLayoutEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BLOCK_BYTES)
    }
}

impl PixelLayoutEngine {
    pub fn new(max_block_bytes: u64) -> Self {
        Self {
            max_block_bytes,
            padding: Padding::NONE,
        }
    }

    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    pub fn padding(&self) -> Padding {
        self.padding
    }

    pub fn max_block_bytes(&self) -> u64 {
        self.max_block_bytes
    }

    /// Validate a region against a frame and the byte cap.
    ///
    /// Returns the number of bytes the block will hold.
    pub fn check_region<L: PixelLayout + ?Sized>(
        &self,
        layout: &L,
        region: &Region,
    ) -> Result<u64, LayoutError> {
        let (w, h) = (layout.frame_width(), layout.frame_height());
        if region.is_empty() || !region.fits(w, h) {
            return Err(LayoutError::RegionOutOfBounds {
                x: region.x,
                y: region.y,
                width: region.width,
                height: region.height,
                frame_width: w,
                frame_height: h,
            });
        }

        // Plan offsets are relative to the frame start and must be addressable
        if frame_byte_size(layout, self.padding).is_none() {
            return Err(LayoutError::BlockTooLarge {
                requested: u64::MAX,
                cap: self.max_block_bytes,
            });
        }

        let bps = layout.pixel_type().bytes_per_sample() as u64;
        let requested = region
            .width
            .checked_mul(region.height)
            .and_then(|n| n.checked_mul(layout.channels()))
            .and_then(|n| n.checked_mul(bps))
            .unwrap_or(u64::MAX);

        if requested > self.max_block_bytes || requested > usize::MAX as u64 {
            return Err(LayoutError::BlockTooLarge {
                requested,
                cap: self.max_block_bytes,
            });
        }

        Ok(requested)
    }

    /// Compute the skip/read plan for `region`.
    ///
    /// Loop order is fixed to match the block's memory layout: channel-major
    /// then row-major for planar frames, row-major for interleaved ones.
    pub fn plan<L: PixelLayout + ?Sized>(
        &self,
        layout: &L,
        region: Region,
        byte_order: ByteOrder,
    ) -> Result<ReadPlan, LayoutError> {
        let total = self.check_region(layout, &region)?;

        let bps = layout.pixel_type().bytes_per_sample() as u64;
        let c = layout.channels();
        let frame_w = layout.frame_width();
        let frame_h = layout.frame_height();
        let pad = self.padding.per_row;
        let Region {
            x,
            y,
            width: w,
            height: h,
        } = region;

        let mut builder = PlanBuilder::new();
        let whole = x == 0 && y == 0 && w == frame_w && h == frame_h;
        let full_rows = x == 0 && w == frame_w;

        match layout.channel_layout() {
            _ if whole && pad == 0 => {
                builder.read_at(0, total, 0);
            }
            ChannelLayout::Interleaved => {
                let pixel = bps * c;
                let stride = frame_w * pixel + pad;
                if full_rows && pad == 0 {
                    builder.read_at(y * stride, h * stride, 0);
                } else {
                    for row in 0..h {
                        builder.read_at((y + row) * stride + x * pixel, w * pixel, row * w * pixel);
                    }
                }
            }
            ChannelLayout::Planar => {
                let stride = frame_w * bps + pad;
                let plane = frame_h * stride;
                for channel in 0..c {
                    let dest_plane = channel * w * h * bps;
                    if full_rows && pad == 0 {
                        builder.read_at(channel * plane + y * stride, h * stride, dest_plane);
                    } else {
                        for row in 0..h {
                            builder.read_at(
                                channel * plane + (y + row) * stride + x * bps,
                                w * bps,
                                dest_plane + row * w * bps,
                            );
                        }
                    }
                }
            }
        }

        trace!(
            x,
            y,
            w,
            h,
            ops = builder.ops.len(),
            total,
            "planned region read"
        );

        Ok(ReadPlan {
            ops: builder.ops,
            region,
            channels: c,
            pixel_type: layout.pixel_type(),
            layout: layout.channel_layout(),
            byte_order,
            total: total as usize,
        })
    }

    /// Execute a plan against a byte source, starting at `frame_offset`.
    pub fn assemble<R: RangeReader + ?Sized>(
        &self,
        reader: &R,
        frame_offset: u64,
        plan: &ReadPlan,
    ) -> Result<Block, LayoutError> {
        let mut data = plan.empty_block();
        let mut cursor = frame_offset;
        for op in plan.ops() {
            cursor += op.skip;
            let bytes = reader.read_exact_at(cursor, op.len)?;
            data[op.dest..op.dest + op.len].copy_from_slice(&bytes);
            cursor += op.len as u64;
        }
        Ok(plan.into_block(data))
    }

    /// Execute a plan against a frame already held in memory.
    pub fn assemble_from_bytes(&self, frame: &[u8], plan: &ReadPlan) -> Result<Block, LayoutError> {
        if plan.span() > frame.len() as u64 {
            return Err(crate::error::IoError::RangeOutOfBounds {
                offset: 0,
                requested: plan.span(),
                size: frame.len() as u64,
            }
            .into());
        }

        let mut data = plan.empty_block();
        let mut cursor = 0usize;
        for op in plan.ops() {
            cursor += op.skip as usize;
            data[op.dest..op.dest + op.len].copy_from_slice(&frame[cursor..cursor + op.len]);
            cursor += op.len;
        }
        Ok(plan.into_block(data))
    }
}
