//! Regions and the decoded blocks that satisfy them.

use bytes::{Bytes, BytesMut};
use serde::Serialize;

use super::descriptor::{ByteOrder, ChannelLayout, PixelType};

/// Axis-aligned rectangle within a frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Region {
    pub x: u64,
    pub y: u64,
    pub width: u64,
    pub height: u64,
}

impl Region {
    pub const fn new(x: u64, y: u64, width: u64, height: u64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Region covering a whole frame.
    pub const fn whole(width: u64, height: u64) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Exclusive end on the x axis.
    #[inline]
    pub fn end_x(&self) -> Option<u64> {
        self.x.checked_add(self.width)
    }

    /// Exclusive end on the y axis.
    #[inline]
    pub fn end_y(&self) -> Option<u64> {
        self.y.checked_add(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when `other` lies entirely inside this region.
    pub fn contains(&self, other: &Region) -> bool {
        match (self.end_x(), self.end_y(), other.end_x(), other.end_y()) {
            (Some(sx), Some(sy), Some(ox), Some(oy)) => {
                other.x >= self.x && other.y >= self.y && ox <= sx && oy <= sy
            }
            _ => false,
        }
    }

    /// True when this region fits in a `width` x `height` frame.
    pub fn fits(&self, width: u64, height: u64) -> bool {
        Region::whole(width, height).contains(self)
    }
}

/// Decoded bytes for a region of one frame.
///
/// Samples are stored channel-major (`[c][y][x]`) for planar images and
/// pixel-major (`[y][x][c]`) for interleaved ones, in the frame's byte order.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    data: Bytes,
    region: Region,
    channels: u64,
    pixel_type: PixelType,
    layout: ChannelLayout,
    byte_order: ByteOrder,
}

impl Block {
    pub(crate) fn from_parts(
        data: Bytes,
        region: Region,
        channels: u64,
        pixel_type: PixelType,
        layout: ChannelLayout,
        byte_order: ByteOrder,
    ) -> Self {
        Self {
            data,
            region,
            channels,
            pixel_type,
            layout,
            byte_order,
        }
    }

    /// Allocate a zero-filled block without any I/O.
    pub fn allocate(
        region: Region,
        channels: u64,
        pixel_type: PixelType,
        layout: ChannelLayout,
        byte_order: ByteOrder,
    ) -> Self {
        let len = region.width * region.height * channels * pixel_type.bytes_per_sample() as u64;
        Self::from_parts(
            BytesMut::zeroed(len as usize).freeze(),
            region,
            channels,
            pixel_type,
            layout,
            byte_order,
        )
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// Offset of the block within the full frame as `[x, y, c]`.
    pub fn offset(&self) -> Vec<u64> {
        vec![self.region.x, self.region.y, 0]
    }

    /// Block extents as `[width, height, channels]`.
    pub fn extents(&self) -> Vec<u64> {
        vec![self.region.width, self.region.height, self.channels]
    }

    pub fn channels(&self) -> u64 {
        self.channels
    }

    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Copy out a sub-region, given in frame coordinates.
    ///
    /// Returns `None` if `region` is not contained in this block.
    pub fn crop(&self, region: Region) -> Option<Block> {
        if !self.region.contains(&region) {
            return None;
        }

        let bps = self.pixel_type.bytes_per_sample();
        let src_w = self.region.width as usize;
        let src_h = self.region.height as usize;
        let dx = (region.x - self.region.x) as usize;
        let dy = (region.y - self.region.y) as usize;
        let w = region.width as usize;
        let h = region.height as usize;
        let c = self.channels as usize;

        let mut out = BytesMut::with_capacity(w * h * c * bps);
        match self.layout {
            ChannelLayout::Interleaved => {
                let pixel = bps * c;
                for row in 0..h {
                    let start = ((dy + row) * src_w + dx) * pixel;
                    out.extend_from_slice(&self.data[start..start + w * pixel]);
                }
            }
            ChannelLayout::Planar => {
                for channel in 0..c {
                    let plane = channel * src_w * src_h * bps;
                    for row in 0..h {
                        let start = plane + ((dy + row) * src_w + dx) * bps;
                        out.extend_from_slice(&self.data[start..start + w * bps]);
                    }
                }
            }
        }

        Some(Block::from_parts(
            out.freeze(),
            region,
            self.channels,
            self.pixel_type,
            self.layout,
            self.byte_order,
        ))
    }
}
