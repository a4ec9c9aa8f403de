//! Format-independent raster model.
//!
//! This module holds the types every format shares:
//!
//! - [`ImageDescriptor`]: frame geometry, pixel type and secondary attributes
//! - [`Region`] and [`Block`]: a requested rectangle and the bytes that fill it
//! - [`PixelLayoutEngine`]: plans and assembles region reads against stored frames

mod attributes;
mod block;
mod descriptor;
mod layout;

pub use attributes::{Attribute, AttributeMap, AttributeValue};
pub use block::{Block, Region};
pub use descriptor::{
    Axis, AxisLength, ByteOrder, ChannelLayout, CompressionScheme, ImageDescriptor, Photometric,
    PixelType,
};
pub use layout::{
    frame_byte_size, Padding, PixelLayout, PixelLayoutEngine, ReadOp, ReadPlan,
    DEFAULT_MAX_BLOCK_BYTES,
};
