//! Image reader façade.
//!
//! This module sits between the format decoders and callers:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Caller / CLI               │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │            FormatRegistry               │
//! │   (sniff + open constructor pairs)      │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              ImageReader                │
//! │ (header, frame table, region reads)     │
//! └────────────────────┬────────────────────┘
//!                      │
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │ PixelLayout     │    │ Decompressor        │
//! │ Engine          │    │ (external codec)    │
//! └─────────────────┘    └─────────────────────┘
//! ```

mod image;
mod registry;

pub use image::{block_count, CancellationToken, DecodedHeader, ImageFormat, ImageReader};
pub use registry::{FormatEntry, FormatRegistry, OpenFn, SniffFn};
