use thiserror::Error;

use crate::raster::CompressionScheme;

/// I/O errors raised by a byte source.
#[derive(Debug, Error)]
pub enum IoError {
    /// Error from the underlying file or device
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },
}

/// Errors raised while decoding a tag stream or locating frames.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// I/O error while reading the stream
    #[error(transparent)]
    Io(#[from] IoError),

    /// Length resolution failed under both byte orders; the stream position
    /// cannot be recovered.
    #[error("Corrupt tag stream at offset {offset}: tag {tag} declares {length} bytes, {remaining} remain")]
    CorruptTagStream {
        tag: String,
        offset: u64,
        length: u64,
        remaining: u64,
    },

    /// The stream ended while a value was still pending
    #[error("Unexpected end of stream at offset {offset}: needed {needed} more bytes")]
    UnexpectedEndOfStream { offset: u64, needed: u64 },

    /// Compression scheme is recognized but not implemented
    #[error("Unsupported compression scheme: {0}")]
    UnsupportedCompressionScheme(CompressionScheme),

    /// A recognized format variant that has no implementation yet
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// No start-of-image marker was found for a compressed frame
    #[error("No {scheme} frame marker found for frame {frame} after offset {offset}")]
    MissingFrameMarker {
        scheme: CompressionScheme,
        frame: usize,
        offset: u64,
    },

    /// The stream carries neither the magic marker nor a known first tag
    #[error("Not a recognized tag stream: {0}")]
    NotRecognized(String),
}

/// Errors raised while planning or assembling a pixel region.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// I/O error while reading pixel bytes
    #[error(transparent)]
    Io(#[from] IoError),

    /// Region lies outside the frame extents
    #[error("Region out of bounds: x={x} y={y} {width}x{height} exceeds {frame_width}x{frame_height}")]
    RegionOutOfBounds {
        x: u64,
        y: u64,
        width: u64,
        height: u64,
        frame_width: u64,
        frame_height: u64,
    },

    /// Total requested bytes exceed the per-call cap; the caller should tile
    /// the request into several smaller regions.
    #[error("Block too large: {requested} bytes requested, cap is {cap}; request smaller tiles")]
    BlockTooLarge { requested: u64, cap: u64 },

    /// Frame index is not present in the frame table
    #[error("Frame {index} out of range: image has {count} frames")]
    FrameOutOfRange { index: usize, count: usize },
}

/// Errors surfaced by the reader façade and the format registry.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// External codec failed on a compressed frame
    #[error("Codec error for {scheme}: {message}")]
    Codec {
        scheme: CompressionScheme,
        message: String,
    },

    /// A batch read was cancelled between frames
    #[error("Cancelled after {completed} of {total} frames")]
    Cancelled { completed: usize, total: usize },

    /// No registered format accepts this stream
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },
}
