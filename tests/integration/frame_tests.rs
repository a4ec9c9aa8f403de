//! Frame location tests.
//!
//! Tests cover:
//! - Contiguous uncompressed frames
//! - RLE frames and their segment headers
//! - JPEG and JPEG 2000 frames found by marker scan
//! - Schemes whose frames cannot be located or decoded
//! - Compressed region reads with and without a decompressor

use std::sync::Arc;

use sci_raster::error::{DecodeError, FormatError, LayoutError};
use sci_raster::{CompressionScheme, DecoderOptions, ImageReader, MemoryReader, Region};

use super::test_utils::{
    ramp, StoredDecompressor, StreamBuilder, EXPLICIT_LE, JPEG_2000, JPEG_BASELINE, MPEG2,
    RLE_LOSSLESS,
};

const UNDEFINED: u32 = 0xFFFF_FFFF;

fn open(data: Vec<u8>) -> Result<ImageReader<MemoryReader>, FormatError> {
    ImageReader::open(MemoryReader::new(data, "frames.dcm"), &DecoderOptions::default())
}

/// Image pixel module for an 8-bit monochrome image, up to the pixel data.
fn monochrome(syntax: &str, frames: &str, rows: u16, columns: u16, bits: u16) -> StreamBuilder {
    StreamBuilder::with_preamble()
        .transfer_syntax(syntax)
        .text(0x0028, 0x0008, "IS", frames)
        .us(0x0028, 0x0002, 1)
        .text(0x0028, 0x0004, "CS", "MONOCHROME2")
        .us(0x0028, 0x0010, rows)
        .us(0x0028, 0x0011, columns)
        .us(0x0028, 0x0100, bits)
        .us(0x0028, 0x0101, bits)
        .us(0x0028, 0x0103, 0)
}

/// RLE frame: 64-byte header listing `segments`, then their bytes.
fn rle_frame(segments: &[&[u8]]) -> Vec<u8> {
    let mut header = (segments.len() as u32).to_le_bytes().to_vec();
    let mut offset = 64u32;
    for segment in segments {
        header.extend_from_slice(&offset.to_le_bytes());
        offset += segment.len() as u32;
    }
    header.resize(64, 0);
    for segment in segments {
        header.extend_from_slice(segment);
    }
    header
}

// =============================================================================
// Uncompressed
// =============================================================================

#[test]
fn test_uncompressed_frames_are_contiguous() {
    let pixels = ramp(3 * 2 * 3 * 2);
    let builder = monochrome(EXPLICIT_LE, "3", 2, 3, 16);
    let start = builder.len() as u64 + 12;
    let data = builder.element(0x7FE0, 0x0010, "OW", &pixels).build();

    let image = open(data).unwrap();
    let frames = image.frames();
    assert_eq!(frames.scheme(), CompressionScheme::None);
    assert_eq!(frames.offsets(), vec![start, start + 12, start + 24]);
    assert!(frames.iter().all(|f| f.length == Some(12)));
    assert_eq!(image.block_count(), 3);
    assert_eq!(image.header().pixel_data_start, Some(start));

    let block = image.read_region(2, Region::whole(3, 2)).unwrap();
    assert_eq!(block.data(), &pixels[24..36]);
}

#[test]
fn test_frame_count_beyond_pixel_data() {
    let data = monochrome(EXPLICIT_LE, "1000", 2, 2, 8)
        .element(0x7FE0, 0x0010, "OB", &[0; 4])
        .build();

    let result = open(data);
    assert!(
        matches!(
            result,
            Err(FormatError::Decode(DecodeError::CorruptTagStream { ref tag, length: 1000, remaining: 4, .. }))
                if tag == "(0028,0008)"
        ),
        "expected frame count rejection"
    );
}

#[test]
fn test_unaddressable_geometry_rejected() {
    let data = StreamBuilder::with_preamble()
        .transfer_syntax(EXPLICIT_LE)
        .us(0x0028, 0x0002, 3)
        .element(0x0028, 0x0010, "UL", &u32::MAX.to_le_bytes())
        .element(0x0028, 0x0011, "UL", &u32::MAX.to_le_bytes())
        .us(0x0028, 0x0100, 16)
        .element(0x7FE0, 0x0010, "OW", &[0; 16])
        .build();

    let result = open(data);
    assert!(
        matches!(
            result,
            Err(FormatError::Decode(DecodeError::CorruptTagStream { ref tag, .. }))
                if tag == "(0028,0010)"
        ),
        "expected geometry rejection"
    );
}

#[test]
fn test_header_only_stream() {
    let data = StreamBuilder::with_preamble()
        .transfer_syntax(EXPLICIT_LE)
        .text(0x0008, 0x0060, "CS", "SR")
        .build();

    let image = open(data).unwrap();
    assert!(image.frames().is_empty());
    assert_eq!(image.header().pixel_data_start, None);

    let result = image.read_region(0, Region::new(0, 0, 1, 1));
    assert!(matches!(
        result,
        Err(FormatError::Layout(LayoutError::FrameOutOfRange { index: 0, count: 0 }))
    ));
}

// =============================================================================
// RLE
// =============================================================================

#[test]
fn test_rle_frames_skip_offset_table() {
    let builder =
        monochrome(RLE_LOSSLESS, "2", 2, 4, 8).header(0x7FE0, 0x0010, "OB", UNDEFINED);
    let start = builder.len() as u64;
    let frame0 = rle_frame(&[&ramp(8)[..]]);
    let frame1 = rle_frame(&[&[9; 8]]);
    let data = builder
        .item_with(&[])
        .item_with(&frame0)
        .item_with(&frame1)
        .sequence_delimiter()
        .build();

    let image = open(data).unwrap();
    assert!(image.descriptor().is_rle());

    let frames = image.frames();
    assert_eq!(frames.scheme(), CompressionScheme::Rle);
    assert_eq!(frames.len(), 2);

    // offset table item, then each frame item header and its 64-byte header
    let first = start + 8 + 8 + 64;
    let second = first + 8 + 8 + 64;
    assert_eq!(frames.offsets(), vec![first, second]);

    let entry = frames.get(0).unwrap();
    assert_eq!(entry.length, Some(8));
    assert_eq!(entry.segments, vec![first]);
}

#[test]
fn test_rle_segments_reversed_for_little_endian() {
    let builder =
        monochrome(RLE_LOSSLESS, "1", 1, 4, 16).header(0x7FE0, 0x0010, "OB", UNDEFINED);
    let start = builder.len() as u64;
    let frame = rle_frame(&[&[1; 4], &[2; 4]]);
    let data = builder
        .item_with(&[])
        .item_with(&frame)
        .sequence_delimiter()
        .build();

    let image = open(data).unwrap();
    let header_start = start + 8 + 8;
    let entry = image.frames().get(0).unwrap();
    assert_eq!(entry.segments, vec![header_start + 68, header_start + 64]);
    assert_eq!(entry.offset, header_start + 64);
    assert_eq!(entry.length, Some(8));
}

#[test]
fn test_rle_unusable_header_falls_back_to_first_data_byte() {
    let builder =
        monochrome(RLE_LOSSLESS, "1", 2, 2, 8).header(0x7FE0, 0x0010, "OB", UNDEFINED);
    let start = builder.len() as u64;

    let mut frame = vec![0u8; 64];
    frame.extend_from_slice(&[0, 0, 7, 7, 7, 7]);
    let data = builder
        .item_with(&[])
        .item_with(&frame)
        .sequence_delimiter()
        .build();

    let image = open(data).unwrap();
    let data_start = start + 8 + 8 + 64;
    assert_eq!(image.frames().offsets(), vec![data_start + 2]);
}

#[test]
fn test_rle_missing_frame_item() {
    let data = monochrome(RLE_LOSSLESS, "2", 2, 4, 8)
        .header(0x7FE0, 0x0010, "OB", UNDEFINED)
        .item_with(&[])
        .item_with(&rle_frame(&[&ramp(8)[..]]))
        .sequence_delimiter()
        .build();

    let result = open(data);
    assert!(matches!(
        result,
        Err(FormatError::Decode(DecodeError::MissingFrameMarker {
            scheme: CompressionScheme::Rle,
            frame: 1,
            ..
        }))
    ));
}

// =============================================================================
// Marker Scan
// =============================================================================

#[test]
fn test_jpeg_frames_by_marker_scan() {
    let payload0 = [0xFF, 0xD8, 0xFF, 0xE0, 0, 1, 2, 3, 0xFF, 0xD9];
    let payload1 = [0xFF, 0xD8, 0xFF, 0xDB, 4, 5, 0xFF, 0xD9];

    let builder =
        monochrome(JPEG_BASELINE, "2", 8, 8, 8).header(0x7FE0, 0x0010, "OB", UNDEFINED);
    let start = builder.len() as u64;
    let data = builder
        .item_with(&[])
        .item_with(&payload0)
        .item_with(&payload1)
        .sequence_delimiter()
        .build();

    let image = open(data).unwrap();
    let frames = image.frames();
    assert_eq!(frames.scheme(), CompressionScheme::Jpeg);

    let first = start + 16;
    let second = first + payload0.len() as u64 + 8;
    assert_eq!(frames.offsets(), vec![first, second]);

    // Each frame ends with its fragment, not at the next item header
    assert_eq!(frames.get(0).unwrap().length, Some(payload0.len() as u64));
    assert_eq!(frames.get(1).unwrap().length, Some(payload1.len() as u64));
}

#[test]
fn test_jpeg_missing_frame() {
    let data = monochrome(JPEG_BASELINE, "2", 8, 8, 8)
        .header(0x7FE0, 0x0010, "OB", UNDEFINED)
        .item_with(&[])
        .item_with(&[0xFF, 0xD8, 0xFF, 0xE0, 0xFF, 0xD9])
        .sequence_delimiter()
        .build();

    let result = open(data);
    assert!(matches!(
        result,
        Err(FormatError::Decode(DecodeError::MissingFrameMarker {
            scheme: CompressionScheme::Jpeg,
            frame: 1,
            ..
        }))
    ));
}

#[test]
fn test_jpeg2000_single_frame() {
    let payload = [0xFF, 0x4F, 0xFF, 0x51, 0, 0x29, 0, 0];
    let builder =
        monochrome(JPEG_2000, "1", 8, 8, 8).header(0x7FE0, 0x0010, "OB", UNDEFINED);
    let start = builder.len() as u64;
    let data = builder
        .item_with(&[])
        .item_with(&payload)
        .sequence_delimiter()
        .build();

    let image = open(data).unwrap();
    assert!(image.descriptor().is_jpeg2000());
    let frames = image.frames();
    assert_eq!(frames.scheme(), CompressionScheme::Jpeg2000);
    assert_eq!(frames.offsets(), vec![start + 16]);
    assert_eq!(frames.get(0).unwrap().length, Some(payload.len() as u64));
}

// =============================================================================
// Unsupported Schemes
// =============================================================================

#[test]
fn test_mpeg_frames_not_located() {
    let data = monochrome(MPEG2, "1", 8, 8, 8)
        .header(0x7FE0, 0x0010, "OB", UNDEFINED)
        .item_with(&[])
        .item_with(&[0, 0, 1, 0xB3])
        .sequence_delimiter()
        .build();

    let result = open(data);
    assert!(matches!(
        result,
        Err(FormatError::Decode(DecodeError::UnsupportedCompressionScheme(
            CompressionScheme::Mpeg
        )))
    ));
}

#[test]
fn test_deflate_stream_rejected() {
    let data = StreamBuilder::with_preamble()
        .transfer_syntax("1.2.840.10008.1.2.1.99")
        .raw(&[0x78, 0x9C, 0x03, 0x00])
        .build();

    let result = open(data);
    assert!(matches!(
        result,
        Err(FormatError::Decode(DecodeError::UnsupportedCompressionScheme(
            CompressionScheme::Deflate
        )))
    ));
}

// =============================================================================
// Compressed Reads
// =============================================================================

fn rle_image() -> ImageReader<MemoryReader> {
    let data = monochrome(RLE_LOSSLESS, "1", 2, 4, 8)
        .header(0x7FE0, 0x0010, "OB", UNDEFINED)
        .item_with(&[])
        .item_with(&rle_frame(&[&[10, 11, 12, 13, 14, 15, 16, 17]]))
        .sequence_delimiter()
        .build();
    open(data).unwrap()
}

#[test]
fn test_compressed_read_without_decompressor() {
    let image = rle_image();
    let result = image.read_region(0, Region::whole(4, 2));
    assert!(matches!(
        result,
        Err(FormatError::Decode(DecodeError::NotImplemented(_)))
    ));
}

#[test]
fn test_compressed_read_through_decompressor() {
    let codec = Arc::new(StoredDecompressor::default());
    let image = rle_image().with_decompressor(codec.clone());

    let block = image.read_region(0, Region::new(1, 0, 2, 2)).unwrap();
    assert_eq!(block.data(), &[11, 12, 15, 16]);
    assert_eq!(block.offset(), vec![1, 0, 0]);

    let calls = codec.calls.lock().unwrap().clone();
    assert_eq!(calls, vec![(CompressionScheme::Rle, 8)]);
}

#[test]
fn test_compressed_read_validates_region_first() {
    let codec = Arc::new(StoredDecompressor::default());
    let image = rle_image().with_decompressor(codec.clone());

    let result = image.read_region(0, Region::new(3, 0, 2, 2));
    assert!(matches!(
        result,
        Err(FormatError::Layout(LayoutError::RegionOutOfBounds { .. }))
    ));
    assert!(codec.calls.lock().unwrap().is_empty());
}

#[test]
fn test_short_decoder_output_is_codec_error() {
    struct Truncating;
    impl sci_raster::Decompressor for Truncating {
        fn decompress(
            &self,
            data: bytes::Bytes,
            _scheme: CompressionScheme,
            _options: &sci_raster::CodecOptions,
        ) -> Result<bytes::Bytes, FormatError> {
            Ok(data.slice(0..2))
        }
    }

    let image = rle_image().with_decompressor(Arc::new(Truncating));
    let result = image.read_region(0, Region::whole(4, 2));
    assert!(matches!(
        result,
        Err(FormatError::Codec {
            scheme: CompressionScheme::Rle,
            ..
        })
    ));
}
