//! Region read tests.
//!
//! Tests cover:
//! - Positioned reads issued for a region (one per row, nothing more)
//! - Sub-region reads agreeing with crops of a whole-frame read
//! - Row padding never reaching a block
//! - Validation before I/O, block allocation and frame bounds
//! - Multi-frame batches and cancellation
//! - Reading from a file on disk

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use sci_raster::error::{FormatError, IoError, LayoutError};
use sci_raster::{
    ByteOrder, CancellationToken, ChannelLayout, DecoderOptions, FileReader, FormatRegistry,
    ImageDescriptor, ImageReader, MemoryReader, Padding, PixelLayoutEngine, PixelType,
    RangeReader, Region,
};

use super::test_utils::{image_stream, ramp, StreamBuilder, TrackingReader, EXPLICIT_LE};

/// Options whose read cache passes every request straight through.
fn uncached() -> DecoderOptions {
    DecoderOptions::default().with_block_cache(1, 1)
}

// =============================================================================
// Read Plans Against a Source
// =============================================================================

#[test]
fn test_region_issues_one_read_per_row() {
    let pixels = ramp(512 * 512 * 2);
    let data = image_stream(EXPLICIT_LE, 512, 512, 1, 16, false, &pixels);
    let frame_start = (data.len() - pixels.len()) as u64;

    let source = TrackingReader::new(data, "scan.dcm");
    let image = ImageReader::open(source.clone(), &uncached()).unwrap();
    source.reset_tracking();

    let block = image.read_region(0, Region::new(100, 50, 100, 10)).unwrap();
    assert_eq!(block.len(), 2000);
    assert_eq!(block.pixel_type(), PixelType::UINT16);

    let requests = source.requests();
    assert_eq!(requests.len(), 10);
    let first = frame_start + 50 * 512 * 2 + 100 * 2;
    for (row, (offset, len)) in requests.iter().enumerate() {
        assert_eq!(*offset, first + row as u64 * 1024);
        assert_eq!(*len, 200);
    }

    let first = first as usize - frame_start as usize;
    assert_eq!(&block.data()[..200], &pixels[first..first + 200]);
}

#[test]
fn test_full_rows_are_one_read() {
    let pixels = ramp(16 * 8);
    let data = image_stream(EXPLICIT_LE, 8, 16, 1, 8, false, &pixels);
    let frame_start = (data.len() - pixels.len()) as u64;

    let source = TrackingReader::new(data, "rows.dcm");
    let image = ImageReader::open(source.clone(), &uncached()).unwrap();
    source.reset_tracking();

    let block = image.read_region(0, Region::new(0, 2, 16, 3)).unwrap();
    assert_eq!(source.requests(), vec![(frame_start + 32, 48)]);
    assert_eq!(block.data(), &pixels[32..80]);
}

// =============================================================================
// Sub-region Consistency
// =============================================================================

fn assert_crops_match(image: &ImageReader<MemoryReader>) {
    let d = image.descriptor();
    let whole = image.read_region(0, Region::whole(d.width, d.height)).unwrap();

    let regions = [
        Region::new(0, 0, 1, 1),
        Region::new(2, 1, 3, 2),
        Region::new(0, 3, d.width, 2),
        Region::new(d.width - 1, 0, 1, d.height),
    ];
    for region in regions {
        let direct = image.read_region(0, region).unwrap();
        let cropped = whole.crop(region).unwrap();
        assert_eq!(direct.data(), cropped.data(), "region {:?}", region);
        assert_eq!(direct.extents(), cropped.extents());
    }
}

#[test]
fn test_planar_sub_regions_match_crops() {
    let data = image_stream(EXPLICIT_LE, 5, 6, 3, 8, true, &ramp(6 * 5 * 3));
    let image = ImageReader::open(MemoryReader::new(data, "planar.dcm"), &uncached()).unwrap();
    assert_eq!(image.descriptor().layout, ChannelLayout::Planar);
    assert_crops_match(&image);
}

#[test]
fn test_interleaved_sub_regions_match_crops() {
    let data = image_stream(EXPLICIT_LE, 5, 6, 3, 8, false, &ramp(6 * 5 * 3));
    let image = ImageReader::open(MemoryReader::new(data, "rgb.dcm"), &uncached()).unwrap();
    assert_eq!(image.descriptor().layout, ChannelLayout::Interleaved);
    assert_crops_match(&image);
}

#[test]
fn test_wide_samples_match_crops() {
    let data = image_stream(EXPLICIT_LE, 5, 6, 1, 16, false, &ramp(6 * 5 * 2));
    let image = ImageReader::open(MemoryReader::new(data, "wide.dcm"), &uncached()).unwrap();
    assert_crops_match(&image);
}

#[test]
fn test_planar_block_is_channel_major() {
    // 2x2 RGB: each plane holds one value per channel
    let mut pixels = vec![1u8; 4];
    pixels.extend([2u8; 4]);
    pixels.extend([3u8; 4]);
    let data = image_stream(EXPLICIT_LE, 2, 2, 3, 8, true, &pixels);
    let image = ImageReader::open(MemoryReader::new(data, "planes.dcm"), &uncached()).unwrap();

    let block = image.read_region(0, Region::new(1, 0, 1, 2)).unwrap();
    assert_eq!(block.data(), &[1, 1, 2, 2, 3, 3]);
    assert_eq!(block.extents(), vec![1, 2, 3]);
}

// =============================================================================
// Padding
// =============================================================================

#[test]
fn test_row_padding_never_read() {
    const PAD: u8 = 0xEE;
    let descriptor = ImageDescriptor {
        width: 4,
        height: 3,
        channels: 1,
        pixel_type: PixelType::UINT8,
        layout: ChannelLayout::Interleaved,
        ..Default::default()
    };

    // 10 bytes of prefix, then rows of 4 samples and 2 padding bytes
    let mut stored = vec![0u8; 10];
    for row in 0..3u8 {
        stored.extend((0..4).map(|col| row * 10 + col));
        stored.extend([PAD, PAD]);
    }
    let reader = MemoryReader::new(stored, "padded");
    let engine = PixelLayoutEngine::default().with_padding(Padding::per_row(2));

    let whole = engine
        .plan(&descriptor, Region::whole(4, 3), ByteOrder::LittleEndian)
        .unwrap();
    let block = engine.assemble(&reader, 10, &whole).unwrap();
    assert_eq!(block.len(), 12);
    assert!(!block.data().contains(&PAD));

    let plan = engine
        .plan(&descriptor, Region::new(1, 1, 3, 2), ByteOrder::LittleEndian)
        .unwrap();
    let block = engine.assemble(&reader, 10, &plan).unwrap();
    assert_eq!(block.data(), &[11, 12, 13, 21, 22, 23]);
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_invalid_region_does_no_io() {
    let data = image_stream(EXPLICIT_LE, 4, 4, 1, 8, false, &ramp(16));
    let source = TrackingReader::new(data, "small.dcm");
    let image = ImageReader::open(source.clone(), &uncached()).unwrap();
    source.reset_tracking();

    for region in [
        Region::new(3, 0, 2, 1),
        Region::new(0, 4, 1, 1),
        Region::new(0, 0, 0, 1),
        Region::new(u64::MAX, 0, 2, 1),
    ] {
        let result = image.read_region(0, region);
        assert!(
            matches!(
                result,
                Err(FormatError::Layout(LayoutError::RegionOutOfBounds { .. }))
            ),
            "region {:?}",
            region
        );
    }
    assert_eq!(source.request_count(), 0);
}

#[test]
fn test_block_cap_enforced() {
    let data = image_stream(EXPLICIT_LE, 4, 4, 1, 16, false, &ramp(32));
    let options = uncached().with_max_block_bytes(8);
    let image = ImageReader::open(MemoryReader::new(data, "cap.dcm"), &options).unwrap();

    assert!(image.read_region(0, Region::new(0, 0, 2, 2)).is_ok());
    let result = image.read_region(0, Region::new(0, 0, 3, 2));
    assert!(matches!(
        result,
        Err(FormatError::Layout(LayoutError::BlockTooLarge {
            requested: 12,
            cap: 8
        }))
    ));
}

#[test]
fn test_frame_out_of_range() {
    let data = image_stream(EXPLICIT_LE, 2, 2, 1, 8, false, &ramp(4));
    let image = ImageReader::open(MemoryReader::new(data, "one.dcm"), &uncached()).unwrap();

    let result = image.read_region(1, Region::whole(2, 2));
    assert!(matches!(
        result,
        Err(FormatError::Layout(LayoutError::FrameOutOfRange { index: 1, count: 1 }))
    ));
}

#[test]
fn test_create_block_allocates_without_reading() {
    let data = image_stream(EXPLICIT_LE, 5, 6, 3, 16, true, &ramp(6 * 5 * 3 * 2));
    let source = TrackingReader::new(data, "alloc.dcm");
    let image = ImageReader::open(source.clone(), &uncached()).unwrap();
    source.reset_tracking();

    let block = image.create_block(Region::new(1, 1, 4, 2)).unwrap();
    assert_eq!(block.len(), 4 * 2 * 3 * 2);
    assert!(block.data().iter().all(|b| *b == 0));
    assert_eq!(block.layout(), ChannelLayout::Planar);
    assert_eq!(block.offset(), vec![1, 1, 0]);
    assert_eq!(source.request_count(), 0);

    assert!(image.create_block(Region::new(5, 0, 2, 1)).is_err());
}

// =============================================================================
// Batches
// =============================================================================

fn three_frames() -> (Vec<u8>, Vec<u8>) {
    let pixels = ramp(3 * 2 * 2);
    let data = StreamBuilder::with_preamble()
        .transfer_syntax(EXPLICIT_LE)
        .text(0x0028, 0x0008, "IS", "3")
        .us(0x0028, 0x0010, 2)
        .us(0x0028, 0x0011, 2)
        .us(0x0028, 0x0100, 8)
        .element(0x7FE0, 0x0010, "OB", &pixels)
        .build();
    (data, pixels)
}

#[test]
fn test_read_frames_in_order() {
    let (data, pixels) = three_frames();
    let image = ImageReader::open(MemoryReader::new(data, "cine.dcm"), &uncached()).unwrap();
    assert_eq!(image.block_count(), 3);

    let token = CancellationToken::new();
    let blocks = image
        .read_frames([2, 0, 1], Region::new(0, 1, 2, 1), &token)
        .unwrap();
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[0].data(), &pixels[10..12]);
    assert_eq!(blocks[1].data(), &pixels[2..4]);
    assert_eq!(blocks[2].data(), &pixels[6..8]);
}

#[test]
fn test_read_frames_cancelled_before_start() {
    let (data, _) = three_frames();
    let source = TrackingReader::new(data, "cine.dcm");
    let image = ImageReader::open(source.clone(), &uncached()).unwrap();
    source.reset_tracking();

    let token = CancellationToken::new();
    token.cancel();
    let result = image.read_frames(0..3, Region::whole(2, 2), &token);
    assert!(matches!(
        result,
        Err(FormatError::Cancelled {
            completed: 0,
            total: 3
        })
    ));
    assert_eq!(source.request_count(), 0);
}

/// Cancels a token on the first read after being armed.
struct CancelOnRead {
    inner: MemoryReader,
    token: CancellationToken,
    armed: Arc<AtomicBool>,
}

impl RangeReader for CancelOnRead {
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        if self.armed.load(Ordering::SeqCst) {
            self.token.cancel();
        }
        self.inner.read_exact_at(offset, len)
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn identifier(&self) -> &str {
        self.inner.identifier()
    }
}

#[test]
fn test_read_frames_cancelled_between_frames() {
    let (data, pixels) = three_frames();
    let token = CancellationToken::new();
    let armed = Arc::new(AtomicBool::new(false));
    let source = CancelOnRead {
        inner: MemoryReader::new(data, "cine.dcm"),
        token: token.clone(),
        armed: armed.clone(),
    };

    let image = ImageReader::open(source, &uncached()).unwrap();
    armed.store(true, Ordering::SeqCst);

    let result = image.read_frames(0..3, Region::whole(2, 2), &token);
    assert!(matches!(
        result,
        Err(FormatError::Cancelled {
            completed: 1,
            total: 3
        })
    ));

    // The frame in flight completed; a fresh token reads everything
    let blocks = image
        .read_frames(0..3, Region::whole(2, 2), &CancellationToken::new())
        .unwrap();
    assert_eq!(blocks[1].data(), &pixels[4..8]);
}

// =============================================================================
// Files
// =============================================================================

#[test]
fn test_read_region_from_file() {
    let pixels = ramp(32 * 16 * 2);
    let data = image_stream(EXPLICIT_LE, 16, 32, 1, 16, false, &pixels);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&data).unwrap();
    file.flush().unwrap();

    let source = FileReader::open(file.path()).unwrap();
    assert_eq!(source.size(), data.len() as u64);

    let image = FormatRegistry::with_defaults()
        .open(source, &DecoderOptions::default())
        .unwrap();
    assert_eq!(image.format(), "dicom");
    assert_eq!(image.descriptor().width, 32);

    let block = image.read_region(0, Region::new(4, 2, 8, 3)).unwrap();
    for row in 0..3 {
        let start = ((2 + row) * 32 + 4) * 2;
        assert_eq!(
            &block.data()[row * 16..(row + 1) * 16],
            &pixels[start..start + 16]
        );
    }

    let source = image.into_inner();
    assert!(source.identifier().contains(
        file.path()
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap()
    ));
}

#[test]
fn test_unrecognized_source_rejected() {
    let source = MemoryReader::new(vec![0x42; 256], "noise.bin");
    let result = FormatRegistry::with_defaults().open(source, &DecoderOptions::default());
    assert!(matches!(
        result,
        Err(FormatError::UnsupportedFormat { ref reason }) if reason.contains("noise.bin")
    ));
}
