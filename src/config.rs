//! Decoder options and command-line configuration.
//!
//! [`DecoderOptions`] is the library-side knob set passed to every decoder
//! and reader. [`Cli`] is the `sci-raster` binary's argument parser; every
//! option can also be set through an environment variable with the
//! `SCI_RASTER_` prefix:
//!
//! - `SCI_RASTER_FORMAT` - Output format, `text` or `json` (default: text)
//! - `SCI_RASTER_TOLERATE_ODD_LENGTHS` - Keep odd value lengths as declared
//! - `SCI_RASTER_MAX_BLOCK_BYTES` - Per-request block cap (default: 2 GiB)
//! - `SCI_RASTER_SCAN_WINDOW` - Frame marker lookahead window (default: 8192)
//! - `SCI_RASTER_MAX_RECORDS` - Record cap per header decode
//! - `SCI_RASTER_MAX_VALUE_BYTES` - Largest value materialized as an attribute
//! - `SCI_RASTER_BLOCK_SIZE` - Block cache block size (default: 64KB)
//! - `SCI_RASTER_CACHE_BLOCKS` - Block cache capacity (default: 64)

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::io::{DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_CAPACITY};
use crate::raster::{Region, DEFAULT_MAX_BLOCK_BYTES};

// =============================================================================
// Default Values
// =============================================================================

/// Default lookahead window when scanning for frame markers.
pub const DEFAULT_SCAN_WINDOW: usize = 8192;

/// Default cap on records read during one header decode.
pub const DEFAULT_MAX_RECORDS: usize = 1_000_000;

/// Default cap on the size of a value decoded into the attribute map (1MB).
pub const DEFAULT_MAX_VALUE_BYTES: u64 = 1024 * 1024;

// =============================================================================
// DecoderOptions
// =============================================================================

/// Tunables shared by the tag decoder, frame locator and layout engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Keep odd value lengths as declared instead of rounding up to even.
    pub tolerate_odd_lengths: bool,

    /// Maximum bytes one region request may produce.
    pub max_block_bytes: u64,

    /// Lookahead window when scanning for compressed frame markers.
    pub scan_window: usize,

    /// Maximum records read before the stream is declared corrupt.
    pub max_records: usize,

    /// Values larger than this are recorded as skipped.
    pub max_value_bytes: u64,

    /// Block size of the read cache wrapped around file sources.
    pub block_cache_size: usize,

    /// Number of blocks held by the read cache.
    pub block_cache_capacity: usize,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            tolerate_odd_lengths: false,
            max_block_bytes: DEFAULT_MAX_BLOCK_BYTES,
            scan_window: DEFAULT_SCAN_WINDOW,
            max_records: DEFAULT_MAX_RECORDS,
            max_value_bytes: DEFAULT_MAX_VALUE_BYTES,
            block_cache_size: DEFAULT_BLOCK_SIZE,
            block_cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl DecoderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tolerate_odd_lengths(mut self, tolerate: bool) -> Self {
        self.tolerate_odd_lengths = tolerate;
        self
    }

    pub fn with_max_block_bytes(mut self, bytes: u64) -> Self {
        self.max_block_bytes = bytes;
        self
    }

    pub fn with_scan_window(mut self, bytes: usize) -> Self {
        self.scan_window = bytes;
        self
    }

    pub fn with_max_records(mut self, records: usize) -> Self {
        self.max_records = records;
        self
    }

    pub fn with_max_value_bytes(mut self, bytes: u64) -> Self {
        self.max_value_bytes = bytes;
        self
    }

    pub fn with_block_cache(mut self, block_size: usize, capacity: usize) -> Self {
        self.block_cache_size = block_size;
        self.block_cache_capacity = capacity;
        self
    }

    /// Validate the options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_block_bytes == 0 {
            return Err("max_block_bytes must be greater than 0".to_string());
        }

        // A marker is 4 bytes and the window keeps a 4-byte overlap
        if self.scan_window < 8 {
            return Err("scan_window must be at least 8 bytes".to_string());
        }

        if self.max_records == 0 {
            return Err("max_records must be greater than 0".to_string());
        }

        if self.block_cache_size < 1024 || self.block_cache_size > 16 * 1024 * 1024 {
            return Err("block_cache_size must be between 1KB and 16MB".to_string());
        }
        if self.block_cache_capacity == 0 {
            return Err("block_cache_capacity must be greater than 0".to_string());
        }

        Ok(())
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// Output format of the inspection report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// sci-raster - inspect tagged raster image headers.
///
/// Decodes the attribute stream of an image file and prints its geometry,
/// attributes and frame offset table.
#[derive(Parser, Debug, Clone)]
#[command(name = "sci-raster")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Image file to inspect.
    pub path: PathBuf,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, env = "SCI_RASTER_FORMAT")]
    pub format: OutputFormat,

    /// Also read a region, given as `x,y,width,height`.
    #[arg(long, value_parser = parse_region)]
    pub region: Option<Region>,

    /// Frame index used with `--region`.
    #[arg(long, default_value_t = 0)]
    pub frame: usize,

    /// Keep odd value lengths as declared.
    #[arg(long, default_value_t = false, env = "SCI_RASTER_TOLERATE_ODD_LENGTHS")]
    pub tolerate_odd_lengths: bool,

    /// Maximum bytes one region request may produce.
    #[arg(long, default_value_t = DEFAULT_MAX_BLOCK_BYTES, env = "SCI_RASTER_MAX_BLOCK_BYTES")]
    pub max_block_bytes: u64,

    /// Lookahead window when scanning for frame markers.
    #[arg(long, default_value_t = DEFAULT_SCAN_WINDOW, env = "SCI_RASTER_SCAN_WINDOW")]
    pub scan_window: usize,

    /// Maximum records read before the stream is declared corrupt.
    #[arg(long, default_value_t = DEFAULT_MAX_RECORDS, env = "SCI_RASTER_MAX_RECORDS")]
    pub max_records: usize,

    /// Values larger than this are not materialized.
    #[arg(long, default_value_t = DEFAULT_MAX_VALUE_BYTES, env = "SCI_RASTER_MAX_VALUE_BYTES")]
    pub max_value_bytes: u64,

    /// Block size in bytes for the read cache.
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE, env = "SCI_RASTER_BLOCK_SIZE")]
    pub block_size: usize,

    /// Number of blocks held by the read cache.
    #[arg(long, default_value_t = DEFAULT_CACHE_CAPACITY, env = "SCI_RASTER_CACHE_BLOCKS")]
    pub cache_blocks: usize,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Cli {
    /// Map command-line settings onto decoder options.
    pub fn decoder_options(&self) -> DecoderOptions {
        DecoderOptions::new()
            .with_tolerate_odd_lengths(self.tolerate_odd_lengths)
            .with_max_block_bytes(self.max_block_bytes)
            .with_scan_window(self.scan_window)
            .with_max_records(self.max_records)
            .with_max_value_bytes(self.max_value_bytes)
            .with_block_cache(self.block_size, self.cache_blocks)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.decoder_options().validate()
    }
}

/// Parse `x,y,width,height`.
fn parse_region(s: &str) -> Result<Region, String> {
    let parts: Vec<u64> = s
        .split(',')
        .map(|p| p.trim().parse::<u64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid region '{}': {}", s, e))?;

    match parts.as_slice() {
        [x, y, w, h] => Ok(Region::new(*x, *y, *w, *h)),
        _ => Err(format!(
            "invalid region '{}': expected x,y,width,height",
            s
        )),
    }
}

// =============================================================================
// Tests
// =============================================================================
