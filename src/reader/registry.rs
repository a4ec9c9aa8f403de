//! Format registry.
//!
//! The registry maps a format identifier to a pair of plain constructor
//! functions:
//!
//! - `sniff` decides from the first bytes whether a stream belongs to the format
//! - `open` builds the [`ImageFormat`] that decodes it
//!
//! Formats are tried in registration order; the first whose sniff accepts the
//! stream wins.
//!
//! # Example
//!
//! ```ignore
//! use sci_raster::reader::FormatRegistry;
//!
//! let registry = FormatRegistry::with_defaults();
//! let image = registry.open(source, &options)?;
//! ```

use tracing::debug;

use crate::config::DecoderOptions;
use crate::error::FormatError;
use crate::format::dicom::{open_dicom, sniff_dicom, DICOM_FORMAT_ID};
use crate::io::{BlockCache, RangeReader};

use super::image::{ImageFormat, ImageReader};

/// Decides whether a stream belongs to a format.
pub type SniffFn = fn(&dyn RangeReader) -> Result<bool, FormatError>;

/// Builds a format decoder for the given options.
pub type OpenFn = fn(&DecoderOptions) -> Box<dyn ImageFormat>;

/// Constructor functions for one format.
#[derive(Debug, Clone, Copy)]
pub struct FormatEntry {
    pub id: &'static str,
    pub sniff: SniffFn,
    pub open: OpenFn,
}

impl FormatEntry {
    pub const fn new(id: &'static str, sniff: SniffFn, open: OpenFn) -> Self {
        Self { id, sniff, open }
    }
}

/// Ordered collection of known formats.
#[derive(Debug, Clone, Default)]
pub struct FormatRegistry {
    entries: Vec<FormatEntry>,
}

impl FormatRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in format.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(FormatEntry::new(DICOM_FORMAT_ID, sniff_dicom, open_dicom));
        registry
    }

    /// Add a format. An entry with the same identifier is replaced in place.
    pub fn register(&mut self, entry: FormatEntry) {
        match self.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn get(&self, id: &str) -> Option<&FormatEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Registered identifiers in trial order.
    pub fn ids(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the first format whose sniff accepts `reader`.
    ///
    /// # Errors
    /// `UnsupportedFormat` if no registered format recognizes the stream.
    pub fn detect(&self, reader: &dyn RangeReader) -> Result<&FormatEntry, FormatError> {
        for entry in &self.entries {
            if (entry.sniff)(reader)? {
                debug!(source = reader.identifier(), format = entry.id, "format detected");
                return Ok(entry);
            }
        }

        Err(FormatError::UnsupportedFormat {
            reason: format!(
                "{}: not recognized by any of [{}]",
                reader.identifier(),
                self.ids().join(", ")
            ),
        })
    }

    /// Wrap `source` in a block cache, detect its format and decode its header.
    pub fn open<R: RangeReader>(
        &self,
        source: R,
        options: &DecoderOptions,
    ) -> Result<ImageReader<R>, FormatError> {
        let cached = BlockCache::with_capacity(
            source,
            options.block_cache_size,
            options.block_cache_capacity,
        );
        let entry = self.detect(&cached)?;
        let format = (entry.open)(options);
        ImageReader::with_format(cached, format.as_ref())
    }
}

// =============================================================================
// Tests
// =============================================================================
