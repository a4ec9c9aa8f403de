//! sci-raster - inspect tagged raster image headers.
//!
//! Decodes a file's attribute stream and prints its geometry, attributes and
//! frame offset table, optionally reading one region to check the layout.

use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sci_raster::{
    config::{Cli, OutputFormat},
    Block, FileReader, FormatRegistry, ImageReader, RangeReader,
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = cli.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let options = cli.decoder_options();
    debug!(?options, path = %cli.path.display(), "inspecting");

    let source = match FileReader::open(&cli.path) {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to open {}: {}", cli.path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let image = match FormatRegistry::with_defaults().open(source, &options) {
        Ok(image) => image,
        Err(e) => {
            error!("Failed to decode {}: {}", cli.path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let block = match cli.region {
        Some(region) => match image.read_region(cli.frame, region) {
            Ok(block) => Some(block),
            Err(e) => {
                error!("Failed to read region: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    match cli.format {
        OutputFormat::Text => print_text(&image, block.as_ref()),
        OutputFormat::Json => {
            if let Err(e) = print_json(&image, block.as_ref()) {
                error!("Failed to serialize report: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "sci_raster=debug"
    } else {
        "sci_raster=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Text Report
// =============================================================================

fn print_text<R: RangeReader>(image: &ImageReader<R>, block: Option<&Block>) {
    let header = image.header();
    let d = &header.descriptor;

    println!("Source:       {}", image.source().identifier());
    println!("Format:       {}", header.format);
    println!("Dimensions:   {} x {}", d.width, d.height);
    println!("Channels:     {} ({:?})", d.channels, d.layout);
    println!("Pixel type:   {}", d.pixel_type);
    println!("Byte order:   {:?}", d.byte_order);
    println!("Photometric:  {}", d.photometric.as_str());
    println!("Compression:  {}", d.compression);
    println!("Frames:       {}", image.block_count());
    match header.pixel_data_start {
        Some(offset) => println!("Pixel data:   offset {}", offset),
        None => println!("Pixel data:   none"),
    }

    println!();
    println!("Attributes ({}):", d.attributes.len());
    for attribute in d.attributes.iter() {
        let values: Vec<String> = attribute.values.iter().map(|v| v.to_string()).collect();
        println!("  {:<40} {}", attribute.key, values.join(" | "));
    }

    if !header.frames.is_empty() {
        println!();
        println!("Frame table ({}):", header.frames.scheme());
        for (i, frame) in header.frames.iter().enumerate() {
            match frame.length {
                Some(length) => println!("  [{:>5}] offset {:>12}  length {}", i, frame.offset, length),
                None => println!("  [{:>5}] offset {:>12}", i, frame.offset),
            }
        }
    }

    if let Some(block) = block {
        let r = block.region();
        println!();
        println!(
            "Region {},{} {}x{}: {} bytes",
            r.x,
            r.y,
            r.width,
            r.height,
            block.len()
        );
    }
}

// =============================================================================
// JSON Report
// =============================================================================

fn print_json<R: RangeReader>(
    image: &ImageReader<R>,
    block: Option<&Block>,
) -> Result<(), serde_json::Error> {
    let region = block.map(|b| {
        serde_json::json!({
            "region": b.region(),
            "offset": b.offset(),
            "extents": b.extents(),
            "bytes": b.len(),
        })
    });

    let report = serde_json::json!({
        "source": image.source().identifier(),
        "header": image.header(),
        "block_count": image.block_count(),
        "read": region,
    });

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
