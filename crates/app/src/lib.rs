//! CLI host for the pixlift engine: argument parsing, logging, image file
//! I/O, and engine lifecycle. All upscaling logic lives in `pixlift-core`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use image::{DynamicImage, ImageBuffer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pixlift_core::backend::ExecutionBackend;
use pixlift_core::device::ProbedDeviceQuery;
use pixlift_core::Engine;

#[derive(Parser)]
#[command(name = "pixlift", about = "Learned image upscaling with tiled GPU inference")]
struct Cli {
    #[arg(short = 'i', long, help = "Input image path")]
    input: PathBuf,

    #[arg(short = 'o', long, help = "Output image path")]
    output: PathBuf,

    #[arg(short = 'm', long, help = "Path to the ONNX model")]
    model: PathBuf,

    #[arg(short = 's', long, default_value_t = 4, help = "Integer upscale factor (2, 3 or 4)")]
    scale: u32,

    #[arg(
        short = 't',
        long,
        default_value_t = 0,
        help = "Tile size in pixels; 0 derives it from the device heap budget"
    )]
    tile_size: u32,

    #[arg(long, help = "Average 8 geometric augmentations per tile (8x slower)")]
    tta: bool,

    #[arg(short = 'g', long, default_value_t = 0, help = "GPU device id")]
    gpu: u32,

    #[arg(long, default_value = "cuda", help = "Execution backend: cuda or tensorrt")]
    backend: String,

    #[arg(long, help = "TensorRT engine cache directory")]
    trt_cache_dir: Option<PathBuf>,

    #[arg(long, help = "Override the device heap budget in MB for tile-size selection")]
    vram_mb: Option<u32>,

    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        help = "Increase log verbosity (-v: debug, -vv: trace)"
    )]
    verbose: u8,
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let img = image::open(&cli.input)
        .with_context(|| format!("failed to open input image {}", cli.input.display()))?;
    let has_alpha = img.color().has_alpha();
    let (width, height) = (img.width() as usize, img.height() as usize);

    let (pixels, channels) = if has_alpha {
        (img.to_rgba8().into_raw(), 4usize)
    } else {
        (img.to_rgb8().into_raw(), 3usize)
    };

    info!(
        input = %cli.input.display(),
        width,
        height,
        channels,
        scale = cli.scale,
        tta = cli.tta,
        "Upscaling image"
    );

    let query = Arc::new(ProbedDeviceQuery::new(cli.vram_mb));
    let mut engine = Engine::new(query, cli.gpu, cli.tta)
        .context("failed to bind compute device")?;
    engine.set_backend(ExecutionBackend::from_str_lossy(&cli.backend));
    if let Some(dir) = cli.trt_cache_dir {
        engine.set_trt_cache_dir(dir);
    }

    let started = Instant::now();
    engine
        .load_model_file(&cli.model)
        .with_context(|| format!("failed to load model {}", cli.model.display()))?;
    engine
        .set_parameters(cli.scale, cli.tile_size)
        .context("failed to configure engine")?;
    info!(
        tile_size = engine.tile_size(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Engine ready"
    );

    let out_w = width * cli.scale as usize;
    let out_h = height * cli.scale as usize;
    let mut output = vec![0u8; out_w * out_h * channels];

    let started = Instant::now();
    engine
        .process(&pixels, &mut output, width, height, channels)
        .context("upscaling failed")?;
    info!(
        out_w,
        out_h,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Upscale complete"
    );

    let result = if has_alpha {
        ImageBuffer::from_raw(out_w as u32, out_h as u32, output)
            .map(DynamicImage::ImageRgba8)
    } else {
        ImageBuffer::from_raw(out_w as u32, out_h as u32, output)
            .map(DynamicImage::ImageRgb8)
    }
    .context("failed to assemble output image")?;

    result
        .save(&cli.output)
        .with_context(|| format!("failed to save output image {}", cli.output.display()))?;
    info!(output = %cli.output.display(), "Saved");

    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from([
            "pixlift", "-i", "in.png", "-o", "out.png", "-m", "model.onnx",
        ]);
        assert_eq!(cli.scale, 4);
        assert_eq!(cli.tile_size, 0);
        assert_eq!(cli.gpu, 0);
        assert!(!cli.tta);
        assert_eq!(cli.backend, "cuda");
    }
}
