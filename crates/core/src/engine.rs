//! Engine orchestration: lifecycle, parameter selection, and the per-tile
//! process loop.
//!
//! An engine moves `Unconfigured → Loaded → Configured → Ready` and exposes a
//! single blocking [`Engine::process`]. Tiles are independent; they are run
//! sequentially on one logical stream, and scratch buffers are sized once per
//! call so peak memory tracks the configured tile size, not the image size.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::Array4;
use tracing::{debug, info};

use crate::backend::{ExecutionBackend, SessionOptions};
use crate::convert::{extract_region, nchw_to_pixels, pixels_to_nchw};
use crate::device::{tile_size_for_heap_budget, DeviceQuery};
use crate::error::{Error, Result};
use crate::network::{Network, OnnxNetwork};
use crate::stitch::stitch_tile;
use crate::tile::plan_tiles;
use crate::tta::{average, Transform};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unconfigured,
    Loaded,
    Configured,
    Ready,
}

#[derive(Debug, Clone, Copy)]
struct Parameters {
    scale: u32,
    tile_size: u32,
    prepadding: usize,
}

/// Tiled super-resolution engine bound to one compute device.
///
/// A single instance is not safe for concurrent `process` calls; callers
/// wanting parallelism run one engine per device or serialize externally.
/// The loaded network itself is read-only and shared-safe.
pub struct Engine {
    device: Arc<dyn DeviceQuery>,
    device_id: u32,
    tta_mode: bool,
    backend: ExecutionBackend,
    trt_cache_dir: Option<PathBuf>,
    state: State,
    network: Option<Box<dyn Network>>,
    params: Option<Parameters>,
    // Scratch reused across tiles of a process call.
    tile_pixels: Vec<u8>,
    out_pixels: Vec<u8>,
    tensor_buf: Option<Array4<f32>>,
}

impl Engine {
    /// Create an engine bound to `device_id`. Fails with [`Error::Device`]
    /// when the id is not a known device.
    pub fn new(device: Arc<dyn DeviceQuery>, device_id: u32, tta_mode: bool) -> Result<Self> {
        let count = device.device_count();
        if device_id >= count {
            return Err(Error::Device(format!(
                "device {device_id} not found ({count} available)"
            )));
        }
        Ok(Self {
            device,
            device_id,
            tta_mode,
            backend: ExecutionBackend::default(),
            trt_cache_dir: None,
            state: State::Unconfigured,
            network: None,
            params: None,
            tile_pixels: Vec::new(),
            out_pixels: Vec::new(),
            tensor_buf: None,
        })
    }

    /// Select the GPU execution backend. Only affects subsequent loads.
    pub fn set_backend(&mut self, backend: ExecutionBackend) {
        self.backend = backend;
    }

    pub fn set_trt_cache_dir(&mut self, dir: PathBuf) {
        self.trt_cache_dir = Some(dir);
    }

    pub fn tta_mode(&self) -> bool {
        self.tta_mode
    }

    pub fn scale(&self) -> Option<u32> {
        self.params.map(|p| p.scale)
    }

    pub fn tile_size(&self) -> Option<u32> {
        self.params.map(|p| p.tile_size)
    }

    /// Load the network from a parameter resource and a weight resource.
    /// `Unconfigured → Loaded`.
    pub fn load_files(&mut self, param: &[u8], weights: &[u8]) -> Result<()> {
        let opts = SessionOptions {
            backend: &self.backend,
            device_id: self.device_id,
            trt_cache_dir: self.trt_cache_dir.as_deref(),
        };
        let network = OnnxNetwork::load(param, weights, &opts)?;
        self.load_network(Box::new(network))
    }

    /// Load the network from an ONNX model file. `Unconfigured → Loaded`.
    pub fn load_model_file(&mut self, model_path: &Path) -> Result<()> {
        let opts = SessionOptions {
            backend: &self.backend,
            device_id: self.device_id,
            trt_cache_dir: self.trt_cache_dir.as_deref(),
        };
        let network = OnnxNetwork::load_file(model_path, &opts)?;
        self.load_network(Box::new(network))
    }

    /// Inject an already-constructed network capability.
    /// `Unconfigured → Loaded`.
    pub fn load_network(&mut self, network: Box<dyn Network>) -> Result<()> {
        if self.state != State::Unconfigured {
            return Err(Error::InvalidState("network already loaded"));
        }
        self.network = Some(network);
        self.state = State::Loaded;
        info!(device_id = self.device_id, tta = self.tta_mode, "Network loaded");
        Ok(())
    }

    /// Fix scale and tile size. `Loaded → Configured`.
    ///
    /// `tile_size == 0` derives the tile size from the device's reported heap
    /// budget. Prepadding always comes from the loaded network family.
    pub fn set_parameters(&mut self, scale: u32, tile_size: u32) -> Result<()> {
        let network = match (&self.state, &self.network) {
            (State::Loaded | State::Configured, Some(n)) => n,
            _ => return Err(Error::InvalidState("set_parameters requires a loaded network")),
        };

        let supported = network.supported_scales();
        if !supported.contains(&scale) {
            return Err(Error::UnsupportedScale {
                scale,
                supported: supported.to_vec(),
            });
        }

        let tile_size = if tile_size == 0 {
            let budget = self.device.heap_budget_mb(self.device_id)?;
            let derived = tile_size_for_heap_budget(budget);
            debug!(budget_mb = budget, tile_size = derived, "Derived tile size from heap budget");
            derived
        } else {
            tile_size
        };

        self.params = Some(Parameters {
            scale,
            tile_size,
            prepadding: network.prepadding(),
        });
        self.state = State::Configured;
        info!(scale, tile_size, "Engine configured");
        Ok(())
    }

    /// Upscale `input` into the caller-provided `output` buffer.
    ///
    /// `input` holds `width*height*channels` interleaved samples; `output`
    /// must be sized `(width*scale)*(height*scale)*channels`. Blocking; the
    /// buffer contents are undefined if an error is returned after stitching
    /// has begun (a wrong-size buffer is rejected before any write).
    pub fn process(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        width: usize,
        height: usize,
        channels: usize,
    ) -> Result<()> {
        if self.state != State::Configured && self.state != State::Ready {
            return Err(Error::InvalidState("process requires set_parameters first"));
        }
        let params = self.params.expect("configured engine has parameters");
        let scale = params.scale as usize;

        if channels == 0 {
            return Err(Error::InvalidConfiguration(
                "channel count must be positive".to_string(),
            ));
        }
        let expected_in = width * height * channels;
        if input.len() != expected_in {
            return Err(Error::DimensionMismatch {
                expected: expected_in,
                actual: input.len(),
            });
        }
        let expected_out = (width * scale) * (height * scale) * channels;
        if output.len() != expected_out {
            return Err(Error::DimensionMismatch {
                expected: expected_out,
                actual: output.len(),
            });
        }

        let tiles = plan_tiles(
            width,
            height,
            params.tile_size as usize,
            params.prepadding,
            scale,
        )?;

        debug!(
            width,
            height,
            channels,
            scale,
            tiles = tiles.len(),
            tta = self.tta_mode,
            "Processing image"
        );

        // Size scratch once from the largest planned tile.
        let max_tile_bytes = tiles
            .iter()
            .map(|t| t.padded_src.w * t.padded_src.h * channels)
            .max()
            .unwrap_or(0);
        self.tile_pixels.reserve(max_tile_bytes);

        let network = self.network.as_ref().expect("configured engine has network");

        for spec in &tiles {
            extract_region(
                input,
                width,
                channels,
                spec.padded_src.x,
                spec.padded_src.y,
                spec.padded_src.w,
                spec.padded_src.h,
                &mut self.tile_pixels,
            );

            let tensor = pixels_to_nchw(
                &self.tile_pixels,
                spec.padded_src.w,
                spec.padded_src.h,
                channels,
                &mut self.tensor_buf,
            )?;

            let result = if self.tta_mode {
                infer_tta(network.as_ref(), &tensor)?
            } else {
                network.run(&tensor)?
            };

            let expected_shape = [
                1,
                channels,
                spec.padded_src.h * scale,
                spec.padded_src.w * scale,
            ];
            if result.shape() != expected_shape {
                return Err(Error::Device(format!(
                    "network produced shape {:?}, expected {:?}",
                    result.shape(),
                    expected_shape
                )));
            }

            nchw_to_pixels(&result, &mut self.out_pixels)?;
            stitch_tile(
                output,
                width * scale,
                channels,
                &self.out_pixels,
                spec,
                scale,
            )?;

            // Hand the input tensor back to the scratch slot.
            self.tensor_buf = Some(tensor);
        }

        self.state = State::Ready;
        Ok(())
    }
}

/// 8-way test-time augmentation: run every dihedral variant, map each result
/// back into the untransformed frame, and average.
fn infer_tta(network: &dyn Network, input: &Array4<f32>) -> Result<Array4<f32>> {
    let mut aligned = Vec::with_capacity(Transform::ALL.len());
    for t in Transform::ALL {
        let out = network.run(&t.apply(input))?;
        aligned.push(t.invert(&out));
    }
    Ok(average(&aligned))
}
