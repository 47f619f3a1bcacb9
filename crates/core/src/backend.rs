//! Execution-provider selection for the ONNX network capability.
//!
//! Builds an `ort::Session` on the CUDA EP (default) or the TensorRT EP with
//! engine caching and CUDA fallback. If no GPU EP is usable, ORT silently
//! runs on CPU; that is logged but not fatal — dispatch failures surface per
//! call as device errors.

use std::path::{Path, PathBuf};

use ort::{
    execution_providers::{CUDAExecutionProvider, ExecutionProvider, TensorRTExecutionProvider},
    session::{builder::GraphOptimizationLevel, Session},
};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Which GPU execution provider to register.
///
/// `Tensorrt` needs the TensorRT runtime libraries at load time; the CUDA EP
/// is always registered behind it as a fallback.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ExecutionBackend {
    #[default]
    Cuda,
    Tensorrt,
}

impl ExecutionBackend {
    /// Parse from string (case-insensitive). Unknown values select `Cuda`.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "tensorrt" | "trt" => Self::Tensorrt,
            _ => Self::Cuda,
        }
    }
}

impl std::fmt::Display for ExecutionBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cuda => write!(f, "cuda"),
            Self::Tensorrt => write!(f, "tensorrt"),
        }
    }
}

pub struct SessionOptions<'a> {
    pub backend: &'a ExecutionBackend,
    pub device_id: u32,
    pub trt_cache_dir: Option<&'a Path>,
}

/// Build a session from in-memory model bytes.
pub fn session_from_memory(model: &[u8], opts: &SessionOptions<'_>) -> Result<Session> {
    let builder = configure(opts)?;
    builder
        .commit_from_memory(model)
        .map_err(|e| Error::Load(format!("failed to load ONNX model from memory: {e}")))
}

/// Build a session from a model file on disk.
pub fn session_from_file(model_path: &Path, opts: &SessionOptions<'_>) -> Result<Session> {
    let builder = configure(opts)?;
    builder
        .commit_from_file(model_path)
        .map_err(|e| Error::Load(format!("failed to load ONNX model {}: {e}", model_path.display())))
}

fn configure(opts: &SessionOptions<'_>) -> Result<ort::session::builder::SessionBuilder> {
    let builder = Session::builder()
        .map_err(Error::from)?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(Error::from)?;

    match opts.backend {
        ExecutionBackend::Tensorrt => {
            let cache_dir: PathBuf = opts
                .trt_cache_dir
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("trt_cache"));
            if let Err(e) = std::fs::create_dir_all(&cache_dir) {
                warn!(dir = %cache_dir.display(), error = %e, "Failed to create TRT cache directory");
            }

            let cache_path = cache_dir.to_string_lossy().to_string();

            debug!(
                backend = "tensorrt",
                device_id = opts.device_id,
                cache_dir = %cache_dir.display(),
                "Registering TensorRT EP with CUDA fallback"
            );

            // TRT EP can fail at runtime when libnvinfer is missing; the
            // trailing CUDA EP keeps inference working.
            builder
                .with_execution_providers([
                    TensorRTExecutionProvider::default()
                        .with_engine_cache(true)
                        .with_engine_cache_path(&cache_path)
                        .with_fp16(true)
                        .with_device_id(opts.device_id as i32)
                        .build(),
                    CUDAExecutionProvider::default()
                        .with_device_id(opts.device_id as i32)
                        .build(),
                ])
                .map_err(Error::from)
        }
        ExecutionBackend::Cuda => {
            let cuda = CUDAExecutionProvider::default();
            if !cuda.is_available().unwrap_or(false) {
                warn!("CUDA EP is not available — inference will fall back to CPU");
            }

            debug!(backend = "cuda", device_id = opts.device_id, "Registering CUDA EP");

            builder
                .with_execution_providers([CUDAExecutionProvider::default()
                    .with_device_id(opts.device_id as i32)
                    .build()])
                .map_err(Error::from)
        }
    }
}
