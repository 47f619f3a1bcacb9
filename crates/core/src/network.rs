//! The network capability: one forward pass over a prepared tile tensor.
//!
//! The engine only ever sees this trait; the production implementation wraps
//! an `ort::Session` (CUDA/TensorRT), and tests substitute deterministic
//! stand-ins.

use std::path::Path;
use std::sync::Mutex;

use half::f16;
use half::slice::HalfFloatSliceExt;
use ndarray::Array4;
use ort::{session::Session, value::Tensor};
use tracing::debug;

use crate::backend::{session_from_file, session_from_memory, SessionOptions};
use crate::error::{Error, Result};

/// Prepadding the Real-ESRGAN network family needs around each tile so its
/// receptive field near tile edges sees real content. A different family may
/// declare a different value via [`Network::prepadding`].
pub const REALESRGAN_PREPADDING: usize = 10;

/// A loaded, read-only super-resolution network.
///
/// Implementations must be deterministic: identical input tensors produce
/// identical outputs. Safe for shared read access; dispatch itself may be
/// internally serialized.
pub trait Network: Send + Sync {
    /// One forward pass. Output spatial dims = input spatial dims × scale.
    fn run(&self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Integer scale factors this network can produce output alignment for.
    fn supported_scales(&self) -> &[u32];

    /// Per-network-family tile prepadding, in source pixels.
    fn prepadding(&self) -> usize;
}

/// ONNX-backed [`Network`]. Expects NCHW float input in the 0–255 range
/// (FP32 Real-ESRGAN convention); FP16 models using the 0–1 range are
/// detected from the session's input dtype and rescaled at the boundary.
pub struct OnnxNetwork {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    is_fp16: bool,
}

impl OnnxNetwork {
    /// Load from a parameter resource (the ONNX graph) and a weight resource.
    ///
    /// Contract: this loader requires weights embedded as graph initializers,
    /// so the weight resource must be empty. A model whose parameter count
    /// does not match its initializers is rejected by the runtime and
    /// surfaces as [`Error::Load`].
    pub fn load(param: &[u8], weights: &[u8], opts: &SessionOptions<'_>) -> Result<Self> {
        if param.is_empty() {
            return Err(Error::Load("empty model parameter resource".to_string()));
        }
        if !weights.is_empty() {
            return Err(Error::Load(
                "separate weight blobs are not supported by the ONNX loader; \
                 embed initializers in the graph resource"
                    .to_string(),
            ));
        }
        Self::from_session(session_from_memory(param, opts)?)
    }

    pub fn load_file(model_path: &Path, opts: &SessionOptions<'_>) -> Result<Self> {
        Self::from_session(session_from_file(model_path, opts)?)
    }

    fn from_session(session: Session) -> Result<Self> {
        let inputs = session.inputs();
        let outputs = session.outputs();
        if inputs.is_empty() || outputs.is_empty() {
            return Err(Error::Load(
                "model must have at least one input and one output".to_string(),
            ));
        }
        let input_name = inputs[0].name().to_string();
        let output_name = outputs[0].name().to_string();
        let is_fp16 = match inputs[0].dtype() {
            ort::value::ValueType::Tensor { ty, .. } => {
                *ty == ort::tensor::TensorElementType::Float16
            }
            _ => false,
        };

        debug!(%input_name, %output_name, is_fp16, "Detected model IO");

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            is_fp16,
        })
    }
}

impl Network for OnnxNetwork {
    fn run(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| Error::Device("network session poisoned".to_string()))?;

        if self.is_fp16 {
            run_fp16(&mut session, input, &self.input_name, &self.output_name)
        } else {
            run_fp32(&mut session, input, &self.input_name, &self.output_name)
        }
    }

    fn supported_scales(&self) -> &[u32] {
        // Alignment transforms exist for the 2x/3x/4x family variants.
        &[2, 3, 4]
    }

    fn prepadding(&self) -> usize {
        REALESRGAN_PREPADDING
    }
}

fn run_fp32(
    session: &mut Session,
    input: &Array4<f32>,
    input_name: &str,
    output_name: &str,
) -> Result<Array4<f32>> {
    let input_tensor = Tensor::from_array(input.clone())?;
    let outputs = session.run(ort::inputs![input_name => &input_tensor])?;
    let output_view = outputs[output_name].try_extract_array::<f32>()?;
    output_view
        .to_owned()
        .into_dimensionality::<ndarray::Ix4>()
        .map_err(|e| Error::Device(format!("unexpected output rank: {e}")))
}

/// FP16 path: rescale 0–255 → 0–1, convert at the session boundary, and
/// rescale back, so the caller always works in the FP32 convention.
fn run_fp16(
    session: &mut Session,
    input: &Array4<f32>,
    input_name: &str,
    output_name: &str,
) -> Result<Array4<f32>> {
    let f32_slice = input
        .as_slice()
        .expect("tile tensors are built contiguous");
    let scaled: Vec<f32> = f32_slice.iter().map(|v| v / 255.0).collect();
    let mut fp16_data = vec![f16::ZERO; scaled.len()];
    fp16_data.convert_from_f32_slice(&scaled);

    let fp16_array =
        ndarray::ArrayD::from_shape_vec(input.shape().to_vec(), fp16_data)
            .map_err(|e| Error::Device(format!("failed to shape fp16 input: {e}")))?;
    let input_tensor = Tensor::from_array(fp16_array)?;
    let run_outputs = session.run(ort::inputs![input_name => &input_tensor])?;
    let output_view = run_outputs[output_name].try_extract_array::<f16>()?;

    let fp16_owned;
    let fp16_slice = if let Some(s) = output_view.as_slice() {
        s
    } else {
        fp16_owned = output_view.as_standard_layout().into_owned();
        fp16_owned.as_slice().expect("standard layout")
    };
    let mut f32_data = vec![0.0f32; fp16_slice.len()];
    fp16_slice.convert_to_f32_slice(&mut f32_data);
    for v in &mut f32_data {
        *v *= 255.0;
    }

    let shape = output_view.shape();
    if shape.len() != 4 {
        return Err(Error::Device(format!(
            "unexpected fp16 output rank {}",
            shape.len()
        )));
    }
    ndarray::Array4::from_shape_vec((shape[0], shape[1], shape[2], shape[3]), f32_data)
        .map_err(|e| Error::Device(format!("unexpected fp16 output shape: {e}")))
}
