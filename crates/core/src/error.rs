//! Error taxonomy for the engine.
//!
//! Every failure surfaces as one of these variants; nothing is retried
//! internally. `Device` failures may be transient — the caller's recovery
//! lever is a smaller tile size or a different device.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Caller error: bad scale, tile size, or image dimensions.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Malformed or mismatched model resources. Fatal to this engine instance.
    #[error("failed to load model: {0}")]
    Load(String),

    /// The requested scale has no matching upscale path in the loaded network.
    #[error("unsupported scale factor {scale} (supported: {supported:?})")]
    UnsupportedScale { scale: u32, supported: Vec<u32> },

    /// Caller-provided buffer does not match the expected byte length.
    #[error("dimension mismatch: expected {expected} bytes, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// GPU dispatch or allocation failure. May be transient; retry with a
    /// smaller tile size or another device.
    #[error("device error: {0}")]
    Device(String),

    /// Operation called in the wrong engine state (e.g. `process` before
    /// `set_parameters`).
    #[error("invalid engine state: {0}")]
    InvalidState(&'static str),
}

impl From<ort::Error> for Error {
    fn from(e: ort::Error) -> Self {
        Error::Device(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = Error::UnsupportedScale {
            scale: 5,
            supported: vec![2, 3, 4],
        };
        assert!(e.to_string().contains("5"));
        assert!(e.to_string().contains("[2, 3, 4]"));

        let e = Error::DimensionMismatch {
            expected: 100,
            actual: 64,
        };
        assert!(e.to_string().contains("100"));
        assert!(e.to_string().contains("64"));
    }
}
