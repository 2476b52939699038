use thiserror::Error;

/// Error type for denoising pipeline operations.
///
/// Only configuration-time operations return these. The per-block path never
/// fails; it degrades to silence and records the event in
/// [`Diagnostics`](crate::Diagnostics).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DenoiseError {
    #[error("Buffer capacity must be greater than zero")]
    InvalidCapacity,
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Requested {requested} samples but only {available} are buffered")]
    Underrun { requested: usize, available: usize },
    #[error("Denoising model is unavailable: {0}")]
    ModelUnavailable(String),
    #[error("Parameter is out of range")]
    ParameterOutOfRange,
    #[error("Resampler error: {0}")]
    Resampler(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[cfg(feature = "download-model")]
    #[error("Failed to download manifest: {0}")]
    ManifestDownload(String),
    #[cfg(feature = "download-model")]
    #[error("Failed to parse manifest: {0}")]
    ManifestParse(String),
    #[cfg(feature = "download-model")]
    #[error("Model `{0}` not found in manifest")]
    ModelNotFound(String),
    #[cfg(feature = "download-model")]
    #[error("Model `{model}` has no version v{version} in the manifest")]
    IncompatibleModel { model: String, version: u32 },
    #[cfg(feature = "download-model")]
    #[error("Failed to download model file: {0}")]
    ModelDownload(String),
    #[cfg(feature = "download-model")]
    #[error("Checksum mismatch for downloaded model")]
    ChecksumMismatch,
}

impl From<rubato::ResamplerConstructionError> for DenoiseError {
    fn from(error: rubato::ResamplerConstructionError) -> Self {
        DenoiseError::Resampler(error.to_string())
    }
}

impl From<rubato::ResampleError> for DenoiseError {
    fn from(error: rubato::ResampleError) -> Self {
        DenoiseError::Resampler(error.to_string())
    }
}

impl From<std::io::Error> for DenoiseError {
    fn from(error: std::io::Error) -> Self {
        DenoiseError::Io(error.to_string())
    }
}
