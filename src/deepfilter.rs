use crate::{
    error::*,
    model::{DenoiseModel, ModelAsset, ModelConfig, ModelFactory},
};

use alt_denoiser_sys::*;

use std::{
    ffi::CString,
    path::{Path, PathBuf},
    ptr,
};

/// DeepFilterNet model loaded through the native `libdf` library.
///
/// # Example
///
/// ```rust,no_run
/// # use alt_denoiser::{DeepFilterModel, DenoiseModel, ModelConfig};
/// let mut model = DeepFilterModel::from_file("/path/to/DeepFilterNet3_onnx.tar.gz", &ModelConfig::default()).unwrap();
/// let input = vec![0.0f32; model.frame_len()];
/// let mut output = vec![0.0f32; model.frame_len()];
/// model.process_frame(&input, &mut output);
/// ```
pub struct DeepFilterModel {
    /// Raw pointer to the C model state
    inner: *mut DFState,
    frame_len: usize,
    /// `df_process_frame` takes a mutable input pointer; frames are copied here first.
    input: Vec<f32>,
}

impl DeepFilterModel {
    /// Loads the model archive at `path`.
    pub fn from_file<P: AsRef<Path>>(path: P, config: &ModelConfig) -> Result<Self, DenoiseError> {
        let path = path.as_ref();
        let c_path = CString::new(path.to_string_lossy().as_bytes()).map_err(|_| {
            DenoiseError::ModelUnavailable(format!("invalid model path {}", path.display()))
        })?;
        let c_log_level = config
            .log_level
            .as_deref()
            .map(CString::new)
            .transpose()
            .map_err(|_| DenoiseError::ModelUnavailable("invalid log level".to_string()))?;
        let log_level_ptr = c_log_level.as_ref().map_or(ptr::null(), |level| level.as_ptr());

        // SAFETY:
        // - `c_path` and `c_log_level` are valid, NUL-terminated strings that outlive the call.
        // - A null log level is accepted by the library.
        let inner = unsafe { df_create(c_path.as_ptr(), config.attenuation_limit_db, log_level_ptr) };
        if inner.is_null() {
            return Err(DenoiseError::ModelUnavailable(format!(
                "libdf could not load {}",
                path.display()
            )));
        }

        // SAFETY: `inner` is a live state returned by `df_create`.
        let frame_len = unsafe { df_get_frame_length(inner) };
        if frame_len == 0 {
            // SAFETY: `inner` is live and not used afterwards.
            unsafe { df_free(inner) };
            return Err(DenoiseError::ModelUnavailable(
                "libdf reported a frame length of zero".to_string(),
            ));
        }

        log::debug!("loaded DeepFilterNet model from {} (frame {frame_len})", path.display());

        Ok(Self {
            inner,
            frame_len,
            input: vec![0.0; frame_len],
        })
    }
}

impl DenoiseModel for DeepFilterModel {
    fn frame_len(&self) -> usize {
        self.frame_len
    }

    fn process_frame(&mut self, input: &[f32], output: &mut [f32]) {
        if input.len() != self.frame_len || output.len() != self.frame_len {
            output.fill(0.0);
            return;
        }

        self.input.copy_from_slice(input);

        // SAFETY:
        // - `inner` is live for the lifetime of `self`.
        // - Both buffers hold exactly `frame_len` samples, as checked above.
        unsafe {
            df_process_frame(self.inner, self.input.as_mut_ptr(), output.as_mut_ptr());
        }
    }

    fn set_attenuation_limit(&mut self, limit_db: f32) {
        // SAFETY: `inner` is live for the lifetime of `self`.
        unsafe { df_set_atten_lim(self.inner, limit_db) };
    }
}

impl Drop for DeepFilterModel {
    fn drop(&mut self) {
        if !self.inner.is_null() {
            // SAFETY:
            // - `inner` was allocated by libdf and is still owned by this wrapper.
            unsafe { df_free(self.inner) };
        }
    }
}

// SAFETY: The state is only accessed through `&mut self` and libdf keeps no
// thread-local data tied to it.
unsafe impl Send for DeepFilterModel {}

enum Source {
    File(PathBuf),
    Embedded(&'static ModelAsset),
}

/// [`ModelFactory`] creating [`DeepFilterModel`]s from a file or an embedded asset.
///
/// ```rust,no_run
/// # use alt_denoiser::{DeepFilterFactory, Processor};
/// let mut processor = Processor::new(DeepFilterFactory::from_file("/path/to/DeepFilterNet3_onnx.tar.gz"));
/// let latency = processor.prepare(44_100, 512).unwrap();
/// ```
pub struct DeepFilterFactory {
    source: Source,
}

impl DeepFilterFactory {
    pub fn from_file<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            source: Source::File(path.into()),
        }
    }

    /// Stages `asset` to a temporary file on first model creation.
    pub fn from_asset(asset: &'static ModelAsset) -> Self {
        Self {
            source: Source::Embedded(asset),
        }
    }
}

impl ModelFactory for DeepFilterFactory {
    fn create(&self, config: &ModelConfig) -> Result<Box<dyn DenoiseModel>, DenoiseError> {
        let model = match &self.source {
            Source::File(path) => DeepFilterModel::from_file(path, config)?,
            Source::Embedded(asset) => DeepFilterModel::from_file(asset.path()?, config)?,
        };
        Ok(Box::new(model))
    }
}
