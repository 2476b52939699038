use crate::error::*;

use sha2::{Digest, Sha256};
use std::{
    fs::{self, File},
    io::Read,
    path::{Path, PathBuf},
    sync::OnceLock,
};

/// Frame-based noise suppression model.
///
/// The pipeline treats the model as an opaque frame transform: exactly
/// [`frame_len`](DenoiseModel::frame_len) samples at 48 kHz in, the same
/// number out. Implementations must not allocate or block inside
/// [`process_frame`](DenoiseModel::process_frame).
///
/// A model is owned by exactly one [`Processor`](crate::Processor) and only
/// ever touched from its processing thread. Dropping the model destroys it.
///
/// # Example
///
/// ```rust
/// use alt_denoiser::DenoiseModel;
///
/// struct Gain(f32);
///
/// impl DenoiseModel for Gain {
///     fn frame_len(&self) -> usize {
///         480
///     }
///
///     fn process_frame(&mut self, input: &[f32], output: &mut [f32]) {
///         for (o, i) in output.iter_mut().zip(input) {
///             *o = i * self.0;
///         }
///     }
///
///     fn set_attenuation_limit(&mut self, _limit_db: f32) {}
/// }
/// ```
pub trait DenoiseModel: Send {
    /// Number of samples per frame. Queried once after creation.
    fn frame_len(&self) -> usize;

    /// Transforms one frame. `input` and `output` are both `frame_len()` long.
    fn process_frame(&mut self, input: &[f32], output: &mut [f32]);

    /// Limits how much noise the model removes, in dB. 100 dB means no limit.
    fn set_attenuation_limit(&mut self, limit_db: f32);

    /// Algorithmic delay of the model in samples at 48 kHz.
    fn delay(&self) -> usize {
        0
    }
}

/// Settings handed to a [`ModelFactory`] when a model is created.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Attenuation limit in dB the model starts with.
    pub attenuation_limit_db: f32,
    /// Log level forwarded to the model backend, if it has its own logging.
    pub log_level: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            attenuation_limit_db: 100.0,
            log_level: None,
        }
    }
}

/// Creates models during stream preparation.
///
/// Any `Fn(&ModelConfig) -> Result<Box<dyn DenoiseModel>, DenoiseError>`
/// closure is a factory.
pub trait ModelFactory: Send {
    fn create(&self, config: &ModelConfig) -> Result<Box<dyn DenoiseModel>, DenoiseError>;
}

impl<F> ModelFactory for F
where
    F: Fn(&ModelConfig) -> Result<Box<dyn DenoiseModel>, DenoiseError> + Send,
{
    fn create(&self, config: &ModelConfig) -> Result<Box<dyn DenoiseModel>, DenoiseError> {
        self(config)
    }
}

/// Model blob embedded in the binary that a backend can only load from a file.
///
/// The blob is written to disk once per process, on first use of
/// [`ModelAsset::path`]. Later calls return the cached path. If the target
/// file already exists with the same SHA-256 it is reused untouched.
///
/// # Example
///
/// ```ignore
/// use alt_denoiser::{ModelAsset, include_model};
///
/// static MODEL: ModelAsset = ModelAsset::new(
///     "DeepFilterNet3_onnx.tar.gz",
///     include_model!("../models/DeepFilterNet3_onnx.tar.gz"),
/// );
///
/// let path = MODEL.path().unwrap();
/// println!("model staged at {}", path.display());
/// ```
pub struct ModelAsset {
    file_name: &'static str,
    bytes: &'static [u8],
    staged: OnceLock<PathBuf>,
}

impl ModelAsset {
    pub const fn new(file_name: &'static str, bytes: &'static [u8]) -> Self {
        Self {
            file_name,
            bytes,
            staged: OnceLock::new(),
        }
    }

    pub fn file_name(&self) -> &'static str {
        self.file_name
    }

    pub fn bytes(&self) -> &'static [u8] {
        self.bytes
    }

    /// Returns the path of the staged model file, writing it to the system
    /// temporary directory on first use.
    ///
    /// # Note
    ///
    /// This is a blocking operation.
    pub fn path(&self) -> Result<&Path, DenoiseError> {
        self.path_in(std::env::temp_dir())
    }

    /// Like [`ModelAsset::path`] but stages into `dir` on first use.
    pub fn path_in<P: AsRef<Path>>(&self, dir: P) -> Result<&Path, DenoiseError> {
        if let Some(path) = self.staged.get() {
            return Ok(path.as_path());
        }

        let path = stage(self.bytes, self.file_name, dir.as_ref())?;
        Ok(self.staged.get_or_init(|| path).as_path())
    }
}

/// Writes `bytes` to `dir/file_name` unless an identical file is already there.
///
/// The file is written next to its destination and renamed into place, so
/// other processes never observe a partially written model.
pub(crate) fn stage(bytes: &[u8], file_name: &str, dir: &Path) -> Result<PathBuf, DenoiseError> {
    if bytes.is_empty() {
        return Err(DenoiseError::ModelUnavailable(
            "model data is empty".to_string(),
        ));
    }

    fs::create_dir_all(dir)?;
    let destination = dir.join(file_name);
    if destination.is_file() && checksum_matches(&destination, &hex_digest(bytes))? {
        log::debug!("reusing staged model at {}", destination.display());
        return Ok(destination);
    }

    // One temporary file per thread, so concurrent stagers never share one.
    let temp_path = dir.join(format!(
        "{file_name}.{:?}.staging",
        std::thread::current().id()
    ));
    fs::write(&temp_path, bytes)?;
    if let Err(err) = fs::rename(&temp_path, &destination) {
        let _ = fs::remove_file(&temp_path);
        if err.kind() != std::io::ErrorKind::AlreadyExists {
            return Err(err.into());
        }
    }

    log::debug!(
        "staged {} bytes of model data at {}",
        bytes.len(),
        destination.display()
    );
    Ok(destination)
}

pub(crate) fn hex_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub(crate) fn checksum_matches(path: &Path, expected: &str) -> Result<bool, DenoiseError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    let checksum = format!("{:x}", hasher.finalize());
    Ok(checksum.eq_ignore_ascii_case(expected))
}

/// Embeds the bytes of a model file, ensuring proper alignment.
///
/// This macro uses Rust's standard library's [`include_bytes!`](std::include_bytes) macro
/// to include the model file at compile time.
///
/// # Example
///
/// ```ignore
/// use alt_denoiser::include_model;
///
/// static MODEL: &'static [u8] = include_model!("path/to/DeepFilterNet3_onnx.tar.gz");
/// ```
#[macro_export]
macro_rules! include_model {
    ($path:expr) => {{
        #[repr(C, align(64))]
        struct __Aligned<T: ?Sized>(T);

        const __DATA: &'static __Aligned<[u8; include_bytes!($path).len()]> =
            &__Aligned(*include_bytes!($path));

        &__DATA.0
    }};
}
