use crate::{
    error::DenoiseError,
    model::{checksum_matches, hex_digest, stage},
};

use std::path::{Path, PathBuf};

mod manifest;
pub use manifest::{Manifest, ModelMetadata};

/// Upper bound on a downloaded model file.
const MAX_MODEL_BYTES: u64 = 512 * 1024 * 1024;

/// Downloads a model file listed in the manifest at `manifest_url`.
///
/// The file location in the manifest is resolved relative to the manifest's
/// own directory. If `download_dir` already holds a file with the expected
/// checksum nothing is downloaded. Downloaded bytes are verified before
/// anything is written to disk.
///
/// # Arguments
///
/// * `model_id` - The model identifier as listed in the manifest (e.g. `"deepfilternet3"`).
/// * `version` - Model version, looked up as `"v{version}"`.
/// * `manifest_url` - URL of the manifest JSON.
/// * `download_dir` - Directory where the downloaded model file should be stored.
///
/// # Returns
///
/// Returns the full path to the model file.
///
/// # Note
///
/// This is a blocking operation.
pub fn download<P: AsRef<Path>>(
    model_id: &str,
    version: u32,
    manifest_url: &str,
    download_dir: P,
) -> Result<PathBuf, DenoiseError> {
    let manifest = Manifest::download(manifest_url)?;
    let model = manifest.metadata_for_model(model_id, version)?;
    let download_dir = download_dir.as_ref();

    let cached = download_dir.join(&model.file_name);
    if cached.is_file() && checksum_matches(&cached, &model.checksum)? {
        log::info!("model {model_id} v{version} already present at {}", cached.display());
        return Ok(cached);
    }

    let url = resolve(manifest_url, &model.url_path);
    log::info!("downloading model {model_id} v{version} from {url}");
    let bytes = fetch(&url)?;
    verify(&bytes, &model.checksum)?;

    let path = stage(&bytes, &model.file_name, download_dir)?;
    log::info!("stored {} bytes at {}", bytes.len(), path.display());
    Ok(path)
}

/// Joins `path` onto the directory of `manifest_url`.
fn resolve(manifest_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }

    let base = manifest_url
        .rsplit_once('/')
        .map_or(manifest_url, |(base, _)| base);
    format!("{base}/{}", path.trim_start_matches('/'))
}

fn verify(bytes: &[u8], expected: &str) -> Result<(), DenoiseError> {
    if hex_digest(bytes).eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(DenoiseError::ChecksumMismatch)
    }
}

fn fetch(url: &str) -> Result<Vec<u8>, DenoiseError> {
    ureq::get(url)
        .call()
        .and_then(|response| {
            response
                .into_body()
                .into_with_config()
                .limit(MAX_MODEL_BYTES)
                .read_to_vec()
        })
        .map_err(|err| DenoiseError::ModelDownload(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_against_the_manifest_directory() {
        assert_eq!(
            resolve(
                "https://models.example.com/index/manifest.json",
                "models/df3/v1/model.tar.gz"
            ),
            "https://models.example.com/index/models/df3/v1/model.tar.gz"
        );
        assert_eq!(
            resolve("https://models.example.com/manifest.json", "/df3.tar.gz"),
            "https://models.example.com/df3.tar.gz"
        );
    }

    #[test]
    fn absolute_urls_are_kept() {
        assert_eq!(
            resolve(
                "https://models.example.com/manifest.json",
                "https://cdn.example.net/df3.tar.gz"
            ),
            "https://cdn.example.net/df3.tar.gz"
        );
    }

    #[test]
    fn verification_accepts_either_hex_case() {
        let digest = hex_digest(b"model");
        assert_eq!(verify(b"model", &digest), Ok(()));
        assert_eq!(verify(b"model", &digest.to_uppercase()), Ok(()));
        assert_eq!(verify(b"modem", &digest), Err(DenoiseError::ChecksumMismatch));
    }
}
