use serde::Deserialize;
use std::collections::HashMap;

use crate::error::DenoiseError;

/// Published model index: `models -> versions ("v{n}") -> file metadata`.
#[derive(Debug, Deserialize)]
pub struct Manifest {
    models: HashMap<String, Model>,
}

#[derive(Debug, Deserialize)]
struct Model {
    versions: HashMap<String, ModelMetadata>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ModelMetadata {
    /// Location of the file relative to the manifest.
    #[serde(rename(deserialize = "file"))]
    pub url_path: String,
    #[serde(rename(deserialize = "filename"))]
    pub file_name: String,
    /// Hex-encoded SHA-256 of the file.
    pub checksum: String,
}

impl Manifest {
    pub fn download(url: &str) -> Result<Self, DenoiseError> {
        let body = ureq::get(url)
            .call()
            .map_err(|err| DenoiseError::ManifestDownload(err.to_string()))?
            .into_body()
            .read_to_string()
            .map_err(|err| DenoiseError::ManifestDownload(err.to_string()))?;

        Self::parse(&body)
    }

    pub fn parse(json: &str) -> Result<Self, DenoiseError> {
        serde_json::from_str(json).map_err(|err| DenoiseError::ManifestParse(err.to_string()))
    }

    pub fn metadata_for_model(&self, id: &str, version: u32) -> Result<&ModelMetadata, DenoiseError> {
        let model = self
            .models
            .get(id)
            .ok_or_else(|| DenoiseError::ModelNotFound(id.to_string()))?;

        model
            .versions
            .get(&format!("v{version}"))
            .ok_or_else(|| DenoiseError::IncompatibleModel {
                model: id.to_string(),
                version,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "models": {
            "deepfilternet3": {
                "versions": {
                    "v1": {
                        "file": "models/deepfilternet3/v1/DeepFilterNet3_onnx.tar.gz",
                        "filename": "DeepFilterNet3_onnx.tar.gz",
                        "checksum": "4c1f6dbd1b3f2c4f1f5e0f0d3b0f8e6a1c2d3e4f5a6b7c8d9e0f1a2b3c4d5e6f"
                    },
                    "v2": {
                        "file": "models/deepfilternet3/v2/DeepFilterNet3_ll_onnx.tar.gz",
                        "filename": "DeepFilterNet3_ll_onnx.tar.gz",
                        "checksum": "0000000000000000000000000000000000000000000000000000000000000000"
                    }
                }
            }
        }
    }"#;

    #[test]
    fn metadata_for_model_returns_requested_version() {
        let manifest = Manifest::parse(MANIFEST).unwrap();

        let model = manifest.metadata_for_model("deepfilternet3", 2).unwrap();

        assert_eq!(model.file_name, "DeepFilterNet3_ll_onnx.tar.gz");
        assert_eq!(
            model.url_path,
            "models/deepfilternet3/v2/DeepFilterNet3_ll_onnx.tar.gz"
        );
    }

    #[test]
    fn unknown_model_and_version_are_reported() {
        let manifest = Manifest::parse(MANIFEST).unwrap();

        assert_eq!(
            manifest.metadata_for_model("rnnoise", 1),
            Err(DenoiseError::ModelNotFound("rnnoise".to_string()))
        );
        assert_eq!(
            manifest.metadata_for_model("deepfilternet3", 7),
            Err(DenoiseError::IncompatibleModel {
                model: "deepfilternet3".to_string(),
                version: 7,
            })
        );
    }

    #[test]
    fn malformed_manifest_is_a_parse_error() {
        assert!(matches!(
            Manifest::parse(r#"{"models": []}"#),
            Err(DenoiseError::ManifestParse(_))
        ));
    }
}
