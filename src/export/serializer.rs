//! Artifact serialization
//!
//! Every artifact is an envelope holding magic bytes, a format version, the
//! model identifier, an FNV-1a checksum and the encoded payload. Files are
//! written to a temporary sibling and renamed into place.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{TrainerError, Result};
use crate::training::Estimator;

/// Serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    /// Binary format using bincode (efficient)
    Binary,
    /// JSON format (portable, human-readable)
    Json,
}

impl Default for SerializationFormat {
    fn default() -> Self {
        SerializationFormat::Binary
    }
}

impl std::str::FromStr for SerializationFormat {
    type Err = TrainerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "binary" | "bin" | "bincode" => Ok(SerializationFormat::Binary),
            "json" => Ok(SerializationFormat::Json),
            other => Err(TrainerError::ConfigError(format!(
                "unknown serialization format '{}', expected 'binary' or 'json'",
                other
            ))),
        }
    }
}

/// On-disk envelope around a serialized object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedArtifact {
    /// Magic bytes for format detection
    pub magic: [u8; 4],
    /// Format version
    pub format_version: u32,
    /// Identifier of the stored model
    pub model_name: String,
    /// Checksum for integrity verification
    pub checksum: u64,
    /// Encoded object, in the same format as the envelope
    pub payload: Vec<u8>,
}

impl SerializedArtifact {
    /// Magic bytes for artifact files
    pub const MAGIC: [u8; 4] = *b"RSEL";
    /// Current format version
    pub const VERSION: u32 = 1;

    pub fn new(model_name: impl Into<String>, payload: Vec<u8>) -> Self {
        let checksum = fnv1a(&payload);
        Self {
            magic: Self::MAGIC,
            format_version: Self::VERSION,
            model_name: model_name.into(),
            checksum,
            payload,
        }
    }

    pub fn verify_checksum(&self) -> bool {
        fnv1a(&self.payload) == self.checksum
    }

    fn verify(&self) -> Result<()> {
        if self.magic != Self::MAGIC {
            return Err(TrainerError::SerializationError(
                "not a model artifact: bad magic bytes".to_string(),
            ));
        }
        if self.format_version != Self::VERSION {
            return Err(TrainerError::SerializationError(format!(
                "unsupported artifact version {} (expected {})",
                self.format_version,
                Self::VERSION
            )));
        }
        if !self.verify_checksum() {
            return Err(TrainerError::SerializationError(
                "Checksum verification failed - file may be corrupted".to_string(),
            ));
        }
        Ok(())
    }
}

/// FNV-1a hash
fn fnv1a(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 14695981039346656037;
    const FNV_PRIME: u64 = 1099511628211;

    data.iter().fold(FNV_OFFSET, |hash, &byte| {
        (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
    })
}

fn encode<T: Serialize>(obj: &T, format: SerializationFormat) -> Result<Vec<u8>> {
    Ok(match format {
        SerializationFormat::Binary => bincode::serialize(obj)?,
        SerializationFormat::Json => serde_json::to_vec_pretty(obj)?,
    })
}

fn decode<T: DeserializeOwned>(bytes: &[u8], format: SerializationFormat) -> Result<T> {
    Ok(match format {
        SerializationFormat::Binary => bincode::deserialize(bytes)?,
        SerializationFormat::Json => serde_json::from_slice(bytes)?,
    })
}

/// Guess the envelope format from the leading bytes
pub fn detect_format(bytes: &[u8]) -> Result<SerializationFormat> {
    if bytes.starts_with(&SerializedArtifact::MAGIC) {
        return Ok(SerializationFormat::Binary);
    }
    match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') => Ok(SerializationFormat::Json),
        _ => Err(TrainerError::SerializationError(
            "unrecognised artifact format".to_string(),
        )),
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()))
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_sibling(path);
    let written = (|| -> Result<()> {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        writer.write_all(bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    })()
    .and_then(|()| fs::rename(&tmp, path).map_err(TrainerError::from));

    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written
}

/// Serialize `obj` under an explicit model identifier
pub fn save_named_object<T: Serialize>(
    path: impl AsRef<Path>,
    model_name: &str,
    obj: &T,
    format: SerializationFormat,
) -> Result<()> {
    let path = path.as_ref();
    let payload = encode(obj, format)?;
    let artifact = SerializedArtifact::new(model_name, payload);
    let bytes = encode(&artifact, format)?;

    write_atomically(path, &bytes)?;
    tracing::debug!(path = %path.display(), model = model_name, bytes = bytes.len(), "artifact written");
    Ok(())
}

/// Serialize `obj` to `path`, creating parent directories as needed
pub fn save_object<T: Serialize>(
    path: impl AsRef<Path>,
    obj: &T,
    format: SerializationFormat,
) -> Result<()> {
    let type_name = std::any::type_name::<T>();
    let short = type_name.rsplit("::").next().unwrap_or(type_name);
    save_named_object(path, short, obj, format)
}

/// Read and verify an artifact envelope without decoding the payload
pub fn read_artifact(path: impl AsRef<Path>) -> Result<(SerializedArtifact, SerializationFormat)> {
    let bytes = fs::read(path.as_ref())?;
    let format = detect_format(&bytes)?;
    let artifact: SerializedArtifact = decode(&bytes, format)?;
    artifact.verify()?;
    Ok((artifact, format))
}

/// Load an object together with its stored model identifier
pub fn load_named_object<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<(String, T)> {
    let (artifact, format) = read_artifact(path)?;
    let obj = decode(&artifact.payload, format)?;
    Ok((artifact.model_name, obj))
}

/// Load an object written by [`save_object`] or [`save_named_object`]
pub fn load_object<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    load_named_object(path).map(|(_, obj)| obj)
}

/// Load a fitted built-in estimator
pub fn load_model(path: impl AsRef<Path>) -> Result<Estimator> {
    load_object(path)
}
