//! Model persistence
//!
//! Saves and reloads fitted estimators as checksummed bincode or JSON artifacts.

mod serializer;

pub use serializer::{
    detect_format, load_model, load_named_object, load_object, read_artifact, save_named_object,
    save_object, SerializationFormat, SerializedArtifact,
};
