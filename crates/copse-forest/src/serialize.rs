//! Model serialization and deserialization via bincode.

use std::path::Path;

use tracing::{info, instrument};

use crate::config::Task;
use crate::error::ForestError;
use crate::forest::Forest;

/// Current binary format version.
const FORMAT_VERSION: u32 = 1;

/// Versioned envelope for the serialized model.
#[derive(serde::Serialize, serde::Deserialize)]
struct ModelEnvelope {
    /// Format version for compatibility checking.
    format_version: u32,
    /// Number of trees in the forest.
    ntree: usize,
    /// Number of features the model was trained on.
    n_features: usize,
    /// Task the forest was trained for.
    task: Task,
    /// The serialized forest.
    forest: Forest,
}

impl Forest {
    /// Save the model to a binary file.
    ///
    /// Uses bincode encoding wrapped in a versioned envelope for
    /// forward-compatibility checking.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::SerializeModel`] | bincode encoding failed |
    /// | [`ForestError::WriteModel`] | file write failed |
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ForestError> {
        let path = path.as_ref();

        let envelope = ModelEnvelope {
            format_version: FORMAT_VERSION,
            ntree: self.trees.len(),
            n_features: self.n_features,
            task: self.task,
            forest: self.clone(),
        };

        let bytes = bincode::serialize(&envelope)
            .map_err(|e| ForestError::SerializeModel { source: e })?;

        std::fs::write(path, &bytes).map_err(|e| ForestError::WriteModel {
            path: path.to_path_buf(),
            source: e,
        })?;

        info!(
            size_bytes = bytes.len(),
            ntree = self.trees.len(),
            "model saved"
        );

        Ok(())
    }

    /// Load a model from a binary file.
    ///
    /// Checks the format version and returns an error on mismatch.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::ReadModel`] | file read failed |
    /// | [`ForestError::DeserializeModel`] | bincode decoding failed |
    /// | [`ForestError::IncompatibleModelVersion`] | format version mismatch |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ForestError> {
        let path = path.as_ref();

        let bytes = std::fs::read(path).map_err(|e| ForestError::ReadModel {
            path: path.to_path_buf(),
            source: e,
        })?;

        let envelope: ModelEnvelope =
            bincode::deserialize(&bytes).map_err(|e| ForestError::DeserializeModel {
                path: path.to_path_buf(),
                source: e,
            })?;

        if envelope.format_version != FORMAT_VERSION {
            return Err(ForestError::IncompatibleModelVersion {
                expected: FORMAT_VERSION,
                found: envelope.format_version,
                path: path.to_path_buf(),
            });
        }

        info!(ntree = envelope.ntree, "model loaded");

        Ok(envelope.forest)
    }
}
