//! Per-user embedding artifacts written alongside index storage.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use resona_core::track::sanitize_filename;

use crate::error::PipelineResult;

/// One embedded track as persisted in the per-user artifact file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackEmbedding {
    pub track_id: String,
    /// The normalized WAV the vector was computed from.
    pub source_file: String,
    pub vector: Vec<f32>,
}

/// Write a user's embeddings to `<dir>/<user>_embeddings.json`.
///
/// The user id is sanitized the same way as track filenames, so ids
/// with path separators cannot escape the embeddings directory.
pub fn write_artifact(
    embeddings_dir: &Path,
    user_id: &str,
    embeddings: &[TrackEmbedding],
) -> PipelineResult<PathBuf> {
    std::fs::create_dir_all(embeddings_dir)?;
    let path = embeddings_dir.join(format!("{}_embeddings.json", sanitize_filename(user_id)));
    let json = serde_json::to_string_pretty(embeddings)?;
    std::fs::write(&path, json)?;
    log::info!(
        "Wrote {} embeddings to {}",
        embeddings.len(),
        path.display()
    );
    Ok(path)
}

/// Read a previously written artifact back.
pub fn read_artifact(path: &Path) -> PipelineResult<Vec<TrackEmbedding>> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Vec<TrackEmbedding> {
        vec![TrackEmbedding {
            track_id: "t1".to_string(),
            source_file: "Aria - Bach.wav".to_string(),
            vector: vec![0.5; 4],
        }]
    }

    #[test]
    fn test_write_and_read_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = write_artifact(temp.path(), "user-1", &sample()).unwrap();
        assert_eq!(path.file_name().unwrap(), "user-1_embeddings.json");

        let back = read_artifact(&path).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_user_id_is_sanitized_in_filename() {
        let temp = TempDir::new().unwrap();
        let path = write_artifact(temp.path(), "users/../evil", &sample()).unwrap();
        assert_eq!(path.file_name().unwrap(), "users____evil_embeddings.json");
        assert_eq!(path.parent().unwrap(), temp.path());
    }

    #[test]
    fn test_empty_artifact_is_valid() {
        let temp = TempDir::new().unwrap();
        let path = write_artifact(temp.path(), "user-2", &[]).unwrap();
        assert!(read_artifact(&path).unwrap().is_empty());
    }
}
