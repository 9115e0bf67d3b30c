use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingMetadata;

/// JSON sidecar stored next to a handed-off recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SidecarRecord {
    pub title: String,
    pub file_name: String,
    #[serde(flatten)]
    pub recording: RecordingMetadata,
}

/// `{stem}.metadata.json` beside the recording.
pub fn sidecar_path(recording_path: &Path) -> PathBuf {
    recording_path.with_extension("metadata.json")
}

pub fn write_sidecar(record: &SidecarRecord, recording_path: &Path) -> Result<PathBuf, CaptureError> {
    let path = sidecar_path(recording_path);
    let json = serde_json::to_string_pretty(record)
        .map_err(|e| CaptureError::StorageError(format!("failed to serialize metadata: {}", e)))?;
    fs::write(&path, json).map_err(|e| CaptureError::StorageError(format!("failed to write metadata: {}", e)))?;
    Ok(path)
}

pub fn read_sidecar(recording_path: &Path) -> Result<SidecarRecord, CaptureError> {
    let json = fs::read_to_string(sidecar_path(recording_path))
        .map_err(|e| CaptureError::StorageError(format!("failed to read metadata: {}", e)))?;
    serde_json::from_str(&json).map_err(|e| CaptureError::StorageError(format!("failed to parse metadata: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_models::{AudioTrackType, CaptureMode, StopCause};
    use crate::models::recording_result::RecordingBlob;

    #[test]
    fn sidecar_sits_beside_recording() {
        assert_eq!(
            sidecar_path(Path::new("/tmp/standup.wav")),
            PathBuf::from("/tmp/standup.metadata.json")
        );
    }

    #[test]
    fn write_then_read_keeps_flattened_fields() {
        let dir = tempfile::tempdir().unwrap();
        let recording = dir.path().join("standup.wav");
        let blob = RecordingBlob {
            data: vec![0; 32],
            mime_type: "audio/wav".into(),
        };
        let record = SidecarRecord {
            title: "Standup".into(),
            file_name: "standup.wav".into(),
            recording: RecordingMetadata::describe(&blob, 6000, 2, CaptureMode::Mixed, StopCause::SourceEnded),
        };

        write_sidecar(&record, &recording).unwrap();

        let json = fs::read_to_string(sidecar_path(&recording)).unwrap();
        assert!(json.contains("\"stop_cause\": \"source-ended\""));
        assert!(json.contains("\"duration_ms\": 6000"));
        let read = read_sidecar(&recording).unwrap();
        assert_eq!(read, record);
        assert_eq!(read.recording.sources, vec![AudioTrackType::System, AudioTrackType::Mic]);
    }

    #[test]
    fn missing_sidecar_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_sidecar(&dir.path().join("nothing.wav")).unwrap_err();
        assert!(matches!(err, CaptureError::StorageError(_)));
    }
}
