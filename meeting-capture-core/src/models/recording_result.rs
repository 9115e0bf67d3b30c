use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::audio_models::{AudioTrackType, CaptureMode, StopCause};

/// The finished recording: encoded bytes exactly as the recorder produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingBlob {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl RecordingBlob {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// SHA-256 hex digest of the blob bytes.
    pub fn checksum(&self) -> String {
        hex_encode(&Sha256::digest(&self.data))
    }
}

/// Result produced when a session reaches `Complete`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub blob: RecordingBlob,
    pub elapsed_ms: u64,
    pub mode: CaptureMode,
    pub stop_cause: StopCause,
    pub metadata: RecordingMetadata,
}

/// Metadata describing a finished recording.
///
/// Serializable for the JSON sidecar written on handoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub created_at: String,
    pub duration_ms: u64,
    pub mime_type: String,
    pub byte_len: u64,
    pub slice_count: usize,
    pub checksum: String,
    pub sources: Vec<AudioTrackType>,
    pub stop_cause: StopCause,
}

impl RecordingMetadata {
    pub fn describe(
        blob: &RecordingBlob,
        duration_ms: u64,
        slice_count: usize,
        mode: CaptureMode,
        stop_cause: StopCause,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            duration_ms,
            mime_type: blob.mime_type.clone(),
            byte_len: blob.len() as u64,
            slice_count,
            checksum: blob.checksum(),
            sources: mode.sources(),
            stop_cause,
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_sha256_hex() {
        let blob = RecordingBlob {
            data: b"abc".to_vec(),
            mime_type: "audio/wav".into(),
        };
        assert_eq!(
            blob.checksum(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn metadata_lists_sources_for_mode() {
        let blob = RecordingBlob {
            data: vec![1, 2, 3],
            mime_type: "audio/webm".into(),
        };
        let meta = RecordingMetadata::describe(&blob, 6000, 6, CaptureMode::SystemOnly, StopCause::User);

        assert_eq!(meta.sources, vec![AudioTrackType::System]);
        assert_eq!(meta.byte_len, 3);
        assert_eq!(meta.mime_type, "audio/webm");
        assert_eq!(meta.duration_ms, 6000);
    }
}
