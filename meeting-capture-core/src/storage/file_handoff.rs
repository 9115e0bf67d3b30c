use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::models::error::CaptureError;
use crate::models::recording_result::{RecordingBlob, RecordingResult};
use crate::storage::metadata::{self, SidecarRecord};
use crate::traits::upload::UploadHandoff;

const MAX_STEM_LEN: usize = 80;

/// A recording written by [`FileUploadHandoff`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecording {
    pub path: PathBuf,
    pub metadata_path: Option<PathBuf>,
    pub checksum: String,
}

/// Upload handoff that stores recordings in a local directory.
///
/// The blob bytes are written unmodified; the extension comes from the MIME
/// type and the file name from the title. Existing files are never
/// overwritten: a numeric suffix is added instead.
pub struct FileUploadHandoff {
    directory: PathBuf,
    stored: Mutex<Vec<StoredRecording>>,
}

impl FileUploadHandoff {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            stored: Mutex::new(Vec::new()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Everything stored through this handoff, oldest first.
    pub fn stored(&self) -> Vec<StoredRecording> {
        self.stored.lock().clone()
    }

    /// Write `blob` and verify the bytes on disk match it.
    pub fn store(&self, blob: &RecordingBlob, title: &str) -> Result<StoredRecording, CaptureError> {
        if blob.is_empty() {
            return Err(CaptureError::StorageError("refusing to store an empty recording".into()));
        }
        fs::create_dir_all(&self.directory)
            .map_err(|e| CaptureError::StorageError(format!("failed to create directory: {}", e)))?;

        let path = self.unique_path(&file_stem(title), extension_for_mime(&blob.mime_type));
        let mut file = File::create_new(&path)
            .map_err(|e| CaptureError::StorageError(format!("failed to create {}: {}", path.display(), e)))?;
        // From here on a failure must not leave a partial file behind.
        let checksum = match write_verified(&mut file, &path, blob) {
            Ok(checksum) => checksum,
            Err(e) => {
                drop(file);
                discard(&path);
                return Err(e);
            }
        };

        log::info!("Stored {} bytes at {}", blob.len(), path.display());
        let stored = StoredRecording {
            path,
            metadata_path: None,
            checksum,
        };
        self.stored.lock().push(stored.clone());
        Ok(stored)
    }

    fn unique_path(&self, stem: &str, extension: &str) -> PathBuf {
        let mut candidate = self.directory.join(format!("{}.{}", stem, extension));
        let mut n = 2;
        while candidate.exists() {
            candidate = self.directory.join(format!("{}-{}.{}", stem, n, extension));
            n += 1;
        }
        candidate
    }
}

impl UploadHandoff for FileUploadHandoff {
    fn hand_off(&self, blob: &RecordingBlob, title: &str) -> Result<(), CaptureError> {
        self.store(blob, title).map(|_| ())
    }

    /// Store the blob plus a `.metadata.json` sidecar.
    fn hand_off_result(&self, result: &RecordingResult, title: &str) -> Result<(), CaptureError> {
        let stored = self.store(&result.blob, title)?;
        let record = SidecarRecord {
            title: title.to_string(),
            file_name: stored
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            recording: result.metadata.clone(),
        };
        let metadata_path = match metadata::write_sidecar(&record, &stored.path) {
            Ok(path) => path,
            Err(e) => {
                // Roll back the blob so a retried handoff reuses the same name.
                discard(&stored.path);
                self.stored.lock().retain(|s| s.path != stored.path);
                return Err(e);
            }
        };

        let mut recorded = self.stored.lock();
        if let Some(entry) = recorded.iter_mut().find(|s| s.path == stored.path) {
            entry.metadata_path = Some(metadata_path);
        }
        Ok(())
    }
}

/// File extension for a recorder MIME type. Parameters such as `;codecs=opus` are ignored.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    let essence = mime_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match essence.as_str() {
        "audio/wav" | "audio/wave" | "audio/x-wav" | "audio/vnd.wave" => "wav",
        "audio/webm" | "video/webm" => "webm",
        "audio/ogg" | "application/ogg" => "ogg",
        "audio/mp4" | "audio/x-m4a" => "m4a",
        "audio/mpeg" => "mp3",
        "audio/flac" => "flac",
        _ => "bin",
    }
}

/// Filesystem-safe stem derived from a title.
pub fn file_stem(title: &str) -> String {
    let mut stem = String::with_capacity(title.len());
    let mut pending_sep = false;
    for c in title.trim().chars() {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            if pending_sep && !stem.is_empty() {
                stem.push('_');
            }
            pending_sep = false;
            stem.push(c);
        } else {
            pending_sep = true;
        }
        if stem.chars().count() >= MAX_STEM_LEN {
            break;
        }
    }
    if stem.is_empty() {
        "recording".into()
    } else {
        stem
    }
}

fn write_verified(file: &mut File, path: &Path, blob: &RecordingBlob) -> Result<String, CaptureError> {
    file.write_all(&blob.data)
        .map_err(|e| CaptureError::StorageError(format!("write failed: {}", e)))?;
    file.flush().map_err(|e| CaptureError::StorageError(e.to_string()))?;

    let checksum = sha256_file(path)?;
    if checksum != blob.checksum() {
        return Err(CaptureError::StorageError(format!(
            "checksum mismatch after writing {}",
            path.display()
        )));
    }
    Ok(checksum)
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        log::warn!("Could not remove {}: {}", path.display(), e);
    }
}

fn sha256_file(path: &Path) -> Result<String, CaptureError> {
    let data =
        fs::read(path).map_err(|e| CaptureError::StorageError(format!("failed to read file for checksum: {}", e)))?;
    Ok(Sha256::digest(&data).iter().map(|b| format!("{:02x}", b)).collect())
}
