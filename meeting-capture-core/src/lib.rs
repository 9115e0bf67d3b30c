//! # meeting-capture-core
//!
//! Platform-agnostic core for recording a meeting from two sources: the
//! audio of a shared screen, window, or tab, and the local microphone.
//!
//! Provides the environment check, device catalog, dual-stream acquisition,
//! the two-input mixing graph, resource cleanup, and the recording session
//! state machine. Backends implement the capability traits in [`traits`] and
//! plug into the generic [`RecordingSession`].
//!
//! ## Architecture
//!
//! ```text
//! meeting-capture-core (this crate)
//! ├── traits/       ← SharedSourceCapture, LocalInputCapture, RecorderCapability, SessionDelegate, UploadHandoff
//! ├── models/       ← CaptureError, Notice, SessionState, SessionConfiguration, MediaStream, etc.
//! ├── processing/   ← FrameBuffer, sample conversion, software audio graph
//! ├── session/      ← CompatibilityProbe, DeviceCatalog, DualStreamAcquirer, MixingGraph, RecordingSession
//! └── storage/      ← FileUploadHandoff, metadata sidecar
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{AudioTrackType, CaptureMode, DeviceEntry, StopCause, Volumes};
pub use models::capability::{
    AudioProcessing, DeviceKind, DisplayMediaRequest, EchoCancellation, EnvironmentInfo, MediaDeviceInfo,
    MicrophoneRequest,
};
pub use models::config::{SessionConfiguration, TickerMode};
pub use models::error::CaptureError;
pub use models::media::{AudioBufferCallback, MediaStream, MediaTrack, TrackKind};
pub use models::notice::Notice;
pub use models::recording_result::{RecordingBlob, RecordingMetadata, RecordingResult};
pub use models::state::SessionState;
pub use processing::audio_graph::{AudioContext, GainNode, GraphFormat};
pub use processing::ring_buffer::FrameBuffer;
pub use session::acquirer::DualStreamAcquirer;
pub use session::cleanup::{ResourceScope, SessionResources};
pub use session::compatibility::{Compatibility, CompatibilityProbe};
pub use session::device_catalog::{CatalogRefresh, DeviceCatalog};
pub use session::mixing::MixingGraph;
pub use session::recording::RecordingSession;
pub use session::slot::RecordingSlot;
pub use session::ticker::{Ticker, TickerHandle};
pub use storage::file_handoff::{FileUploadHandoff, StoredRecording};
pub use traits::capture_delegate::SessionDelegate;
pub use traits::capture_provider::{LocalInputCapture, SharedSourceCapture};
pub use traits::recorder::{EncodedSlice, RecorderCapability, SliceCallback};
pub use traits::upload::UploadHandoff;
