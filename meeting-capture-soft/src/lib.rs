//! # meeting-capture-soft
//!
//! In-process capture backend for meeting-capture-core.
//!
//! Provides:
//! - `SoftPlatform`: a scriptable host that answers the screen-sharing and
//!   microphone prompts, lists devices, and revokes sharing on demand
//! - `SoftDisplayCapture` / `SoftMicrophone`: the capability handles it issues
//! - `PcmRecorder`: a recorder that emits streaming 16-bit PCM WAV slices
//! - `SineTone`: phase-continuous test signal generator
//!
//! ## Usage
//! ```ignore
//! use meeting_capture_core::{RecordingSession, SessionConfiguration};
//! use meeting_capture_soft::{PcmRecorder, SoftPlatform};
//!
//! let platform = SoftPlatform::new();
//! let session = RecordingSession::new(
//!     platform.display_capture(),
//!     platform.microphone(),
//!     PcmRecorder::new(48000, 2),
//!     SessionConfiguration::default(),
//! )?;
//! session.start()?;
//! ```

pub mod platform;
pub mod recorder;
pub mod tone;
pub mod wav;

pub use platform::{FeedHandle, SoftDisplayCapture, SoftMicrophone, SoftPlatform, TrackOrigin};
pub use recorder::{PcmRecorder, WAV_MIME_TYPE};
pub use tone::SineTone;
pub use wav::{WavError, WavSpec};
