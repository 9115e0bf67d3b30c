use std::sync::Arc;
use std::time::Duration;

use crate::models::error::CaptureError;
use crate::models::media::MediaStream;

/// One encoded fragment emitted by a recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSlice {
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// Callback invoked for every slice, in emission order.
pub type SliceCallback = Arc<dyn Fn(EncodedSlice) + Send + Sync + 'static>;

/// Platform encoder bound to a live stream.
///
/// The session never inspects or rewrites the encoded bytes.
pub trait RecorderCapability: Send {
    /// Bind to the stream's audio and start emitting slices of roughly `timeslice` audio each.
    fn start(&mut self, stream: &MediaStream, timeslice: Duration, on_slice: SliceCallback) -> Result<(), CaptureError>;

    /// Stop encoding, emitting any buffered data as a final slice before returning.
    ///
    /// Calling `stop` on a recorder that is not running is a no-op.
    fn stop(&mut self) -> Result<(), CaptureError>;

    fn is_recording(&self) -> bool;
}
