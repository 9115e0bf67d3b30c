use crate::models::audio_models::Volumes;
use crate::models::error::CaptureError;
use crate::models::media::MediaStream;
use crate::processing::audio_graph::{AudioContext, GainNode, GraphFormat};

/// Two-input mix of system and microphone audio with live per-source gain.
///
/// Either fully wired or not built at all: if any construction step fails the
/// context is closed before the error is returned. Gain nodes belong to this
/// graph and stop accepting changes once it is closed.
#[derive(Clone)]
pub struct MixingGraph {
    context: AudioContext,
    system_gain: GainNode,
    mic_gain: GainNode,
    output: MediaStream,
}

impl MixingGraph {
    /// Build `system → gain ─┐ / mic → gain ─┴→ destination`.
    ///
    /// Any failure is reported as `MixingUnavailable`; the caller falls back to system audio.
    pub fn build(
        system: &MediaStream,
        mic: &MediaStream,
        volumes: Volumes,
        format: GraphFormat,
    ) -> Result<Self, CaptureError> {
        let context = AudioContext::new(format).map_err(mixing_unavailable)?;

        match Self::wire(&context, system, mic, volumes) {
            Ok((system_gain, mic_gain)) => {
                log::info!(
                    "Mixing graph built at {} Hz (system {}%, mic {}%)",
                    format.sample_rate,
                    volumes.system,
                    volumes.mic
                );
                Ok(Self {
                    output: context.destination_stream(),
                    context,
                    system_gain,
                    mic_gain,
                })
            }
            Err(e) => {
                context.close();
                Err(mixing_unavailable(e))
            }
        }
    }

    fn wire(
        context: &AudioContext,
        system: &MediaStream,
        mic: &MediaStream,
        volumes: Volumes,
    ) -> Result<(GainNode, GainNode), CaptureError> {
        let system_source = context.create_media_stream_source(system)?;
        let mic_source = context.create_media_stream_source(mic)?;
        let system_gain = context.create_gain(volumes.system_gain())?;
        let mic_gain = context.create_gain(volumes.mic_gain())?;

        // System audio is connected first so it clocks the render cycle.
        context.connect(system_source, &system_gain)?;
        context.connect(mic_source, &mic_gain)?;
        Ok((system_gain, mic_gain))
    }

    /// The mixed stream fed to the recorder.
    pub fn output(&self) -> &MediaStream {
        &self.output
    }

    pub fn is_live(&self) -> bool {
        !self.context.is_closed()
    }

    /// Set the system gain in `[0.0, 1.0]`. Applies on the next render cycle.
    pub fn set_system_gain(&self, gain: f32) -> Result<(), CaptureError> {
        self.ensure_live()?;
        self.system_gain.set_value(gain.clamp(0.0, 1.0));
        Ok(())
    }

    /// Set the microphone gain in `[0.0, 1.0]`. Applies on the next render cycle.
    pub fn set_mic_gain(&self, gain: f32) -> Result<(), CaptureError> {
        self.ensure_live()?;
        self.mic_gain.set_value(gain.clamp(0.0, 1.0));
        Ok(())
    }

    pub fn system_gain(&self) -> f32 {
        self.system_gain.value()
    }

    pub fn mic_gain(&self) -> f32 {
        self.mic_gain.value()
    }

    pub fn render_cycles(&self) -> u64 {
        self.context.render_cycles()
    }

    /// Tear the graph down. Idempotent.
    pub fn close(&self) {
        self.context.close();
    }

    fn ensure_live(&self) -> Result<(), CaptureError> {
        if self.is_live() {
            Ok(())
        } else {
            Err(CaptureError::InvalidState("mixing graph has been torn down".into()))
        }
    }
}

fn mixing_unavailable(e: CaptureError) -> CaptureError {
    match e {
        CaptureError::MixingUnavailable(_) => e,
        other => CaptureError::MixingUnavailable(other.to_string()),
    }
}
