use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;

use meeting_capture_core::{
    CaptureError, FileUploadHandoff, Notice, RecordingResult, RecordingSession, SessionConfiguration, SessionDelegate,
    SessionState, TickerMode,
};
use meeting_capture_soft::{PcmRecorder, SineTone, SoftPlatform};

/// Record a synthetic meeting (tab audio plus microphone) and store it as WAV.
#[derive(Parser, Debug)]
#[command(name = "meeting-capture-demo", version, about)]
struct Args {
    /// Recording length in seconds
    #[arg(short, long, default_value_t = 5)]
    duration: u64,

    /// Directory the recording and its metadata are written to
    #[arg(short, long, default_value = "recordings")]
    output: PathBuf,

    /// Recording title (a dated default is used when empty)
    #[arg(short, long, default_value = "")]
    title: String,

    /// JSON session configuration; missing fields take their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// System (tab) volume in percent
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    system_volume: Option<u8>,

    /// Microphone volume in percent
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    mic_volume: Option<u8>,

    /// Microphone device id
    #[arg(long)]
    device: Option<String>,

    /// Decline the microphone prompt
    #[arg(long)]
    no_mic: bool,

    /// Leave "share audio" unticked in the sharing prompt
    #[arg(long)]
    no_share_audio: bool,

    /// Stop sharing from the platform side after this many seconds
    #[arg(long)]
    revoke_after: Option<u64>,
}

struct LogDelegate;

impl SessionDelegate for LogDelegate {
    fn on_state_changed(&self, state: &SessionState) {
        match state {
            SessionState::Recording { elapsed_ms, mode } => {
                log::info!("recording {:?}: {}s", mode, elapsed_ms / 1000)
            }
            other => log::info!("state: {}", other.name()),
        }
    }

    fn on_notice(&self, notice: &Notice) {
        eprintln!("note: {}", notice);
    }

    fn on_error(&self, error: &CaptureError) {
        eprintln!("error: {}", error);
    }

    fn on_recording_finished(&self, result: &RecordingResult) {
        log::info!(
            "finished: {} bytes, {} ms, {:?}",
            result.blob.len(),
            result.elapsed_ms,
            result.stop_cause
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SessionConfiguration::load(path)?,
        None => SessionConfiguration::default(),
    };
    config.ticker = TickerMode::Background;
    if let Some(volume) = args.system_volume {
        config.initial_system_volume = volume;
    }
    if let Some(volume) = args.mic_volume {
        config.initial_mic_volume = volume;
    }

    let platform = SoftPlatform::new();
    platform.set_mic_grant(!args.no_mic);
    platform.set_share_audio(!args.no_share_audio);

    let recorder = PcmRecorder::new(config.sample_rate.round() as u32, config.channels);
    let session = RecordingSession::new(platform.display_capture(), platform.microphone(), recorder, config)?;
    session.set_delegate(Arc::new(LogDelegate));

    for device in session.refresh_devices()? {
        log::info!("microphone {:?}: {:?}", device.device_id, device.label);
    }
    if let Some(device) = &args.device {
        session.select_device(Some(device))?;
    }

    let mut feed = platform.start_feeding(
        SineTone::new(440.0, 0.4, 48000.0, 2),
        SineTone::new(220.0, 0.3, 48000.0, 1),
        Duration::from_millis(20),
    )?;

    let mode = session.start()?;
    println!("Recording {:?} for {}s", mode, args.duration);

    let started = Instant::now();
    let deadline = Duration::from_secs(args.duration);
    let revoke_at = args.revoke_after.map(Duration::from_secs);
    while session.state().is_recording() && started.elapsed() < deadline {
        if revoke_at.is_some_and(|at| started.elapsed() >= at) {
            platform.revoke_share();
        }
        thread::sleep(Duration::from_millis(100));
    }

    session.stop()?;
    feed.stop();

    let Some(result) = session.result() else {
        let reason = session
            .last_error()
            .map(|e| e.to_string())
            .unwrap_or_else(|| format!("session ended {}", session.state().name()));
        return Err(reason.into());
    };

    let handoff = FileUploadHandoff::new(&args.output);
    session.hand_off(&handoff, &args.title)?;
    for stored in handoff.stored() {
        println!(
            "Saved {} ({} bytes, {} ms, sha256 {})",
            stored.path.display(),
            result.blob.len(),
            result.elapsed_ms,
            stored.checksum
        );
    }
    Ok(())
}
