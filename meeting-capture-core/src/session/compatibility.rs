use crate::models::capability::EnvironmentInfo;

/// Outcome of the pre-permission environment check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compatibility {
    Supported,
    Unsupported { reason: String },
}

impl Compatibility {
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Supported)
    }
}

/// Decides whether shared-screen audio capture can work here at all.
///
/// Read-only: never prompts and never touches a device.
#[derive(Debug, Clone)]
pub struct CompatibilityProbe {
    allowed_engines: Vec<String>,
}

impl CompatibilityProbe {
    pub fn new(allowed_engines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            allowed_engines: allowed_engines
                .into_iter()
                .map(|e| e.into().trim().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn check(&self, environment: &EnvironmentInfo) -> Compatibility {
        if !environment.shared_audio_capture {
            return Compatibility::Unsupported {
                reason: "this environment cannot capture shared screen or tab audio; \
                         record with the microphone only, or upload an existing recording instead"
                    .into(),
            };
        }

        let engine = environment.engine.trim().to_ascii_lowercase();
        if !self.allowed_engines.iter().any(|allowed| *allowed == engine) {
            return Compatibility::Unsupported {
                reason: format!(
                    "system audio sharing is only supported on {} engines (found {:?}); \
                     record with the microphone only instead",
                    self.allowed_engines.join(", "),
                    environment.engine
                ),
            };
        }

        Compatibility::Supported
    }
}
