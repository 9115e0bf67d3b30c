use crate::models::audio_models::DeviceEntry;
use crate::models::capability::{DeviceKind, MediaDeviceInfo, MicrophoneRequest};
use crate::models::notice::Notice;
use crate::traits::capture_provider::LocalInputCapture;

/// Selectable microphones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceCatalog {
    devices: Vec<DeviceEntry>,
}

/// What a refresh produced. A failed refresh is a warning, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRefresh {
    pub catalog: DeviceCatalog,
    pub warning: Option<Notice>,
}

impl DeviceCatalog {
    pub fn new(devices: Vec<DeviceEntry>) -> Self {
        Self { devices }
    }

    /// Re-list microphones with labels.
    ///
    /// Labels only appear after a grant has been observed, so this opens a
    /// throwaway microphone grant, enumerates, and stops the throwaway tracks
    /// before returning.
    pub fn refresh<L: LocalInputCapture + ?Sized>(input: &L) -> CatalogRefresh {
        let probe = match input.request_microphone(&MicrophoneRequest::permission_probe()) {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("Microphone permission probe failed, continuing without a device list: {}", e);
                return CatalogRefresh {
                    catalog: Self::default(),
                    warning: Some(Notice::DeviceCatalogUnavailable { reason: e.to_string() }),
                };
            }
        };

        let listed = input.enumerate_devices();
        probe.stop_all();

        match listed {
            Ok(devices) => {
                let catalog = Self::from_platform(&devices);
                log::info!("Found {} microphone(s)", catalog.len());
                CatalogRefresh { catalog, warning: None }
            }
            Err(e) => {
                log::warn!("Device enumeration failed: {}", e);
                CatalogRefresh {
                    catalog: Self::default(),
                    warning: Some(Notice::DeviceCatalogUnavailable { reason: e.to_string() }),
                }
            }
        }
    }

    /// Keep audio inputs only; unlabeled devices get a positional name.
    pub fn from_platform(devices: &[MediaDeviceInfo]) -> Self {
        let devices = devices
            .iter()
            .filter(|d| d.kind == DeviceKind::AudioInput)
            .enumerate()
            .map(|(i, d)| DeviceEntry {
                device_id: d.device_id.clone(),
                label: if d.label.trim().is_empty() {
                    format!("Microphone {}", i + 1)
                } else {
                    d.label.clone()
                },
            })
            .collect();
        Self { devices }
    }

    pub fn devices(&self) -> &[DeviceEntry] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.devices.iter().any(|d| d.device_id == device_id)
    }

    /// The device to open for `selected`: itself if still listed, else the first entry.
    ///
    /// Returns None when the catalog is empty (use the platform default).
    pub fn resolve(&self, selected: Option<&str>) -> Option<&DeviceEntry> {
        selected
            .and_then(|id| self.devices.iter().find(|d| d.device_id == id))
            .or_else(|| self.devices.first())
    }
}
