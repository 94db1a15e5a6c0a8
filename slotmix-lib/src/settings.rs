//! Tunables for the rodio backend.

use serde::{Deserialize, Serialize};

const DEFAULT_OPEN_RETRIES: u32 = 20;
const DEFAULT_OPEN_RETRY_MS: u64 = 100;
const DEFAULT_CONTROL_REFRESH_FRAMES: usize = 64;

/// Serialized configuration for [`crate::RodioBackend`].
///
/// Missing fields fall back to their defaults, so `{}` is a valid document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Attempts at opening the default output device before giving up.
    #[serde(alias = "retries")]
    pub open_retries: u32,
    /// Pause between two open attempts.
    #[serde(alias = "retry_ms")]
    pub open_retry_ms: u64,
    /// Frames the audio thread renders between two reads of the shared
    /// per-sound controls (volume, pan, loop, fade, seek requests).
    #[serde(alias = "refresh_frames")]
    pub control_refresh_frames: usize,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            open_retries: DEFAULT_OPEN_RETRIES,
            open_retry_ms: DEFAULT_OPEN_RETRY_MS,
            control_refresh_frames: DEFAULT_CONTROL_REFRESH_FRAMES,
        }
    }
}

impl BackendSettings {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Refresh interval with a floor of one frame.
    pub fn refresh_frames(&self) -> usize {
        self.control_refresh_frames.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let settings = BackendSettings::from_json("{}").expect("deserialize settings");
        assert_eq!(settings, BackendSettings::default());
        assert_eq!(settings.open_retries, 20);
        assert_eq!(settings.open_retry_ms, 100);
        assert_eq!(settings.control_refresh_frames, 64);
    }

    #[test]
    fn partial_document_and_aliases() {
        let json = r#"{ "retries": 3, "refresh_frames": 0 }"#;
        let settings = BackendSettings::from_json(json).expect("deserialize settings");
        assert_eq!(settings.open_retries, 3);
        assert_eq!(settings.open_retry_ms, 100);
        assert_eq!(settings.refresh_frames(), 1);
    }

    #[test]
    fn pretty_json_reads_back() {
        let json = BackendSettings::default()
            .to_json_pretty()
            .expect("serialize settings");
        assert!(json.contains("\"control_refresh_frames\": 64"));
        assert_eq!(
            BackendSettings::from_json(&json).expect("deserialize settings"),
            BackendSettings::default()
        );
    }
}
