use directories::ProjectDirs;
use refmic_core::CodecConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Application configuration for persisting user preferences.
#[derive(Serialize, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_device")]
    pub last_input: String,
    #[serde(default = "default_device")]
    pub last_output: String,
    #[serde(default = "default_tone_hz")]
    pub tone_hz: f32,
    #[serde(default)]
    pub codec: CodecConfig,
}

fn default_device() -> String {
    "default".to_string()
}

fn default_tone_hz() -> f32 {
    440.0
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            last_input: default_device(),
            last_output: default_device(),
            tone_hz: default_tone_hz(),
            codec: CodecConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from disk, or returns default if not found.
    pub fn load() -> Self {
        if let Some(path) = config_path() {
            if let Ok(content) = fs::read_to_string(path) {
                if let Ok(cfg) = serde_json::from_str(&content) {
                    return cfg;
                }
            }
        }
        Self::default()
    }

    /// Saves configuration to disk in JSON format.
    pub fn save(&self) {
        if let Some(path) = config_path() {
            if let Some(parent) = path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            if let Ok(json) = serde_json::to_string_pretty(self) {
                let _ = fs::write(path, json);
            }
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "refmic", "refmic").map(|dirs| dirs.config_dir().join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = AppConfig::default();
        assert_eq!(config.last_input, "default");
        assert_eq!(config.tone_hz, 440.0);
        assert!(config.codec.input_reference);
        assert_eq!(config.codec.output_volume, 70);
    }

    #[test]
    fn test_config_deserialization_with_defaults() {
        // Minimal JSON - should fill in defaults
        let json = r#"{"last_input":"Mic","codec":{"output_volume":40}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.last_input, "Mic");
        assert_eq!(config.last_output, "default"); // Default
        assert_eq!(config.tone_hz, 440.0); // Default
        assert_eq!(config.codec.output_volume, 40);
        assert_eq!(config.codec.reference_capacity, 1920); // Default
    }

    #[test]
    fn test_config_roundtrip() {
        let original = AppConfig {
            last_input: "Input".to_string(),
            last_output: "Output".to_string(),
            tone_hz: 1000.0,
            codec: CodecConfig {
                output_sample_rate: 24000,
                input_reference: false,
                ..CodecConfig::default()
            },
        };

        let json = serde_json::to_string(&original).unwrap();
        assert!(json.contains("\"output_sample_rate\":24000"));
        let restored: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(original.last_output, restored.last_output);
        assert_eq!(original.tone_hz, restored.tone_hz);
        assert_eq!(original.codec, restored.codec);
    }

    #[test]
    fn test_config_path_exists() {
        // Should return Some path on most systems
        assert!(config_path().is_some());
    }
}
