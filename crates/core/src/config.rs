use crate::assembler::FrameLayout;
use crate::constants::{
    DEFAULT_CAPTURE_SHIFT, DEFAULT_INPUT_SAMPLE_RATE, DEFAULT_IO_TIMEOUT_MS,
    DEFAULT_OUTPUT_SAMPLE_RATE, DEFAULT_OUTPUT_VOLUME, DEFAULT_REFERENCE_CAPACITY,
    MIN_SAMPLE_RATE,
};
use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Construction-time settings for a [`crate::codec::ReferenceCodec`].
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CodecConfig {
    #[serde(default = "default_input_sample_rate")]
    pub input_sample_rate: u32,
    #[serde(default = "default_output_sample_rate")]
    pub output_sample_rate: u32,
    #[serde(default = "default_mic_channels")]
    pub mic_channels: usize,
    /// Frame topology: whether each group carries a reference slot.
    #[serde(default = "default_true")]
    pub reference_slot: bool,
    /// Whether played audio is archived and replayed into the reference slot.
    #[serde(default = "default_true")]
    pub input_reference: bool,
    #[serde(default = "default_reference_capacity")]
    pub reference_capacity: usize,
    #[serde(default = "default_output_volume")]
    pub output_volume: u8,
    #[serde(default = "default_capture_shift")]
    pub capture_shift: u32,
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,
}

fn default_input_sample_rate() -> u32 {
    DEFAULT_INPUT_SAMPLE_RATE
}

fn default_output_sample_rate() -> u32 {
    DEFAULT_OUTPUT_SAMPLE_RATE
}

fn default_mic_channels() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_reference_capacity() -> usize {
    DEFAULT_REFERENCE_CAPACITY
}

fn default_output_volume() -> u8 {
    DEFAULT_OUTPUT_VOLUME
}

fn default_capture_shift() -> u32 {
    DEFAULT_CAPTURE_SHIFT
}

fn default_io_timeout_ms() -> u64 {
    DEFAULT_IO_TIMEOUT_MS
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: default_input_sample_rate(),
            output_sample_rate: default_output_sample_rate(),
            mic_channels: default_mic_channels(),
            reference_slot: true,
            input_reference: true,
            reference_capacity: default_reference_capacity(),
            output_volume: default_output_volume(),
            capture_shift: default_capture_shift(),
            io_timeout_ms: default_io_timeout_ms(),
        }
    }
}

impl CodecConfig {
    /// Mono microphone without any reference slot.
    pub fn simplex() -> Self {
        Self {
            reference_slot: false,
            input_reference: false,
            ..Self::default()
        }
    }

    pub fn layout(&self) -> FrameLayout {
        FrameLayout::new(self.mic_channels, self.reference_slot)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    /// Checks the settings for combinations the codec cannot honour.
    pub fn validate(&self) -> Result<(), CodecError> {
        if self.input_sample_rate < MIN_SAMPLE_RATE || self.output_sample_rate < MIN_SAMPLE_RATE {
            return Err(CodecError::InvalidConfig(format!(
                "sample rates must be at least {}Hz",
                MIN_SAMPLE_RATE
            )));
        }
        if self.mic_channels == 0 {
            return Err(CodecError::InvalidLayout);
        }
        if self.input_reference && !self.reference_slot {
            return Err(invalid("reference synthesis needs a reference slot in the frame"));
        }
        if self.input_reference && self.reference_capacity == 0 {
            return Err(invalid("reference capacity must be non-zero"));
        }
        if self.output_volume > 100 {
            return Err(invalid("output volume is a percentage (0-100)"));
        }
        if self.capture_shift > 31 {
            return Err(invalid("capture shift must be below 32"));
        }
        if self.io_timeout_ms == 0 {
            return Err(invalid("I/O timeout must be non-zero"));
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> CodecError {
    CodecError::InvalidConfig(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = CodecConfig::default();
        assert_eq!(config.input_sample_rate, 16000);
        assert_eq!(config.reference_capacity, 1920);
        assert_eq!(config.output_volume, 70);
        assert_eq!(config.capture_shift, 12);
        assert!(config.input_reference);
        assert_eq!(config.layout().group_width(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_simplex_layout() {
        let config = CodecConfig::simplex();
        assert_eq!(config.layout().group_width(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_deserialization_with_defaults() {
        let json = r#"{"output_sample_rate":24000,"input_reference":false}"#;
        let config: CodecConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.output_sample_rate, 24000);
        assert_eq!(config.input_sample_rate, 16000); // Default
        assert!(!config.input_reference);
        assert!(config.reference_slot); // Default
    }

    #[test]
    fn test_validate_rejects_bad_combinations() {
        let no_slot = CodecConfig {
            reference_slot: false,
            ..CodecConfig::default()
        };
        assert!(matches!(no_slot.validate(), Err(CodecError::InvalidConfig(_))));

        let no_mic = CodecConfig {
            mic_channels: 0,
            ..CodecConfig::default()
        };
        assert!(matches!(no_mic.validate(), Err(CodecError::InvalidLayout)));

        let loud = CodecConfig {
            output_volume: 101,
            ..CodecConfig::default()
        };
        assert!(loud.validate().is_err());

        let no_timeout = CodecConfig {
            io_timeout_ms: 0,
            ..CodecConfig::default()
        };
        assert!(no_timeout.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_sub_frame_rates() {
        for rate in [0, 10, 50, 99] {
            let slow_mic = CodecConfig {
                input_sample_rate: rate,
                ..CodecConfig::default()
            };
            assert!(matches!(slow_mic.validate(), Err(CodecError::InvalidConfig(_))));

            let slow_speaker = CodecConfig {
                output_sample_rate: rate,
                ..CodecConfig::default()
            };
            assert!(matches!(
                slow_speaker.validate(),
                Err(CodecError::InvalidConfig(_))
            ));
        }

        let lowest = CodecConfig {
            input_sample_rate: 100,
            output_sample_rate: 100,
            ..CodecConfig::default()
        };
        assert!(lowest.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_allowed_without_reference() {
        let config = CodecConfig {
            input_reference: false,
            reference_capacity: 0,
            ..CodecConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
