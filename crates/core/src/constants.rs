//! Shared constants for the refmic duplex engine.

/// Default microphone sample rate (16kHz)
pub const DEFAULT_INPUT_SAMPLE_RATE: u32 = 16000;

/// Default speaker sample rate (16kHz)
pub const DEFAULT_OUTPUT_SAMPLE_RATE: u32 = 16000;

/// Lowest sample rate where a 10ms frame still holds a sample
pub const MIN_SAMPLE_RATE: u32 = 100;

/// Nominal frame size in samples (60ms at 16kHz)
pub const FRAME_SIZE: usize = 960;

/// Default reference backlog: two nominal frames
pub const DEFAULT_REFERENCE_CAPACITY: usize = FRAME_SIZE * 2;

/// Right shift taking a 32-bit capture word down to 16-bit PCM
pub const DEFAULT_CAPTURE_SHIFT: u32 = 12;

/// Output volume in percent at power-up
pub const DEFAULT_OUTPUT_VOLUME: u8 = 70;

/// Upper bound on any single blocking transport call
pub const DEFAULT_IO_TIMEOUT_MS: u64 = 100;

/// Unity gain of the quadratic volume law (16.16 fixed point)
pub const UNITY_GAIN: i64 = 1 << 16;
