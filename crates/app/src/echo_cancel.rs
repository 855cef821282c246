//! Downstream echo cancellation fed with the synthesized reference channel.
//!
//! Uses the aec3 crate (Rust port of WebRTC AEC3); refmic only supplies the
//! time-aligned mic/reference pair.

use aec3::voip::VoipAec3;

/// Echo canceller wrapper working on 10ms mono frames
pub struct EchoCanceller {
    aec: VoipAec3,
    output_buffer: Vec<f32>, // Pre-allocated to avoid heap allocation
}

// SAFETY: VoipAec3 holds its processing stages as exclusively owned `Box<dyn Trait>`
// objects without a `Send` bound, which blocks auto-Send. The canceller is moved
// once into the monitor thread and never shared (it is not Sync).
unsafe impl Send for EchoCanceller {}

impl EchoCanceller {
    /// Creates a canceller for `sample_rate`. Returns None if AEC3 initialization fails.
    pub fn new(sample_rate: u32) -> Option<Self> {
        let aec = VoipAec3::builder(sample_rate as usize, 1, 1).build().ok()?;
        Some(Self {
            aec,
            output_buffer: vec![0.0; frame_len(sample_rate)],
        })
    }

    /// Samples per frame the canceller expects.
    pub fn frame_len(&self) -> usize {
        self.output_buffer.len()
    }

    /// Cancels the echo of `speaker_ref` from `mic_input` into `output`.
    ///
    /// Returns `false` when AEC3 rejected the frame and the raw input was copied instead.
    pub fn process_frame(&mut self, mic_input: &[f32], speaker_ref: &[f32], output: &mut [f32]) -> bool {
        self.output_buffer.fill(0.0);

        if let Err(e) = self
            .aec
            .process(mic_input, Some(speaker_ref), false, &mut self.output_buffer)
        {
            log::warn!("AEC error: {:?}", e);
            output.copy_from_slice(mic_input);
            return false;
        }

        output.copy_from_slice(&self.output_buffer);
        true
    }
}

/// 10ms worth of samples at `sample_rate`.
pub fn frame_len(sample_rate: u32) -> usize {
    (sample_rate / 100) as usize
}
