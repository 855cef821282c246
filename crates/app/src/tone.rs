use std::f32::consts::TAU;

/// Peak amplitude of the test tone (about -6 dBFS)
const TONE_AMPLITUDE: f32 = 16384.0;

/// Continuous sine generator for the playback path.
pub struct ToneGenerator {
    phase: f32,
    step: f32,
}

impl ToneGenerator {
    pub fn new(frequency_hz: f32, sample_rate: u32) -> Self {
        Self {
            phase: 0.0,
            step: TAU * frequency_hz / sample_rate as f32,
        }
    }

    pub fn fill(&mut self, samples: &mut [i16]) {
        for sample in samples.iter_mut() {
            *sample = (self.phase.sin() * TONE_AMPLITUDE) as i16;
            self.phase = (self.phase + self.step) % TAU;
        }
    }
}
