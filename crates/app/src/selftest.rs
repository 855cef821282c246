//! Hardware-free check of the whole playback -> reference -> capture chain.
//!
//! Plays a tone into the in-memory loopback, reads the frames back and checks
//! that every reference slot carries exactly the sample that was played.

use crate::echo_cancel::frame_len;
use crate::monitor::FrameMonitor;
use crate::tone::ToneGenerator;
use anyhow::{bail, Context, Result};
use log::debug;
use refmic_core::loopback;
use refmic_core::{AudioCodec, CodecConfig, CodecStats, ReferenceCodec};

/// Echo path attenuation of the simulated room (12 dB)
const ECHO_SHIFT: u32 = 2;

pub struct SelfTestReport {
    pub frames: usize,
    pub checked_groups: usize,
    pub mismatched_groups: usize,
    pub stats: CodecStats,
    pub mic_rms: f32,
    pub reference_rms: f32,
    pub cleaned_rms: f32,
}

impl SelfTestReport {
    pub fn passed(&self) -> bool {
        self.mismatched_groups == 0 && self.stats.transport_errors == 0
    }
}

pub fn run(config: CodecConfig, frames: usize, tone_hz: f32) -> Result<SelfTestReport> {
    if config.mic_channels != 1 {
        bail!("Self test drives a mono loopback; set mic_channels to 1");
    }
    config.validate().context("Invalid codec configuration")?;
    // The loopback has no clock, so both directions move the same number of samples
    let rate = config.input_sample_rate;
    let batch = frame_len(rate);

    let (tx, rx) = loopback::pair(batch * 4);
    let rx = rx.with_echo_shift(ECHO_SHIFT);
    let codec = ReferenceCodec::new(config, tx, rx).context("Invalid codec configuration")?;
    let layout = codec.layout();
    let synthesized = codec.input_reference();

    let mut monitor = FrameMonitor::new(layout, rate, codec.output_sample_rate());
    let levels = monitor.levels();
    let mut tone = ToneGenerator::new(tone_hz, rate);
    let mut played = vec![0i16; batch];
    let mut frame = vec![0i16; batch * layout.group_width()];

    let mut checked_groups = 0;
    let mut mismatched_groups = 0;
    for index in 0..frames {
        tone.fill(&mut played);
        let sent = codec.write(&played).context("Loopback write failed")?;
        let slots = codec.read(&mut frame).context("Loopback read failed")?;
        debug!("Self test frame {}: sent {}, read {} slots", index, sent, slots);

        if synthesized {
            for (group, &expected) in frame[..slots]
                .chunks_exact(layout.group_width())
                .zip(&played[..sent])
            {
                checked_groups += 1;
                if group[layout.mic_channels] != expected {
                    mismatched_groups += 1;
                }
            }
        }
        monitor.process(&frame[..slots]);
    }

    Ok(SelfTestReport {
        frames,
        checked_groups,
        mismatched_groups,
        stats: codec.stats(),
        mic_rms: levels.mic(),
        reference_rms: levels.reference(),
        cleaned_rms: levels.cleaned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn without_aec(config: CodecConfig) -> CodecConfig {
        // Mismatched device rates keep AEC3 out of the unit tests
        CodecConfig {
            output_sample_rate: config.input_sample_rate * 2,
            ..config
        }
    }

    #[test]
    fn test_reference_matches_playback() {
        let report = run(without_aec(CodecConfig::default()), 20, 440.0).unwrap();
        assert!(report.passed());
        assert_eq!(report.checked_groups, 20 * 160);
        assert_eq!(report.stats.reference_overflow, 0);
        assert_eq!(report.stats.short_reads, 0);
        assert!(report.reference_rms > 0.0);
        assert!(report.mic_rms > 0.0);
    }

    #[test]
    fn test_reference_disabled_checks_nothing() {
        let config = CodecConfig {
            input_reference: false,
            ..CodecConfig::default()
        };
        let report = run(without_aec(config), 5, 440.0).unwrap();
        assert_eq!(report.checked_groups, 0);
        assert_eq!(report.reference_rms, 0.0);
    }

    #[test]
    fn test_sub_frame_rate_rejected() {
        let config = CodecConfig {
            input_sample_rate: 50,
            output_sample_rate: 50,
            ..CodecConfig::default()
        };
        assert!(run(config, 1, 440.0).is_err());
    }

    #[test]
    fn test_multi_mic_rejected() {
        let config = CodecConfig {
            mic_channels: 2,
            ..CodecConfig::default()
        };
        assert!(run(config, 1, 440.0).is_err());
    }
}
