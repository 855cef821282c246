//! Consumer of assembled capture frames.
//!
//! Splits each frame back into microphone and reference, tracks RMS levels
//! and, when playback and capture share a rate, runs the echo canceller on
//! the first microphone channel.

use crate::echo_cancel::{frame_len, EchoCanceller};
use log::{info, warn};
use refmic_core::assembler::FrameLayout;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Levels published for the status line (f32 stored as bits)
#[derive(Default)]
pub struct Levels {
    pub mic_rms: AtomicU32,
    pub reference_rms: AtomicU32,
    pub cleaned_rms: AtomicU32,
    pub frames: AtomicU64,
}

impl Levels {
    pub fn mic(&self) -> f32 {
        f32::from_bits(self.mic_rms.load(Ordering::Relaxed))
    }

    pub fn reference(&self) -> f32 {
        f32::from_bits(self.reference_rms.load(Ordering::Relaxed))
    }

    pub fn cleaned(&self) -> f32 {
        f32::from_bits(self.cleaned_rms.load(Ordering::Relaxed))
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

pub struct FrameMonitor {
    layout: FrameLayout,
    aec: Option<EchoCanceller>,
    mic: Vec<f32>,
    reference: Vec<f32>,
    cleaned: Vec<f32>,
    levels: Arc<Levels>,
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

impl FrameMonitor {
    pub fn new(layout: FrameLayout, input_sample_rate: u32, output_sample_rate: u32) -> Self {
        let aec = if !layout.reference_slot {
            None
        } else if input_sample_rate != output_sample_rate {
            warn!(
                "Echo cancellation skipped: capture {}Hz and playback {}Hz differ",
                input_sample_rate, output_sample_rate
            );
            None
        } else {
            let aec = EchoCanceller::new(input_sample_rate);
            if aec.is_none() {
                warn!("Echo canceller failed to initialize at {}Hz", input_sample_rate);
            } else {
                info!("Echo canceller running at {}Hz", input_sample_rate);
            }
            aec
        };

        let frame = frame_len(input_sample_rate);
        Self {
            layout,
            aec,
            mic: Vec::with_capacity(frame),
            reference: Vec::with_capacity(frame),
            cleaned: vec![0.0; frame],
            levels: Arc::new(Levels::default()),
        }
    }

    pub fn levels(&self) -> Arc<Levels> {
        self.levels.clone()
    }

    /// Splits `frame` into its first microphone channel and its reference slot.
    fn split(&mut self, frame: &[i16]) {
        self.mic.clear();
        self.reference.clear();
        let channels = self.layout.mic_channels;
        for group in frame.chunks_exact(self.layout.group_width()) {
            self.mic.push(f32::from(group[0]) / 32768.0);
            let reference = if self.layout.reference_slot {
                group[channels]
            } else {
                0
            };
            self.reference.push(f32::from(reference) / 32768.0);
        }
    }

    pub fn process(&mut self, frame: &[i16]) {
        self.split(frame);

        let mic_rms = rms(&self.mic);
        let mut cleaned_rms = mic_rms;
        if let Some(aec) = self.aec.as_mut() {
            // Short captures are not a full 10ms frame; AEC3 only takes whole frames
            if self.mic.len() == aec.frame_len() {
                aec.process_frame(&self.mic, &self.reference, &mut self.cleaned);
                cleaned_rms = rms(&self.cleaned);
            }
        }

        self.levels
            .mic_rms
            .store(mic_rms.to_bits(), Ordering::Relaxed);
        self.levels
            .reference_rms
            .store(rms(&self.reference).to_bits(), Ordering::Relaxed);
        self.levels
            .cleaned_rms
            .store(cleaned_rms.to_bits(), Ordering::Relaxed);
        self.levels.frames.fetch_add(1, Ordering::Relaxed);
    }
}
