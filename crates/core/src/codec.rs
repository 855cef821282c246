//! Duplex codec that synthesizes an echo reference channel in software.
//!
//! Speaker and microphone run as two independent simplex transports, so the
//! hardware cannot hand back what was played. `ReferenceCodec` archives every
//! played batch and splices it into the captured frame as an extra channel,
//! which is what a downstream AEC stage needs to subtract the echo.

use crate::assembler::{assemble, FrameLayout};
use crate::config::CodecConfig;
use crate::error::CodecError;
use crate::reference::ReferenceBuffer;
use crate::scaler::{downscale_into, scale_into};
use crate::transport::{InputTransport, OutputTransport, TransportError};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Capability surface the application drives, whatever the hardware variant.
pub trait AudioCodec: Send + Sync {
    /// Plays `samples`. Returns how many were accepted, 0 when output is off.
    fn write(&self, samples: &[i16]) -> Result<usize, CodecError>;
    /// Fills `dest` with interleaved groups. Returns the number of slots filled.
    fn read(&self, dest: &mut [i16]) -> Result<usize, CodecError>;

    fn output_volume(&self) -> u8;
    fn set_output_volume(&self, volume: u8);

    fn enable_input(&self, enable: bool);
    fn enable_output(&self, enable: bool);
    fn input_enabled(&self) -> bool;
    fn output_enabled(&self) -> bool;

    fn input_sample_rate(&self) -> u32;
    fn output_sample_rate(&self) -> u32;
    /// Slots per captured group, reference slot included.
    fn input_channels(&self) -> usize;
    /// Whether the reference slot carries played audio.
    fn input_reference(&self) -> bool;
}

/// Snapshot of the codec counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodecStats {
    pub samples_written: u64,
    pub slots_read: u64,
    pub short_reads: u64,
    pub transport_errors: u64,
    /// Reference samples discarded because the backlog was full.
    pub reference_overflow: u64,
    /// Reference samples waiting to be spliced into a frame.
    pub reference_pending: usize,
}

#[derive(Default)]
struct Counters {
    samples_written: AtomicU64,
    slots_read: AtomicU64,
    short_reads: AtomicU64,
    transport_errors: AtomicU64,
}

struct OutputPath<O> {
    transport: O,
    words: Vec<i32>,
}

struct InputPath<I> {
    transport: I,
    words: Vec<i32>,
    pcm: Vec<i16>,
}

pub struct ReferenceCodec<O, I> {
    config: CodecConfig,
    layout: FrameLayout,
    io_timeout: Duration,
    output: Mutex<OutputPath<O>>,
    input: Mutex<InputPath<I>>,
    // Only state shared by the playback and capture paths. Never held
    // across a transport call.
    reference: Option<Mutex<ReferenceBuffer>>,
    output_volume: AtomicU8,
    input_enabled: AtomicBool,
    output_enabled: AtomicBool,
    counters: Counters,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn scratch<T: Copy + Default>(buf: &mut Vec<T>, len: usize) -> &mut [T] {
    if buf.len() < len {
        buf.resize(len, T::default());
    }
    &mut buf[..len]
}

impl<O: OutputTransport, I: InputTransport> ReferenceCodec<O, I> {
    /// Builds a codec over the two transport halves. Both paths start enabled.
    pub fn new(config: CodecConfig, output: O, input: I) -> Result<Self, CodecError> {
        config.validate()?;
        let layout = config.layout();

        let reference = config
            .input_reference
            .then(|| Mutex::new(ReferenceBuffer::new(config.reference_capacity)));

        // Pre-size scratch buffers for a nominal frame to avoid allocating on the audio path
        let frame = crate::constants::FRAME_SIZE;
        let mic_words = frame * layout.mic_channels;

        info!(
            "Reference codec: in {}Hz x{} mic, out {}Hz, reference {}",
            config.input_sample_rate,
            layout.mic_channels,
            config.output_sample_rate,
            if config.input_reference {
                "synthesized"
            } else if config.reference_slot {
                "silent"
            } else {
                "absent"
            }
        );

        Ok(Self {
            layout,
            io_timeout: config.io_timeout(),
            output: Mutex::new(OutputPath {
                transport: output,
                words: vec![0; frame],
            }),
            input: Mutex::new(InputPath {
                transport: input,
                words: vec![0; mic_words],
                pcm: vec![0; mic_words],
            }),
            reference,
            output_volume: AtomicU8::new(config.output_volume),
            input_enabled: AtomicBool::new(true),
            output_enabled: AtomicBool::new(true),
            counters: Counters::default(),
            config,
        })
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    pub fn stats(&self) -> CodecStats {
        let (reference_overflow, reference_pending) = match &self.reference {
            Some(reference) => {
                let buffer = lock(reference);
                (buffer.overflowed(), buffer.len())
            }
            None => (0, 0),
        };
        CodecStats {
            samples_written: self.counters.samples_written.load(Ordering::Relaxed),
            slots_read: self.counters.slots_read.load(Ordering::Relaxed),
            short_reads: self.counters.short_reads.load(Ordering::Relaxed),
            transport_errors: self.counters.transport_errors.load(Ordering::Relaxed),
            reference_overflow,
            reference_pending,
        }
    }

    fn transport_failed(&self, direction: &str, err: TransportError) -> CodecError {
        self.counters.transport_errors.fetch_add(1, Ordering::Relaxed);
        warn!("Audio {} failed: {}", direction, err);
        CodecError::Transport(err)
    }
}

impl<O: OutputTransport, I: InputTransport> AudioCodec for ReferenceCodec<O, I> {
    fn write(&self, samples: &[i16]) -> Result<usize, CodecError> {
        if !self.output_enabled() {
            return Ok(0);
        }
        if self.reference.is_some() && samples.len() > self.config.reference_capacity {
            return Err(CodecError::BatchTooLarge {
                len: samples.len(),
                capacity: self.config.reference_capacity,
            });
        }
        if samples.is_empty() {
            return Ok(0);
        }

        let volume = self.output_volume();
        let mut output = lock(&self.output);
        let OutputPath { transport, words } = &mut *output;
        let words = scratch(words, samples.len());
        scale_into(samples, volume, words);

        let sent = transport
            .send(words, self.io_timeout)
            .map_err(|e| self.transport_failed("write", e))?
            .min(samples.len());

        // Archive while still holding the output path so batches stay in play order.
        // Only what actually reached the speaker can echo back.
        if let Some(reference) = &self.reference {
            lock(reference).append(&samples[..sent]);
        }

        self.counters
            .samples_written
            .fetch_add(sent as u64, Ordering::Relaxed);
        Ok(sent)
    }

    fn read(&self, dest: &mut [i16]) -> Result<usize, CodecError> {
        if !self.input_enabled() {
            return Ok(0);
        }
        let groups = self.layout.groups_for(dest.len())?;
        if groups == 0 {
            return Ok(0);
        }
        let wanted = groups * self.layout.mic_channels;

        let mut input = lock(&self.input);
        let InputPath {
            transport,
            words,
            pcm,
        } = &mut *input;
        let words = scratch(words, wanted);
        let received = transport
            .receive(words, self.io_timeout)
            .map_err(|e| self.transport_failed("read", e))?
            .min(wanted);

        let pcm = scratch(pcm, received);
        downscale_into(&words[..received], self.config.capture_shift, pcm);

        let written = match &self.reference {
            Some(reference) => {
                let mut buffer = lock(reference);
                assemble(dest, pcm, self.layout, Some(&mut *buffer))
            }
            None => assemble(dest, pcm, self.layout, None),
        };

        if written < dest.len() {
            self.counters.short_reads.fetch_add(1, Ordering::Relaxed);
            debug!(
                "Short capture: {} of {} microphone samples, {} of {} slots filled",
                received,
                wanted,
                written,
                dest.len()
            );
        }
        self.counters
            .slots_read
            .fetch_add(written as u64, Ordering::Relaxed);
        Ok(written)
    }

    fn output_volume(&self) -> u8 {
        self.output_volume.load(Ordering::Relaxed)
    }

    fn set_output_volume(&self, volume: u8) {
        let volume = volume.min(100);
        self.output_volume.store(volume, Ordering::Relaxed);
        info!("Set output volume to {}", volume);
    }

    fn enable_input(&self, enable: bool) {
        if self.input_enabled.swap(enable, Ordering::Relaxed) != enable {
            info!("Set input enable to {}", enable);
        }
    }

    fn enable_output(&self, enable: bool) {
        if self.output_enabled.swap(enable, Ordering::Relaxed) != enable {
            info!("Set output enable to {}", enable);
        }
    }

    fn input_enabled(&self) -> bool {
        self.input_enabled.load(Ordering::Relaxed)
    }

    fn output_enabled(&self) -> bool {
        self.output_enabled.load(Ordering::Relaxed)
    }

    fn input_sample_rate(&self) -> u32 {
        self.config.input_sample_rate
    }

    fn output_sample_rate(&self) -> u32 {
        self.config.output_sample_rate
    }

    fn input_channels(&self) -> usize {
        self.layout.group_width()
    }

    fn input_reference(&self) -> bool {
        self.reference.is_some()
    }
}
