use crate::monitor::{FrameMonitor, Levels};
use crate::tone::ToneGenerator;
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, TrySendError};
use log::{info, warn};
use refmic_core::{
    AudioCodec, CodecConfig, CodecError, InputTransport, OutputTransport, ReferenceCodec,
    TransportError,
};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_micros(200);

/// Speaker half of the cpal transport: words go into a ring drained by the output stream.
pub struct CpalOutput {
    prod: HeapProd<f32>,
    fault: Arc<AtomicBool>,
}

/// Microphone half of the cpal transport: the input stream fills a ring we poll.
pub struct CpalInput {
    cons: HeapCons<f32>,
    fault: Arc<AtomicBool>,
    full_scale: f32,
}

impl CpalInput {
    /// `capture_shift` is the shift the codec applies afterwards, so a full
    /// scale float ends up as full scale 16-bit PCM.
    fn new(cons: HeapCons<f32>, fault: Arc<AtomicBool>, capture_shift: u32) -> Self {
        let bits = (15 + capture_shift).min(31);
        Self {
            cons,
            fault,
            full_scale: (1u64 << bits) as f32,
        }
    }
}

fn word_to_float(word: i32) -> f32 {
    word as f32 / 2_147_483_648.0
}

impl OutputTransport for CpalOutput {
    fn send(&mut self, words: &[i32], timeout: Duration) -> Result<usize, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut sent = 0;
        while sent < words.len() {
            if self.fault.load(Ordering::Relaxed) {
                return Err(TransportError::Fault("output stream error".into()));
            }
            sent += self
                .prod
                .push_iter(words[sent..].iter().map(|&word| word_to_float(word)));
            if sent < words.len() {
                if Instant::now() >= deadline {
                    break;
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
        if sent == 0 && !words.is_empty() {
            return Err(TransportError::Timeout(timeout));
        }
        Ok(sent)
    }
}

impl InputTransport for CpalInput {
    fn receive(&mut self, buf: &mut [i32], timeout: Duration) -> Result<usize, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut received = 0;
        while received < buf.len() {
            if self.fault.load(Ordering::Relaxed) {
                return Err(TransportError::Fault("input stream error".into()));
            }
            while received < buf.len() {
                match self.cons.try_pop() {
                    Some(sample) => {
                        buf[received] = (sample.clamp(-1.0, 1.0) * self.full_scale) as i32;
                        received += 1;
                    }
                    None => break,
                }
            }
            if received < buf.len() {
                if Instant::now() >= deadline {
                    break;
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
        if received == 0 && !buf.is_empty() {
            return Err(TransportError::Timeout(timeout));
        }
        Ok(received)
    }
}

pub type CpalCodec = ReferenceCodec<CpalOutput, CpalInput>;

fn find_input(host: &cpal::Host, name: &str) -> Result<cpal::Device> {
    if name == "default" {
        host.default_input_device()
            .context("No default input found")
    } else {
        host.input_devices()?
            .find(|d| d.name().ok().as_deref() == Some(name))
            .context("Input device not found")
    }
}

fn find_output(host: &cpal::Host, name: &str) -> Result<cpal::Device> {
    if name == "default" {
        host.default_output_device()
            .context("No default output found")
    } else {
        host.output_devices()?
            .find(|d| d.name().ok().as_deref() == Some(name))
            .context("Output device not found")
    }
}

/// Live duplex session: a tone is played through the codec while captured
/// frames (mic + synthesized reference) are fed to the monitor.
pub struct DuplexSession {
    _input_stream: cpal::Stream,
    _output_stream: cpal::Stream,
    is_running: Arc<AtomicBool>,
    pub codec: Arc<CpalCodec>,
    pub levels: Arc<Levels>,
}

impl DuplexSession {
    /// Opens both devices and starts the playback, capture and monitor threads.
    pub fn start(
        input_device_name: &str,
        output_device_name: &str,
        config: CodecConfig,
        tone_hz: f32,
    ) -> Result<Self> {
        config.validate().context("Invalid codec configuration")?;

        let host = cpal::default_host();
        info!("Audio host: {}", host.id().name());

        let input_device = find_input(&host, input_device_name)?;
        info!(
            "Using input device: {}",
            input_device.name().unwrap_or_default()
        );
        let output_device = find_output(&host, output_device_name)?;
        info!(
            "Using output device: {}",
            output_device.name().unwrap_or_default()
        );

        let input_config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(config.input_sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let output_config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(config.output_sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        // Latency management (100ms per direction)
        let (mut prod_in, cons_in) =
            HeapRb::<f32>::new(config.input_sample_rate as usize / 10).split();
        let (prod_out, mut cons_out) =
            HeapRb::<f32>::new(config.output_sample_rate as usize / 10).split();

        let input_fault = Arc::new(AtomicBool::new(false));
        let output_fault = Arc::new(AtomicBool::new(false));

        let input_stream = {
            let fault = input_fault.clone();
            input_device.build_input_stream(
                &input_config,
                move |data: &[f32], _| {
                    let _ = prod_in.push_slice(data);
                },
                move |err| {
                    warn!("Input error: {}", err);
                    fault.store(true, Ordering::Relaxed);
                },
                None,
            )?
        };

        let output_stream = {
            let fault = output_fault.clone();
            output_device.build_output_stream(
                &output_config,
                move |data: &mut [f32], _| {
                    let read = cons_out.pop_slice(data);
                    if read < data.len() {
                        for sample in data.iter_mut().skip(read) {
                            *sample = 0.0;
                        }
                    }
                },
                move |err| {
                    warn!("Output error: {}", err);
                    fault.store(true, Ordering::Relaxed);
                },
                None,
            )?
        };

        let output = CpalOutput {
            prod: prod_out,
            fault: output_fault,
        };
        let input = CpalInput::new(cons_in, input_fault, config.capture_shift);
        let codec = Arc::new(
            ReferenceCodec::new(config, output, input).context("Invalid codec configuration")?,
        );

        let is_running = Arc::new(AtomicBool::new(true));
        let (frame_tx, frame_rx) = bounded::<Vec<i16>>(32);

        let monitor = FrameMonitor::new(
            codec.layout(),
            codec.input_sample_rate(),
            codec.output_sample_rate(),
        );
        let levels = monitor.levels();

        spawn_playback(codec.clone(), is_running.clone(), tone_hz)?;
        spawn_capture(codec.clone(), is_running.clone(), move |frame| {
            match frame_tx.try_send(frame) {
                Ok(()) | Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Disconnected(_)) => false,
            }
        })?;
        spawn_monitor(monitor, frame_rx)?;

        input_stream.play()?;
        output_stream.play()?;

        Ok(Self {
            _input_stream: input_stream,
            _output_stream: output_stream,
            is_running,
            codec,
            levels,
        })
    }
}

impl Drop for DuplexSession {
    fn drop(&mut self) {
        self.is_running.store(false, Ordering::Relaxed);
    }
}

/// Producer path: writes 10ms tone batches through the codec.
pub fn spawn_playback<C: AudioCodec + 'static>(
    codec: Arc<C>,
    run_flag: Arc<AtomicBool>,
    tone_hz: f32,
) -> Result<()> {
    let batch = (codec.output_sample_rate() / 100) as usize;
    let mut tone = ToneGenerator::new(tone_hz, codec.output_sample_rate());

    thread::Builder::new()
        .name("refmic-playback".into())
        .spawn(move || {
            let mut samples = vec![0i16; batch];
            while run_flag.load(Ordering::Relaxed) {
                tone.fill(&mut samples);
                let mut offset = 0;
                while offset < samples.len() && run_flag.load(Ordering::Relaxed) {
                    match codec.write(&samples[offset..]) {
                        Ok(0) => thread::sleep(Duration::from_millis(10)),
                        Ok(n) => offset += n,
                        Err(CodecError::Transport(TransportError::Timeout(_))) => {}
                        Err(e) => {
                            warn!("Playback stalled: {}", e);
                            thread::sleep(Duration::from_millis(100));
                        }
                    }
                }
            }
        })
        .context("Failed to spawn playback thread")?;
    Ok(())
}

/// Consumer path: reads 10ms frames and hands each one to `sink` until it returns false.
pub fn spawn_capture<C, F>(codec: Arc<C>, run_flag: Arc<AtomicBool>, mut sink: F) -> Result<()>
where
    C: AudioCodec + 'static,
    F: FnMut(Vec<i16>) -> bool + Send + 'static,
{
    let slots = (codec.input_sample_rate() / 100) as usize * codec.input_channels();

    thread::Builder::new()
        .name("refmic-capture".into())
        .spawn(move || {
            let mut frame = vec![0i16; slots];
            while run_flag.load(Ordering::Relaxed) {
                match codec.read(&mut frame) {
                    Ok(0) => thread::sleep(Duration::from_millis(10)),
                    Ok(n) => {
                        if !sink(frame[..n].to_vec()) {
                            break;
                        }
                    }
                    Err(CodecError::Transport(TransportError::Timeout(_))) => {}
                    Err(e) => {
                        warn!("Capture stalled: {}", e);
                        thread::sleep(Duration::from_millis(100));
                    }
                }
            }
        })
        .context("Failed to spawn capture thread")?;
    Ok(())
}

fn spawn_monitor(mut monitor: FrameMonitor, frames: Receiver<Vec<i16>>) -> Result<()> {
    thread::Builder::new()
        .name("refmic-monitor".into())
        .spawn(move || {
            // Ends when the capture thread drops its sender
            for frame in frames.iter() {
                monitor.process(&frame);
            }
        })
        .context("Failed to spawn monitor thread")?;
    Ok(())
}
