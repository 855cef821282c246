use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use cpal::traits::{DeviceTrait, HostTrait};
use refmic_core::AudioCodec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

mod audio;
mod config;
mod echo_cancel;
mod monitor;
mod selftest;
mod tone;

use config::AppConfig;

#[derive(Parser)]
#[command(name = "refmic")]
#[command(about = "refmic: duplex audio with a synthesized echo reference", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available audio devices
    List,
    /// Play a test tone and capture mic + reference frames (press Ctrl+C to stop)
    Run {
        #[arg(short, long)]
        input: Option<String>,
        #[arg(short, long)]
        output: Option<String>,
        /// Output volume in percent (0-100)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=100))]
        volume: Option<u8>,
        /// Test tone frequency in Hz
        #[arg(short, long)]
        tone: Option<f32>,
        /// Leave the reference slot silent
        #[arg(long)]
        no_reference: bool,
        /// Remember the chosen devices and settings
        #[arg(long)]
        save: bool,
    },
    /// Run the pipeline over an in-memory loopback, no audio hardware needed
    Selftest {
        #[arg(short, long, default_value_t = 100)]
        frames: usize,
    },
    /// Show the configuration file location and effective settings
    Config,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut app_config = AppConfig::load();

    match cli.command {
        Some(Commands::List) => {
            list_devices()?;
        }
        Some(Commands::Run {
            input,
            output,
            volume,
            tone,
            no_reference,
            save,
        }) => {
            if let Some(input) = input {
                app_config.last_input = input;
            }
            if let Some(output) = output {
                app_config.last_output = output;
            }
            if let Some(volume) = volume {
                app_config.codec.output_volume = volume;
            }
            if let Some(tone) = tone {
                app_config.tone_hz = tone;
            }
            if no_reference {
                app_config.codec.input_reference = false;
            }
            if save {
                app_config.save();
            }
            run(&app_config)?;
        }
        Some(Commands::Selftest { frames }) => {
            let report = selftest::run(app_config.codec.clone(), frames, app_config.tone_hz)?;
            println!("Frames:             {}", report.frames);
            println!("Reference checked:  {} groups", report.checked_groups);
            println!("Reference mismatch: {} groups", report.mismatched_groups);
            println!("Overflowed samples: {}", report.stats.reference_overflow);
            println!("Short reads:        {}", report.stats.short_reads);
            println!(
                "Levels (RMS):       mic {:.4}, reference {:.4}, after AEC {:.4}",
                report.mic_rms, report.reference_rms, report.cleaned_rms
            );
            if !report.passed() {
                bail!("Self test failed");
            }
            println!("Self test passed.");
        }
        Some(Commands::Config) => {
            match config::config_path() {
                Some(path) => println!("Config file: {}", path.display()),
                None => println!("Config file: unavailable on this platform"),
            }
            println!("{}", serde_json::to_string_pretty(&app_config)?);
        }
        None => {
            println!("No command given. Try 'refmic selftest' or 'refmic --help'.");
        }
    }

    Ok(())
}

fn run(app_config: &AppConfig) -> Result<()> {
    let session = audio::DuplexSession::start(
        &app_config.last_input,
        &app_config.last_output,
        app_config.codec.clone(),
        app_config.tone_hz,
    )?;
    println!("refmic active. Press Ctrl+C to stop.");

    // Graceful shutdown handling
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        println!("\nShutting down gracefully...");
        r.store(false, Ordering::Relaxed);
    })?;

    let mut last_report = Instant::now();
    while running.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(100));
        if last_report.elapsed() >= Duration::from_secs(1) {
            last_report = Instant::now();
            let stats = session.codec.stats();
            println!(
                "vol {:>3}% | mic {:.4} ref {:.4} aec {:.4} | frames {} | pending {} overflow {} short {} errors {}",
                session.codec.output_volume(),
                session.levels.mic(),
                session.levels.reference(),
                session.levels.cleaned(),
                session.levels.frames(),
                stats.reference_pending,
                stats.reference_overflow,
                stats.short_reads,
                stats.transport_errors,
            );
        }
    }

    println!("refmic stopped.");
    Ok(())
}

fn list_devices() -> Result<()> {
    let host = cpal::default_host();
    println!("Audio Host: {}", host.id().name());
    println!("\nInput Devices:");
    for device in host.input_devices()? {
        println!("  - {}", device.name().unwrap_or("Unknown".to_string()));
    }
    println!("\nOutput Devices:");
    for device in host.output_devices()? {
        println!("  - {}", device.name().unwrap_or("Unknown".to_string()));
    }
    Ok(())
}
