//! Ambient CLI
//!
//! Inspect the mode catalog, render soundscapes to WAV, trace the intensity
//! signal, and (with the `device` feature) play through the speakers.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ambient_core::error::Result;
use ambient_core::renderer::{self, ModeChange};
use ambient_core::{EngineConfig, ModeId, SoundscapeEngine};

/// Procedural ambient soundscapes
#[derive(Parser, Debug)]
#[command(name = "ambient")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Engine configuration (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Seed for reproducible output
    #[arg(short, long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the available modes
    Modes {
        /// Print the full catalog as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render a soundscape to a WAV file
    Render {
        #[arg(short, long, default_value_t = ModeId::Focus)]
        mode: ModeId,

        #[arg(short = 't', long, default_value_t = 30.0)]
        seconds: f64,

        /// Output WAV path
        #[arg(short, long)]
        out: PathBuf,

        /// Crossfade to this mode part-way through
        #[arg(long)]
        then: Option<ModeId>,

        /// When to start the crossfade, in seconds
        #[arg(long, requires = "then")]
        at: Option<f64>,
    },

    /// Print the intensity signal over time
    Intensity {
        #[arg(short, long, default_value_t = ModeId::Focus)]
        mode: ModeId,

        #[arg(short = 't', long, default_value_t = 5.0)]
        seconds: f64,

        /// Leave the transport stopped
        #[arg(long)]
        paused: bool,
    },

    /// Play through the default output device
    #[cfg(feature = "device")]
    Play {
        #[arg(short, long, default_value_t = ModeId::Focus)]
        mode: ModeId,

        #[arg(short = 't', long, default_value_t = 60.0)]
        seconds: f64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }

    match cli.command {
        Commands::Modes { json } => list_modes(json),
        Commands::Render {
            mode,
            seconds,
            out,
            then,
            at,
        } => {
            let change = then.map(|next| ModeChange {
                mode: next.as_str(),
                at_seconds: at.unwrap_or(seconds / 2.0),
            });
            renderer::write_wav(&out, config, mode.as_str(), seconds, change)
        }
        Commands::Intensity {
            mode,
            seconds,
            paused,
        } => trace_intensity(config, mode, seconds, paused),
        #[cfg(feature = "device")]
        Commands::Play { mode, seconds } => play(config, mode, seconds),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            EngineConfig::from_json_file(path)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn list_modes(json: bool) -> Result<()> {
    let catalog = ambient_core::mode::catalog();
    if json {
        println!("{}", serde_json::to_string_pretty(catalog)?);
        return Ok(());
    }
    for mode in catalog {
        println!(
            "{:<8} {:>4} bpm  {:<14} {}",
            mode.id.as_str(),
            mode.tempo_bpm,
            mode.name,
            mode.description
        );
    }
    Ok(())
}

fn trace_intensity(config: EngineConfig, mode: ModeId, seconds: f64, paused: bool) -> Result<()> {
    let period_ms = config.intensity.period_ms;
    let mut engine = SoundscapeEngine::new(config)?;
    engine.initialize()?;
    engine.set_mode(mode.as_str());
    if !paused {
        engine.set_playing(true)?;
    }
    let frames = (engine.sample_rate() * period_ms as f64 / 1000.0).round() as usize;
    let steps = (seconds * 1000.0 / period_ms as f64).ceil() as usize;
    let mut block = vec![0.0; frames * 2];
    for step in 0..steps {
        engine.render(&mut block);
        println!("{:>8.2}s  {:.3}", step as f64 * period_ms as f64 / 1000.0, engine.audio_intensity());
    }
    engine.dispose();
    Ok(())
}

#[cfg(feature = "device")]
fn play(mut config: EngineConfig, mode: ModeId, seconds: f64) -> Result<()> {
    use ambient_core::output::{self, DeviceOutput};
    use ambient_core::{Confirmation, Player};

    config.sample_rate = output::default_sample_rate()? as f64;
    let mut engine = SoundscapeEngine::new(config)?;
    engine.initialize_with_retry()?;
    engine.set_mode(mode.as_str());

    let player = Player::new(engine);
    let _output = DeviceOutput::open(player.render_handle())?;
    if player.set_playing(true)? != Confirmation::Confirmed {
        tracing::warn!("device did not confirm playback start");
    }
    info!(%mode, seconds, "playing");
    std::thread::sleep(std::time::Duration::from_secs_f64(seconds.max(0.0)));
    player.set_playing(false)?;
    player.dispose();
    Ok(())
}
