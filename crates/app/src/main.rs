use clap::{Parser, Subcommand};
use freq_grid_core::{
    Command, EngineConfig, FreqGridError, Instrument, NullBackend, Scale, Treatment,
};
use tracing_subscriber::EnvFilter;

/// Tick period of the scripted render loop, roughly 30 Hz.
const TICK_MS: u64 = 33;

fn main() -> freq_grid_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo {
            ticks,
            seed,
            treatment,
            scale,
            snapshot_every,
        } => run_demo(ticks, seed, treatment.as_deref(), scale.as_deref(), snapshot_every),
        Commands::Scales => run_scales(),
    }
}

/// Drives the instrument through a scripted gesture: a recorded sweep is
/// played back as looping automation while snapshots stream to stdout. The
/// null backend stands in for a synthesis host, so the demo runs anywhere.
fn run_demo(
    ticks: u64,
    seed: u64,
    treatment: Option<&str>,
    scale: Option<&str>,
    snapshot_every: u64,
) -> freq_grid_core::Result<()> {
    tracing::info!(ticks, seed, "starting scripted demo");

    let mut instrument = Instrument::with_seed(
        Box::new(NullBackend::new()),
        None,
        EngineConfig::default(),
        seed,
    );

    if let Some(name) = treatment {
        match parse_treatment(name) {
            Some(treatment) => instrument.on_command(Command::SetTreatment(treatment), 0),
            None => tracing::warn!(name, "unknown treatment, keeping the default"),
        }
    }
    if let Some(name) = scale {
        match parse_scale(name) {
            Some(scale) => instrument.on_command(Command::SetScale(scale), 0),
            None => tracing::warn!(name, "unknown scale, keeping the default"),
        }
    }

    let config = instrument.config();
    let (center_x, center_y) = (config.canvas_width / 2.0, config.canvas_height / 2.0);

    for tick in 0..ticks {
        let now = tick * TICK_MS;

        match tick {
            5 => {
                tracing::info!("recording gesture");
                instrument.on_command(Command::ToggleRecording, now);
            }
            42 => {
                instrument.on_command(Command::ToggleRecording, now);
                tracing::info!(
                    events = instrument.recorder().events().len(),
                    "gesture recorded"
                );
            }
            45 => {
                tracing::info!("replaying gesture as looping automation");
                instrument.on_command(Command::TogglePlayback, now);
            }
            _ => {}
        }

        // Sweep the pointer in a flat ellipse while "pressed", then let the
        // replayed automation take over.
        let angle = tick as f32 * 0.12;
        let interacting = (5..40).contains(&tick);
        let x = center_x + angle.cos() * 250.0;
        let y = center_y + angle.sin() * 150.0;
        if tick <= 40 {
            instrument.on_pointer(x, y, interacting, now);
        }

        instrument.tick(now);

        if snapshot_every > 0 && tick % snapshot_every == 0 {
            let line = serde_json::to_string(&instrument.snapshot())
                .map_err(|err| FreqGridError::msg(err.to_string()))?;
            println!("{line}");
        }
    }

    tracing::info!("demo finished");
    Ok(())
}

/// Prints the scale registry in selection order.
fn run_scales() -> freq_grid_core::Result<()> {
    for (index, scale) in Scale::ALL.iter().enumerate() {
        // Key 0 selects the last registry entry.
        let key = (index + 1) % 10;
        if scale.is_continuous() {
            println!("{key}: {}", scale.name());
        } else {
            println!("{key}: {} {:?}", scale.name(), scale.intervals());
        }
    }
    Ok(())
}

fn parse_treatment(name: &str) -> Option<Treatment> {
    match name.to_ascii_lowercase().as_str() {
        "chord" => Some(Treatment::Chord),
        "arpeggio" => Some(Treatment::Arpeggio),
        "line" => Some(Treatment::Line),
        "improvise" => Some(Treatment::Improvise),
        "phase" => Some(Treatment::Phase),
        _ => None,
    }
}

fn parse_scale(name: &str) -> Option<Scale> {
    match name.to_ascii_lowercase().as_str() {
        "chromatic" => Some(Scale::Chromatic),
        "major" => Some(Scale::Major),
        "minor" => Some(Scale::Minor),
        "harmonic-minor" => Some(Scale::HarmonicMinor),
        "pentatonic" => Some(Scale::Pentatonic),
        "blues" => Some(Scale::Blues),
        "middle-eastern" => Some(Scale::MiddleEastern),
        "japanese" => Some(Scale::Japanese),
        "whole-tone" => Some(Scale::WholeTone),
        "continuous" => Some(Scale::Continuous),
        _ => None,
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Interactive generative-music frequency grid", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a scripted demo of the instrument and stream JSON snapshots.
    Demo {
        /// Number of ~30 Hz ticks to simulate.
        #[arg(long, default_value_t = 120)]
        ticks: u64,
        /// Seed for the engine's stochastic behavior.
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Rhythmic treatment to select (chord, arpeggio, line, improvise, phase).
        #[arg(short, long)]
        treatment: Option<String>,
        /// Scale to select (chromatic, major, minor, ...).
        #[arg(short, long)]
        scale: Option<String>,
        /// Print a snapshot every N ticks; 0 disables snapshots.
        #[arg(long, default_value_t = 15)]
        snapshot_every: u64,
    },
    /// List the selectable scales with their interval tables.
    Scales,
}
