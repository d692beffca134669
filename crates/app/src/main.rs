use std::{fs, path::PathBuf};

use clap::{Args, Parser, Subcommand};
use spectrum_visualiser_core::{
    ClockedGraph, ColorMode, ControlEvent, FixedRateRefresh, FrameOutcome, LoopState, PixelCanvas,
    RefreshSignal, Visualiser, VisualiserConfig, WavDecoder,
};
use tracing_subscriber::EnvFilter;

fn main() -> spectrum_visualiser_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play(args) => run_play(args),
        Commands::Defaults => print_defaults(),
    }
}

fn run_play(args: PlayArgs) -> spectrum_visualiser_core::Result<()> {
    let config = build_config(&args)?;
    tracing::info!(input = ?args.input, ?config, "starting playback");

    let bytes = fs::read(&args.input)?;
    let name = args
        .input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.input.display().to_string());

    let mut canvas = PixelCanvas::new(args.width, args.height);
    let mut visualiser = Visualiser::new(config, WavDecoder, ClockedGraph::new())?;
    visualiser.draw_idle(&mut canvas);
    visualiser.handle_event(ControlEvent::LoadFile { name, bytes }, &mut canvas)?;

    if let Some(info) = visualiser.audio_info() {
        tracing::info!(title = %info.title, detail = %info.detail, "loaded");
    }

    let mut refresh = FixedRateRefresh::new(args.fps)?;
    let mut frames: u64 = 0;
    while visualiser.state() == LoopState::Running {
        if args.max_frames.is_some_and(|max| frames >= max) {
            tracing::info!(frames, "frame limit reached");
            break;
        }

        let tick = refresh.wait_for_refresh();
        match visualiser.on_refresh(tick, &mut canvas) {
            FrameOutcome::Rendered(stats) => {
                frames += 1;
                if frames % u64::from(args.fps) == 0 {
                    tracing::info!(
                        frames,
                        bars = stats.bars,
                        glowing = stats.glowing,
                        position = ?visualiser.position(),
                        "rendering"
                    );
                }
            }
            FrameOutcome::Ended => break,
            FrameOutcome::Skipped => {}
        }
    }

    if let Some(info) = visualiser.audio_info() {
        tracing::info!(title = %info.title, detail = %info.detail, frames, "stopped");
    }

    if let Some(path) = args.snapshot {
        canvas.save(&path)?;
        tracing::info!(?path, "wrote final frame");
    }

    Ok(())
}

/// Defaults, then the optional preset file, then individual flags.
fn build_config(args: &PlayArgs) -> spectrum_visualiser_core::Result<VisualiserConfig> {
    let mut config = match &args.config {
        Some(path) => VisualiserConfig::from_json_file(path)?,
        None => VisualiserConfig::default(),
    };

    if let Some(fft_size) = args.fft_size {
        config.set_fft_size(fft_size)?;
    }
    if let Some(smoothing) = args.smoothing {
        config.set_smoothing(smoothing)?;
    }
    if let Some(sensitivity) = args.sensitivity {
        config.set_sensitivity(sensitivity)?;
    }
    if let Some(color_mode) = args.color_mode {
        config.color_mode = color_mode;
    }

    Ok(config)
}

fn print_defaults() -> spectrum_visualiser_core::Result<()> {
    println!("{}", VisualiserConfig::default().to_json_pretty()?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Real-time audio spectrum visualiser", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a WAV file through the visualiser.
    Play(PlayArgs),
    /// Print the default configuration as JSON.
    Defaults,
}

#[derive(Args, Debug)]
struct PlayArgs {
    /// Path to the WAV file to visualise.
    input: PathBuf,
    /// JSON preset applied before the individual flags.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// FFT window size, a power of two between 32 and 32768.
    #[arg(long)]
    fft_size: Option<u32>,
    /// Smoothing time constant in [0, 1].
    #[arg(long)]
    smoothing: Option<f32>,
    /// Bar color theme (spectrum, rainbow, fire, ocean, neon, monochrome).
    #[arg(long)]
    color_mode: Option<ColorMode>,
    /// Linear gain applied to magnitudes before drawing.
    #[arg(long)]
    sensitivity: Option<f32>,
    #[arg(long, default_value_t = 800)]
    width: u32,
    #[arg(long, default_value_t = 400)]
    height: u32,
    /// Refresh rate of the render loop.
    #[arg(long, default_value_t = 60)]
    fps: u32,
    /// Stop after this many rendered frames.
    #[arg(long)]
    max_frames: Option<u64>,
    /// Write the final surface to this image path; the format follows the
    /// extension (e.g. `frame.png`).
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "spectrum-visualiser",
            "play",
            "song.wav",
            "--fft-size",
            "1024",
            "--color-mode",
            "fire",
            "--sensitivity",
            "1.5",
        ]);
        let Commands::Play(args) = cli.command else {
            panic!("expected play command");
        };
        let config = build_config(&args).unwrap();
        assert_eq!(config.fft_size, 1024);
        assert_eq!(config.color_mode, ColorMode::Fire);
        assert_eq!(config.sensitivity, 1.5);
        assert_eq!(config.smoothing_time_constant, 0.8);
    }

    #[test]
    fn invalid_flags_are_reported() {
        let cli = Cli::parse_from(["spectrum-visualiser", "play", "song.wav", "--fft-size", "48"]);
        let Commands::Play(args) = cli.command else {
            panic!("expected play command");
        };
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn snapshot_path_is_taken_verbatim() {
        let cli = Cli::parse_from([
            "spectrum-visualiser",
            "play",
            "song.wav",
            "--snapshot",
            "frame.png",
        ]);
        let Commands::Play(args) = cli.command else {
            panic!("expected play command");
        };
        assert_eq!(args.snapshot, Some(PathBuf::from("frame.png")));
    }

    #[test]
    fn unknown_color_mode_fails_to_parse() {
        let parsed = Cli::try_parse_from([
            "spectrum-visualiser",
            "play",
            "song.wav",
            "--color-mode",
            "plaid",
        ]);
        assert!(parsed.is_err());
    }
}
