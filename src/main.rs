//! Gaze cursor application: drives the pointer from face-mesh landmarks.

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use gaze_cursor::{
    app::{slot_provider, GazeCursorApp, InputBridge},
    config::{Config, SinkBackend, EXAMPLE_CONFIG},
    constants::DEFAULT_FPS,
    controller::{ControllerHandle, SessionMode},
    cursor_control::create_sink,
    geometry::ScreenPoint,
    landmarks::{
        synthetic::{ScriptedProvider, SyntheticFace},
        Observation,
    },
    storage::{CalibrationStore, JsonCalibrationStore, MemoryCalibrationStore},
};
use log::{info, warn};
use std::f64::consts::TAU;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

/// Frames shown per calibration target in the demo
const DEMO_FIXATION_FRAMES: usize = 20;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SinkArg {
    /// Move the X11 pointer
    X11,
    /// Only log cursor positions
    Log,
}

impl From<SinkArg> for SinkBackend {
    fn from(arg: SinkArg) -> Self {
        match arg {
            SinkArg::X11 => Self::X11,
            SinkArg::Log => Self::Log,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Print an example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Directory holding the calibration file
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Cursor backend (overrides the configuration)
    #[arg(long, value_enum)]
    sink: Option<SinkArg>,

    /// Run a calibrate-then-track session on synthetic landmarks
    #[arg(long)]
    demo: bool,

    /// Tracking frames played in demo mode
    #[arg(long, default_value = "300")]
    frames: usize,

    /// Delete the stored calibration before starting
    #[arg(long)]
    reset_calibration: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if args.print_config {
        print!("{EXAMPLE_CONFIG}");
        return Ok(());
    }

    info!("Gaze Cursor");

    let mut config = if let Some(path) = &args.config {
        info!("Loading configuration from: {}", path.display());
        match Config::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config file: {e}. Using defaults.");
                Config::default()
            }
        }
    } else {
        Config::default()
    };

    if let Some(dir) = args.data_dir {
        config.storage.data_dir = dir;
    }
    if let Some(sink) = args.sink {
        config.cursor.backend = sink.into();
    } else if args.demo {
        config.cursor.backend = SinkBackend::Log;
    }
    config.validate()?;

    if args.reset_calibration {
        let mut store = JsonCalibrationStore::new(&config.storage.data_dir, &config.storage.calibration_file)?;
        if store.delete()? {
            info!("Stored calibration deleted");
        } else {
            info!("No stored calibration at {}", store.path().display());
        }
    }

    if args.demo {
        run_demo(&config, args.frames)
    } else {
        run_stdin(&config)
    }
}

/// Landmark frames and commands arrive as JSON lines on stdin
fn run_stdin(config: &Config) -> Result<()> {
    info!("Reading landmark frames and commands from stdin");
    let (slot, provider) = slot_provider(&config.runtime);
    let app = GazeCursorApp::new(config, Box::new(provider))?;
    let bridge = InputBridge::new(app.handle(), slot);
    let running = app.spawn()?;

    let handled = bridge.run(std::io::stdin().lock())?;
    let state = running.handle().get_state();
    let stats = running.stop_and_join()?;

    info!(
        "Input closed after {handled} messages: {} frames processed, {} cursor moves",
        stats.frames, state.sink.moves
    );
    if let Some(error) = state.last_error {
        warn!("Last error: {error}");
    }
    Ok(())
}

/// Gaze that a synthetic user would show while looking at `target`
fn synthetic_gaze(target: ScreenPoint, width: u32, height: u32) -> (f64, f64) {
    let x = target.x / f64::from(width) - 0.5;
    let y = target.y / f64::from(height) - 0.5;
    (x * 1.5, y * 1.2)
}

fn calibrate_synthetic(handle: &ControllerHandle, width: u32, height: u32) -> Result<()> {
    handle.start_calibration()?;
    let Some(progress) = handle.with(|c| c.calibration_progress()) else {
        bail!("Calibration session did not open");
    };

    let mut timestamp = 0.0;
    for (index, target) in progress.targets.iter().enumerate() {
        handle.restart_fixation()?;
        let (x, y) = synthetic_gaze(*target, width, height);
        let landmarks = SyntheticFace::default().with_gaze(x, y).build();
        for _ in 0..DEMO_FIXATION_FRAMES {
            handle.process_frame(&Observation::face(timestamp, landmarks.clone()))?;
            timestamp += 1.0 / DEFAULT_FPS;
        }
        handle.add_calibration_point(index)?;
        info!("Target {index} at ({:.0}, {:.0}) captured", target.x, target.y);
    }

    handle.finish_calibration()?;
    Ok(())
}

fn run_demo(config: &Config, frames: usize) -> Result<()> {
    info!("Running synthetic demo session with {frames} tracking frames");

    let sink = create_sink(&config.cursor)?;
    let (width, height) = sink.screen_bounds();

    // The synthetic user looks around an ellipse, nodding slightly and
    // briefly leaving the camera view every three seconds
    let mut provider = ScriptedProvider::new(DEFAULT_FPS);
    for i in 0..frames {
        let phase = i as f64 / frames.max(1) as f64 * TAU;
        if i % 90 == 45 {
            for _ in 0..5 {
                provider.push_no_face();
            }
        }
        let face = SyntheticFace::default()
            .with_gaze(0.45 * phase.cos(), 0.35 * phase.sin())
            .with_head_pose(0.05 * phase.sin(), 0.02 * phase.cos());
        provider.push_face(&face);
    }
    let scripted = provider.remaining() as u64;

    let store: Box<dyn CalibrationStore> = Box::new(MemoryCalibrationStore::new());
    let app = GazeCursorApp::with_parts(config, Box::new(provider), sink, store)?;
    let handle = app.handle();

    calibrate_synthetic(&handle, width, height)?;
    handle.start_tracking()?;
    let target = handle.get_state().frames_processed + scripted;

    let running = app.spawn()?;
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let state = running.handle().get_state();
        if state.mode != SessionMode::Tracking || state.frames_processed >= target {
            break;
        }
        if Instant::now() >= deadline {
            warn!("Demo did not finish in time");
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }

    let state = running.handle().get_state();
    running.stop_and_join()?;

    info!(
        "Demo finished in {} mode: {} frames, {} cursor moves, {} rate-limited",
        state.mode, state.frames_processed, state.sink.moves, state.sink.skipped_moves
    );
    if let Some(command) = state.last_command {
        info!("Final cursor position ({:.1}, {:.1})", command.position.x, command.position.y);
    }
    Ok(())
}
