//! # Matrix Clock Application Entry Point
//!
//! This binary wires the library together and runs the display loop. It
//! supports production mode (LED matrix, DHT22, pushbutton on the Pi) and
//! development mode (`--stdout`: frames printed to the terminal, no GPIO).
//!
//! Any startup failure prints a single diagnostic line and exits with status 1.

use anyhow::{bail, Context};
use std::env;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use matrix_clock_lib::app::{App, Pacing};
use matrix_clock_lib::button::PressDetector;
use matrix_clock_lib::clock::SystemClock;
use matrix_clock_lib::composer::{FrameComposer, Palette};
use matrix_clock_lib::config::Config;
use matrix_clock_lib::font::FontSet;

/// Command line options
struct Args {
    development_mode: bool,
    config_path: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        development_mode: false,
        config_path: None,
    };
    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            // Development mode: render to stdout for testing without hardware
            "--stdout" => args.development_mode = true,
            "--config" => {
                let path = iter.next().context("--config needs a file path")?;
                args.config_path = Some(PathBuf::from(path));
            }
            other => bail!("unknown argument '{}'", other),
        }
    }
    Ok(args)
}

/// Raise the shutdown flag on Ctrl+C or SIGTERM
fn install_shutdown_handler() -> anyhow::Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .context("install signal handler")?;
    Ok(shutdown)
}

fn run() -> anyhow::Result<()> {
    let args = parse_args()?;

    let config = match &args.config_path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };
    config.validate()?;

    let fonts = FontSet::load(&config.fonts)?;
    let composer = FrameComposer::new(fonts, Palette::default(), config.panel_width());
    let pacing = Pacing::from_config(&config);
    let detector = PressDetector::new(
        config.input.trigger,
        Duration::from_millis(config.input.debounce_ms),
    );

    if args.development_mode {
        run_development(&config, composer, pacing, detector)
    } else {
        run_production(&config, composer, pacing, detector)
    }
}

/// Greeting for interactive sessions
fn greet() {
    if std::io::stdin().is_terminal() {
        println!("Enjoy your LED panel :)");
    }
}

/// Terminal panel, no sensor, no button
fn run_development(
    config: &Config,
    composer: FrameComposer,
    pacing: Pacing,
    detector: PressDetector,
) -> anyhow::Result<()> {
    use matrix_clock_lib::button::ReleasedButton;
    use matrix_clock_lib::display::{FrameSurface, TerminalPanel};
    use matrix_clock_lib::sensor::UnavailableSensor;

    let panel = TerminalPanel::stdout(config.panel_width(), config.panel_height());
    let surface = FrameSurface::new(panel, config.initial_brightness());
    greet();
    let mut app = App::new(
        SystemClock,
        UnavailableSensor,
        ReleasedButton,
        surface,
        composer,
        pacing,
        detector,
    );

    let shutdown = install_shutdown_handler()?;
    app.run(&shutdown);
    Ok(())
}

#[cfg(all(target_os = "linux", feature = "hardware"))]
fn run_production(
    config: &Config,
    composer: FrameComposer,
    pacing: Pacing,
    detector: PressDetector,
) -> anyhow::Result<()> {
    use matrix_clock_lib::button::GpioButton;
    use matrix_clock_lib::display::{FrameSurface, LedMatrixPanel};
    use matrix_clock_lib::error::StartupError;
    use matrix_clock_lib::sensor::{BusyWait, Dht22, GpioSensorLine, ThrottledSensor};
    use rppal::gpio::Gpio;

    let gpio = Gpio::new().map_err(|e| StartupError::Gpio(e.to_string()))?;
    let button = GpioButton::new(&gpio, config.pins.button, config.pins.button_active_low)?;
    let line = GpioSensorLine::new(&gpio, config.pins.sensor)?;
    let dht22 = Dht22::new(
        line,
        BusyWait::new(),
        Duration::from_millis(config.timing.sensor_timeout_ms),
    );
    let sensor = ThrottledSensor::new(
        dht22,
        Duration::from_millis(config.timing.sensor_min_interval_ms),
    );

    let panel = LedMatrixPanel::new(&config.panel)?;
    let surface = FrameSurface::new(panel, config.initial_brightness());

    greet();
    let mut app = App::new(SystemClock, sensor, button, surface, composer, pacing, detector);
    let shutdown = install_shutdown_handler()?;
    app.run(&shutdown);
    Ok(())
}

#[cfg(not(all(target_os = "linux", feature = "hardware")))]
fn run_production(
    _config: &Config,
    _composer: FrameComposer,
    _pacing: Pacing,
    _detector: PressDetector,
) -> anyhow::Result<()> {
    bail!("LED matrix support not enabled; rebuild with --features hardware or run with --stdout")
}

/// Main application entry point.
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        process::exit(1);
    }
}
