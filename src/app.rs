//! # Main Loop
//!
//! One tick:
//!
//! 1. Sample the button
//! 2. Clear the off-screen buffer
//! 3. On a press: step the brightness (100 wraps to 10), apply it, compose the
//!    brightness overlay, present and pause for the longer hold interval. The
//!    status frame is skipped for this tick.
//! 4. Otherwise: poll the sensor and the clock and compose the status frame
//! 5. Present (swap on vsync)
//! 6. Pause for the regular tick interval
//!
//! The loop runs until the shared shutdown flag is raised, then blanks the
//! panel before returning.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::button::{InputAdapter, PressDetector};
use crate::clock::ClockSource;
use crate::composer::FrameComposer;
use crate::config::Config;
use crate::display::DisplaySurface;
use crate::sensor::EnvironmentSensor;
use crate::{BrightnessLevel, Frame, RenderMode};

/// State carried from one tick to the next.
#[derive(Debug)]
pub struct LoopState {
    pub brightness: BrightnessLevel,
    pub detector: PressDetector,
}

/// Loop pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Pause after a status frame
    pub tick: Duration,
    /// Pause after a brightness overlay
    pub hold: Duration,
}

impl Pacing {
    pub fn from_config(config: &Config) -> Self {
        Pacing {
            tick: Duration::from_millis(config.timing.tick_ms),
            hold: Duration::from_millis(config.timing.brightness_hold_ms),
        }
    }
}

/// What one tick rendered and how long to wait before the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub mode: RenderMode,
    pub pause: Duration,
}

/// The appliance: peripherals, composer and loop state.
pub struct App<C, E, B, S> {
    clock: C,
    sensor: E,
    button: B,
    surface: S,
    composer: FrameComposer,
    pacing: Pacing,
    state: LoopState,
}

impl<C, E, B, S> App<C, E, B, S>
where
    C: ClockSource,
    E: EnvironmentSensor,
    B: InputAdapter,
    S: DisplaySurface,
{
    pub fn new(
        clock: C,
        sensor: E,
        button: B,
        surface: S,
        composer: FrameComposer,
        pacing: Pacing,
        detector: PressDetector,
    ) -> Self {
        let brightness = surface.brightness();
        Self {
            clock,
            sensor,
            button,
            surface,
            composer,
            pacing,
            state: LoopState {
                brightness,
                detector,
            },
        }
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Run a single tick at `now` without sleeping.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let pressed = self.button.is_pressed();
        let press = self.state.detector.update(pressed, now);

        self.surface.clear();

        if press {
            let level = self.state.brightness.advance();
            self.state.brightness = level;
            self.surface.set_brightness(level);
            log::info!("Brightness set to {}%", level);

            self.composer
                .compose(&mut self.surface, &Frame::BrightnessOverlay { level });
            self.surface.present();
            return TickOutcome {
                mode: RenderMode::BrightnessOverlay,
                pause: self.pacing.hold,
            };
        }

        let environment = self.sensor.read();
        let time = self.clock.now();
        self.composer.compose(
            &mut self.surface,
            &Frame::Status { time, environment },
        );
        self.surface.present();

        TickOutcome {
            mode: RenderMode::Status,
            pause: self.pacing.tick,
        }
    }

    /// Tick until `shutdown` is set, then blank the panel.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        log::info!(
            "Display loop started ({:?} tick, {:?} trigger)",
            self.pacing.tick,
            self.state.detector.mode()
        );

        while !shutdown.load(Ordering::Relaxed) {
            let outcome = self.tick(Instant::now());
            thread::sleep(outcome.pause);
        }

        self.shutdown();
    }

    /// Present an empty frame so the panel goes dark.
    pub fn shutdown(&mut self) {
        self.surface.clear();
        self.surface.present();
        log::info!("Display loop stopped, panel cleared");
    }
}
