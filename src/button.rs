//! Pushbutton input and press detection.
//!
//! The pin itself is read through [`InputAdapter`]; deciding whether a sample
//! counts as a press is the job of [`PressDetector`], which supports the raw
//! level-triggered behaviour and a debounced edge-triggered mode.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Instantaneous read of the button pin.
pub trait InputAdapter {
    /// True while the button is held down. Must not block.
    fn is_pressed(&mut self) -> bool;
}

/// How a held button turns into brightness steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    /// Every tick that samples the button down counts as a press;
    /// holding the button keeps cycling
    Level,
    /// Only a debounced released -> pressed transition counts
    Edge,
}

/// Turns raw button samples into press events.
#[derive(Debug)]
pub struct PressDetector {
    mode: TriggerMode,
    debounce: Duration,
    was_pressed: bool,
    last_change: Option<Instant>,
}

impl PressDetector {
    pub fn new(mode: TriggerMode, debounce: Duration) -> Self {
        Self {
            mode,
            debounce,
            was_pressed: false,
            last_change: None,
        }
    }

    pub fn mode(&self) -> TriggerMode {
        self.mode
    }

    /// Feed one sample taken at `now`; returns true if it is a press.
    pub fn update(&mut self, pressed: bool, now: Instant) -> bool {
        match self.mode {
            TriggerMode::Level => pressed,
            TriggerMode::Edge => self.edge(pressed, now),
        }
    }

    fn edge(&mut self, pressed: bool, now: Instant) -> bool {
        if pressed == self.was_pressed {
            return false;
        }

        // Contact bounce: ignore changes too close to the last accepted one
        if let Some(last) = self.last_change {
            if now.saturating_duration_since(last) < self.debounce {
                return false;
            }
        }

        self.was_pressed = pressed;
        self.last_change = Some(now);
        pressed
    }
}

/// A button that is never pressed, for running without GPIO.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReleasedButton;

impl InputAdapter for ReleasedButton {
    fn is_pressed(&mut self) -> bool {
        false
    }
}

#[cfg(all(target_os = "linux", feature = "hardware"))]
pub use self::hardware::GpioButton;

#[cfg(all(target_os = "linux", feature = "hardware"))]
mod hardware {
    use super::InputAdapter;
    use crate::error::StartupError;
    use rppal::gpio::{Gpio, InputPin};

    /// Button on a BCM GPIO line with the internal pull resistor enabled.
    pub struct GpioButton {
        pin: InputPin,
        active_low: bool,
    }

    impl GpioButton {
        /// Claim `bcm_pin`. Active-low buttons (wired to ground) get a pull-up,
        /// active-high ones a pull-down.
        pub fn new(gpio: &Gpio, bcm_pin: u8, active_low: bool) -> Result<Self, StartupError> {
            let pin = gpio
                .get(bcm_pin)
                .map_err(|e| StartupError::Gpio(format!("button pin {}: {}", bcm_pin, e)))?;
            let pin = if active_low {
                pin.into_input_pullup()
            } else {
                pin.into_input_pulldown()
            };
            Ok(Self { pin, active_low })
        }
    }

    impl InputAdapter for GpioButton {
        fn is_pressed(&mut self) -> bool {
            self.pin.is_low() == self.active_low
        }
    }
}
