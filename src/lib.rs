//! # Matrix Clock Core Library
//!
//! This library holds everything the matrix clock needs between the hardware
//! and the pixels: the data model for one tick, the peripheral adapters, the
//! BDF font renderer, the frame composer and the polling loop. The binary in
//! `main.rs` only wires these together for either real hardware (Raspberry Pi
//! with a 64x64 HUB75 panel, DHT22 sensor and a pushbutton) or the terminal
//! development mode.
//!
//! ## Tick Model
//!
//! Every tick the loop samples the button, clears the off-screen framebuffer and
//! then renders exactly one of two frames:
//! - **Status**: weekday, date, time, temperature and humidity
//! - **Brightness overlay**: the "Brightness" label and the new level, shown
//!   right after a press advanced the brightness
//!
//! The finished framebuffer is handed to the panel on vsync and the buffer the
//! panel hands back becomes the next off-screen target.
//!
//! ## Core Types
//!
//! - [`TimeSnapshot`]: calendar fields already formatted for display
//! - [`EnvironmentReading`]: a sensor measurement or an explicit failure
//! - [`BrightnessLevel`]: a panel brightness step in 10..=100
//! - [`Frame`]: the mode-tagged data the composer renders

pub mod app;
pub mod button;
pub mod clock;
pub mod composer;
pub mod config;
pub mod display;
pub mod error;
pub mod font;
pub mod sensor;

#[cfg(test)]
mod tests;

/// Calendar fields for one tick, formatted for display.
///
/// # Example
/// ```
/// use matrix_clock_lib::TimeSnapshot;
///
/// let snapshot = TimeSnapshot {
///     weekday: 3,
///     date: "15.03".to_string(),
///     time: "14:05".to_string(),
/// };
/// assert_eq!(snapshot.weekday, 3);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeSnapshot {
    /// Day of week, 0 = Sunday through 6 = Saturday
    pub weekday: u8,
    /// Day and month as `DD.MM`
    pub date: String,
    /// Hour and minute as `HH:MM` (24 hour)
    pub time: String,
}

/// A successful temperature/humidity measurement, in whole units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Measurement {
    /// Degrees Celsius
    pub temperature: i32,
    /// Relative humidity in percent
    pub humidity: i32,
}

/// Result of polling the environment sensor once.
///
/// A failed read is its own variant so a genuine 0 C / 0 % measurement is
/// never confused with a sensor that did not answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvironmentReading {
    Valid(Measurement),
    Unavailable,
}

impl EnvironmentReading {
    pub fn valid(temperature: i32, humidity: i32) -> Self {
        EnvironmentReading::Valid(Measurement {
            temperature,
            humidity,
        })
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, EnvironmentReading::Valid(_))
    }

    pub fn measurement(&self) -> Option<Measurement> {
        match self {
            EnvironmentReading::Valid(measurement) => Some(*measurement),
            EnvironmentReading::Unavailable => None,
        }
    }
}

/// Panel brightness in percent, always one of 10, 20, ..., 100.
///
/// # Example
/// ```
/// use matrix_clock_lib::BrightnessLevel;
///
/// let level = BrightnessLevel::new(90).unwrap();
/// assert_eq!(level.advance().percent(), 100);
/// assert_eq!(level.advance().advance().percent(), 10);
/// assert!(BrightnessLevel::new(35).is_none());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BrightnessLevel(u8);

impl BrightnessLevel {
    pub const MIN: BrightnessLevel = BrightnessLevel(10);
    pub const MAX: BrightnessLevel = BrightnessLevel(100);
    pub const STEP: u8 = 10;
    /// Brightness the panel is brought up with
    pub const INITIAL: BrightnessLevel = BrightnessLevel(30);

    /// Returns `None` unless `percent` is a multiple of 10 in 10..=100.
    pub fn new(percent: u8) -> Option<Self> {
        if (Self::MIN.0..=Self::MAX.0).contains(&percent) && percent % Self::STEP == 0 {
            Some(BrightnessLevel(percent))
        } else {
            None
        }
    }

    /// Next step up, wrapping from 100 back to 10.
    pub fn advance(self) -> Self {
        if self >= Self::MAX {
            Self::MIN
        } else {
            BrightnessLevel(self.0 + Self::STEP)
        }
    }

    pub fn percent(self) -> u8 {
        self.0
    }
}

impl Default for BrightnessLevel {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl std::fmt::Display for BrightnessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which of the two layouts a tick renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    Status,
    BrightnessOverlay,
}

/// Everything the composer needs for one tick, tagged by mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Status {
        time: TimeSnapshot,
        environment: EnvironmentReading,
    },
    BrightnessOverlay {
        level: BrightnessLevel,
    },
}

impl Frame {
    pub fn mode(&self) -> RenderMode {
        match self {
            Frame::Status { .. } => RenderMode::Status,
            Frame::BrightnessOverlay { .. } => RenderMode::BrightnessOverlay,
        }
    }
}
