//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the
//! `matrix-clock.toml` file. Every value has a compiled-in default matching the
//! stock appliance (64x64 panel, DHT22 on BCM 27, button on BCM 17, BDF fonts
//! in `../fonts`), so the file only needs the keys that differ.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::button::TriggerMode;
use crate::BrightnessLevel;

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE: &str = "matrix-clock.toml";

/// Largest visible width or height, in pixels, across chained panels
pub const MAX_PANEL_PIXELS: u32 = 1024;

/// Application configuration loaded from matrix-clock.toml
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// LED matrix geometry and driver options
    pub panel: PanelConfig,
    /// GPIO pin assignments
    pub pins: PinConfig,
    /// Bitmap font locations
    pub fonts: FontConfig,
    /// Loop pacing and sensor timing
    pub timing: TimingConfig,
    /// Button behaviour
    pub input: InputConfig,
}

/// LED matrix options passed to the panel driver
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PanelConfig {
    pub rows: u32,
    pub cols: u32,
    pub chain_length: u32,
    pub parallel: u32,
    /// Brightness at startup, percent (10..=100 in steps of 10)
    pub brightness: u8,
    /// GPIO slowdown factor for fast Pi models
    pub gpio_slowdown: u32,
    pub hardware_mapping: String,
    pub drop_privileges: bool,
}

/// BCM GPIO numbers for the peripherals
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PinConfig {
    /// DHT22 data line (BCM 27 = wiringPi 2 = header pin 13)
    pub sensor: u8,
    pub button: u8,
    /// Button wired to ground with a pull-up (reads low when pressed)
    pub button_active_low: bool,
}

/// Font files, resolved relative to `root`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FontConfig {
    pub root: PathBuf,
    pub day: String,
    pub date: String,
    pub time: String,
    pub climate: String,
}

/// Which font a piece of text is drawn with
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FontRole {
    Day,
    Date,
    Time,
    Climate,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Pause after a status frame
    pub tick_ms: u64,
    /// Pause after a brightness overlay frame
    pub brightness_hold_ms: u64,
    /// Upper bound for a single sensor transaction
    pub sensor_timeout_ms: u64,
    /// The DHT22 needs about two seconds between conversions
    pub sensor_min_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InputConfig {
    pub trigger: TriggerMode,
    pub debounce_ms: u64,
}

/// Configuration values that parse but cannot drive the appliance
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("panel brightness {0} is not one of 10, 20, ..., 100")]
    Brightness(u8),

    #[error(
        "panel {rows}x{cols} (chain {chain_length}, parallel {parallel}) must span 1 to {max} pixels each way",
        max = MAX_PANEL_PIXELS
    )]
    PanelSize {
        rows: u32,
        cols: u32,
        chain_length: u32,
        parallel: u32,
    },

    #[error("tick interval must be greater than zero")]
    ZeroTick,
}

impl Default for PanelConfig {
    fn default() -> Self {
        PanelConfig {
            rows: 64,
            cols: 64,
            chain_length: 1,
            parallel: 1,
            brightness: BrightnessLevel::INITIAL.percent(),
            gpio_slowdown: 4,
            hardware_mapping: "regular".to_string(),
            drop_privileges: false,
        }
    }
}

impl Default for PinConfig {
    fn default() -> Self {
        PinConfig {
            sensor: 27,
            button: 17,
            button_active_low: true,
        }
    }
}

impl Default for FontConfig {
    fn default() -> Self {
        FontConfig {
            root: PathBuf::from("../fonts"),
            day: "8x13B.bdf".to_string(),
            date: "6x13B.bdf".to_string(),
            time: "texgyre-27.bdf".to_string(),
            climate: "6x13B.bdf".to_string(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            tick_ms: 100,
            brightness_hold_ms: 500,
            sensor_timeout_ms: 100,
            sensor_min_interval_ms: 2000,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        InputConfig {
            trigger: TriggerMode::Edge,
            debounce_ms: 50,
        }
    }
}

impl FontConfig {
    /// Full path of the font file used for `role`
    pub fn path(&self, role: FontRole) -> PathBuf {
        let file = match role {
            FontRole::Day => &self.day,
            FontRole::Date => &self.date,
            FontRole::Time => &self.time,
            FontRole::Climate => &self.climate,
        };
        self.root.join(file)
    }
}

impl Config {
    /// Load configuration from matrix-clock.toml
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    log::info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Invalid config file format: {}", e);
                    log::warn!("Using default configuration");
                    Self::default()
                }
            },
            Err(_) => {
                log::info!(
                    "No config file at {}, using default configuration",
                    path.display()
                );
                Self::default()
            }
        }
    }

    /// Check the values the loop relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if BrightnessLevel::new(self.panel.brightness).is_none() {
            return Err(ConfigError::Brightness(self.panel.brightness));
        }
        let panel = &self.panel;
        let width = panel.cols.checked_mul(panel.chain_length);
        let height = panel.rows.checked_mul(panel.parallel);
        let in_range = |side: Option<u32>| matches!(side, Some(1..=MAX_PANEL_PIXELS));
        if !in_range(width) || !in_range(height) {
            return Err(ConfigError::PanelSize {
                rows: panel.rows,
                cols: panel.cols,
                chain_length: panel.chain_length,
                parallel: panel.parallel,
            });
        }
        if self.timing.tick_ms == 0 {
            return Err(ConfigError::ZeroTick);
        }
        Ok(())
    }

    /// Startup brightness; only meaningful after [`Config::validate`]
    pub fn initial_brightness(&self) -> BrightnessLevel {
        BrightnessLevel::new(self.panel.brightness).unwrap_or_default()
    }

    /// Visible width in pixels across the whole chain
    pub fn panel_width(&self) -> u32 {
        self.panel.cols.saturating_mul(self.panel.chain_length)
    }

    /// Visible height in pixels across parallel chains
    pub fn panel_height(&self) -> u32 {
        self.panel.rows.saturating_mul(self.panel.parallel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.panel.rows, 64);
        assert_eq!(config.panel.cols, 64);
        assert_eq!(config.panel.brightness, 30);
        assert_eq!(config.panel.gpio_slowdown, 4);
        assert_eq!(config.pins.sensor, 27);
        assert_eq!(config.timing.tick_ms, 100);
        assert_eq!(config.timing.brightness_hold_ms, 500);
        assert_eq!(config.input.trigger, TriggerMode::Edge);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.fonts.root, parsed.fonts.root);
        assert_eq!(config.pins.button, parsed.pins.button);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[fonts]\nroot = \"/usr/share/matrix-clock/fonts\"\n\n[input]\ntrigger = \"level\""
        )
        .unwrap();

        let config = Config::load_from_path(file.path());
        assert_eq!(
            config.fonts.root,
            PathBuf::from("/usr/share/matrix-clock/fonts")
        );
        assert_eq!(config.fonts.day, "8x13B.bdf");
        assert_eq!(config.input.trigger, TriggerMode::Level);
        assert_eq!(config.input.debounce_ms, 50);
        assert_eq!(config.panel.rows, 64);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path");
        // Should fallback to default
        assert_eq!(config.pins.button, 17);
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[panel\nrows = ").unwrap();
        let config = Config::load_from_path(file.path());
        assert_eq!(config.panel.rows, 64);
    }

    #[test]
    fn test_font_paths_join_root() {
        let fonts = FontConfig::default();
        assert_eq!(fonts.path(FontRole::Day), PathBuf::from("../fonts/8x13B.bdf"));
        assert_eq!(
            fonts.path(FontRole::Time),
            PathBuf::from("../fonts/texgyre-27.bdf")
        );
    }

    #[test]
    fn test_validate_rejects_oversized_panel() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[panel]\nrows = 65536\ncols = 65536").unwrap();
        let config = Config::load_from_path(file.path());
        assert_eq!(config.panel.rows, 65536);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PanelSize {
                rows: 65536,
                cols: 65536,
                ..
            })
        ));
        assert_eq!(config.panel_width(), 65536);

        // The product overflows u32 even though each factor is small enough
        let mut config = Config::default();
        config.panel.cols = 1 << 16;
        config.panel.chain_length = 1 << 16;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PanelSize { .. })
        ));
        assert_eq!(config.panel_width(), u32::MAX);

        let mut config = Config::default();
        config.panel.chain_length = 16;
        assert!(config.validate().is_ok());
        assert_eq!(config.panel_width(), MAX_PANEL_PIXELS);
        config.panel.chain_length = 17;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.panel.brightness = 35;
        assert_eq!(config.validate(), Err(ConfigError::Brightness(35)));

        let mut config = Config::default();
        config.panel.cols = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PanelSize {
                rows: 64,
                cols: 0,
                ..
            })
        ));

        let mut config = Config::default();
        config.panel.chain_length = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PanelSize { chain_length: 0, .. })
        ));

        let mut config = Config::default();
        config.timing.tick_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroTick));
    }
}
