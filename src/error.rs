//! Startup failures.
//!
//! Everything that can go wrong before the first frame is fatal: the binary
//! prints one diagnostic line and exits with status 1. Runtime problems (a
//! sensor that does not answer) never reach this type; they are rendered as
//! placeholders instead.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::font::FontError;

#[derive(Error, Debug)]
pub enum StartupError {
    /// GPIO subsystem could not be opened or a pin could not be claimed
    #[error("GPIO init failed: {0}")]
    Gpio(String),

    /// LED matrix driver refused the panel options
    #[error("LED matrix init failed: {0}")]
    Matrix(String),

    /// One of the bitmap fonts is missing or unreadable
    #[error("couldn't load font {}: {source}", path.display())]
    Font {
        path: PathBuf,
        #[source]
        source: FontError,
    },

    /// Configuration values are out of range
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
