//! YMF271-F "OPX" FM + PCM tone generator emulator
//!
//! A cycle-accurate emulator of the Yamaha YMF271-F hybrid tone generator
//! used in arcade sound hardware (Seibu SPI and friends).
//!
//! # Features
//! - 48 slots arranged as 12 groups x 4 banks, with per-group sync modes
//!   (4-op FM, 2x2-op FM, 3-op FM + PCM, 4x PCM)
//! - All 16 four-operator algorithms with one-sample feedback delay
//! - PCM streaming from up to 8 MiB of external memory, 8-bit and 12-bit
//!   packed formats, normal and alternate (bidirectional) loops
//! - PFM mode: external PCM data as the FM carrier waveform
//! - 18-bit saturating accumulator path (Accon) for controlled overdrive
//! - Timer A/B period calculation, status flags and level-sensitive IRQ
//!
//! # Quick start
//! ```
//! use ymf271::Ymf271;
//! let mut chip = Ymf271::new(16_934_400).unwrap();
//! chip.write(0x0c, 0x00); // group 0 sub-address
//! chip.write(0x0d, 0x00); // sync mode 0 (4-op FM)
//! let mut left = [0i32; 512];
//! let mut right = [0i32; 512];
//! chip.update(&mut left, &mut right);
//! ```
//!
//! The chip renders at `clock / 384` Hz (44100 Hz at the standard
//! 16.9344 MHz crystal). Timers compute periods but never fire on their
//! own: the host owns time and calls [`Ymf271::timer_a_tick`] /
//! [`Ymf271::timer_b_tick`] when a period elapses.

#![warn(missing_docs)]

mod algorithms;
mod chip;
pub mod constants;
mod operator;
mod pcm;
mod registers;
mod slot;
mod tables;

/// Error types for YMF271 chip emulator operations
///
/// This enum only contains errors that can occur while constructing or
/// configuring the core. Rendering and register access are infallible.
#[derive(thiserror::Error, Debug)]
pub enum Ymf271Error {
    /// IO error from filesystem or device
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for Ymf271Error {
    /// Converts a String into `Ymf271Error::Other`.
    fn from(msg: String) -> Self {
        Ymf271Error::Other(msg)
    }
}

impl From<&str> for Ymf271Error {
    /// Converts a string slice into `Ymf271Error::Other`.
    fn from(msg: &str) -> Self {
        Ymf271Error::Other(msg.to_string())
    }
}

/// Result type for emulator operations
pub type Result<T> = std::result::Result<T, Ymf271Error>;

// Public API exports
pub use chip::{SyncMode, Ymf271};
pub use constants::STD_CLOCK;
