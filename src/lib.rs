//! SID RTL co-simulation harness
//!
//! Drives a cycle-stepped hardware logic model of the MOS 6581/8580 Sound
//! Interface Device through discrete clock transitions, turns register writes
//! queued by an emulator into timed bus transactions, and reconstructs an
//! audible waveform from the model's raw 1 MHz output.
//!
//! # Pipeline
//! - [`queue::WriteQueue`]: bounded FIFO of pending register writes
//! - [`clock::ClockStepper`]: half-cycle evaluation, write strobes, settle cycles
//! - [`filter::FilterCascade`]: two biquad low-pass sections (22.05 kHz)
//! - [`capture::OutputSink`]: dither, clip, raw little-endian PCM capture
//! - [`harness::Harness`]: tick batches, run budget, lifecycle
//!
//! The logic model itself is external and only reachable through the
//! [`SidModel`] pin contract. [`RecordingModel`] is an in-process stand-in
//! that records the bus traffic it sees.
//!
//! # Crate feature flags
//! - `export-wav` (default): [`capture::raw_to_wav`] via `hound`
//!
//! # Quick start
//! ```no_run
//! use sid_cosim::{Harness, HarnessConfig, RecordingModel};
//!
//! # fn main() -> sid_cosim::Result<()> {
//! let mut harness = Harness::initialize(HarnessConfig::default(), RecordingModel::new())?;
//! harness.enqueue_write(24, 0x0F)?; // Mode/volume
//! while !harness.should_stop()? {
//!     harness.run(19_656)?; // one PAL frame
//! }
//! harness.shutdown()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod capture;
pub mod clock;
pub mod config;
pub mod dither;
pub mod filter;
pub mod harness;
pub mod model;
pub mod queue;

/// SID clock rate on PAL machines (ticks per second)
///
/// Captures carry one sample per tick at this rate; the raw format has no
/// header so the rate travels out-of-band.
pub const SID_CLOCK_HZ: u32 = 985_248;

/// Number of addressable SID registers
pub const SID_REGISTER_COUNT: u8 = 32;

/// Error types for harness operations
#[derive(thiserror::Error, Debug)]
pub enum HarnessError {
    /// IO error from a capture stream or configuration file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The pending write queue reached its bound
    #[error("Write queue full ({capacity} pending writes)")]
    QueueFull {
        /// Configured queue bound
        capacity: usize,
    },

    /// Register address outside 0..=31
    #[error("Invalid register address: {0} (expected 0-31)")]
    InvalidRegister(u8),

    /// Operation attempted after `shutdown`
    #[error("Harness has been shut down")]
    ShutDown,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for HarnessError {
    /// Converts a String into `HarnessError::Other`.
    ///
    /// Prefer the specific variants where one applies; this conversion loses
    /// the error category.
    fn from(msg: String) -> Self {
        HarnessError::Other(msg)
    }
}

impl From<&str> for HarnessError {
    fn from(msg: &str) -> Self {
        HarnessError::Other(msg.to_string())
    }
}

impl From<serde_json::Error> for HarnessError {
    fn from(err: serde_json::Error) -> Self {
        HarnessError::ConfigError(err.to_string())
    }
}

/// Result type for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;

// Public API exports
pub use capture::{CaptureDiff, CaptureSink, OutputSink};
pub use clock::{ClockStepper, SimClock, DEFAULT_SETTLE_CYCLES};
pub use config::{HarnessArgs, HarnessConfig};
pub use dither::Dither;
pub use filter::{Biquad, BiquadCoefficients, FilterCascade};
pub use harness::{Harness, HarnessStats};
pub use model::{ChipVariant, ControlPins, PinInputs, RecordingModel, SidModel};
pub use queue::{PendingWrite, WriteQueue};
