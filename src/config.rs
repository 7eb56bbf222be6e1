//! Harness configuration
//!
//! [`HarnessConfig`] can be built in code, loaded from JSON, or derived from
//! the host process arguments with [`HarnessArgs`]. Process arguments are
//! shared with the RTL simulator, so only the harness's own `--flag value` /
//! `--flag=value` pairs are handed to clap and everything else is skipped.

use crate::clock::DEFAULT_SETTLE_CYCLES;
use crate::dither::DEFAULT_DITHER_SEED;
use crate::model::ChipVariant;
use crate::queue::DEFAULT_QUEUE_CAPACITY;
use crate::{HarnessError, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Budget granularity: ticks per second of simulated time
pub const BUDGET_TICKS_PER_SECOND: i64 = 1_000_000;

/// Default simulated duration before `should_stop` trips
pub const DEFAULT_BUDGET_SECONDS: i64 = 120;

/// Default primary capture file
pub const DEFAULT_CAPTURE_PATH: &str = "output.bin";

/// Harness flags that take a value
const VALUE_FLAGS: [&str; 7] = [
    "--config",
    "--capture",
    "--reference",
    "--seconds",
    "--settle-cycles",
    "--seed",
    "--variant",
];

/// Harness flags without a value
const SWITCH_FLAGS: [&str; 1] = ["--no-capture"];

/// Runtime configuration of a [`Harness`](crate::Harness)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Ticks to run before `should_stop` reports true
    pub budget_ticks: i64,
    /// Clock-disabled cycles after every active cycle
    pub settle_cycles: u32,
    /// Bound on pending register writes
    pub queue_capacity: usize,
    /// Dither generator seed
    pub dither_seed: u32,
    /// Primary capture file (`None` disables capture)
    pub capture_path: Option<PathBuf>,
    /// Reference capture file (`None` disables it)
    pub reference_path: Option<PathBuf>,
    /// Chip revision selected at startup
    pub variant: ChipVariant,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            budget_ticks: DEFAULT_BUDGET_SECONDS * BUDGET_TICKS_PER_SECOND,
            settle_cycles: DEFAULT_SETTLE_CYCLES,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            dither_seed: DEFAULT_DITHER_SEED,
            capture_path: Some(PathBuf::from(DEFAULT_CAPTURE_PATH)),
            reference_path: None,
            variant: ChipVariant::default(),
        }
    }
}

impl HarnessConfig {
    /// Configuration that persists nothing
    pub fn without_capture() -> Self {
        Self {
            capture_path: None,
            ..Self::default()
        }
    }

    /// Set the run budget in ticks
    pub fn budget_ticks(mut self, ticks: i64) -> Self {
        self.budget_ticks = ticks;
        self
    }

    /// Set the run budget in seconds of simulated time
    pub fn budget_seconds(mut self, seconds: i64) -> Self {
        self.budget_ticks = seconds.saturating_mul(BUDGET_TICKS_PER_SECOND);
        self
    }

    /// Set the primary capture file
    pub fn capture_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.capture_path = Some(path.into());
        self
    }

    /// Set the reference capture file
    pub fn reference_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.reference_path = Some(path.into());
        self
    }

    /// Set the settle cycle count
    pub fn settle_cycles(mut self, cycles: u32) -> Self {
        self.settle_cycles = cycles;
        self
    }

    /// Set the pending write bound
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the dither seed
    pub fn dither_seed(mut self, seed: u32) -> Self {
        self.dither_seed = seed;
        self
    }

    /// Set the startup chip revision
    pub fn variant(mut self, variant: ChipVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject settings the harness cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(HarnessError::ConfigError(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.settle_cycles < DEFAULT_SETTLE_CYCLES {
            log::warn!(
                "settle_cycles = {} is below the validated {}; DAC output may not have settled",
                self.settle_cycles,
                DEFAULT_SETTLE_CYCLES
            );
        }
        Ok(())
    }
}

/// Harness options taken from the host process arguments
#[derive(Parser, Debug, Default)]
#[command(name = "sid-cosim")]
#[command(about = "SID RTL co-simulation harness options")]
#[command(disable_help_flag = true, disable_version_flag = true)]
pub struct HarnessArgs {
    /// JSON configuration file (flags below override it)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Primary capture file
    #[arg(long, value_name = "PATH")]
    pub capture: Option<PathBuf>,

    /// Disable the primary capture
    #[arg(long)]
    pub no_capture: bool,

    /// Reference capture file
    #[arg(long, value_name = "PATH")]
    pub reference: Option<PathBuf>,

    /// Simulated seconds before the run budget is exhausted
    #[arg(long)]
    pub seconds: Option<i64>,

    /// Settle cycles after each active cycle
    #[arg(long)]
    pub settle_cycles: Option<u32>,

    /// Dither seed
    #[arg(long)]
    pub seed: Option<u32>,

    /// Chip revision (6581 or 8580)
    #[arg(long)]
    pub variant: Option<ChipVariant>,
}

impl HarnessArgs {
    /// Parse harness options out of `args` (including the program name)
    ///
    /// Simulator arguments anywhere in `args` are skipped. A harness flag with
    /// a missing or malformed value is a [`HarnessError::ConfigError`].
    pub fn parse_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(harness_args(args))
            .map_err(|e| HarnessError::ConfigError(e.to_string()))
    }

    /// Resolve into a validated configuration
    pub fn into_config(self) -> Result<HarnessConfig> {
        let mut config = match &self.config {
            Some(path) => HarnessConfig::from_json_file(path)?,
            None => HarnessConfig::default(),
        };

        if let Some(path) = self.capture {
            config.capture_path = Some(path);
        }
        if self.no_capture {
            config.capture_path = None;
        }
        if let Some(path) = self.reference {
            config.reference_path = Some(path);
        }
        if let Some(seconds) = self.seconds {
            config = config.budget_seconds(seconds);
        }
        if let Some(cycles) = self.settle_cycles {
            config.settle_cycles = cycles;
        }
        if let Some(seed) = self.seed {
            config.dither_seed = seed;
        }
        if let Some(variant) = self.variant {
            config.variant = variant;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Keep the program name and the harness's own flags
///
/// A value-taking flag swallows the following argument whatever it looks
/// like, and is forwarded as `--flag=value` so clap never reads the value as
/// another option.
fn harness_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut args = args.into_iter().map(Into::into);
    let mut kept: Vec<OsString> = args.next().into_iter().collect();

    while let Some(arg) = args.next() {
        let Some(text) = arg.to_str() else {
            continue;
        };
        let name = text.split_once('=').map_or(text, |(name, _)| name);

        if SWITCH_FLAGS.contains(&name) {
            kept.push(arg);
        } else if VALUE_FLAGS.contains(&name) {
            if name.len() < text.len() {
                kept.push(arg);
            } else if let Some(value) = args.next() {
                let mut joined = OsString::from(format!("{name}="));
                joined.push(&value);
                kept.push(joined);
            } else {
                // clap reports the missing value
                kept.push(arg);
            }
        }
    }

    kept
}
