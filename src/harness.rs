//! Run controller
//!
//! Owns the model, the pending writes, the reconstruction filter and the
//! capture streams of one co-simulation, and runs them in tick batches.
//!
//! Every tick is one active cycle of the model followed by the settle cycles:
//!
//! ```text
//! dequeue-if-any -> active cycle -> settle cycles -> raw sample
//!     -> FilterCascade -> OutputSink
//! ```
//!
//! The run budget only tells the caller when to stop; the harness never
//! stops itself.

use crate::capture::{CaptureSink, OutputSink};
use crate::clock::ClockStepper;
use crate::config::{HarnessArgs, HarnessConfig};
use crate::dither::Dither;
use crate::filter::FilterCascade;
use crate::model::{ChipVariant, SidModel};
use crate::queue::{PendingWrite, WriteQueue};
use crate::{HarnessError, Result};
use std::ffi::OsString;

/// Counters describing a harness run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HarnessStats {
    /// Ticks requested through `run`
    pub ticks_run: u64,
    /// Samples quantized (one per tick)
    pub samples_emitted: u64,
    /// Samples persisted to the primary capture
    pub samples_captured: u64,
    /// Register writes strobed onto the bus
    pub writes_applied: u64,
    /// Register writes still waiting
    pub pending_writes: usize,
    /// Remaining run budget (may be negative)
    pub remaining_budget: i64,
}

/// Everything released on shutdown
struct Session<M> {
    stepper: ClockStepper<M>,
    queue: WriteQueue,
    filter: FilterCascade,
    output: OutputSink,
    budget: i64,
    ticks_run: u64,
}

/// One co-simulation of a SID logic model
pub struct Harness<M: SidModel> {
    session: Option<Session<M>>,
}

impl<M: SidModel> Harness<M> {
    /// Take ownership of `model` and open the capture streams
    ///
    /// A capture file that cannot be opened does not fail initialization:
    /// the stream becomes a no-op, a warning is logged and
    /// [`capture_active`](Self::capture_active) reports false. An invalid
    /// configuration fails with [`HarnessError::ConfigError`] before any
    /// file is opened.
    pub fn initialize(config: HarnessConfig, model: M) -> Result<Self> {
        config.validate()?;
        Ok(Self::open(config, model))
    }

    /// Parse process arguments into a configuration and initialize
    pub fn from_args<I, T>(args: I, model: M) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        // into_config validates
        let config = HarnessArgs::parse_args(args)?.into_config()?;
        Ok(Self::open(config, model))
    }

    fn open(config: HarnessConfig, model: M) -> Self {
        let primary = match &config.capture_path {
            Some(path) => CaptureSink::create_or_disabled(path, "primary"),
            None => CaptureSink::disabled(),
        };
        let reference = match &config.reference_path {
            Some(path) => CaptureSink::create_or_disabled(path, "reference"),
            None => CaptureSink::disabled(),
        };

        Self::assemble(config, model, primary, reference)
    }

    /// Initialize with caller-provided capture streams
    pub fn with_sinks(
        config: HarnessConfig,
        model: M,
        primary: CaptureSink,
        reference: CaptureSink,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, model, primary, reference))
    }

    fn assemble(
        config: HarnessConfig,
        model: M,
        primary: CaptureSink,
        reference: CaptureSink,
    ) -> Self {
        let mut stepper = ClockStepper::new(model, config.settle_cycles);
        stepper.set_variant(config.variant);

        log::info!(
            "harness ready: budget {} ticks, {} settle cycles, {:?}, capture {}",
            config.budget_ticks,
            config.settle_cycles,
            config.variant,
            if primary.is_active() { "on" } else { "off" }
        );

        Self {
            session: Some(Session {
                stepper,
                queue: WriteQueue::new(config.queue_capacity),
                filter: FilterCascade::new(),
                output: OutputSink::new(Dither::new(config.dither_seed), primary, reference),
                budget: config.budget_ticks,
                ticks_run: 0,
            }),
        }
    }

    fn session(&self) -> Result<&Session<M>> {
        self.session.as_ref().ok_or(HarnessError::ShutDown)
    }

    fn session_mut(&mut self) -> Result<&mut Session<M>> {
        self.session.as_mut().ok_or(HarnessError::ShutDown)
    }

    /// Select the chip revision for subsequent cycles
    pub fn select_device_variant(&mut self, variant: ChipVariant) -> Result<()> {
        let session = self.session_mut()?;
        log::debug!("chip variant -> {:?}", variant);
        session.stepper.set_variant(variant);
        Ok(())
    }

    /// Queue a register write for the next free active cycle
    ///
    /// Fails with [`HarnessError::InvalidRegister`] for addresses above 31 and
    /// with [`HarnessError::QueueFull`] when the pending bound is reached.
    pub fn enqueue_write(&mut self, register: u8, value: u8) -> Result<()> {
        let session = self.session_mut()?;
        let write = PendingWrite::new(register, value)?;
        session.queue.enqueue(write).map_err(|e| {
            log::warn!("dropping write ${register:02x} <- ${value:02x}: {e}");
            e
        })
    }

    /// Advance the simulation by `n_ticks` chip clocks
    ///
    /// Each tick applies at most one queued write, produces one filtered
    /// sample and appends it to the primary capture. The budget is reduced
    /// by `n_ticks` whether or not it was already exhausted.
    pub fn run(&mut self, n_ticks: u32) -> Result<()> {
        let session = self.session_mut()?;
        session.budget -= i64::from(n_ticks);

        for _ in 0..n_ticks {
            let write = session.queue.dequeue_if_any();
            let raw = session.stepper.step_active(write);
            let filtered = session.filter.process(f64::from(raw));
            session.output.emit(filtered)?;
        }
        session.ticks_run += u64::from(n_ticks);
        Ok(())
    }

    /// True once the run budget is exhausted
    pub fn should_stop(&self) -> Result<bool> {
        Ok(self.session()?.budget <= 0)
    }

    /// Append an externally computed sample to the reference capture
    pub fn capture_reference(&mut self, sample: i16) -> Result<()> {
        self.session_mut()?.output.capture_reference(sample)
    }

    /// Restart the dither sequence from `seed`
    pub fn reseed_dither(&mut self, seed: u32) -> Result<()> {
        let session = self.session_mut()?;
        log::debug!("dither reseeded with {seed}");
        session.output.reseed(seed);
        Ok(())
    }

    /// True while the primary capture is persisting samples
    pub fn capture_active(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.output.primary().is_active())
    }

    /// Simulation timestamp in half-cycles
    pub fn now(&self) -> Result<u64> {
        Ok(self.session()?.stepper.now())
    }

    /// Borrow the model
    pub fn model(&self) -> Result<&M> {
        Ok(self.session()?.stepper.model())
    }

    /// Current run counters
    pub fn stats(&self) -> Result<HarnessStats> {
        let session = self.session()?;
        Ok(HarnessStats {
            ticks_run: session.ticks_run,
            samples_emitted: session.output.emitted(),
            samples_captured: session.output.primary().samples_written(),
            writes_applied: session.stepper.writes_applied(),
            pending_writes: session.queue.len(),
            remaining_budget: session.budget,
        })
    }

    /// True after `shutdown`
    pub fn is_shut_down(&self) -> bool {
        self.session.is_none()
    }

    /// Close the capture streams and release the model
    ///
    /// Safe to call repeatedly; only the first call does anything. Every
    /// other operation fails with [`HarnessError::ShutDown`] afterwards.
    pub fn shutdown(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };

        let dropped = session.queue.clear();
        if dropped > 0 {
            log::debug!("discarding {dropped} undelivered writes");
        }

        log::info!(
            "harness shutdown: {} ticks, {} samples captured, {} writes applied",
            session.ticks_run,
            session.output.primary().samples_written(),
            session.stepper.writes_applied()
        );

        session.output.close()
    }
}

impl<M: SidModel> Drop for Harness<M> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!("error closing capture on drop: {e}");
        }
    }
}

impl<M: SidModel> std::fmt::Debug for Harness<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("shut_down", &self.is_shut_down())
            .field("capture_active", &self.capture_active())
            .field("stats", &self.stats().ok())
            .finish_non_exhaustive()
    }
}
