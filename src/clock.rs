//! Clock stepping
//!
//! Advances the logic model through full clock cycles (low phase, high phase)
//! and places queued writes on the bus for exactly one active cycle.

use crate::model::{ChipVariant, ControlPins, PinInputs, SidModel};
use crate::queue::PendingWrite;

/// Settle cycles run after each active cycle
///
/// The 6581 DAC model needs 8 clocks to finish a conversion; 10 leaves
/// margin. Not validated for other netlists.
pub const DEFAULT_SETTLE_CYCLES: u32 = 10;

/// Simulation time in half-cycles
///
/// Advances by exactly 2 per full cycle, one step per evaluated phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimClock {
    time: u64,
}

impl SimClock {
    /// Create a clock at time zero
    pub fn new() -> Self {
        SimClock { time: 0 }
    }

    /// Advance by one evaluated phase
    pub fn tick(&mut self) {
        self.time += 1;
    }

    /// Current simulation timestamp
    pub fn now(&self) -> u64 {
        self.time
    }

    /// Completed full cycles
    pub fn cycles(&self) -> u64 {
        self.time / 2
    }
}

/// Drives a [`SidModel`] through clock cycles
#[derive(Debug)]
pub struct ClockStepper<M> {
    model: M,
    pins: PinInputs,
    clock: SimClock,
    settle_cycles: u32,
    active_cycles: u64,
    writes_applied: u64,
}

impl<M: SidModel> ClockStepper<M> {
    /// Take ownership of `model` with every input pin low
    pub fn new(model: M, settle_cycles: u32) -> Self {
        Self {
            model,
            pins: PinInputs::default(),
            clock: SimClock::new(),
            settle_cycles,
            active_cycles: 0,
            writes_applied: 0,
        }
    }

    /// One full cycle: clock low, eval, clock high, eval
    pub fn cycle(&mut self) {
        self.pins.control.remove(ControlPins::CLK);
        self.model.eval(&self.pins);
        self.clock.tick();

        self.pins.control.insert(ControlPins::CLK);
        self.model.eval(&self.pins);
        self.clock.tick();
    }

    /// Run one active cycle followed by the settle cycles
    ///
    /// A write, when present, is on the bus with WE asserted for the active
    /// cycle only. Returns the raw model output read once the settle cycles
    /// have completed.
    pub fn step_active(&mut self, write: Option<PendingWrite>) -> i16 {
        if let Some(write) = write {
            self.pins.address = write.register();
            self.pins.data = write.value();
            self.pins.control.insert(ControlPins::WE);
            self.writes_applied += 1;
            log::trace!(
                "bus write ${:02x} <- ${:02x} @ {}",
                write.register(),
                write.value(),
                self.clock.now()
            );
        }

        self.pins.control.insert(ControlPins::CLK_EN);
        self.cycle();
        self.active_cycles += 1;

        self.pins.control.remove(ControlPins::WE | ControlPins::CLK_EN);
        for _ in 0..self.settle_cycles {
            self.cycle();
        }

        self.model.sample_out()
    }

    /// Set the chip revision pin; seen by the model on its next evaluation
    pub fn set_variant(&mut self, variant: ChipVariant) {
        self.pins.variant = variant;
    }

    /// Current chip revision pin level
    pub fn variant(&self) -> ChipVariant {
        self.pins.variant
    }

    /// Simulation timestamp in half-cycles
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Active (clock-enabled) cycles run so far
    pub fn active_cycles(&self) -> u64 {
        self.active_cycles
    }

    /// Writes strobed onto the bus so far
    pub fn writes_applied(&self) -> u64 {
        self.writes_applied
    }

    /// Configured settle cycles per active cycle
    pub fn settle_cycles(&self) -> u32 {
        self.settle_cycles
    }

    /// Borrow the model
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Release the model
    pub fn into_model(self) -> M {
        self.model
    }
}
