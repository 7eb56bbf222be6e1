//! In-process stand-in for the RTL model
//!
//! Behaves like a register file behind the SID bus: writes strobed on a
//! rising clock edge are latched and logged, and every enabled edge moves the
//! audio output to the next value of a scripted raw sample sequence.

use super::{ChipVariant, ControlPins, PinInputs, SidModel};

/// A register write observed on the model's bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusWrite {
    /// Address bus value (masked to 5 bits)
    pub address: u8,
    /// Data bus value
    pub data: u8,
    /// Index of the rising clock edge the strobe was sampled on
    pub edge: u64,
    /// Whether the edge was an active (clock-enabled) one
    pub clock_enabled: bool,
}

/// Recording SID model used for harness tests and dry runs
#[derive(Debug, Clone, Default)]
pub struct RecordingModel {
    clk: bool,
    evals: u64,
    rising_edges: u64,
    enabled_edges: u64,
    writes: Vec<BusWrite>,
    registers: [u8; 32],
    address: u8,
    variant: ChipVariant,
    script: Vec<i16>,
    script_pos: usize,
    output: i16,
}

impl RecordingModel {
    /// Create a model with a silent output
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a model that outputs `script[n]` after its n-th enabled edge
    ///
    /// Once the script runs out the last value is held.
    pub fn with_script(script: Vec<i16>) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    /// Every write strobe seen on a rising clock edge, in bus order
    pub fn writes(&self) -> &[BusWrite] {
        &self.writes
    }

    /// Number of `eval` calls
    pub fn evals(&self) -> u64 {
        self.evals
    }

    /// Number of rising clock edges
    pub fn rising_edges(&self) -> u64 {
        self.rising_edges
    }

    /// Number of rising clock edges with clock-enable asserted
    pub fn enabled_edges(&self) -> u64 {
        self.enabled_edges
    }

    /// Latched register contents
    pub fn registers(&self) -> &[u8; 32] {
        &self.registers
    }

    /// Variant present on the configuration pin at the last evaluation
    pub fn variant(&self) -> ChipVariant {
        self.variant
    }

    fn rising_edge(&mut self, inputs: &PinInputs) {
        let clock_enabled = inputs.control.contains(ControlPins::CLK_EN);

        if inputs.control.contains(ControlPins::WE) {
            let address = inputs.address & 0x1F;
            self.registers[address as usize] = inputs.data;
            self.writes.push(BusWrite {
                address,
                data: inputs.data,
                edge: self.rising_edges,
                clock_enabled,
            });
        }

        if clock_enabled {
            self.enabled_edges += 1;
            if let Some(&next) = self.script.get(self.script_pos) {
                self.output = next;
                self.script_pos += 1;
            }
        }

        self.rising_edges += 1;
    }
}

impl SidModel for RecordingModel {
    fn eval(&mut self, inputs: &PinInputs) {
        self.evals += 1;
        self.variant = inputs.variant;
        self.address = inputs.address & 0x1F;

        let clk = inputs.control.contains(ControlPins::CLK);
        if clk && !self.clk {
            self.rising_edge(inputs);
        }
        self.clk = clk;
    }

    fn sample_out(&self) -> i16 {
        self.output
    }

    fn read_data(&self) -> u8 {
        self.registers[self.address as usize]
    }
}
