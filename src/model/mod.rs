//! Pin-level contract for the external SID logic model
//!
//! The harness never looks inside the model. It drives a fixed set of input
//! pins, asks the model to evaluate, and reads the output pins back. Any
//! cycle-stepped implementation (a Verilated netlist behind FFI, an FPGA
//! bridge, or the in-process [`RecordingModel`]) plugs in through [`SidModel`].

mod recording;

pub use recording::{BusWrite, RecordingModel};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Single-bit control inputs of the model
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ControlPins: u8 {
        /// Master clock input
        const CLK = 0x01;
        /// Clock enable (asserted during active cycles only)
        const CLK_EN = 0x02;
        /// Register write strobe
        const WE = 0x04;
    }
}

/// Chip revision selected through the model's configuration pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChipVariant {
    /// Original NMOS revision (C64 breadbin)
    #[default]
    Mos6581,
    /// HMOS-II revision (C64C, C128)
    Mos8580,
}

impl ChipVariant {
    /// Map the model's boolean `is6581` configuration signal to a variant
    pub fn from_is_6581(is_6581: bool) -> Self {
        if is_6581 {
            ChipVariant::Mos6581
        } else {
            ChipVariant::Mos8580
        }
    }

    /// Level of the configuration pin for this variant
    pub fn is_6581(self) -> bool {
        self == ChipVariant::Mos6581
    }
}

impl std::str::FromStr for ChipVariant {
    type Err = crate::HarnessError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "6581" | "mos6581" => Ok(ChipVariant::Mos6581),
            "8580" | "mos8580" => Ok(ChipVariant::Mos8580),
            other => Err(crate::HarnessError::ConfigError(format!(
                "unknown chip variant '{other}' (expected 6581 or 8580)"
            ))),
        }
    }
}

/// Complete set of input pin levels presented to the model on each evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PinInputs {
    /// Clock, clock-enable and write-enable levels
    pub control: ControlPins,
    /// Register address bus (low 5 bits significant)
    pub address: u8,
    /// Write data bus
    pub data: u8,
    /// Chip revision configuration input
    pub variant: ChipVariant,
}

/// Common interface for cycle-stepped SID logic models
///
/// Implementations latch `inputs` and settle their combinational logic in
/// [`eval`](SidModel::eval), exactly like one evaluation of a generated RTL
/// netlist. Sequential state advances on the rising edge of
/// [`ControlPins::CLK`].
///
/// # Example
///
/// ```
/// use sid_cosim::{ControlPins, PinInputs, RecordingModel, SidModel};
///
/// let mut model = RecordingModel::new();
/// let mut pins = PinInputs::default();
/// model.eval(&pins);
/// pins.control.insert(ControlPins::CLK);
/// model.eval(&pins);
/// let sample = model.sample_out();
/// # let _ = sample;
/// ```
pub trait SidModel {
    /// Evaluate the model with the given input pin levels
    fn eval(&mut self, inputs: &PinInputs);

    /// Signed 16-bit audio output pin
    fn sample_out(&self) -> i16;

    /// 8-bit read data output pin
    ///
    /// The harness never reads registers back; models without a read port
    /// may keep the default.
    fn read_data(&self) -> u8 {
        0
    }
}

impl<M: SidModel + ?Sized> SidModel for Box<M> {
    fn eval(&mut self, inputs: &PinInputs) {
        (**self).eval(inputs)
    }

    fn sample_out(&self) -> i16 {
        (**self).sample_out()
    }

    fn read_data(&self) -> u8 {
        (**self).read_data()
    }
}
