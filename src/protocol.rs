//! Register map and value decoding for the inverter.
//!
//! The bridge polls a fixed, ordered table of holding registers every cycle.
//! Slot [`STATUS_SLOT`] is always the device status register; its assembled
//! value drives the operating-state classification and is never published as
//! a reading of its own.

use crate::{Error, Result};

/// Status word reported while the inverter has shut down (no panel power).
pub const IDLE_STATUS: u32 = 0xA000;

/// Mask selecting the status family bits.
pub const ACTIVE_STATUS_MASK: u32 = 0xFFF0;
/// Masked status value of the normal grid-feeding family (`0x020*`).
pub const ACTIVE_STATUS_VALUE: u32 = 0x0200;

/// Upper bound for a rendered register value in display characters.
pub const MAX_TEXT_LEN: usize = 80;

/// Slot reserved for the device status register. Never published.
pub const STATUS_SLOT: usize = 0;

/// Slot of the internal temperature reading. While idle the device returns a
/// stale zero for this register, so the pipeline invalidates it.
pub const INTERNAL_TEMPERATURE_SLOT: usize = 1;

/// How an assembled register value is turned into a payload string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// No rendering; the slot never carries a payload.
    None,
    /// Divide by the descriptor gain and render as a fixed-point decimal.
    FloatScaled,
    /// Render the unsigned value directly; the gain plays no role.
    Unsigned,
}

/// Display format tied to the conversion kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayFormat {
    /// Fixed number of decimal places, for [`Conversion::FloatScaled`].
    Decimals(usize),
    /// Zero-padded lowercase hex of the given minimum width.
    Hex(usize),
    /// Plain decimal rendering of the unsigned value.
    Decimal,
}

/// One register range to poll each cycle.
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    /// Holding register start address.
    pub address: u16,
    /// Number of consecutive 16-bit words to read (1 or 2).
    pub word_count: u16,
    /// Integer divisor applied to the assembled value before float
    /// conversion. A gain of 1 means the value is rendered undivided.
    pub gain: u32,
    /// Conversion kind applied to the assembled value.
    pub conversion: Conversion,
    /// Display format for the converted value.
    pub format: DisplayFormat,
    /// Destination topic on the publish bus.
    pub topic: &'static str,
}

impl ParameterDescriptor {
    /// Renders an assembled register value according to this descriptor.
    ///
    /// Returns an empty string for [`Conversion::None`]. The result is
    /// bounded to [`MAX_TEXT_LEN`] characters.
    pub fn render(&self, value: u32) -> String {
        let mut text = match (self.conversion, self.format) {
            (Conversion::None, _) => String::new(),
            (Conversion::FloatScaled, DisplayFormat::Decimals(places)) => {
                let scaled = value as f64 / self.gain as f64;
                format!("{scaled:.places$}")
            }
            (Conversion::FloatScaled, _) => {
                format!("{}", value as f64 / self.gain as f64)
            }
            (Conversion::Unsigned, DisplayFormat::Hex(width)) => {
                format!("{value:0width$x}")
            }
            (Conversion::Unsigned, _) => value.to_string(),
        };
        text.truncate(MAX_TEXT_LEN);
        text
    }
}

/// Assembles consecutive 16-bit register words into one unsigned value,
/// most significant word first: `[0x0001, 0x0002]` becomes `0x0001_0002`.
pub fn assemble_words(words: &[u16]) -> u32 {
    words
        .iter()
        .fold(0u32, |value, word| (value << 16) | u32::from(*word))
}

/// Ordered list of register descriptors polled each cycle.
///
/// The ordering is load bearing: slot [`STATUS_SLOT`] must be the device
/// status register, both the state machine and the publisher special-case it.
#[derive(Debug, Clone)]
pub struct ParameterTable {
    params: Vec<ParameterDescriptor>,
}

impl ParameterTable {
    /// Validates and wraps a descriptor list.
    pub fn new(params: Vec<ParameterDescriptor>) -> Result<Self> {
        if params.is_empty() {
            return Err(Error::InvalidTable(
                "table must contain at least the status slot",
            ));
        }
        for param in &params {
            if !(1..=2).contains(&param.word_count) {
                return Err(Error::InvalidTable("word count must be 1 or 2"));
            }
            if param.conversion == Conversion::FloatScaled && param.gain == 0 {
                return Err(Error::InvalidTable(
                    "gain must be non-zero for scaled values",
                ));
            }
        }
        Ok(Self { params })
    }

    /// The register table of the inverter this bridge was written for.
    pub fn builtin() -> Self {
        Self {
            params: vec![
                ParameterDescriptor {
                    address: 32089,
                    word_count: 1,
                    gain: 1,
                    conversion: Conversion::Unsigned,
                    format: DisplayFormat::Hex(2),
                    topic: "sun/status",
                },
                ParameterDescriptor {
                    address: 32087,
                    word_count: 1,
                    gain: 10,
                    conversion: Conversion::FloatScaled,
                    format: DisplayFormat::Decimals(1),
                    topic: "sun/internalTemp",
                },
                ParameterDescriptor {
                    address: 32080,
                    word_count: 2,
                    gain: 1000,
                    conversion: Conversion::FloatScaled,
                    format: DisplayFormat::Decimals(3),
                    topic: "sun/activePower",
                },
                ParameterDescriptor {
                    address: 32064,
                    word_count: 2,
                    gain: 1000,
                    conversion: Conversion::FloatScaled,
                    format: DisplayFormat::Decimals(3),
                    topic: "sun/inputPower",
                },
                ParameterDescriptor {
                    address: 32106,
                    word_count: 2,
                    gain: 100,
                    conversion: Conversion::FloatScaled,
                    format: DisplayFormat::Decimals(2),
                    topic: "sun/accEnergy",
                },
                ParameterDescriptor {
                    address: 32114,
                    word_count: 2,
                    gain: 100,
                    conversion: Conversion::FloatScaled,
                    format: DisplayFormat::Decimals(2),
                    topic: "sun/dailyEnergy",
                },
            ],
        }
    }

    /// Number of slots in the table.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// True if the table has no slots. Cannot happen for validated tables.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Descriptor at `slot`, if present.
    pub fn get(&self, slot: usize) -> Option<&ParameterDescriptor> {
        self.params.get(slot)
    }

    /// Iterates the descriptors in slot order.
    pub fn iter(&self) -> std::slice::Iter<'_, ParameterDescriptor> {
        self.params.iter()
    }
}

impl Default for ParameterTable {
    fn default() -> Self {
        Self::builtin()
    }
}
