//! Port traits — the hexagonal boundary between the synchronization
//! core and the outside world.

use core::fmt;

// ── GPIO ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioError {
    /// Pin number is not usable as an output on this board.
    InvalidPin(u8),
    /// The write itself failed at the driver level.
    WriteFailed(u8),
}

impl fmt::Display for GpioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPin(p) => write!(f, "pin {p} not usable as output"),
            Self::WriteFailed(p) => write!(f, "write to pin {p} failed"),
        }
    }
}

/// Digital output access for LEDs.
///
/// Production wires this to the MCU GPIO matrix; tests inject a
/// recorder so assertions can run against the full write history.
pub trait GpioPort {
    /// Claim a pin and configure it as a low output.
    fn configure_output(&mut self, pin: u8) -> Result<(), GpioError>;

    /// Drive a previously configured pin.
    fn write(&mut self, pin: u8, high: bool) -> Result<(), GpioError>;
}
