//! GPIO output adapter.
//!
//! ## Dual-target design
//!
//! - **`target_os = "espidf"`**: real pin drivers via `esp-idf-hal`,
//!   one `PinDriver` held per configured pin.
//! - **all other targets**: levels tracked in-memory only.

use crate::app::ports::{GpioError, GpioPort};

#[cfg(target_os = "espidf")]
use esp_idf_hal::gpio::{AnyIOPin, Output, PinDriver};

pub struct NodeGpio {
    #[cfg(target_os = "espidf")]
    pins: std::collections::HashMap<u8, PinDriver<'static, AnyIOPin, Output>>,
    #[cfg(not(target_os = "espidf"))]
    levels: std::collections::HashMap<u8, bool>,
}

impl NodeGpio {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "espidf")]
            pins: std::collections::HashMap::new(),
            #[cfg(not(target_os = "espidf"))]
            levels: std::collections::HashMap::new(),
        }
    }

    /// Simulated level of a pin (host builds only).
    #[cfg(not(target_os = "espidf"))]
    pub fn level(&self, pin: u8) -> Option<bool> {
        self.levels.get(&pin).copied()
    }
}

impl Default for NodeGpio {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "espidf")]
impl GpioPort for NodeGpio {
    fn configure_output(&mut self, pin: u8) -> Result<(), GpioError> {
        // SAFETY: pin numbers come from the validated dashboard config;
        // each pin is claimed at most once (layout enforces uniqueness).
        let io = unsafe { AnyIOPin::new(i32::from(pin)) };
        let mut driver = PinDriver::output(io).map_err(|_| GpioError::InvalidPin(pin))?;
        driver.set_low().map_err(|_| GpioError::WriteFailed(pin))?;
        self.pins.insert(pin, driver);
        Ok(())
    }

    fn write(&mut self, pin: u8, high: bool) -> Result<(), GpioError> {
        let driver = self.pins.get_mut(&pin).ok_or(GpioError::InvalidPin(pin))?;
        let result = if high { driver.set_high() } else { driver.set_low() };
        result.map_err(|_| GpioError::WriteFailed(pin))
    }
}

#[cfg(not(target_os = "espidf"))]
impl GpioPort for NodeGpio {
    fn configure_output(&mut self, pin: u8) -> Result<(), GpioError> {
        self.levels.insert(pin, false);
        Ok(())
    }

    fn write(&mut self, pin: u8, high: bool) -> Result<(), GpioError> {
        match self.levels.get_mut(&pin) {
            Some(level) => {
                *level = high;
                log::debug!("GPIO(sim): pin {pin} <- {}", if high { "high" } else { "low" });
                Ok(())
            }
            None => Err(GpioError::InvalidPin(pin)),
        }
    }
}
