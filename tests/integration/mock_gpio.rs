//! Mock GPIO port for integration tests.
//!
//! Records every configure/write call so tests can assert on the full
//! hardware history without touching real pins.

use std::cell::RefCell;
use std::rc::Rc;

use hadash::app::ports::{GpioError, GpioPort};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpioCall {
    Configure(u8),
    Write { pin: u8, high: bool },
}

pub type CallLog = Rc<RefCell<Vec<GpioCall>>>;

pub struct MockGpio {
    calls: CallLog,
}

impl MockGpio {
    /// Returns the mock and a shared handle to its call history.
    pub fn new() -> (Self, CallLog) {
        let calls: CallLog = Rc::new(RefCell::new(Vec::new()));
        (Self { calls: calls.clone() }, calls)
    }
}

impl GpioPort for MockGpio {
    fn configure_output(&mut self, pin: u8) -> Result<(), GpioError> {
        self.calls.borrow_mut().push(GpioCall::Configure(pin));
        Ok(())
    }

    fn write(&mut self, pin: u8, high: bool) -> Result<(), GpioError> {
        self.calls.borrow_mut().push(GpioCall::Write { pin, high });
        Ok(())
    }
}

// ── History helpers ───────────────────────────────────────────

#[allow(dead_code)]
pub fn writes(log: &CallLog) -> Vec<(u8, bool)> {
    log.borrow()
        .iter()
        .filter_map(|c| match c {
            GpioCall::Write { pin, high } => Some((*pin, *high)),
            GpioCall::Configure(_) => None,
        })
        .collect()
}

/// Most recent level written to `pin`, if any write happened.
#[allow(dead_code)]
pub fn last_level(log: &CallLog, pin: u8) -> Option<bool> {
    writes(log).iter().rev().find(|(p, _)| *p == pin).map(|(_, h)| *h)
}

/// Clear recorded history (e.g. after setup writes).
#[allow(dead_code)]
pub fn clear(log: &CallLog) {
    log.borrow_mut().clear();
}
