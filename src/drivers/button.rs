//! ISR-debounced button driver.
//!
//! Active-low momentary switches with pull-ups. Each configured button
//! takes one slot: the GPIO ISR records a raw press timestamp into the
//! slot's atomic, and `tick()` (called from the button task) applies a
//! soft debounce and emits at most one press event per physical press.

use core::sync::atomic::{AtomicU32, Ordering};

pub const MAX_BUTTONS: usize = 8;

const DEBOUNCE_MS: u32 = 200;

/// Raw ISR timestamps (milliseconds since boot, truncated to u32),
/// one per slot. Written by the ISR, read by the button task.
static PRESS_TIMESTAMPS: [AtomicU32; MAX_BUTTONS] = [const { AtomicU32::new(0) }; MAX_BUTTONS];

/// ISR handler — register on the button GPIO falling edge.
/// Safe to call from interrupt context (lock-free atomic store).
pub fn button_isr_handler(slot: usize, now_ms: u32) {
    if slot < MAX_BUTTONS {
        PRESS_TIMESTAMPS[slot].store(now_ms.max(1), Ordering::Release);
    }
}

pub struct ButtonDriver {
    slot: usize,
    pin: u8,
    last_seen_ms: u32,
    last_emit_ms: Option<u32>,
}

impl ButtonDriver {
    pub fn new(slot: usize, pin: u8) -> Self {
        Self { slot, pin, last_seen_ms: 0, last_emit_ms: None }
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Poll for a debounced press. `now_ms` is monotonic milliseconds.
    pub fn tick(&mut self, now_ms: u32) -> bool {
        let isr_ms = PRESS_TIMESTAMPS[self.slot].load(Ordering::Acquire);
        if isr_ms == 0 || isr_ms == self.last_seen_ms {
            return false;
        }
        self.last_seen_ms = isr_ms;

        // Bounce within the window collapses into the first press.
        if let Some(last) = self.last_emit_ms {
            if now_ms.wrapping_sub(last) < DEBOUNCE_MS {
                return false;
            }
        }
        self.last_emit_ms = Some(now_ms);
        true
    }
}

// ── ESP-IDF pin wiring ───────────────────────────────────────

/// Holds the input pin driver and its ISR subscription alive.
#[cfg(target_os = "espidf")]
pub struct InputButton {
    _driver: esp_idf_hal::gpio::PinDriver<'static, esp_idf_hal::gpio::AnyIOPin, esp_idf_hal::gpio::Input>,
}

#[cfg(target_os = "espidf")]
impl InputButton {
    /// Configure `pin` as a pulled-up input firing `button_isr_handler`
    /// for `slot` on the falling edge.
    pub fn attach(slot: usize, pin: u8) -> anyhow::Result<Self> {
        use esp_idf_hal::gpio::{AnyIOPin, InterruptType, PinDriver, Pull};

        // SAFETY: pin numbers come from the validated dashboard config;
        // the layout guarantees each pin is claimed once.
        let io = unsafe { AnyIOPin::new(i32::from(pin)) };
        let mut driver = PinDriver::input(io)?;
        driver.set_pull(Pull::Up)?;
        driver.set_interrupt_type(InterruptType::NegEdge)?;

        // SAFETY: the closure is ISR-safe — a single atomic store.
        unsafe {
            driver.subscribe(move || {
                let now_ms = (esp_idf_svc::sys::esp_timer_get_time() / 1000) as u32;
                button_isr_handler(slot, now_ms);
            })?;
        }
        driver.enable_interrupt()?;

        Ok(Self { _driver: driver })
    }
}

// ── Tests ────────────────────────────────────────────────────
