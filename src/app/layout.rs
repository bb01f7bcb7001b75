//! Physical hardware registry.
//!
//! [`PhysicalLayout`] is the single owner of every registered LED and
//! button: which component id maps to which pin, and the GPIO port that
//! drives them. Pages and the dispatcher never touch pins directly —
//! all hardware writes funnel through [`PhysicalLayout::set_led`].

use core::fmt;
use std::collections::HashMap;

use log::{debug, info};

use crate::app::ports::{GpioError, GpioPort};

// ── Components ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Led,
    Button,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareComponent {
    pub id: String,
    pub name: String,
    pub kind: ComponentKind,
    pub pin: u8,
}

// ── Errors ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// Registration collides with an existing component id.
    DuplicateId(String),
    /// Registration collides with a pin already in use.
    DuplicatePin(u8),
    /// No component with this id.
    UnknownComponent(String),
    /// LED operation addressed to a non-LED component.
    NotAnLed(String),
    /// Button binding addressed to a non-Button component.
    NotAButton(String),
    Gpio(GpioError),
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId(id) => write!(f, "component id '{id}' already registered"),
            Self::DuplicatePin(pin) => write!(f, "pin {pin} already in use"),
            Self::UnknownComponent(id) => write!(f, "no component '{id}'"),
            Self::NotAnLed(id) => write!(f, "component '{id}' is not an LED"),
            Self::NotAButton(id) => write!(f, "component '{id}' is not a button"),
            Self::Gpio(e) => write!(f, "gpio: {e}"),
        }
    }
}

impl From<GpioError> for LayoutError {
    fn from(e: GpioError) -> Self {
        Self::Gpio(e)
    }
}

// ── Registry ─────────────────────────────────────────────────

pub struct PhysicalLayout<G: GpioPort> {
    gpio: G,
    components: HashMap<String, HardwareComponent>,
}

impl<G: GpioPort> PhysicalLayout<G> {
    pub fn new(gpio: G) -> Self {
        Self { gpio, components: HashMap::new() }
    }

    /// Register a component; LED pins are configured as outputs.
    /// Button pins belong to the input driver and are only claimed here.
    ///
    /// Both the id and the pin must be unused; on any error the
    /// registry is left unchanged.
    pub fn register(&mut self, component: HardwareComponent) -> Result<(), LayoutError> {
        if self.components.contains_key(&component.id) {
            return Err(LayoutError::DuplicateId(component.id));
        }
        if self.components.values().any(|c| c.pin == component.pin) {
            return Err(LayoutError::DuplicatePin(component.pin));
        }
        if component.kind == ComponentKind::Led {
            self.gpio.configure_output(component.pin)?;
        }

        info!(
            "Layout: registered {:?} '{}' on pin {}",
            component.kind, component.id, component.pin
        );
        self.components.insert(component.id.clone(), component);
        Ok(())
    }

    /// Remove a component. LEDs are deasserted before removal so a
    /// deregistered output never stays lit.
    pub fn deregister(&mut self, id: &str) -> Result<HardwareComponent, LayoutError> {
        let component = self
            .components
            .remove(id)
            .ok_or_else(|| LayoutError::UnknownComponent(id.to_string()))?;

        if component.kind == ComponentKind::Led {
            if let Err(e) = self.gpio.write(component.pin, false) {
                log::warn!("Layout: deassert on deregister of '{id}' failed: {e}");
            }
        }
        debug!("Layout: deregistered '{id}'");
        Ok(component)
    }

    /// Drive an LED component.
    pub fn set_led(&mut self, id: &str, on: bool) -> Result<(), LayoutError> {
        let component = self
            .components
            .get(id)
            .ok_or_else(|| LayoutError::UnknownComponent(id.to_string()))?;
        if component.kind != ComponentKind::Led {
            return Err(LayoutError::NotAnLed(id.to_string()));
        }
        self.gpio.write(component.pin, on)?;
        Ok(())
    }

    pub fn component(&self, id: &str) -> Option<&HardwareComponent> {
        self.components.get(id)
    }

    pub fn components(&self) -> impl Iterator<Item = &HardwareComponent> {
        self.components.values()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}
