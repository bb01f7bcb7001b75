//! Event dispatcher.
//!
//! [`EventHandler`] owns the hardware registry and the page list. Hub
//! events fan out to *every* page (virtual state), while only the
//! current page drives hardware. Page switching replays the new page's
//! virtual state onto the LEDs.

use core::fmt;

use log::{debug, info};
use serde_json::Value;

use crate::app::layout::PhysicalLayout;
use crate::app::page::{ButtonAction, DashPage};
use crate::app::ports::GpioPort;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    UnknownPage(String),
    DuplicatePage(String),
    NoPages,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPage(name) => write!(f, "no page named '{name}'"),
            Self::DuplicatePage(name) => write!(f, "page '{name}' already exists"),
            Self::NoPages => write!(f, "no pages configured"),
        }
    }
}

pub struct EventHandler<G: GpioPort> {
    layout: PhysicalLayout<G>,
    /// Insertion order is the cycling order.
    pages: Vec<DashPage>,
    current: usize,
}

impl<G: GpioPort> EventHandler<G> {
    pub fn new(layout: PhysicalLayout<G>) -> Self {
        Self { layout, pages: Vec::new(), current: 0 }
    }

    pub fn add_page(&mut self, page: DashPage) -> Result<(), DispatchError> {
        if self.pages.iter().any(|p| p.name() == page.name()) {
            return Err(DispatchError::DuplicatePage(page.name().to_string()));
        }
        self.pages.push(page);
        Ok(())
    }

    pub fn current_page(&self) -> Option<&DashPage> {
        self.pages.get(self.current)
    }

    pub fn layout(&self) -> &PhysicalLayout<G> {
        &self.layout
    }

    /// Switch to a named page and sync its virtual state to hardware.
    pub fn set_current_page(&mut self, name: &str) -> Result<(), DispatchError> {
        let idx = self
            .pages
            .iter()
            .position(|p| p.name() == name)
            .ok_or_else(|| DispatchError::UnknownPage(name.to_string()))?;
        self.activate(idx);
        Ok(())
    }

    /// Cycle to the next page in insertion order (wraps). Returns the
    /// new page name.
    pub fn next_page(&mut self) -> Result<&str, DispatchError> {
        if self.pages.is_empty() {
            return Err(DispatchError::NoPages);
        }
        let idx = (self.current + 1) % self.pages.len();
        self.activate(idx);
        Ok(self.pages[self.current].name())
    }

    fn activate(&mut self, idx: usize) {
        self.current = idx;
        info!("Dispatcher: page '{}' active", self.pages[idx].name());
        self.pages[idx].sync_physical_to_virtual(&mut self.layout);
    }

    /// Route one hub message. Anything that is not a well-formed
    /// `state_changed` event envelope is ignored.
    pub fn handle_event(&mut self, msg: &Value) {
        if msg["type"] != "event" {
            return;
        }
        let event = &msg["event"];
        if event["event_type"] != "state_changed" {
            return;
        }
        let data = &event["data"];
        let Some(entity_id) = data["entity_id"].as_str() else {
            debug!("Dispatcher: state_changed without entity_id, ignoring");
            return;
        };
        let Some(state) = data["new_state"]["state"].as_str() else {
            debug!("Dispatcher: state_changed without new_state.state, ignoring");
            return;
        };
        self.apply_state(entity_id, state);
    }

    /// Apply one entity state to every page; only the current page
    /// touches hardware.
    pub fn apply_state(&mut self, entity_id: &str, state: &str) {
        let current = self.current;
        for (idx, page) in self.pages.iter_mut().enumerate() {
            page.update_led_state(entity_id, state, &mut self.layout, idx == current);
        }
    }

    /// Replay a full `/api/states` snapshot (post-reconnect resync).
    pub fn resync_from_states(&mut self, states: &Value) {
        let Some(entries) = states.as_array() else {
            debug!("Dispatcher: resync payload is not an array, ignoring");
            return;
        };
        let mut applied = 0usize;
        for entry in entries {
            if let (Some(entity_id), Some(state)) =
                (entry["entity_id"].as_str(), entry["state"].as_str())
            {
                self.apply_state(entity_id, state);
                applied += 1;
            }
        }
        info!("Dispatcher: resynced {applied} entity states");
    }

    /// Resolve a button press against the current page.
    pub fn action_for_button(&self, component_id: &str) -> Option<ButtonAction> {
        self.current_page()
            .and_then(|p| p.action_for_button(component_id))
            .cloned()
    }
}
