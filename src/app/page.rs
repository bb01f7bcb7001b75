//! Dashboard pages.
//!
//! A [`DashPage`] maps hub entities to LED components and button
//! components to actions. Each page keeps its own *virtual* LED state:
//! what the LEDs would show if the page were active. Only the active
//! page writes hardware; inactive pages keep absorbing events into
//! their virtual state so switching to them is instant and correct.

use std::collections::{BTreeMap, HashMap};

use log::warn;

use crate::app::layout::{ComponentKind, LayoutError, PhysicalLayout};
use crate::app::ports::GpioPort;

/// What a button press does. Closed set — dashboards are data, not code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    /// Toggle a hub entity through the REST API.
    ToggleEntity(String),
    /// Cycle to the next dashboard page.
    NextDashboard,
}

pub struct DashPage {
    name: String,
    description: String,
    /// entity_id → LED component id.
    led_for_entity: HashMap<String, String>,
    /// entity_id → virtual on/off. BTreeMap keeps sync order stable.
    virtual_state: BTreeMap<String, bool>,
    /// button component id → action.
    button_actions: HashMap<String, ButtonAction>,
}

impl DashPage {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            led_for_entity: HashMap::new(),
            virtual_state: BTreeMap::new(),
            button_actions: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Bind a hub entity to an LED component. Virtual state starts off.
    /// The component must resolve in the registry to an LED.
    pub fn map_led<G: GpioPort>(
        &mut self,
        entity_id: impl Into<String>,
        component_id: impl Into<String>,
        layout: &PhysicalLayout<G>,
    ) -> Result<(), LayoutError> {
        let component_id = component_id.into();
        match layout.component(&component_id) {
            None => return Err(LayoutError::UnknownComponent(component_id)),
            Some(c) if c.kind != ComponentKind::Led => {
                return Err(LayoutError::NotAnLed(component_id));
            }
            Some(_) => {}
        }
        let entity_id = entity_id.into();
        self.virtual_state.entry(entity_id.clone()).or_insert(false);
        self.led_for_entity.insert(entity_id, component_id);
        Ok(())
    }

    /// Bind a button component to an action. The component must resolve
    /// in the registry to a Button.
    pub fn map_button<G: GpioPort>(
        &mut self,
        component_id: impl Into<String>,
        action: ButtonAction,
        layout: &PhysicalLayout<G>,
    ) -> Result<(), LayoutError> {
        let component_id = component_id.into();
        match layout.component(&component_id) {
            None => return Err(LayoutError::UnknownComponent(component_id)),
            Some(c) if c.kind != ComponentKind::Button => {
                return Err(LayoutError::NotAButton(component_id));
            }
            Some(_) => {}
        }
        self.button_actions.insert(component_id, action);
        Ok(())
    }

    /// Apply a state change for `entity_id`. Returns whether the
    /// virtual value changed.
    ///
    /// Unmapped entities and unchanged values are no-ops. On a change
    /// the virtual state is written; hardware only when `active`.
    /// `"on"` compares case-insensitively; every other state string
    /// means off.
    pub fn update_led_state<G: GpioPort>(
        &mut self,
        entity_id: &str,
        state: &str,
        layout: &mut PhysicalLayout<G>,
        active: bool,
    ) -> bool {
        let Some(component_id) = self.led_for_entity.get(entity_id) else {
            return false;
        };
        let on = state.eq_ignore_ascii_case("on");
        if self.virtual_state.get(entity_id) == Some(&on) {
            return false;
        }
        self.virtual_state.insert(entity_id.to_string(), on);

        if active {
            if let Err(e) = layout.set_led(component_id, on) {
                warn!("Page '{}': LED write for {entity_id} failed: {e}", self.name);
            }
        }
        true
    }

    /// Drive every mapped LED to its virtual value (page activation).
    pub fn sync_physical_to_virtual<G: GpioPort>(&self, layout: &mut PhysicalLayout<G>) {
        for (entity_id, on) in &self.virtual_state {
            // Every virtual entry has a binding; map_led seeds both.
            let Some(component_id) = self.led_for_entity.get(entity_id) else {
                continue;
            };
            if let Err(e) = layout.set_led(component_id, *on) {
                warn!("Page '{}': sync of '{entity_id}' failed: {e}", self.name);
            }
        }
    }

    pub fn action_for_button(&self, component_id: &str) -> Option<&ButtonAction> {
        self.button_actions.get(component_id)
    }

    /// Current virtual value of an entity, if this page maps it.
    pub fn virtual_value(&self, entity_id: &str) -> Option<bool> {
        self.virtual_state.get(entity_id).copied()
    }
}
