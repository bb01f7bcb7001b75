//! Node configuration.
//!
//! Two documents, both JSON on the node's flash filesystem:
//!
//! - [`NodeConfig`] — hub address, token, WiFi credentials, protocol
//!   timing knobs.
//! - [`DashboardFile`] — the hardware layout and dashboard pages, fed
//!   through [`build_dashboard`] into a live [`EventHandler`].

use core::fmt;
use core::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::dispatcher::EventHandler;
use crate::app::layout::{ComponentKind, HardwareComponent, PhysicalLayout};
use crate::app::page::{ButtonAction, DashPage};
use crate::app::ports::GpioPort;
use crate::ws::client::WsConfig;

// ── Errors ───────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config file: {e}"),
            Self::Parse(msg) => write!(f, "config parse: {msg}"),
        }
    }
}

// ── Node configuration ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    // --- Hub ---
    /// Home Assistant host (IP or mDNS name).
    pub ha_host: String,
    pub ha_port: u16,
    /// Long-lived access token.
    pub access_token: String,
    /// WebSocket API path.
    pub ws_path: String,
    /// `Some(x)` forces the scheme; `None` probes plaintext then TLS.
    pub use_tls: Option<bool>,

    // --- WiFi ---
    pub wifi_ssid: String,
    pub wifi_password: String,

    // --- Protocol timing ---
    /// Application-level ping cadence (seconds).
    pub ping_interval_secs: u16,
    /// Traffic must arrive this soon after a ping (seconds).
    pub pong_timeout_secs: u16,
    /// Listen-loop inactivity limit (seconds).
    pub listen_timeout_secs: u16,
    /// Subscription confirmation window (seconds).
    pub subscribe_timeout_secs: u16,
    /// First reconnect delay (seconds).
    pub reconnect_initial_secs: u16,
    /// Reconnect delay cap (seconds).
    pub reconnect_max_secs: u16,
    /// External watchdog threshold (seconds).
    pub watchdog_timeout_secs: u16,

    // --- Files ---
    pub dashboard_path: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            ha_host: "homeassistant.local".into(),
            ha_port: 8123,
            access_token: String::new(),
            ws_path: "/api/websocket".into(),
            use_tls: None,

            wifi_ssid: String::new(),
            wifi_password: String::new(),

            ping_interval_secs: 20,
            pong_timeout_secs: 10,
            listen_timeout_secs: 60,
            subscribe_timeout_secs: 10,
            reconnect_initial_secs: 1,
            reconnect_max_secs: 60,
            watchdog_timeout_secs: 120,

            dashboard_path: "/spiffs/dashboard.json".into(),
        }
    }
}

impl NodeConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path).map_err(ConfigError::Io)?;
        serde_json::from_slice(&bytes).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn ws_config(&self) -> WsConfig {
        WsConfig {
            host: self.ha_host.clone(),
            port: self.ha_port,
            path: self.ws_path.clone(),
            access_token: self.access_token.clone(),
            use_tls: self.use_tls,
            ping_interval: Duration::from_secs(u64::from(self.ping_interval_secs)),
            pong_timeout: Duration::from_secs(u64::from(self.pong_timeout_secs)),
            listen_timeout: Duration::from_secs(u64::from(self.listen_timeout_secs)),
            subscribe_timeout: Duration::from_secs(u64::from(self.subscribe_timeout_secs)),
            backoff_initial: Duration::from_secs(u64::from(self.reconnect_initial_secs)),
            backoff_max: Duration::from_secs(u64::from(self.reconnect_max_secs)),
        }
    }
}

// ── Dashboard file ───────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardFile {
    pub physical_layout: LayoutSection,
    #[serde(default)]
    pub pages: Vec<PageSection>,
    #[serde(default)]
    pub default_page: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayoutSection {
    #[serde(default)]
    pub leds: Vec<ComponentEntry>,
    #[serde(default)]
    pub buttons: Vec<ComponentEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComponentEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub pin: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageSection {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mappings: Vec<MappingEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MappingEntry {
    pub component_id: String,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
}

impl DashboardFile {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path).map_err(ConfigError::Io)?;
        Self::parse(&bytes)
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, ConfigError> {
        serde_json::from_slice(bytes).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

// ── Builder ──────────────────────────────────────────────────

/// Build a live dispatcher from the dashboard file.
///
/// Invalid components and mappings are skipped with a warning — one bad
/// entry must not take the node down. The default page (or the first
/// page) becomes current, which also drives its initial LED state.
pub fn build_dashboard<G: GpioPort>(file: &DashboardFile, gpio: G) -> EventHandler<G> {
    let mut layout = PhysicalLayout::new(gpio);

    let sections = [
        (ComponentKind::Led, &file.physical_layout.leds),
        (ComponentKind::Button, &file.physical_layout.buttons),
    ];
    for (kind, entries) in sections {
        for entry in entries {
            let component = HardwareComponent {
                id: entry.id.clone(),
                name: entry.name.clone().unwrap_or_else(|| entry.id.clone()),
                kind,
                pin: entry.pin,
            };
            if let Err(e) = layout.register(component) {
                warn!("Config: skipping component '{}': {e}", entry.id);
            }
        }
    }

    let mut handler = EventHandler::new(layout);

    for section in &file.pages {
        let mut page = DashPage::new(section.name.clone(), section.description.clone());
        for mapping in &section.mappings {
            apply_mapping(&handler, &mut page, &section.name, mapping);
        }
        if let Err(e) = handler.add_page(page) {
            warn!("Config: skipping page '{}': {e}", section.name);
        }
    }

    let initial = file
        .default_page
        .clone()
        .or_else(|| file.pages.first().map(|p| p.name.clone()));
    if let Some(name) = initial {
        match handler.set_current_page(&name) {
            Ok(()) => info!("Config: initial page '{name}'"),
            Err(e) => warn!("Config: default page unusable: {e}"),
        }
    }

    handler
}

fn apply_mapping<G: GpioPort>(
    handler: &EventHandler<G>,
    page: &mut DashPage,
    page_name: &str,
    mapping: &MappingEntry,
) {
    let Some(component) = handler.layout().component(&mapping.component_id) else {
        warn!(
            "Config: page '{page_name}' references unknown component '{}', skipping",
            mapping.component_id
        );
        return;
    };

    let bound = match (component.kind, mapping.action.as_deref(), mapping.entity_id.as_deref()) {
        (ComponentKind::Led, None, Some(entity_id)) => {
            page.map_led(entity_id, &mapping.component_id, handler.layout())
        }
        (ComponentKind::Button, Some("toggle"), Some(entity_id)) => page.map_button(
            &mapping.component_id,
            ButtonAction::ToggleEntity(entity_id.into()),
            handler.layout(),
        ),
        (ComponentKind::Button, Some("next_dashboard" | "next_page"), _) => {
            page.map_button(&mapping.component_id, ButtonAction::NextDashboard, handler.layout())
        }
        _ => {
            warn!(
                "Config: page '{page_name}' has an invalid mapping for '{}', skipping",
                mapping.component_id
            );
            return;
        }
    };
    if let Err(e) = bound {
        warn!("Config: page '{page_name}' mapping rejected: {e}");
    }
}

// ── Tests ────────────────────────────────────────────────────
