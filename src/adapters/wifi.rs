//! WiFi station-mode adapter.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver calls via
//!   `esp_idf_svc::wifi` (the `BlockingWifi` handle is attached from
//!   `main` once peripherals exist).
//! - **all other targets**: simulation stubs for host-side tests.
//!
//! ## Reconnection policy
//!
//! On disconnect the adapter waits an exponential backoff (2 s → 4 s →
//! 8 s … capped at 60 s) before retrying from `poll()`.

use core::fmt;
use log::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WifiError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
    AlreadyConnected,
    DriverMissing,
}

impl fmt::Display for WifiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::AlreadyConnected => write!(f, "already connected to AP"),
            Self::DriverMissing => write!(f, "WiFi driver not attached"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

const INITIAL_BACKOFF_SECS: u32 = 2;
const MAX_BACKOFF_SECS: u32 = 60;

// ── Validation ───────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), WifiError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(WifiError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), WifiError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(WifiError::InvalidPassword);
    }
    Ok(())
}

// ── Adapter ──────────────────────────────────────────────────

pub struct WifiAdapter {
    state: WifiState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    backoff_secs: u32,
    #[cfg(target_os = "espidf")]
    driver: Option<esp_idf_svc::wifi::BlockingWifi<esp_idf_svc::wifi::EspWifi<'static>>>,
    #[cfg(not(target_os = "espidf"))]
    sim_link_up: bool,
}

impl WifiAdapter {
    pub fn new() -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            backoff_secs: INITIAL_BACKOFF_SECS,
            #[cfg(target_os = "espidf")]
            driver: None,
            #[cfg(not(target_os = "espidf"))]
            sim_link_up: true,
        }
    }

    /// Drop or restore the simulated link (host builds only).
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_link(&mut self, up: bool) {
        self.sim_link_up = up;
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.platform_is_connected()
    }

    pub fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), WifiError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.ssid.clear();
        self.ssid.push_str(ssid).map_err(|()| WifiError::InvalidSsid)?;
        self.password.clear();
        self.password.push_str(password).map_err(|()| WifiError::InvalidPassword)?;
        info!("WiFi: credentials updated (SSID='{}')", self.ssid);
        Ok(())
    }

    pub fn connect(&mut self) -> Result<(), WifiError> {
        if self.ssid.is_empty() {
            return Err(WifiError::NoCredentials);
        }
        if self.state == WifiState::Connected {
            return Err(WifiError::AlreadyConnected);
        }

        info!("WiFi: connecting to '{}'", self.ssid);
        self.state = WifiState::Connecting;

        match self.platform_connect() {
            Ok(()) => {
                self.state = WifiState::Connected;
                self.backoff_secs = INITIAL_BACKOFF_SECS;
                info!("WiFi: connected");
                Ok(())
            }
            Err(e) => {
                error!("WiFi: connection failed — {}", e);
                self.state = WifiState::Reconnecting { attempt: 0 };
                Err(e)
            }
        }
    }

    pub fn disconnect(&mut self) {
        self.platform_disconnect();
        self.state = WifiState::Disconnected;
        info!("WiFi: disconnected");
    }

    /// Drive the reconnect state machine; call periodically.
    /// Returns the backoff to wait before the next poll while
    /// reconnecting, so the caller can sleep instead of spinning.
    pub fn poll(&mut self) -> Option<u32> {
        match self.state {
            WifiState::Reconnecting { attempt } => {
                info!("WiFi: reconnect attempt {} (backoff {}s)", attempt, self.backoff_secs);
                match self.platform_connect() {
                    Ok(()) => {
                        self.state = WifiState::Connected;
                        self.backoff_secs = INITIAL_BACKOFF_SECS;
                        info!("WiFi: reconnected");
                        None
                    }
                    Err(_) => {
                        let wait = self.backoff_secs;
                        self.backoff_secs = (self.backoff_secs * 2).min(MAX_BACKOFF_SECS);
                        self.state = WifiState::Reconnecting { attempt: attempt + 1 };
                        Some(wait)
                    }
                }
            }
            WifiState::Connected => {
                if self.platform_is_connected() {
                    None
                } else {
                    warn!("WiFi: connection lost, entering reconnect");
                    self.state = WifiState::Reconnecting { attempt: 0 };
                    Some(self.backoff_secs)
                }
            }
            _ => None,
        }
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    pub fn attach_driver(
        &mut self,
        driver: esp_idf_svc::wifi::BlockingWifi<esp_idf_svc::wifi::EspWifi<'static>>,
    ) {
        self.driver = Some(driver);
    }

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), WifiError> {
        use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};

        let driver = self.driver.as_mut().ok_or(WifiError::DriverMissing)?;
        let auth_method = if self.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        driver
            .set_configuration(&Configuration::Client(ClientConfiguration {
                ssid: self.ssid.clone(),
                password: self.password.clone(),
                auth_method,
                ..Default::default()
            }))
            .map_err(|_| WifiError::ConnectionFailed)?;
        driver.start().map_err(|_| WifiError::ConnectionFailed)?;
        driver.connect().map_err(|_| WifiError::ConnectionFailed)?;
        driver.wait_netif_up().map_err(|_| WifiError::ConnectionFailed)?;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), WifiError> {
        self.sim_link_up = true;
        info!("WiFi(sim): connected to '{}'", self.ssid);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        if let Some(driver) = self.driver.as_mut() {
            driver.disconnect().ok();
            driver.stop().ok();
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        info!("WiFi(sim): disconnected");
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.driver
            .as_ref()
            .is_some_and(|d| d.is_connected().unwrap_or(false))
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.state == WifiState::Connected && self.sim_link_up
    }
}

impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────
