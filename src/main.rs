//! HADash firmware — main entry point.
//!
//! Physical Home Assistant dashboard: buttons and LEDs on GPIO, state
//! sync over the hub's WebSocket API, commands over its REST API.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                   │
//! │                                                            │
//! │  NodeGpio      WifiAdapter    RestClient    ConfigServer   │
//! │  (GpioPort)    (STA + retry)  (commands)    (local HTTP)   │
//! │                                                            │
//! │  ─────────────── Port Trait Boundary ──────────────────    │
//! │                                                            │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │   EventHandler (pure logic)                          │  │
//! │  │   PhysicalLayout · DashPage routing                  │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! │                                                            │
//! │  WsClient (protocol engine) · StreamWatchdog (liveness)    │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! All protocol work runs on one `edge-executor` LocalExecutor; see
//! the `ws` module docs for the task layout.

#![deny(unused_must_use)]

use core::cell::RefCell;
use core::time::Duration;
use std::rc::Rc;
use std::time::Instant;

use anyhow::Result;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::signal::Signal;
use log::{info, warn};
use serde_json::Value;

use hadash::adapters::gpio::NodeGpio;
use hadash::adapters::httpd::ConfigServer;
use hadash::adapters::rest::RestClient;
use hadash::adapters::wifi::WifiAdapter;
use hadash::app::dispatcher::EventHandler;
use hadash::app::layout::ComponentKind;
use hadash::app::page::ButtonAction;
use hadash::config::{self, DashboardFile, NodeConfig};
use hadash::drivers::button::{ButtonDriver, InputButton, MAX_BUTTONS};
use hadash::ws::client::{MessageHandler, WsClient};
use hadash::ws::watchdog::StreamWatchdog;

const NODE_CONFIG_PATH: &str = "/spiffs/node.json";

/// Poll cadence of the button task.
const BUTTON_POLL: Duration = Duration::from_millis(20);

/// Link-check cadence of the WiFi monitor while the link is healthy.
const WIFI_POLL: Duration = Duration::from_secs(5);

type SharedDispatcher = Rc<RefCell<EventHandler<NodeGpio>>>;
type ResyncSignal = Rc<Signal<NoopRawMutex, ()>>;

// ── Engine → dispatcher bridge ────────────────────────────────
//
// The protocol engine knows JSON messages; the dispatcher knows
// entities and pins. This adapter is the translation seam, plus the
// resync trigger when a session reaches streaming.

struct DispatcherBridge {
    dispatcher: SharedDispatcher,
    resync: ResyncSignal,
}

impl MessageHandler for DispatcherBridge {
    fn on_message(&mut self, msg: &Value) {
        self.dispatcher.borrow_mut().handle_event(msg);
    }

    fn on_streaming(&mut self) {
        self.resync.signal(());
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  HADash v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    mount_storage()?;

    // ── 2. Load configuration ─────────────────────────────────
    let node_cfg = match NodeConfig::load(NODE_CONFIG_PATH) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Node config load failed ({e}), using defaults");
            NodeConfig::default()
        }
    };
    let dashboard = DashboardFile::load(&node_cfg.dashboard_path)
        .map_err(|e| anyhow::anyhow!("dashboard config unusable: {e}"))?;

    // ── 3. WiFi ───────────────────────────────────────────────
    let peripherals = esp_idf_hal::peripherals::Peripherals::take()?;
    let sysloop = esp_idf_svc::eventloop::EspSystemEventLoop::take()?;
    let nvs = esp_idf_svc::nvs::EspDefaultNvsPartition::take()?;

    let mut wifi = WifiAdapter::new();
    wifi.attach_driver(esp_idf_svc::wifi::BlockingWifi::wrap(
        esp_idf_svc::wifi::EspWifi::new(peripherals.modem, sysloop.clone(), Some(nvs))?,
        sysloop,
    )?);
    wifi.set_credentials(&node_cfg.wifi_ssid, &node_cfg.wifi_password)
        .map_err(|e| anyhow::anyhow!("wifi credentials: {e}"))?;
    let mut wait = 2u64;
    while let Err(e) = wifi.connect() {
        warn!("WiFi connect failed ({e}), retrying in {wait}s");
        std::thread::sleep(Duration::from_secs(wait));
        wait = (wait * 2).min(60);
    }

    // ── 4. Dispatcher + hardware ──────────────────────────────
    let dispatcher: SharedDispatcher =
        Rc::new(RefCell::new(config::build_dashboard(&dashboard, NodeGpio::new())));

    // Button drivers: one slot per registered button component.
    let mut buttons: Vec<(String, ButtonDriver)> = Vec::new();
    let mut input_pins: Vec<InputButton> = Vec::new();
    {
        let d = dispatcher.borrow();
        for (slot, component) in d
            .layout()
            .components()
            .filter(|c| c.kind == ComponentKind::Button)
            .enumerate()
        {
            if slot >= MAX_BUTTONS {
                warn!("Hardware: ISR slots exhausted, button '{}' not wired", component.id);
                continue;
            }
            input_pins.push(InputButton::attach(slot, component.pin)?);
            buttons.push((component.id.clone(), ButtonDriver::new(slot, component.pin)));
        }
    }
    info!("Hardware: {} buttons wired", buttons.len());

    // ── 5. Services ───────────────────────────────────────────
    let rest = Rc::new(RestClient::new(
        node_cfg.ha_host.clone(),
        node_cfg.ha_port,
        node_cfg.access_token.clone(),
    ));

    let mut httpd = ConfigServer::new(node_cfg.dashboard_path.clone());
    if let Err(e) = httpd.start() {
        warn!("HTTPD start failed ({e}), continuing without config endpoint");
    }

    let resync: ResyncSignal = Rc::new(Signal::new());
    let client = Rc::new(WsClient::new(
        node_cfg.ws_config(),
        DispatcherBridge { dispatcher: dispatcher.clone(), resync: resync.clone() },
    ));
    let watchdog = StreamWatchdog::new(
        client.liveness(),
        client.force_close_signal(),
        Duration::from_secs(u64::from(node_cfg.watchdog_timeout_secs)),
    );

    info!("System ready. Starting executor.");

    // ── 6. Executor ───────────────────────────────────────────
    let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();

    {
        let client = client.clone();
        executor.spawn(async move { client.run().await }).detach();
    }

    executor.spawn(async move { watchdog.run().await }).detach();

    executor.spawn(wifi_task(wifi)).detach();

    {
        let dispatcher = dispatcher.clone();
        let rest = rest.clone();
        executor
            .spawn(async move { resync_task(resync, rest, dispatcher).await })
            .detach();
    }

    {
        let dispatcher = dispatcher.clone();
        let boot = Instant::now();
        executor
            .spawn(async move { button_task(buttons, dispatcher, rest, boot).await })
            .detach();
    }

    futures_lite::future::block_on(executor.run(core::future::pending::<()>()));
    unreachable!("executor never returns");
}

// ── Tasks ─────────────────────────────────────────────────────

/// Keep the STA link up: detect drops and drive the reconnect backoff.
async fn wifi_task(mut wifi: WifiAdapter) {
    loop {
        let wait = wifi
            .poll()
            .map_or(WIFI_POLL, |secs| Duration::from_secs(u64::from(secs)));
        async_io_mini::Timer::after(wait).await;
    }
}

/// Pull a fresh `/api/states` snapshot whenever a session reaches
/// streaming, so virtual state converges after any connectivity gap.
async fn resync_task(resync: ResyncSignal, rest: Rc<RestClient>, dispatcher: SharedDispatcher) {
    loop {
        resync.wait().await;
        info!("Resync: fetching full state snapshot");
        match rest.get_states().await {
            Ok(states) => dispatcher.borrow_mut().resync_from_states(&states),
            Err(e) => warn!("Resync: state fetch failed: {e}"),
        }
    }
}

/// Poll debounced buttons and run their page actions.
async fn button_task(
    mut buttons: Vec<(String, ButtonDriver)>,
    dispatcher: SharedDispatcher,
    rest: Rc<RestClient>,
    boot: Instant,
) {
    loop {
        async_io_mini::Timer::after(BUTTON_POLL).await;
        let now_ms = boot.elapsed().as_millis() as u32;

        for (component_id, driver) in &mut buttons {
            if !driver.tick(now_ms) {
                continue;
            }
            // The dispatcher borrow must end before any await below.
            let action = dispatcher.borrow().action_for_button(component_id);
            match action {
                Some(ButtonAction::ToggleEntity(entity_id)) => {
                    info!("Button '{component_id}': toggle {entity_id}");
                    if let Err(e) = rest.toggle(&entity_id).await {
                        warn!("Button '{component_id}': toggle failed: {e}");
                    }
                }
                Some(ButtonAction::NextDashboard) => match dispatcher.borrow_mut().next_page() {
                    Ok(name) => info!("Button '{component_id}': switched to page '{name}'"),
                    Err(e) => warn!("Button '{component_id}': page switch failed: {e}"),
                },
                None => info!("Button '{component_id}': no action on current page"),
            }
        }
    }
}

// ── Storage ───────────────────────────────────────────────────

/// Mount the SPIFFS partition that holds both config documents.
fn mount_storage() -> Result<()> {
    use esp_idf_svc::sys;

    let base_path = c"/spiffs";
    let conf = sys::esp_vfs_spiffs_conf_t {
        base_path: base_path.as_ptr(),
        partition_label: core::ptr::null(),
        max_files: 4,
        format_if_mount_failed: true,
    };
    // SAFETY: conf and its strings outlive the call; the VFS copies them.
    let err = unsafe { sys::esp_vfs_spiffs_register(&conf) };
    if err != sys::ESP_OK {
        anyhow::bail!("SPIFFS mount failed (err {err})");
    }
    info!("Storage: SPIFFS mounted at /spiffs");
    Ok(())
}
