//! Hub session logic.
//!
//! One [`WsClient`] owns the whole connection lifecycle:
//!
//! ```text
//! connect ─ handshake ─ auth ─ subscribe ─┬─ listen loop   ──┐
//!                                         ├─ keepalive loop ─┤ first exit
//!                                         └─ forced close  ──┘ wins
//!                    ▲                                        │
//!                    └────────── backoff delay ◄──────────────┘
//! ```
//!
//! The three session futures are raced with `futures_lite::future::or`;
//! when one exits the others are dropped, which is the only cancellation
//! mechanism the engine needs. Liveness is refreshed by *any* inbound
//! traffic; the keepalive ping merely guarantees traffic exists on a
//! quiet line.

use core::cell::{Cell, RefCell};
use core::time::Duration;
use std::rc::Rc;
use std::time::Instant;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use futures_lite::future::or;
use log::{debug, info, warn};
use serde_json::{Value, json};

use crate::ws::error::WsError;
use crate::ws::frame::{self, FrameDecoder, Opcode};
use crate::ws::handshake;
use crate::ws::transport::{self, SharedConn, Transport};

const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll period while waiting for traffic after a keepalive ping.
const PONG_POLL: Duration = Duration::from_millis(100);

/// Message ids wrap back to 1 here; well clear of anything a session
/// will allocate, and always JSON-safe.
const MESSAGE_ID_WRAP: u64 = 1 << 32;

// ── Configuration ────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct WsConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub access_token: String,
    /// `Some(x)` forces the scheme; `None` tries plaintext then TLS.
    pub use_tls: Option<bool>,
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
    pub listen_timeout: Duration,
    pub subscribe_timeout: Duration,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
}

// ── Handler port ─────────────────────────────────────────────

/// Consumer of the decoded message stream.
pub trait MessageHandler {
    /// Called once per inbound JSON message, in arrival order.
    /// Session-internal traffic (keepalive pongs, the subscription
    /// confirmation) is consumed by the engine and never delivered.
    fn on_message(&mut self, msg: &Value);

    /// Called when a session reaches the streaming state — the hook
    /// for a full state resync after a connectivity gap.
    fn on_streaming(&mut self) {}
}

// ── Backoff ──────────────────────────────────────────────────

/// Exponential reconnect backoff: `initial, 2·initial, … , max`.
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max, current: initial }
    }

    /// Delay to wait before the next attempt; doubles for the one after.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    /// Back to the initial delay (call after a healthy session).
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

fn next_message_id(current: u64) -> u64 {
    if current >= MESSAGE_ID_WRAP { 1 } else { current + 1 }
}

// ── Client ───────────────────────────────────────────────────

pub struct WsClient<H: MessageHandler> {
    cfg: WsConfig,
    handler: RefCell<H>,
    next_id: Cell<u64>,
    streaming: Cell<bool>,
    /// Refreshed on every inbound frame; shared with the watchdog.
    last_activity: Rc<Cell<Instant>>,
    /// Raised by the watchdog to force the current session down.
    force_close: Rc<Signal<NoopRawMutex, ()>>,
    /// Serialises whole frames when listen and keepalive both write.
    write_gate: Mutex<NoopRawMutex, ()>,
}

impl<H: MessageHandler> WsClient<H> {
    pub fn new(cfg: WsConfig, handler: H) -> Self {
        Self {
            cfg,
            handler: RefCell::new(handler),
            next_id: Cell::new(1),
            streaming: Cell::new(false),
            last_activity: Rc::new(Cell::new(Instant::now())),
            force_close: Rc::new(Signal::new()),
            write_gate: Mutex::new(()),
        }
    }

    /// Timestamp of the last inbound frame (watchdog input).
    pub fn liveness(&self) -> Rc<Cell<Instant>> {
        self.last_activity.clone()
    }

    /// Signal that tears the current session down when raised.
    pub fn force_close_signal(&self) -> Rc<Signal<NoopRawMutex, ()>> {
        self.force_close.clone()
    }

    fn alloc_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(next_message_id(id));
        id
    }

    // ── Supervisor ────────────────────────────────────────────

    /// Run sessions forever, reconnecting with exponential backoff.
    /// The backoff resets once a session reaches the streaming state.
    pub async fn run(&self) {
        let mut backoff = Backoff::new(self.cfg.backoff_initial, self.cfg.backoff_max);
        loop {
            info!("WS: connecting to {}:{}", self.cfg.host, self.cfg.port);
            if let Err(e) = self.run_session().await {
                warn!("WS: session ended: {e}");
            }
            if self.streaming.take() {
                backoff.reset();
            }
            let delay = backoff.next_delay();
            info!("WS: reconnecting in {:.1}s", delay.as_secs_f32());
            async_io_mini::Timer::after(delay).await;
        }
    }

    /// One full session: connect through streaming until any error.
    pub async fn run_session(&self) -> Result<(), WsError> {
        self.streaming.set(false);
        self.force_close.reset();

        let conn: SharedConn = Rc::new(RefCell::new(self.open_transport()?));
        self.last_activity.set(Instant::now());

        let leftover =
            handshake::client_handshake(&conn, &self.cfg.host, self.cfg.port, &self.cfg.path)
                .await?;
        let mut decoder = FrameDecoder::new();
        decoder.feed(&leftover)?;

        self.authenticate(&conn, &mut decoder).await?;
        let sub_id = self.subscribe(&conn).await?;

        let result = {
            let listen = self.listen_loop(&conn, &mut decoder, sub_id);
            let keepalive = self.keepalive_loop(&conn);
            let forced = async {
                self.force_close.wait().await;
                Err(WsError::WatchdogForced)
            };
            or(listen, or(keepalive, forced)).await
        };

        // Best-effort close frame; the socket drops regardless.
        let close = frame::encode_masked(Opcode::Close, &[]);
        let _ = conn.borrow_mut().try_write(&close);
        result
    }

    fn open_transport(&self) -> Result<Transport, WsError> {
        match self.cfg.use_tls {
            Some(tls) => Transport::connect(&self.cfg.host, self.cfg.port, tls),
            None => match Transport::connect(&self.cfg.host, self.cfg.port, false) {
                Ok(conn) => Ok(conn),
                Err(e) => {
                    warn!("WS: plaintext connect failed ({e}), retrying with TLS");
                    Transport::connect(&self.cfg.host, self.cfg.port, true)
                }
            },
        }
    }

    // ── Auth + subscribe ──────────────────────────────────────

    async fn authenticate(
        &self,
        conn: &SharedConn,
        decoder: &mut FrameDecoder,
    ) -> Result<(), WsError> {
        let greeting = self.next_message(conn, decoder, AUTH_TIMEOUT).await?;
        match greeting["type"].as_str() {
            Some("auth_ok") => {
                info!("WS: authenticated (no challenge)");
                Ok(())
            }
            Some("auth_required") => {
                self.send_json(
                    conn,
                    &json!({"type": "auth", "access_token": self.cfg.access_token}),
                )
                .await?;
                let reply = self.next_message(conn, decoder, AUTH_TIMEOUT).await?;
                match reply["type"].as_str() {
                    Some("auth_ok") => {
                        info!("WS: authenticated");
                        Ok(())
                    }
                    Some("auth_invalid") => Err(WsError::AuthFailed),
                    _ => Err(WsError::ProtocolViolation("unexpected auth reply")),
                }
            }
            _ => Err(WsError::ProtocolViolation("unexpected greeting")),
        }
    }

    async fn subscribe(&self, conn: &SharedConn) -> Result<u64, WsError> {
        let id = self.alloc_id();
        self.send_json(
            conn,
            &json!({"id": id, "type": "subscribe_events", "event_type": "state_changed"}),
        )
        .await?;
        debug!("WS: subscribe_events sent (id={id})");
        Ok(id)
    }

    // ── Session loops ─────────────────────────────────────────

    async fn listen_loop(
        &self,
        conn: &SharedConn,
        decoder: &mut FrameDecoder,
        sub_id: u64,
    ) -> Result<(), WsError> {
        let mut pending_sub = Some(Instant::now() + self.cfg.subscribe_timeout);

        loop {
            let timeout = match pending_sub {
                Some(deadline) => self
                    .cfg
                    .listen_timeout
                    .min(deadline.saturating_duration_since(Instant::now())),
                None => self.cfg.listen_timeout,
            };

            let msg = match self.next_message(conn, decoder, timeout).await {
                Ok(msg) => msg,
                Err(WsError::LivenessTimeout) if pending_sub.is_some() => {
                    return Err(WsError::SubscribeFailed);
                }
                Err(e) => return Err(e),
            };

            if let Some(deadline) = pending_sub {
                if msg["type"] == "result" && msg["id"].as_u64() == Some(sub_id) {
                    if msg["success"].as_bool() != Some(true) {
                        return Err(WsError::SubscribeFailed);
                    }
                    info!("WS: subscription confirmed, streaming");
                    self.streaming.set(true);
                    self.handler.borrow_mut().on_streaming();
                    pending_sub = None;
                    continue;
                }
                if Instant::now() >= deadline {
                    return Err(WsError::SubscribeFailed);
                }
            }

            // Keepalive replies stay engine-internal; liveness was
            // already refreshed when the frame arrived.
            if msg["type"] == "pong" {
                continue;
            }

            self.handler.borrow_mut().on_message(&msg);
        }
    }

    async fn keepalive_loop(&self, conn: &SharedConn) -> Result<(), WsError> {
        loop {
            async_io_mini::Timer::after(self.cfg.ping_interval).await;

            let id = self.alloc_id();
            let sent = Instant::now();
            debug!("WS: keepalive ping (id={id})");
            self.send_json(conn, &json!({"id": id, "type": "ping"})).await?;

            loop {
                if self.last_activity.get() >= sent {
                    break;
                }
                if sent.elapsed() >= self.cfg.pong_timeout {
                    warn!("WS: no traffic within pong window");
                    return Err(WsError::LivenessTimeout);
                }
                async_io_mini::Timer::after(PONG_POLL).await;
            }
        }
    }

    // ── Frame plumbing ────────────────────────────────────────

    /// Read until the next Text frame parses as JSON. Control frames
    /// are handled inline: Ping is echoed as Pong, Close ends the
    /// session, Pong and reserved opcodes are consumed.
    async fn next_message(
        &self,
        conn: &SharedConn,
        decoder: &mut FrameDecoder,
        timeout: Duration,
    ) -> Result<Value, WsError> {
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 2048];

        loop {
            while let Some(frame) = decoder.next_frame()? {
                self.last_activity.set(Instant::now());
                match frame.opcode {
                    Opcode::Text => {
                        return serde_json::from_slice(&frame.payload)
                            .map_err(|_| WsError::ProtocolViolation("invalid JSON text frame"));
                    }
                    Opcode::Ping => {
                        debug!("WS: ping ({} bytes), answering", frame.payload.len());
                        self.send_control(conn, Opcode::Pong, &frame.payload).await?;
                    }
                    Opcode::Close => return Err(WsError::ConnectionClosed),
                    Opcode::Pong | Opcode::Binary | Opcode::Continuation | Opcode::Other(_) => {}
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(WsError::LivenessTimeout);
            }
            let n = transport::read_some(conn, &mut buf, deadline - now).await?;
            decoder.feed(&buf[..n])?;
        }
    }

    async fn send_json(&self, conn: &SharedConn, value: &Value) -> Result<(), WsError> {
        let payload =
            serde_json::to_vec(value).map_err(|_| WsError::ProtocolViolation("unencodable message"))?;
        self.send_control(conn, Opcode::Text, &payload).await
    }

    async fn send_control(
        &self,
        conn: &SharedConn,
        opcode: Opcode,
        payload: &[u8],
    ) -> Result<(), WsError> {
        let wire = frame::encode_masked(opcode, payload);
        let _gate = self.write_gate.lock().await;
        transport::write_all(conn, &wire).await
    }
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let mut b = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));
        let delays: Vec<u64> = (0..8).map(|_| b.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 60, 60]);
    }

    #[test]
    fn backoff_resets_to_initial() {
        let mut b = Backoff::new(Duration::from_secs(2), Duration::from_secs(30));
        for _ in 0..5 {
            let _ = b.next_delay();
        }
        b.reset();
        assert_eq!(b.next_delay(), Duration::from_secs(2));
        assert_eq!(b.next_delay(), Duration::from_secs(4));
    }

    #[test]
    fn message_ids_wrap_but_never_hit_zero() {
        assert_eq!(next_message_id(1), 2);
        assert_eq!(next_message_id(MESSAGE_ID_WRAP - 1), MESSAGE_ID_WRAP);
        assert_eq!(next_message_id(MESSAGE_ID_WRAP), 1);
    }
}
