//! Hub REST client.
//!
//! Minimal async HTTP/1.1 over the same non-blocking transport the
//! WebSocket engine uses. One request per connection (`Connection:
//! close`), which keeps the parser trivial and matches how rarely this
//! path runs: bulk state fetch after (re)connect, service calls on
//! button presses.
//!
//! The hub's scheme is probed once: plaintext first, then TLS; whichever
//! connects is cached for the rest of the session.
//!
//! State resync uses the bulk `/api/states` snapshot rather than one
//! fetch per entity: one request instead of N, and per-entity failure
//! isolation still holds because malformed snapshot entries are skipped
//! individually by the dispatcher.

use core::cell::Cell;
use core::fmt;
use core::time::Duration;
use std::rc::Rc;
use std::time::Instant;

use log::{debug, info, warn};
use serde_json::Value;

use crate::ws::error::WsError;
use crate::ws::transport::{self, SharedConn, Transport};

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(15);

/// Response head + body cap. States dumps for big installs are large;
/// beyond this the hub is misconfigured for a node this small.
const MAX_RESPONSE: usize = 256 * 1024;

// ── Errors ───────────────────────────────────────────────────

#[derive(Debug)]
pub enum RestError {
    Transport(WsError),
    /// Non-2xx response status.
    BadStatus(u16),
    /// Response was not parseable HTTP or not valid JSON.
    InvalidResponse(&'static str),
    /// Response exceeded the size cap.
    TooLarge,
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::BadStatus(code) => write!(f, "hub answered HTTP {code}"),
            Self::InvalidResponse(what) => write!(f, "invalid response: {what}"),
            Self::TooLarge => write!(f, "response exceeds size cap"),
        }
    }
}

impl From<WsError> for RestError {
    fn from(e: WsError) -> Self {
        Self::Transport(e)
    }
}

// ── Client ───────────────────────────────────────────────────

pub struct RestClient {
    host: String,
    port: u16,
    token: String,
    /// Scheme confirmed by a successful connect; `None` until probed.
    confirmed_tls: Cell<Option<bool>>,
}

impl RestClient {
    pub fn new(host: impl Into<String>, port: u16, token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            token: token.into(),
            confirmed_tls: Cell::new(None),
        }
    }

    /// Full `/api/states` snapshot (array of entity states).
    pub async fn get_states(&self) -> Result<Value, RestError> {
        let (status, body) = self.request("GET", "/api/states", None).await?;
        if status != 200 {
            return Err(RestError::BadStatus(status));
        }
        Ok(body)
    }

    /// Toggle any entity via `homeassistant/toggle`.
    pub async fn toggle(&self, entity_id: &str) -> Result<(), RestError> {
        info!("REST: toggle {entity_id}");
        self.call_service("homeassistant", "toggle", entity_id).await
    }

    pub async fn call_service(
        &self,
        domain: &str,
        service: &str,
        entity_id: &str,
    ) -> Result<(), RestError> {
        let path = format!("/api/services/{domain}/{service}");
        let body = serde_json::json!({"entity_id": entity_id});
        let (status, _) = self.request("POST", &path, Some(&body)).await?;
        if !(200..300).contains(&status) {
            return Err(RestError::BadStatus(status));
        }
        Ok(())
    }

    // ── Request machinery ─────────────────────────────────────

    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<&Value>,
    ) -> Result<(u16, Value), RestError> {
        let conn = self.open()?;

        let body_text = body.map(Value::to_string).unwrap_or_default();
        let request = format!(
            "{method} {path} HTTP/1.1\r\n\
             Host: {host}:{port}\r\n\
             Authorization: Bearer {token}\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {len}\r\n\
             Connection: close\r\n\
             \r\n\
             {body_text}",
            host = self.host,
            port = self.port,
            token = self.token,
            len = body_text.len(),
        );
        transport::write_all(&conn, request.as_bytes()).await?;

        let raw = read_response(&conn).await?;
        parse_response(&raw)
    }

    fn open(&self) -> Result<SharedConn, RestError> {
        let candidates: &[bool] = match self.confirmed_tls.get() {
            Some(true) => &[true],
            Some(false) => &[false],
            None => &[false, true],
        };

        let mut last_err = WsError::TlsUnavailable;
        for &tls in candidates {
            match Transport::connect(&self.host, self.port, tls) {
                Ok(conn) => {
                    if self.confirmed_tls.get().is_none() {
                        debug!("REST: confirmed {} scheme", if tls { "https" } else { "http" });
                        self.confirmed_tls.set(Some(tls));
                    }
                    return Ok(Rc::new(core::cell::RefCell::new(conn)));
                }
                Err(e) => {
                    warn!("REST: connect ({}) failed: {e}", if tls { "https" } else { "http" });
                    last_err = e;
                }
            }
        }
        Err(RestError::Transport(last_err))
    }
}

/// Read until EOF (the hub honours `Connection: close`) or timeout.
async fn read_response(conn: &SharedConn) -> Result<Vec<u8>, RestError> {
    let deadline = Instant::now() + RESPONSE_TIMEOUT;
    let mut raw = Vec::new();
    let mut buf = [0u8; 2048];

    loop {
        let now = Instant::now();
        if now >= deadline {
            return Err(RestError::Transport(WsError::LivenessTimeout));
        }
        match transport::read_some(conn, &mut buf, deadline - now).await {
            Ok(n) => {
                if raw.len() + n > MAX_RESPONSE {
                    return Err(RestError::TooLarge);
                }
                raw.extend_from_slice(&buf[..n]);
            }
            Err(WsError::ConnectionClosed) => return Ok(raw),
            Err(e) => return Err(e.into()),
        }
    }
}

fn parse_response(raw: &[u8]) -> Result<(u16, Value), RestError> {
    let head_end = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .ok_or(RestError::InvalidResponse("no header terminator"))?;

    let head = core::str::from_utf8(&raw[..head_end])
        .map_err(|_| RestError::InvalidResponse("non-UTF8 headers"))?;
    let status: u16 = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .ok_or(RestError::InvalidResponse("malformed status line"))?;

    let body = &raw[head_end + 4..];
    let value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(body).map_err(|_| RestError::InvalidResponse("body is not JSON"))?
    };
    Ok((status, value))
}
