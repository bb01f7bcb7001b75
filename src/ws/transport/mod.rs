//! Non-blocking stream transport.
//!
//! One socket per hub session, shared between the listen and keepalive
//! tasks as `Rc<RefCell<Transport>>`. All socket calls are non-blocking;
//! the async helpers below poll via `async-io-mini` reactor timers so a
//! `RefCell` borrow is never held across an await point.
//!
//! ## Dual-target design
//!
//! - **`target_os = "espidf"`**: TLS sessions ride esp-tls (mbedTLS)
//!   with certificate verification disabled — the hub lives on the LAN
//!   and is addressed by IP or mDNS name.
//! - **all other targets**: plaintext TCP only; requesting TLS reports
//!   [`WsError::TlsUnavailable`].

#[cfg(target_os = "espidf")]
mod esp_tls;

use core::cell::RefCell;
use core::time::Duration;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::rc::Rc;
use std::time::Instant;

use crate::ws::error::WsError;

/// How long a blocking `connect` may take before giving up.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Reactor-timer poll period for pending reads/writes.
const POLL_INTERVAL: Duration = Duration::from_millis(2);

pub type SharedConn = Rc<RefCell<Transport>>;

// ── Transport ────────────────────────────────────────────────

pub enum Transport {
    Tcp(TcpStream),
    #[cfg(target_os = "espidf")]
    Tls(esp_tls::TlsSession),
}

impl Transport {
    /// Open a connection to `host:port`, plaintext or TLS.
    ///
    /// The connect itself is bounded-blocking; everything after is
    /// non-blocking.
    pub fn connect(host: &str, port: u16, tls: bool) -> Result<Self, WsError> {
        if tls {
            return Self::connect_tls(host, port);
        }

        let addr = (host, port)
            .to_socket_addrs()
            .map_err(WsError::Transport)?
            .next()
            .ok_or_else(|| {
                WsError::Transport(io::Error::new(io::ErrorKind::NotFound, "no address for host"))
            })?;

        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT).map_err(WsError::Transport)?;
        stream.set_nonblocking(true).map_err(WsError::Transport)?;
        stream.set_nodelay(true).ok();
        Ok(Self::Tcp(stream))
    }

    #[cfg(target_os = "espidf")]
    fn connect_tls(host: &str, port: u16) -> Result<Self, WsError> {
        Ok(Self::Tls(esp_tls::TlsSession::connect(host, port)?))
    }

    #[cfg(not(target_os = "espidf"))]
    fn connect_tls(_host: &str, _port: u16) -> Result<Self, WsError> {
        Err(WsError::TlsUnavailable)
    }

    /// Non-blocking read. `Ok(0)` means no data available right now;
    /// peer EOF surfaces as `UnexpectedEof`.
    pub fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(s) => match s.read(buf) {
                Ok(0) => Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(n) => Ok(n),
                Err(e) if would_block(&e) => Ok(0),
                Err(e) => Err(e),
            },
            #[cfg(target_os = "espidf")]
            Self::Tls(s) => s.try_read(buf),
        }
    }

    /// Non-blocking write. `Ok(0)` means the socket buffer is full.
    pub fn try_write(&mut self, data: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(s) => match s.write(data) {
                Ok(n) => Ok(n),
                Err(e) if would_block(&e) => Ok(0),
                Err(e) => Err(e),
            },
            #[cfg(target_os = "espidf")]
            Self::Tls(s) => s.try_write(data),
        }
    }
}

fn would_block(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted)
}

// ── Async helpers ────────────────────────────────────────────

/// Read at least one byte, polling until `timeout` elapses.
pub async fn read_some(conn: &SharedConn, buf: &mut [u8], timeout: Duration) -> Result<usize, WsError> {
    let deadline = Instant::now() + timeout;
    loop {
        let n = conn.borrow_mut().try_read(buf)?;
        if n > 0 {
            return Ok(n);
        }
        if Instant::now() >= deadline {
            return Err(WsError::LivenessTimeout);
        }
        async_io_mini::Timer::after(POLL_INTERVAL).await;
    }
}

/// Write the whole buffer, polling while the socket buffer is full.
///
/// Callers that interleave writers must serialise whole frames through
/// a write gate; this helper only guarantees completion, not atomicity.
pub async fn write_all(conn: &SharedConn, data: &[u8]) -> Result<(), WsError> {
    let mut remaining = data;
    while !remaining.is_empty() {
        let n = conn.borrow_mut().try_write(remaining)?;
        if n == 0 {
            async_io_mini::Timer::after(POLL_INTERVAL).await;
        } else {
            remaining = &remaining[n..];
        }
    }
    Ok(())
}
