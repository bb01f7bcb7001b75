//! HTTP Upgrade client handshake.
//!
//! Sends the `GET <path>` Upgrade request with a random
//! `Sec-WebSocket-Key`, requires a `101` status line, and drains the
//! remaining response headers. Bytes received past the blank line
//! already belong to the frame stream and are returned to the caller.

use core::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::debug;

use crate::ws::error::WsError;
use crate::ws::transport::{self, SharedConn};

/// Response headers larger than this are a misbehaving peer.
const MAX_RESPONSE_HEAD: usize = 2048;

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Perform the client handshake. On success returns any bytes read
/// beyond the header terminator (the start of the frame stream).
pub async fn client_handshake(
    conn: &SharedConn,
    host: &str,
    port: u16,
    path: &str,
) -> Result<Vec<u8>, WsError> {
    let key_bytes: [u8; 16] = rand::random();
    let key = BASE64.encode(key_bytes);

    let request = format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host}:{port}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {key}\r\n\
         Sec-WebSocket-Version: 13\r\n\
         \r\n"
    );
    transport::write_all(conn, request.as_bytes()).await?;

    // Accumulate until the blank line that ends the response head.
    let mut head = Vec::new();
    let mut buf = [0u8; 512];
    let body_start = loop {
        if let Some(end) = find_terminator(&head) {
            break end;
        }
        if head.len() > MAX_RESPONSE_HEAD {
            return Err(WsError::BufferOverflow);
        }
        let n = transport::read_some(conn, &mut buf, RESPONSE_TIMEOUT).await?;
        head.extend_from_slice(&buf[..n]);
    };

    let status = parse_status_line(&head[..body_start])?;
    if status != 101 {
        return Err(WsError::HandshakeRejected(status));
    }
    debug!("WS: handshake accepted ({} header bytes)", body_start);

    Ok(head[body_start..].to_vec())
}

/// Byte offset just past the `\r\n\r\n` terminator, if present.
fn find_terminator(head: &[u8]) -> Option<usize> {
    head.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn parse_status_line(head: &[u8]) -> Result<u16, WsError> {
    let line_end = head
        .windows(2)
        .position(|w| w == b"\r\n")
        .ok_or(WsError::ProtocolViolation("missing status line"))?;
    let line = core::str::from_utf8(&head[..line_end])
        .map_err(|_| WsError::ProtocolViolation("non-UTF8 status line"))?;

    // "HTTP/1.1 101 Switching Protocols"
    line.split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .ok_or(WsError::ProtocolViolation("malformed status line"))
}
