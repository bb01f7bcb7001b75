//! WebSocket frame codec.
//!
//! Wire format (RFC 6455, client side):
//! ```text
//! ┌─────────────┬─────────────┬───────────────┬──────────┬─────────┐
//! │ FIN|opcode  │ MASK|len7   │ ext. length   │ mask key │ payload │
//! │ 1 B         │ 1 B         │ 0 / 2 / 8 B   │ 0 / 4 B  │ N B     │
//! └─────────────┴─────────────┴───────────────┴──────────┴─────────┘
//! ```
//!
//! Payload lengths `<= 125` are inline; `126..=65535` use marker 126
//! plus a 2-byte big-endian length; larger use marker 127 plus 8 bytes.
//! Client frames are always masked; server frames normally are not, but
//! the decoder unmasks either way.
//!
//! The decoder accumulates incoming bytes and yields complete frames.
//! This handles partial reads gracefully — a single transport read may
//! return part of the header, part of the payload, or several frames
//! concatenated.

use crate::ws::error::WsError;

/// Maximum accepted payload size (protects against memory exhaustion).
pub const MAX_FRAME_PAYLOAD: usize = 96 * 1024;

/// Cap on buffered-but-unparsed bytes. Must exceed the largest legal
/// frame (header + payload) or the decoder could wedge.
const MAX_BUFFERED: usize = MAX_FRAME_PAYLOAD + 16;

// ── Opcodes ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
    /// Reserved opcode — ignored by the session layer.
    Other(u8),
}

impl Opcode {
    fn from_bits(bits: u8) -> Self {
        match bits {
            0x0 => Self::Continuation,
            0x1 => Self::Text,
            0x2 => Self::Binary,
            0x8 => Self::Close,
            0x9 => Self::Ping,
            0xA => Self::Pong,
            other => Self::Other(other),
        }
    }

    fn bits(self) -> u8 {
        match self {
            Self::Continuation => 0x0,
            Self::Text => 0x1,
            Self::Binary => 0x2,
            Self::Close => 0x8,
            Self::Ping => 0x9,
            Self::Pong => 0xA,
            Self::Other(b) => b & 0x0F,
        }
    }

    fn is_data(self) -> bool {
        matches!(self, Self::Continuation | Self::Text | Self::Binary)
    }
}

/// A complete, unmasked frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: Opcode,
    pub payload: Vec<u8>,
}

// ── Encoder ──────────────────────────────────────────────────

/// Encode a single masked client frame (FIN always set — this client
/// never fragments).
pub fn encode(opcode: Opcode, payload: &[u8], mask_key: [u8; 4]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 14);
    out.push(0x80 | opcode.bits());

    let len = payload.len();
    if len <= 125 {
        out.push(0x80 | len as u8);
    } else if len <= 65535 {
        out.push(0x80 | 126);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(0x80 | 127);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }

    out.extend_from_slice(&mask_key);
    out.extend(payload.iter().enumerate().map(|(i, b)| b ^ mask_key[i % 4]));
    out
}

/// Encode with a freshly drawn mask key.
pub fn encode_masked(opcode: Opcode, payload: &[u8]) -> Vec<u8> {
    encode(opcode, payload, rand::random())
}

// ── Streaming decoder ────────────────────────────────────────

/// Streaming frame decoder.
///
/// Feed raw bytes with [`FrameDecoder::feed`], then drain complete
/// frames with [`FrameDecoder::next_frame`].
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Append raw transport bytes to the decode buffer.
    pub fn feed(&mut self, data: &[u8]) -> Result<(), WsError> {
        if self.buf.len() + data.len() > MAX_BUFFERED {
            return Err(WsError::BufferOverflow);
        }
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Pop the next complete frame, or `None` if more bytes are needed.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, WsError> {
        if self.buf.len() < 2 {
            return Ok(None);
        }

        let fin = self.buf[0] & 0x80 != 0;
        let opcode = Opcode::from_bits(self.buf[0] & 0x0F);
        let masked = self.buf[1] & 0x80 != 0;
        let len7 = (self.buf[1] & 0x7F) as usize;

        let ext_len = match len7 {
            126 => 2,
            127 => 8,
            _ => 0,
        };
        let mask_len = if masked { 4 } else { 0 };
        let header_len = 2 + ext_len + mask_len;

        if self.buf.len() < 2 + ext_len {
            return Ok(None);
        }

        let payload_len = match len7 {
            126 => u16::from_be_bytes([self.buf[2], self.buf[3]]) as usize,
            127 => {
                let mut b = [0u8; 8];
                b.copy_from_slice(&self.buf[2..10]);
                let n = u64::from_be_bytes(b);
                if n > MAX_FRAME_PAYLOAD as u64 {
                    return Err(WsError::FrameTooLarge(MAX_FRAME_PAYLOAD + 1));
                }
                n as usize
            }
            n => n,
        };

        if payload_len > MAX_FRAME_PAYLOAD {
            return Err(WsError::FrameTooLarge(payload_len));
        }

        // Fragmentation is not supported: a data frame without FIN, or
        // any continuation frame, is a violation rather than a silent
        // event drop.
        if (!fin && opcode.is_data()) || opcode == Opcode::Continuation {
            return Err(WsError::ProtocolViolation("fragmented frame"));
        }
        if !fin {
            return Err(WsError::ProtocolViolation("non-final control frame"));
        }

        if self.buf.len() < header_len + payload_len {
            return Ok(None);
        }

        let mut payload = self.buf[header_len..header_len + payload_len].to_vec();
        if masked {
            let key = [
                self.buf[2 + ext_len],
                self.buf[3 + ext_len],
                self.buf[4 + ext_len],
                self.buf[5 + ext_len],
            ];
            for (i, b) in payload.iter_mut().enumerate() {
                *b ^= key[i % 4];
            }
        }

        self.buf.drain(..header_len + payload_len);
        Ok(Some(Frame { opcode, payload }))
    }

    /// Drop buffered bytes (after a transport reconnect).
    pub fn reset(&mut self) {
        self.buf.clear();
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────
