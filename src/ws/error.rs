//! Protocol-engine error types.
//!
//! One enum per the engine's failure classes. Transport failures carry
//! the underlying I/O error; everything else is a plain variant so the
//! supervisor can log it and decide the reconnect path uniformly.

use core::fmt;

#[derive(Debug)]
pub enum WsError {
    /// Socket-level failure (connect, read, write).
    Transport(std::io::Error),
    /// Peer closed the connection (Close frame or EOF).
    ConnectionClosed,
    /// Upgrade handshake answered with a non-101 status.
    HandshakeRejected(u16),
    /// Peer sent something the protocol does not allow here.
    ProtocolViolation(&'static str),
    /// Hub rejected the access token.
    AuthFailed,
    /// Event subscription was not confirmed, or was refused.
    SubscribeFailed,
    /// No traffic within the liveness window.
    LivenessTimeout,
    /// Inbound frame exceeds the payload cap.
    FrameTooLarge(usize),
    /// A bounded receive buffer filled without completing a unit.
    BufferOverflow,
    /// TLS requested but not available on this target.
    TlsUnavailable,
    /// The external watchdog forced this session down.
    WatchdogForced,
}

impl fmt::Display for WsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::ConnectionClosed => write!(f, "connection closed by peer"),
            Self::HandshakeRejected(code) => write!(f, "handshake rejected (HTTP {code})"),
            Self::ProtocolViolation(what) => write!(f, "protocol violation: {what}"),
            Self::AuthFailed => write!(f, "authentication failed"),
            Self::SubscribeFailed => write!(f, "event subscription failed"),
            Self::LivenessTimeout => write!(f, "liveness timeout"),
            Self::FrameTooLarge(n) => write!(f, "frame too large ({n} bytes)"),
            Self::BufferOverflow => write!(f, "receive buffer overflow"),
            Self::TlsUnavailable => write!(f, "TLS not available on this target"),
            Self::WatchdogForced => write!(f, "watchdog forced close"),
        }
    }
}

impl From<std::io::Error> for WsError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut => Self::LivenessTimeout,
            std::io::ErrorKind::UnexpectedEof => Self::ConnectionClosed,
            _ => Self::Transport(e),
        }
    }
}
