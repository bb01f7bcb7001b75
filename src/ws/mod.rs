//! WebSocket protocol engine.
//!
//! A raw-socket WebSocket client for the Home Assistant event stream:
//!
//! - [`frame`] — RFC 6455 frame encode + streaming decode
//! - [`handshake`] — HTTP Upgrade client handshake
//! - [`transport`] — non-blocking TCP (TLS on device) with async helpers
//! - [`client`] — session logic: auth, subscribe, listen, keepalive,
//!   supervised reconnection with exponential backoff
//! - [`watchdog`] — external liveness guard that can force a session down

pub mod client;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod transport;
pub mod watchdog;

pub use client::{Backoff, MessageHandler, WsClient, WsConfig};
pub use error::WsError;
