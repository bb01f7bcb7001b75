//! Outside-world adapters.
//!
//! Each adapter implements a port (or a concrete service) for one
//! external concern. ESP-IDF code is guarded by
//! `#[cfg(target_os = "espidf")]`; every adapter also builds on the
//! host with an in-memory simulation.

pub mod gpio;
pub mod httpd;
pub mod rest;
pub mod wifi;
