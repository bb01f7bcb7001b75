//! State synchronization core.
//!
//! Pure logic, no hardware and no network:
//!
//! - [`ports`] — the GPIO boundary the hardware adapters implement
//! - [`layout`] — [`layout::PhysicalLayout`], the single owner of all
//!   registered hardware components
//! - [`page`] — [`page::DashPage`], one dashboard of LED/button
//!   mappings with a virtual/physical state split
//! - [`dispatcher`] — [`dispatcher::EventHandler`], routing hub events
//!   to pages and button presses to actions

pub mod dispatcher;
pub mod layout;
pub mod page;
pub mod ports;

pub use dispatcher::EventHandler;
pub use layout::{ComponentKind, HardwareComponent, PhysicalLayout};
pub use page::{ButtonAction, DashPage};
