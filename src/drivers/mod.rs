//! Input device drivers.

pub mod button;
