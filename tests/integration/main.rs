//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters.  All tests run on the host (x86_64) with no
//! real hardware required.

mod config_tests;
mod dispatcher_tests;
mod layout_tests;
mod mock_gpio;
mod page_tests;
