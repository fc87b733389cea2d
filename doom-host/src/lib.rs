//! doom-host: a minimal WebAssembly host for the Doom guest module.
//!
//! The guest is a precompiled `doom.wasm` that imports its linear memory and
//! three host callables (time, log, framebuffer present), bound by position.
//! Startup runs load -> validate -> compile -> provision memory -> bind
//! imports -> instantiate -> resolve exports, then the driver calls the
//! initializer and steps frames at 60 Hz.
//!
//! The import/export contract lives in `crate::abi`.

pub mod abi;
pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod loader;
pub mod memory;
pub mod runtime;
pub mod signal;
pub mod state;

pub use config::HostConfig;
pub use driver::{Driver, LoopExit, RunSummary, StopHandle};
pub use error::{GuestMemoryError, HostError};
pub use runtime::DoomRuntime;
