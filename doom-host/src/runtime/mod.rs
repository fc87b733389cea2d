//! Wasmtime-backed runtime glue for doom-host.
//!
//! - `imports`: the host functions and the positional import binder.
//! - `runtime`: engine/store setup, instantiation and export resolution.

pub mod imports;
pub mod runtime;

pub use runtime::{DoomRuntime, new_engine};
