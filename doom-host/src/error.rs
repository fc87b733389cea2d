//! Error types for doom-host.
//!
//! `HostError` covers every failure surfaced at the driver level; the binary
//! prints it as one line and exits with status 1. `GuestMemoryError` never
//! reaches the driver directly: host functions hand it back to the guest as a
//! trap, and the driver then sees a `HostError::Call`.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = HostError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum HostError {
    /// The guest artifact could not be opened or read.
    #[error("cannot read guest module `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The embedder rejected the engine configuration.
    #[error("cannot create engine: {}", .error.root_cause())]
    Engine { error: anyhow::Error },

    /// The bytes are not a valid WebAssembly module.
    #[error("invalid binary: {reason}")]
    Format { reason: String },

    /// Validation passed but the embedder failed to compile the module.
    #[error("compilation failed: {}", .error.root_cause())]
    Compile { error: anyhow::Error },

    /// Memory creation or growth failed.
    #[error("memory provisioning failed: {reason}")]
    Resource { reason: String },

    /// The import vector or the export layout does not match the guest.
    #[error("instantiation failed: {reason}")]
    Link { reason: String },

    /// A guest call trapped.
    #[error("guest call `{export}` failed: {}", .error.root_cause())]
    Call {
        export: &'static str,
        error: anyhow::Error,
    },
}

impl HostError {
    pub fn format(reason: impl Into<String>) -> Self {
        HostError::Format {
            reason: reason.into(),
        }
    }

    pub fn resource(reason: impl Into<String>) -> Self {
        HostError::Resource {
            reason: reason.into(),
        }
    }

    pub fn link(reason: impl Into<String>) -> Self {
        HostError::Link {
            reason: reason.into(),
        }
    }

    /// Short kind label, used in lifecycle logs.
    pub fn kind(&self) -> &'static str {
        match self {
            HostError::Io { .. } => "io",
            HostError::Engine { .. } => "engine",
            HostError::Format { .. } => "format",
            HostError::Compile { .. } => "compile",
            HostError::Resource { .. } => "resource",
            HostError::Link { .. } => "link",
            HostError::Call { .. } => "call",
        }
    }
}

/// A guest pointer that escapes the shared linear memory.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
pub enum GuestMemoryError {
    #[error("memory out of bounds: [{ptr:#x}, +{len}) exceeds {memory_len} bytes")]
    OutOfBounds { ptr: u32, len: u32, memory_len: u64 },
}
