//! Host configuration.
//!
//! The binary takes no arguments and reads no environment variables, so
//! `HostConfig::default()` is the whole configuration surface. Tests build
//! their own values to point at temporary artifacts and bound the frame loop.

use std::path::PathBuf;
use std::time::Duration;

/// Relative path of the guest artifact.
pub const DEFAULT_ARTIFACT_PATH: &str = "../doom.wasm";

/// Initial page count of the provisioned memory (`M_min`).
pub const DEFAULT_MINIMUM_PAGES: u64 = 108;

/// Extra pages grown before instantiation (`M_grow`).
pub const DEFAULT_GROW_PAGES: u64 = 102;

/// Frame tick: 60 Hz.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

/// Page limits for the host-provided linear memory.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemoryPlan {
    pub minimum_pages: u64,
    pub grow_pages: u64,
}

impl MemoryPlan {
    /// Page count the memory must have once provisioning finishes.
    pub fn target_pages(&self) -> u64 {
        self.minimum_pages.saturating_add(self.grow_pages)
    }
}

impl Default for MemoryPlan {
    fn default() -> Self {
        Self {
            minimum_pages: DEFAULT_MINIMUM_PAGES,
            grow_pages: DEFAULT_GROW_PAGES,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HostConfig {
    pub artifact_path: PathBuf,
    pub memory: MemoryPlan,
    /// Time between frame step calls.
    pub frame_interval: Duration,
    /// Stop the frame loop after this many steps. `None` runs until the guest quits.
    pub frame_limit: Option<u64>,
    /// `tracing-subscriber` filter directive for host diagnostics (stderr).
    pub log_filter: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            artifact_path: PathBuf::from(DEFAULT_ARTIFACT_PATH),
            memory: MemoryPlan::default(),
            frame_interval: DEFAULT_FRAME_INTERVAL,
            frame_limit: None,
            log_filter: "warn".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_guest_expectations() {
        let cfg = HostConfig::default();
        assert_eq!(cfg.artifact_path, PathBuf::from("../doom.wasm"));
        assert_eq!(cfg.memory.target_pages(), 210);
        assert_eq!(cfg.frame_limit, None);
    }
}
