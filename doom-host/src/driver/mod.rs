//! Driver: calls the guest initializer, then pumps the frame step.
//!
//! Everything runs on the calling thread. Guest calls are synchronous, so host
//! function side effects from one call are visible before the next call starts.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::abi::INITIALIZER_ARGS;
use crate::config::HostConfig;
use crate::error::{HostError, Result};
use crate::runtime::DoomRuntime;
use crate::state::HostState;

/// Cross-thread request to leave the frame loop after the current frame.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why the driver returned.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LoopExit {
    /// No frame step, or the initializer reported failure.
    InitOnly,
    /// The frame step returned a non-zero status.
    GuestQuit,
    /// The configured frame limit was reached.
    FrameLimit,
    /// A `StopHandle` was raised.
    Stopped,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RunSummary {
    /// Value returned by the guest initializer.
    pub init_status: i32,
    pub frames: u64,
    pub exit: LoopExit,
}

pub struct Driver {
    runtime: DoomRuntime,
    frame_interval: Duration,
    frame_limit: Option<u64>,
    stop: StopHandle,
}

impl Driver {
    pub fn new(runtime: DoomRuntime, config: &HostConfig) -> Self {
        Self::with_stop_handle(runtime, config, StopHandle::default())
    }

    /// Build a driver that leaves its frame loop once `stop` is raised.
    pub fn with_stop_handle(runtime: DoomRuntime, config: &HostConfig, stop: StopHandle) -> Self {
        Self {
            runtime,
            frame_interval: config.frame_interval,
            frame_limit: config.frame_limit,
            stop,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn runtime(&self) -> &DoomRuntime {
        &self.runtime
    }

    /// Call the initializer once with the argc/argv shim.
    pub fn initialize(&mut self) -> Result<i32> {
        let runtime = &mut self.runtime;
        let status = runtime
            .entrypoints
            .init
            .call(&mut runtime.store, INITIALIZER_ARGS)
            .map_err(|error| HostError::Call {
                export: "initializer",
                error,
            })?;
        info!(status, "guest initializer returned");
        Ok(status)
    }

    /// Run one frame step. Returns `true` when the guest asks to quit.
    pub fn step(&mut self) -> Result<bool> {
        let runtime = &mut self.runtime;
        let Some(frame) = &runtime.entrypoints.frame else {
            return Ok(true);
        };
        frame
            .call(&mut runtime.store)
            .map_err(|error| HostError::Call {
                export: "frame step",
                error,
            })
    }

    /// Initialize, then step frames at a fixed tick until the guest quits,
    /// the frame limit is reached, or the stop handle is raised.
    pub fn run(mut self) -> Result<(RunSummary, DoomRuntime)> {
        let init_status = self.initialize()?;

        let exit = if init_status != 0 {
            warn!(init_status, "guest initializer reported failure; skipping frame loop");
            LoopExit::InitOnly
        } else if self.runtime.entrypoints.frame.is_none() {
            LoopExit::InitOnly
        } else {
            return self.frame_loop(init_status);
        };

        Ok((
            RunSummary {
                init_status,
                frames: 0,
                exit,
            },
            self.runtime,
        ))
    }

    fn frame_loop(mut self, init_status: i32) -> Result<(RunSummary, DoomRuntime)> {
        let mut frames = 0u64;
        let mut next_tick = Instant::now();

        let exit = loop {
            if self.stop.is_stopped() {
                break LoopExit::Stopped;
            }
            if self.frame_limit.is_some_and(|limit| frames >= limit) {
                break LoopExit::FrameLimit;
            }

            let quit = self.step()?;
            frames += 1;
            if quit {
                break LoopExit::GuestQuit;
            }

            next_tick += self.frame_interval;
            let now = Instant::now();
            if next_tick > now {
                std::thread::sleep(next_tick - now);
            } else {
                // Late frames are not made up.
                next_tick = now;
            }
        };

        debug!(frames, ?exit, "frame loop finished");
        Ok((
            RunSummary {
                init_status,
                frames,
                exit,
            },
            self.runtime,
        ))
    }
}

/// Load the configured artifact, then initialize and run it with guest logs on
/// stdout until the guest quits or `stop` is raised.
pub fn run(config: &HostConfig, stop: StopHandle) -> Result<RunSummary> {
    let runtime = DoomRuntime::load(config, HostState::default())?;
    let (summary, _runtime) = Driver::with_stop_handle(runtime, config, stop).run()?;
    Ok(summary)
}
