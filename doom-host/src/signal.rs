//! Termination signal forwarding.
//!
//! The frame loop runs on the main thread and never awaits anything, so a
//! small current-thread Tokio runtime on a helper thread listens for SIGINT
//! and SIGTERM and raises the driver's [`StopHandle`]. The loop then leaves
//! after the current frame and the runtime is torn down in order.
//!
//! A second signal while the first is still being honoured (for example a
//! guest stuck inside one frame) exits the process immediately with status 1.

use std::io;
use std::thread;

use tracing::{info, warn};

use crate::driver::StopHandle;

/// Install the signal listeners and forward the first signal to `stop`.
///
/// Listeners are registered before this returns, so a signal delivered
/// afterwards is never lost to the default disposition.
pub fn forward_termination(stop: StopHandle) -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()?;
    let mut signals = {
        let _guard = runtime.enter();
        Termination::register()?
    };

    thread::Builder::new()
        .name("doom-host-signals".into())
        .spawn(move || {
            runtime.block_on(async move {
                let name = signals.recv().await;
                info!(signal = name, "termination requested; stopping frame loop");
                stop.stop();

                let name = signals.recv().await;
                warn!(signal = name, "second termination signal; exiting now");
                std::process::exit(1);
            })
        })?;
    Ok(())
}

#[cfg(unix)]
struct Termination {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Termination {
    fn register() -> io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }
}

#[cfg(windows)]
struct Termination(tokio::signal::windows::CtrlC);

#[cfg(windows)]
impl Termination {
    fn register() -> io::Result<Self> {
        tokio::signal::windows::ctrl_c().map(Self)
    }

    async fn recv(&mut self) -> &'static str {
        self.0.recv().await;
        "ctrl-c"
    }
}
