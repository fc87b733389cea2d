//! Host-side state attached to the Wasmtime `Store`.
//!
//! Host functions receive it through `Caller::data`/`data_mut`. Nothing here is
//! global: one store, one guest, one clock epoch. The guest is paused whenever
//! a host function runs, so no locking is needed.

use std::io::Write;

use crate::abi::screen;
use crate::clock::MonotonicClock;

pub struct HostState {
    /// Time source behind `monotonic_millis`.
    pub clock: MonotonicClock,

    /// Sink for guest log lines. Standard output in the binary.
    pub console: Box<dyn Write + Send>,

    /// Host-owned copy of the last presented frame.
    pub video: VideoState,
}

impl HostState {
    pub fn new(console: Box<dyn Write + Send>) -> Self {
        Self {
            clock: MonotonicClock::new(),
            console,
            video: VideoState::default(),
        }
    }
}

impl Default for HostState {
    fn default() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }
}

/// Host-owned framebuffer (RGBA, `screen::WIDTH` x `screen::HEIGHT`).
#[derive(Debug)]
pub struct VideoState {
    pub framebuffer: Vec<u8>,
    pub frames_presented: u64,
}

impl Default for VideoState {
    fn default() -> Self {
        Self {
            framebuffer: vec![0; screen::BYTE_LEN],
            frames_presented: 0,
        }
    }
}

impl VideoState {
    /// Replace the host framebuffer with a full guest frame.
    pub(crate) fn present(&mut self, frame: &[u8; screen::BYTE_LEN]) {
        self.framebuffer.copy_from_slice(frame);
        self.frames_presented += 1;
    }
}

/// In-memory console used by tests to capture guest log output.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct CapturedConsole(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

#[cfg(test)]
impl CapturedConsole {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

#[cfg(test)]
impl Write for CapturedConsole {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn present_copies_and_counts() {
        let mut video = VideoState::default();
        let frame = vec![7u8; screen::BYTE_LEN];
        video.present(frame.as_slice().try_into().unwrap());
        assert_eq!(video.frames_presented, 1);
        assert!(video.framebuffer.iter().all(|&b| b == 7));
    }
}
