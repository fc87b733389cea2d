//! Host import definitions for the Wasmtime runtime.
//!
//! Three host functions back the six guest imports:
//! - `monotonic_millis() -> i32`
//! - `log(ptr: i32, len: i32)`
//! - `present_frame(ptr: i32)`
//!
//! The guest binds imports by position, so instead of registering names with a
//! `Linker` the host builds the extern vector directly from `abi::IMPORTS`.

use std::io::Write;

use wasmtime::{AsContextMut, Caller, Extern, Func, Memory};

use crate::abi::{HostBinding, IMPORTS, screen};
use crate::error::GuestMemoryError;
use crate::state::HostState;

/// Translate a guest `(ptr, len)` pair into a byte range of `data`.
///
/// Both values are reinterpreted as unsigned 32-bit offsets and the end is
/// computed in 64 bits, so the check cannot overflow.
pub fn guest_slice(data: &[u8], ptr: i32, len: i32) -> Result<&[u8], GuestMemoryError> {
    let (ptr, len) = (ptr as u32, len as u32);
    let start = u64::from(ptr);
    let end = start + u64::from(len);
    let memory_len = data.len() as u64;
    if end > memory_len {
        return Err(GuestMemoryError::OutOfBounds {
            ptr,
            len,
            memory_len,
        });
    }
    Ok(&data[start as usize..end as usize])
}

/// Turn a host-detected fault into the error Wasmtime propagates as a trap.
pub fn trap(err: GuestMemoryError) -> wasmtime::Error {
    wasmtime::Error::new(err)
}

/// `log(ptr, len)`: write guest bytes as one UTF-8 line to the console.
pub fn console_log(
    memory: &Memory,
    mut caller: Caller<'_, HostState>,
    ptr: i32,
    len: i32,
) -> wasmtime::Result<()> {
    let (data, state) = memory.data_and_store_mut(&mut caller);
    let bytes = guest_slice(data, ptr, len).map_err(trap)?;
    let line = String::from_utf8_lossy(bytes);
    // Console write failures are ignored.
    let _ = writeln!(state.console, "{line}");
    let _ = state.console.flush();
    Ok(())
}

/// `monotonic_millis()`: milliseconds since the first call.
pub fn monotonic_millis(caller: Caller<'_, HostState>) -> i32 {
    caller.data().clock.elapsed_millis()
}

/// `present_frame(ptr)`: copy one RGBA frame out of guest memory.
pub fn present_frame(
    memory: &Memory,
    mut caller: Caller<'_, HostState>,
    ptr: i32,
) -> wasmtime::Result<()> {
    let (data, state) = memory.data_and_store_mut(&mut caller);
    let frame = guest_slice(data, ptr, screen::BYTE_LEN as i32).map_err(trap)?;
    let frame: &[u8; screen::BYTE_LEN] = frame.try_into()?;
    state.video.present(frame);
    Ok(())
}

/// The host callables, created once per store.
#[derive(Copy, Clone, Debug)]
pub struct HostFunctions {
    pub millis: Func,
    pub log: Func,
    pub present: Func,
}

impl HostFunctions {
    /// Define the host functions. `memory` is captured by the functions that
    /// dereference guest pointers.
    pub fn new(mut store: impl AsContextMut<Data = HostState>, memory: Memory) -> Self {
        let millis = Func::wrap(&mut store, monotonic_millis);
        let log = Func::wrap(
            &mut store,
            move |caller: Caller<'_, HostState>, ptr: i32, len: i32| {
                console_log(&memory, caller, ptr, len)
            },
        );
        let present = Func::wrap(&mut store, move |caller: Caller<'_, HostState>, ptr: i32| {
            present_frame(&memory, caller, ptr)
        });
        Self {
            millis,
            log,
            present,
        }
    }

    fn func_for(&self, binding: HostBinding) -> Option<Func> {
        match binding {
            HostBinding::MonotonicMillis => Some(self.millis),
            HostBinding::Log => Some(self.log),
            HostBinding::PresentFrame => Some(self.present),
            HostBinding::Memory => None,
        }
    }
}

/// Build the extern vector in `abi::IMPORTS` order.
pub fn bind_imports(functions: &HostFunctions, memory: Memory) -> Vec<Extern> {
    IMPORTS
        .iter()
        .map(|slot| match functions.func_for(slot.binding) {
            Some(func) => Extern::from(func),
            None => Extern::from(memory),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::validate::signature_matches;
    use crate::config::MemoryPlan;
    use crate::memory::provision;
    use crate::state::CapturedConsole;
    use wasmtime::{Engine, ExternType, Store};

    const ONE_PAGE: i32 = 65_536;

    fn setup() -> (Store<HostState>, Memory, HostFunctions, CapturedConsole) {
        let console = CapturedConsole::default();
        let mut store = Store::new(&Engine::default(), HostState::new(Box::new(console.clone())));
        let plan = MemoryPlan {
            minimum_pages: 1,
            grow_pages: 0,
        };
        let memory = provision(&mut store, plan, None).unwrap();
        let functions = HostFunctions::new(&mut store, memory);
        (store, memory, functions, console)
    }

    fn log(store: &mut Store<HostState>, f: &HostFunctions, ptr: i32, len: i32) -> wasmtime::Result<()> {
        f.log.typed::<(i32, i32), ()>(&*store)?.call(store, (ptr, len))
    }

    #[test]
    fn guest_slice_bounds() {
        let data = [1u8, 2, 3, 4];
        assert_eq!(guest_slice(&data, 1, 2).unwrap(), &[2, 3]);
        assert_eq!(guest_slice(&data, 4, 0).unwrap(), &[] as &[u8]);
        assert_eq!(guest_slice(&data, 0, 4).unwrap(), &data);
        assert!(guest_slice(&data, 0, 5).is_err());
        assert!(guest_slice(&data, 5, 0).is_err());
        assert_eq!(
            guest_slice(&data, -16, 32),
            Err(GuestMemoryError::OutOfBounds {
                ptr: 0xFFFF_FFF0,
                len: 32,
                memory_len: 4
            })
        );
    }

    #[test]
    fn log_writes_slice_and_newline() {
        let (mut store, memory, f, console) = setup();
        memory.write(&mut store, 100, b"hello").unwrap();
        log(&mut store, &f, 100, 5).unwrap();
        assert_eq!(console.contents(), "hello\n");
    }

    #[test]
    fn log_of_zero_length_emits_empty_line() {
        let (mut store, _memory, f, console) = setup();
        log(&mut store, &f, ONE_PAGE, 0).unwrap();
        assert_eq!(console.contents(), "\n");
    }

    #[test]
    fn log_of_whole_memory_succeeds_one_more_byte_traps() {
        let (mut store, _memory, f, console) = setup();
        log(&mut store, &f, 0, ONE_PAGE).unwrap();
        assert_eq!(console.contents().len(), ONE_PAGE as usize + 1);

        let err = log(&mut store, &f, 0, ONE_PAGE + 1).unwrap_err();
        assert!(err.downcast_ref::<GuestMemoryError>().is_some(), "{err:?}");
        assert_eq!(console.contents().len(), ONE_PAGE as usize + 1);
    }

    #[test]
    fn log_renders_invalid_utf8_lossily() {
        let (mut store, memory, f, console) = setup();
        memory.write(&mut store, 0, &[b'a', 0xFF, b'b']).unwrap();
        log(&mut store, &f, 0, 3).unwrap();
        assert_eq!(console.contents(), "a\u{FFFD}b\n");
    }

    #[test]
    fn millis_starts_at_zero_and_is_monotonic() {
        let (mut store, _memory, f, _console) = setup();
        let millis = f.millis.typed::<(), i32>(&store).unwrap();
        let t0 = millis.call(&mut store, ()).unwrap();
        let t1 = millis.call(&mut store, ()).unwrap();
        assert_eq!(t0, 0);
        assert!(t1 >= t0);
    }

    #[test]
    fn present_copies_frame_and_rejects_short_memory() {
        let (mut store, _memory, f, _console) = setup();
        let present = f.present.typed::<i32, ()>(&store).unwrap();
        // One page cannot hold a 640x400 RGBA frame.
        let err = present.call(&mut store, 0).unwrap_err();
        assert!(err.downcast_ref::<GuestMemoryError>().is_some());
        assert_eq!(store.data().video.frames_presented, 0);

        let mut store = Store::new(&Engine::default(), HostState::new(Box::new(std::io::sink())));
        let memory = provision(&mut store, MemoryPlan::default(), None).unwrap();
        memory.write(&mut store, 64, &[9u8; 4]).unwrap();
        let f = HostFunctions::new(&mut store, memory);
        f.present
            .typed::<i32, ()>(&store)
            .unwrap()
            .call(&mut store, 64)
            .unwrap();
        assert_eq!(store.data().video.frames_presented, 1);
        assert_eq!(&store.data().video.framebuffer[..5], &[9, 9, 9, 9, 0]);
    }

    #[test]
    fn extern_vector_matches_contract_positionally() {
        let (store, memory, f, _console) = setup();
        let externs = bind_imports(&f, memory);
        assert_eq!(externs.len(), IMPORTS.len());
        for (ext, slot) in externs.iter().zip(IMPORTS.iter()) {
            match (ext.ty(&store), slot.binding.signature()) {
                (ExternType::Func(ty), Some(sig)) => assert!(signature_matches(&ty, sig)),
                (ExternType::Memory(_), None) => {}
                (other, _) => panic!("unexpected extern {other:?} for {}", slot.name),
            }
        }
    }
}
