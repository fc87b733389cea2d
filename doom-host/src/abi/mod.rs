//! doom-host ABI module
//!
//! This module defines the contract between:
//! - **Host**: `doom-host`
//! - **Guest**: the precompiled Doom WebAssembly module
//!
//! ## Imports (guest -> host)
//! The guest declares six imports. They are bound **positionally**: the host
//! builds an extern vector in exactly this order and hands it to the
//! instantiator. Names are only used for diagnostics.
//!
//! | Index | Import                            | Binding            |
//! |-------|-----------------------------------|--------------------|
//! | 0     | `js.js_milliseconds_since_start`  | `monotonic_millis` |
//! | 1     | `js.js_console_log`               | `log`              |
//! | 2     | `js.js_draw_screen`               | `present_frame`    |
//! | 3     | `js.js_stdout`                    | `log`              |
//! | 4     | `js.js_stderr`                    | `log`              |
//! | 5     | `env.memory`                      | provisioned memory |
//!
//! Indices 3 and 4 reuse the log implementation as a compatibility shim.
//!
//! ## Exports (host -> guest)
//! Selected by position, not by name:
//! - index 3: initializer `(argc: i32, argv: i32) -> i32`
//! - index 2: frame step `() -> ()` or `() -> i32` (non-zero = quit)
//!
//! Changing any index here breaks compatibility with the guest binary.

use tracing::{debug, warn};
use wasmtime::{AsContext, AsContextMut, Extern, Func, Instance, Store, TypedFunc};

use crate::error::{HostError, Result};
use crate::state::HostState;

/// WebAssembly page size in bytes.
pub const PAGE_SIZE: u64 = 65_536;

/// Export index of the guest initializer (`main`).
pub const INITIALIZER_EXPORT: usize = 3;

/// Export index of the guest frame step (`doom_loop_step`).
pub const FRAME_STEP_EXPORT: usize = 2;

/// Arguments passed to the initializer (argc/argv shim; ignored by the guest).
pub const INITIALIZER_ARGS: (i32, i32) = (0, 0);

/// Framebuffer geometry presented by the guest through `present_frame`.
pub mod screen {
    pub const WIDTH: usize = 640;
    pub const HEIGHT: usize = 400;
    /// RGBA, one byte per channel.
    pub const BYTES_PER_PIXEL: usize = 4;
    pub const BYTE_LEN: usize = WIDTH * HEIGHT * BYTES_PER_PIXEL;
}

/// Which host object satisfies an import slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HostBinding {
    MonotonicMillis,
    Log,
    PresentFrame,
    Memory,
}

/// Function signature over `i32` values only (the whole guest ABI is `i32`).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct I32Signature {
    pub params: usize,
    pub results: usize,
}

impl HostBinding {
    /// Signature of the host function, or `None` for the memory binding.
    pub const fn signature(self) -> Option<I32Signature> {
        match self {
            HostBinding::MonotonicMillis => Some(I32Signature {
                params: 0,
                results: 1,
            }),
            HostBinding::Log => Some(I32Signature {
                params: 2,
                results: 0,
            }),
            HostBinding::PresentFrame => Some(I32Signature {
                params: 1,
                results: 0,
            }),
            HostBinding::Memory => None,
        }
    }

    pub const fn kind_name(self) -> &'static str {
        match self {
            HostBinding::Memory => "memory",
            _ => "function",
        }
    }
}

/// One positional entry of the import contract.
#[derive(Copy, Clone, Debug)]
pub struct ImportSlot {
    pub module: &'static str,
    pub name: &'static str,
    pub binding: HostBinding,
}

/// The import contract, in declaration order.
pub const IMPORTS: [ImportSlot; 6] = [
    ImportSlot {
        module: "js",
        name: "js_milliseconds_since_start",
        binding: HostBinding::MonotonicMillis,
    },
    ImportSlot {
        module: "js",
        name: "js_console_log",
        binding: HostBinding::Log,
    },
    ImportSlot {
        module: "js",
        name: "js_draw_screen",
        binding: HostBinding::PresentFrame,
    },
    ImportSlot {
        module: "js",
        name: "js_stdout",
        binding: HostBinding::Log,
    },
    ImportSlot {
        module: "js",
        name: "js_stderr",
        binding: HostBinding::Log,
    },
    ImportSlot {
        module: "env",
        name: "memory",
        binding: HostBinding::Memory,
    },
];

/// Helpers for checking a compiled module against [`IMPORTS`].
pub mod validate {
    use super::{I32Signature, IMPORTS, ImportSlot};
    use wasmtime::{ExternType, FuncType, Module};

    /// A positional disagreement between the module and the host contract.
    #[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
    pub enum ImportMismatch {
        #[error("module declares {found} imports, host binds {expected}")]
        Count { expected: usize, found: usize },
        #[error("import {index} is not a {expected}")]
        Kind { index: usize, expected: &'static str },
        #[error(
            "import {index} does not have type ({} x i32) -> ({} x i32)",
            .expected.params, .expected.results
        )]
        Signature { index: usize, expected: I32Signature },
    }

    /// Check the module's imports against the host table.
    ///
    /// Kinds and function types must match at every index. Name differences are
    /// returned as warnings since binding is positional.
    pub fn imports_match(module: &Module) -> Result<Vec<String>, ImportMismatch> {
        let found = module.imports().len();
        if found != IMPORTS.len() {
            return Err(ImportMismatch::Count {
                expected: IMPORTS.len(),
                found,
            });
        }

        let mut warnings = Vec::new();
        for (index, (import, slot)) in module.imports().zip(IMPORTS.iter()).enumerate() {
            match (import.ty(), slot.binding.signature()) {
                (ExternType::Memory(_), None) => {}
                (ExternType::Func(ty), Some(expected)) => {
                    if !signature_matches(&ty, expected) {
                        return Err(ImportMismatch::Signature { index, expected });
                    }
                }
                _ => {
                    return Err(ImportMismatch::Kind {
                        index,
                        expected: slot.binding.kind_name(),
                    });
                }
            }

            if import.module() != slot.module || import.name() != slot.name {
                warnings.push(name_warning(index, slot, import.module(), import.name()));
            }
        }
        Ok(warnings)
    }

    pub fn signature_matches(ty: &FuncType, expected: I32Signature) -> bool {
        ty.params().len() == expected.params
            && ty.results().len() == expected.results
            && ty.params().all(|p| p.is_i32())
            && ty.results().all(|r| r.is_i32())
    }

    fn name_warning(index: usize, slot: &ImportSlot, module: &str, name: &str) -> String {
        format!(
            "import {index} is `{module}.{name}`, expected `{}.{}`; binding positionally",
            slot.module, slot.name
        )
    }
}

/// The guest's entrypoints, resolved by export position.
///
/// The host resolves these once after instantiation.
#[derive(Clone)]
pub struct GuestEntrypoints {
    pub init: TypedFunc<(i32, i32), i32>,
    pub frame: Option<FrameStep>,
}

/// The per-frame export. A non-zero `Status` result asks the host to stop.
#[derive(Clone)]
pub enum FrameStep {
    Unit(TypedFunc<(), ()>),
    Status(TypedFunc<(), i32>),
}

impl FrameStep {
    /// Run one frame. Returns `true` when the guest signals quit.
    pub fn call(&self, store: impl AsContextMut) -> wasmtime::Result<bool> {
        match self {
            FrameStep::Unit(f) => f.call(store, ()).map(|()| false),
            FrameStep::Status(f) => f.call(store, ()).map(|status| status != 0),
        }
    }
}

impl GuestEntrypoints {
    /// Resolve entrypoints from an instance's ordered export list.
    ///
    /// The initializer is required. The frame step is optional; when export
    /// [`FRAME_STEP_EXPORT`] is missing or not a function the host runs the
    /// initializer only.
    pub fn resolve(instance: &Instance, store: &mut Store<HostState>) -> Result<Self> {
        let exports: Vec<(String, Extern)> = instance
            .exports(&mut *store)
            .map(|e| (e.name().to_string(), e.into_extern()))
            .collect();
        for (index, (name, ext)) in exports.iter().enumerate() {
            debug!(index, name = %name, ty = ?ext.ty(&*store), "guest export");
        }

        let init = exports
            .get(INITIALIZER_EXPORT)
            .and_then(|(_, ext)| ext.clone().into_func())
            .ok_or_else(|| {
                HostError::link(format!(
                    "export {INITIALIZER_EXPORT} is not a function ({} exports)",
                    exports.len()
                ))
            })?
            .typed::<(i32, i32), i32>(&*store)
            .map_err(|_| {
                HostError::link(format!(
                    "export {INITIALIZER_EXPORT} does not have type (i32, i32) -> i32"
                ))
            })?;

        let frame = match exports
            .get(FRAME_STEP_EXPORT)
            .and_then(|(_, ext)| ext.clone().into_func())
        {
            Some(func) => Some(Self::frame_step(func, &*store)?),
            None => {
                warn!("export {FRAME_STEP_EXPORT} is not a function; frame loop disabled");
                None
            }
        };

        Ok(Self { init, frame })
    }

    fn frame_step(func: Func, store: impl AsContext) -> Result<FrameStep> {
        let ty = func.ty(&store);
        if ty.params().len() == 0 {
            match ty.results().len() {
                0 => return Ok(FrameStep::Unit(func.typed(&store).map_err(link_err)?)),
                1 => return Ok(FrameStep::Status(func.typed(&store).map_err(link_err)?)),
                _ => {}
            }
        }
        Err(HostError::link(format!(
            "export {FRAME_STEP_EXPORT} does not have type () -> () or () -> i32"
        )))
    }
}

fn link_err(e: wasmtime::Error) -> HostError {
    HostError::link(format!(
        "export {FRAME_STEP_EXPORT}: {}",
        e.root_cause()
    ))
}
