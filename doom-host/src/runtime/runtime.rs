//! Wasmtime-backed runtime glue for doom-host.
//!
//! Responsibilities:
//! - Create a Wasmtime `Engine`/`Store` with the feature flags guests need.
//! - Check the module's imports against the positional contract.
//! - Provision the shared memory and build the ordered extern vector.
//! - Instantiate the module and resolve entrypoints by export index.
//!
//! Startup is strictly sequential: load, validate, compile, provision memory,
//! build imports, instantiate, resolve exports.

use tracing::{debug, info, warn};
use wasmtime::{Engine, Instance, Memory, Module, Store};

use super::imports::{HostFunctions, bind_imports};
use crate::abi::{self, GuestEntrypoints};
use crate::config::{HostConfig, MemoryPlan};
use crate::error::{HostError, Result};
use crate::state::HostState;
use crate::{loader, memory};

/// Create a Wasmtime engine with the proposals common guest toolchains emit.
pub fn new_engine() -> Result<Engine> {
    let mut cfg = wasmtime::Config::new();
    cfg.wasm_multi_value(true);
    cfg.wasm_bulk_memory(true);
    cfg.wasm_reference_types(true);
    cfg.wasm_simd(true);

    Engine::new(&cfg).map_err(|error| HostError::Engine { error })
}

/// An instantiated guest and everything it depends on.
///
/// Fields are declared in reverse acquisition order so that drop order is the
/// reverse of construction: exports, instance, host functions, memory,
/// module, store, engine.
pub struct DoomRuntime {
    pub entrypoints: GuestEntrypoints,
    pub instance: Instance,
    pub functions: HostFunctions,
    pub memory: Memory,
    pub module: Module,
    pub store: Store<HostState>,
    pub engine: Engine,
}

impl DoomRuntime {
    /// Load the artifact named by `config` and instantiate it.
    pub fn load(config: &HostConfig, state: HostState) -> Result<Self> {
        let engine = new_engine()?;
        let module = loader::load_module(&engine, &config.artifact_path)?;
        info!(path = %config.artifact_path.display(), "compiled guest module");
        Self::instantiate(engine, module, config.memory, state)
    }

    /// Instantiate an already compiled module.
    pub fn instantiate(
        engine: Engine,
        module: Module,
        plan: MemoryPlan,
        state: HostState,
    ) -> Result<Self> {
        inspect_imports(&module);
        let warnings =
            abi::validate::imports_match(&module).map_err(|e| HostError::link(e.to_string()))?;
        for warning in warnings {
            warn!("{warning}");
        }

        let mut store = Store::new(&engine, state);
        let declared = memory::declared_memory(&module);
        let memory = memory::provision(&mut store, plan, declared.as_ref())?;

        let functions = HostFunctions::new(&mut store, memory);
        let externs = bind_imports(&functions, memory);

        let instance = Instance::new(&mut store, &module, &externs)
            .map_err(|e| HostError::link(e.root_cause().to_string()))?;
        let entrypoints = GuestEntrypoints::resolve(&instance, &mut store)?;
        info!(
            frame_step = entrypoints.frame.is_some(),
            "instantiated guest"
        );

        Ok(Self {
            entrypoints,
            instance,
            functions,
            memory,
            module,
            store,
            engine,
        })
    }

    /// Current size of the shared memory in pages.
    pub fn memory_pages(&self) -> u64 {
        self.memory.size(&self.store)
    }

    pub fn state(&self) -> &HostState {
        self.store.data()
    }
}

fn inspect_imports(module: &Module) {
    for (index, import) in module.imports().enumerate() {
        debug!(
            index,
            module = import.module(),
            name = import.name(),
            ty = ?import.ty(),
            "guest import"
        );
    }
}
