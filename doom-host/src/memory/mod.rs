//! Memory provisioner.
//!
//! The guest imports its linear memory instead of defining it, and expects the
//! heap to already be enlarged at instantiation time. The host creates the
//! memory with the planned minimum, then grows it by the planned number of
//! pages before any guest code runs.

use tracing::{debug, info};
use wasmtime::{AsContextMut, ExternType, Memory, MemoryType, Module};

use crate::abi::PAGE_SIZE;
use crate::config::MemoryPlan;
use crate::error::{HostError, Result};

/// The memory type the module declares for its memory import, if any.
pub fn declared_memory(module: &Module) -> Option<MemoryType> {
    module.imports().find_map(|import| match import.ty() {
        ExternType::Memory(ty) => Some(ty),
        _ => None,
    })
}

/// Create the shared memory and grow it to `plan.target_pages()`.
///
/// `declared` is the module's memory import type. Its minimum must not exceed
/// the planned minimum, and its maximum (if any) carries over to the created
/// memory so that the import type check at instantiation succeeds.
pub fn provision(
    mut store: impl AsContextMut,
    plan: MemoryPlan,
    declared: Option<&MemoryType>,
) -> Result<Memory> {
    let maximum = match declared {
        Some(ty) => {
            if ty.is_64() || ty.is_shared() {
                return Err(HostError::link(
                    "guest memory import must be a 32-bit unshared memory",
                ));
            }
            if ty.minimum() > plan.minimum_pages {
                return Err(HostError::resource(format!(
                    "guest requires at least {} pages, host provides {}",
                    ty.minimum(),
                    plan.minimum_pages
                )));
            }
            ty.maximum()
        }
        None => None,
    };

    if let Some(max) = maximum
        && plan.target_pages() > max
    {
        return Err(HostError::resource(format!(
            "{} pages exceed the guest's declared maximum of {max}",
            plan.target_pages()
        )));
    }

    let minimum = to_u32_pages(plan.minimum_pages)?;
    let maximum = maximum.map(to_u32_pages).transpose()?;
    let memory = Memory::new(&mut store, MemoryType::new(minimum, maximum)).map_err(|e| {
        HostError::resource(format!("failed to create memory: {}", e.root_cause()))
    })?;
    debug!(minimum, ?maximum, "created linear memory");

    memory
        .grow(&mut store, plan.grow_pages)
        .map_err(|e| HostError::resource(format!("failed to grow memory: {}", e.root_cause())))?;

    let pages = memory.size(&store);
    if pages != plan.target_pages() {
        return Err(HostError::resource(format!(
            "memory has {pages} pages after growth, expected {}",
            plan.target_pages()
        )));
    }
    info!(
        pages,
        bytes = pages * PAGE_SIZE,
        "provisioned guest memory"
    );

    Ok(memory)
}

fn to_u32_pages(pages: u64) -> Result<u32> {
    u32::try_from(pages)
        .map_err(|_| HostError::resource(format!("{pages} pages do not fit a 32-bit memory")))
}
