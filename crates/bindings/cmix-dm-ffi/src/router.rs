//! The process-wide router behind the C entry points.

use std::sync::OnceLock;

use cmix_dm::{CallbackRouter, RouterStats, SchemaGeneration};
use libc::c_int;

use crate::error::{into_dm_error, DmError, FfiError};

pub(crate) struct GlobalRouter {
    pub(crate) generation: SchemaGeneration,
    pub(crate) router: CallbackRouter,
}

static ROUTER: OnceLock<GlobalRouter> = OnceLock::new();

pub(crate) fn global() -> Result<&'static GlobalRouter, FfiError> {
    ROUTER.get().ok_or(FfiError::NotInitialized)
}

pub(crate) fn require_generation(
    entry_point: &'static str,
    expected: SchemaGeneration,
) -> Result<&'static GlobalRouter, FfiError> {
    let global = global()?;
    if global.generation != expected {
        return Err(FfiError::GenerationMismatch {
            entry_point,
            expected,
            actual: global.generation,
        });
    }
    Ok(global)
}

/// Install the process-wide router for `generation` (1, 2 or 3).
pub fn init(generation: SchemaGeneration) -> Result<&'static CallbackRouter, FfiError> {
    let global = ROUTER.get_or_init(|| {
        log::info!("initializing dm router for {generation} handler tables");
        GlobalRouter { generation, router: CallbackRouter::for_generation(generation) }
    });
    if global.generation != generation {
        return Err(FfiError::AlreadyInitialized {
            current: global.generation,
            requested: generation,
        });
    }
    Ok(&global.router)
}

/// The process-wide router, once initialized.
pub fn router() -> Option<&'static CallbackRouter> {
    ROUTER.get().map(|global| &global.router)
}

pub fn stats() -> Option<RouterStats> {
    router().map(CallbackRouter::stats)
}

/// Select the handler-table generation for this process. Calling it again
/// with the same generation is a no-op; a different generation is an error.
#[no_mangle]
pub extern "C" fn cmix_dm_router_init(generation: c_int) -> DmError {
    into_dm_error(
        SchemaGeneration::from_raw(generation)
            .ok_or(FfiError::UnknownGeneration(generation))
            .and_then(init)
            .map(|_| ()),
    )
}
