//! Handler-table registration.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use cmix_dm::{CallbackRouter, HandlerSet, SchemaGeneration, IMPLICIT_INSTANCE};
use libc::c_int;

use crate::error::{into_dm_error, DmError, FfiError};
use crate::router::{global, require_generation};
use crate::table::{
    DMReceiverCallbackFunctions, DMReceiverCallbackFunctionsV1, DMReceiverRouterFunctions,
};

fn guarded<F>(entry_point: &'static str, body: F) -> DmError
where
    F: FnOnce() -> Result<(), FfiError>,
{
    let result = panic::catch_unwind(AssertUnwindSafe(body))
        .unwrap_or(Err(FfiError::Panicked(entry_point)));
    into_dm_error(result)
}

/// Process-global tables replace whatever was set before, atomically.
fn replace_implicit(router: &CallbackRouter, handlers: HandlerSet) -> Result<(), FfiError> {
    router.replace_implicit(Arc::new(handlers));
    Ok(())
}

/// Bind `table` to `dm_instance_id`. Fails if the instance already has one.
///
/// # Safety
///
/// Every non-null slot must be a function with the declared signature that
/// stays callable until the instance is deregistered.
#[no_mangle]
pub unsafe extern "C" fn cmix_dm_register_router(
    dm_instance_id: c_int,
    table: DMReceiverRouterFunctions,
) -> DmError {
    guarded("cmix_dm_register_router", || {
        let global = require_generation("cmix_dm_register_router", SchemaGeneration::V3)?;
        // SAFETY: forwarded from the caller.
        let handlers = unsafe { table.into_handler_set() };
        global.router.register(dm_instance_id, Arc::new(handlers))?;
        Ok(())
    })
}

/// Set the process-wide handler table with split partner and sender keys.
///
/// # Safety
///
/// As for [`cmix_dm_register_router`], until replaced or deregistered.
#[no_mangle]
pub unsafe extern "C" fn cmix_dm_set_callbacks(table: DMReceiverCallbackFunctions) -> DmError {
    guarded("cmix_dm_set_callbacks", || {
        let global = require_generation("cmix_dm_set_callbacks", SchemaGeneration::V2)?;
        // SAFETY: forwarded from the caller.
        replace_implicit(&global.router, unsafe { table.into_handler_set() })
    })
}

/// Set the process-wide single-key handler table.
///
/// # Safety
///
/// As for [`cmix_dm_set_callbacks`].
#[no_mangle]
pub unsafe extern "C" fn cmix_dm_set_callbacks_v1(table: DMReceiverCallbackFunctionsV1) -> DmError {
    guarded("cmix_dm_set_callbacks_v1", || {
        let global = require_generation("cmix_dm_set_callbacks_v1", SchemaGeneration::V1)?;
        // SAFETY: forwarded from the caller.
        replace_implicit(&global.router, unsafe { table.into_handler_set() })
    })
}

/// Remove an instance's handlers. Events for it are dropped from then on.
/// With a process-wide table the id is ignored and that table is removed.
#[no_mangle]
pub extern "C" fn cmix_dm_deregister(dm_instance_id: c_int) -> DmError {
    guarded("cmix_dm_deregister", || {
        let global = global()?;
        let target = if global.router.capabilities().is_instance_scoped() {
            dm_instance_id
        } else {
            IMPLICIT_INSTANCE
        };
        global.router.deregister(target)?;
        Ok(())
    })
}
