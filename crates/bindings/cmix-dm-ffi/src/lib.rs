//! C ABI for the cMix DM event router.
//!
//! The host process first selects a handler-table generation with
//! [`cmix_dm_router_init`], then registers tables with
//! [`cmix_dm_register_router`] (per instance) or [`cmix_dm_set_callbacks`] /
//! [`cmix_dm_set_callbacks_v1`] (process-wide). The network layer reports
//! events through the `cmix_dm_receive*` family and friends in [`inbound`].
//! `include/cmix_dm.h` declares the same surface for C.

// C signatures are fixed by the network layer.
#![allow(clippy::too_many_arguments)]

pub mod error;
pub mod inbound;
pub mod register;
pub mod router;
pub mod span;
pub mod table;

pub use error::{cmix_dm_free_error, error_string, DmError, FfiError};
pub use inbound::boundary_rejections;
pub use register::{
    cmix_dm_deregister, cmix_dm_register_router, cmix_dm_set_callbacks, cmix_dm_set_callbacks_v1,
};
pub use router::{cmix_dm_router_init, init, router, stats};
pub use span::{borrow_span, cmix_dm_free_buffer, into_c_buffer, take_c_buffer, CByteSlice};
pub use table::{
    DMReceiverCallbackFunctions, DMReceiverCallbackFunctionsV1, DMReceiverRouterFunctions,
};
