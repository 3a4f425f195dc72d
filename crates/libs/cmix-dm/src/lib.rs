//! Direct-message event routing for cMix clients.
//!
//! Inbound DM events decoded by the network layer arrive here as
//! [`EventEnvelope`]s and are delivered to the [`HandlerSet`] registered for
//! the envelope's instance. The crate provides:
//!
//! - **[`ByteSpan`]**: a borrowed `(length, bytes)` view used while decoding
//! - **[`EventEnvelope`] / [`DmEvent`]**: one tagged variant per event kind
//! - **[`HandlerSet`]**: a sparse set of handlers with typed no-op defaults
//! - **[`InstanceRegistry`]**: the concurrent instance to handler-set map
//! - **[`CallbackRouter`]**: dispatch, panic isolation and reply translation
//!
//! # Schema generations
//!
//! Three generations of the handler table exist. They differ in whether
//! routing is instance-scoped and in which event kinds they can express; a
//! router is built for exactly one of them through [`RouterCapabilities`].

pub mod capability;
pub mod config;
pub mod envelope;
mod error;
pub mod handler;
pub mod registry;
pub mod router;
pub mod span;

pub use capability::{RouterCapabilities, SchemaGeneration};
pub use config::RouterConfig;
pub use envelope::{
    DeleteRequest, DmEvent, EventEnvelope, EventKind, GenericEvent, MessageReceived,
    ReactionReceived, ReplyFamily, ReplyReceived, SentStatusUpdate, TextReceived,
};
pub use error::{BoundaryError, ConfigError, RoutingError};
pub use handler::{HandlerSet, Reply};
pub use registry::InstanceRegistry;
pub use router::{CallbackRouter, RouterResult, RouterStats, IMPLICIT_INSTANCE};
pub use span::ByteSpan;

/// Identifier of one running DM client instance, as assigned by the network client.
pub type InstanceId = i32;
