//! Dispatch of decoded events to registered handler sets.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::capability::{RouterCapabilities, SchemaGeneration};
use crate::config::RouterConfig;
use crate::envelope::{EventEnvelope, EventKind};
use crate::error::RoutingError;
use crate::handler::{HandlerSet, Reply};
use crate::registry::InstanceRegistry;
use crate::InstanceId;

/// The instance every event is routed to when the router is not
/// instance-scoped.
pub const IMPLICIT_INSTANCE: InstanceId = 0;

/// Outcome of one [`CallbackRouter::dispatch`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouterResult {
    /// A handler (or its neutral default) ran and produced this reply.
    Delivered(Reply),
    /// No handler set is registered for the target instance.
    DroppedNoInstance { instance_id: InstanceId },
    /// The router's generation cannot express this kind of event.
    Unsupported(EventKind),
    Failed(RoutingError),
}

impl RouterResult {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }

    pub fn reply(&self) -> Option<&Reply> {
        match self {
            Self::Delivered(reply) => Some(reply),
            _ => None,
        }
    }

    /// The value to hand back across the boundary: the delivered reply, or
    /// the neutral reply for `kind` when nothing was delivered.
    pub fn wire_reply(&self, kind: EventKind) -> Reply {
        match self {
            Self::Delivered(reply) => reply.clone(),
            _ => Reply::neutral(kind),
        }
    }
}

/// Point-in-time copy of the router's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RouterStats {
    pub delivered: u64,
    /// Delivered events whose kind had no registered handler.
    pub defaulted: u64,
    pub dropped_no_instance: u64,
    pub handler_panics: u64,
    pub unsupported: u64,
}

#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicU64,
    defaulted: AtomicU64,
    dropped_no_instance: AtomicU64,
    handler_panics: AtomicU64,
    unsupported: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RouterStats {
        RouterStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            defaulted: self.defaulted.load(Ordering::Relaxed),
            dropped_no_instance: self.dropped_no_instance.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
            unsupported: self.unsupported.load(Ordering::Relaxed),
        }
    }
}

/// Routes each [`EventEnvelope`] to the handler set of its instance.
///
/// Dispatch is synchronous: the caller blocks until the handler returns. The
/// registry lock is released before the handler runs, so a slow handler only
/// delays its own event.
#[derive(Debug)]
pub struct CallbackRouter {
    capabilities: RouterCapabilities,
    registry: InstanceRegistry,
    counters: Counters,
}

impl Default for CallbackRouter {
    fn default() -> Self {
        Self::new(RouterCapabilities::all())
    }
}

impl CallbackRouter {
    pub fn new(capabilities: RouterCapabilities) -> Self {
        Self { capabilities, registry: InstanceRegistry::new(), counters: Counters::default() }
    }

    pub fn for_generation(generation: SchemaGeneration) -> Self {
        Self::new(RouterCapabilities::for_generation(generation))
    }

    pub fn from_config(config: &RouterConfig) -> Self {
        Self::new(config.capabilities())
    }

    pub fn capabilities(&self) -> RouterCapabilities {
        self.capabilities
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    pub fn register(
        &self,
        instance_id: InstanceId,
        handlers: Arc<HandlerSet>,
    ) -> Result<(), RoutingError> {
        if let Err(err) = self.registry.register(instance_id, handlers) {
            log::warn!("rejected handler registration: {err}");
            return Err(err);
        }
        log::debug!("registered handlers for instance {instance_id}");
        Ok(())
    }

    /// Register the single handler set used when routing is process-global.
    pub fn register_implicit(&self, handlers: Arc<HandlerSet>) -> Result<(), RoutingError> {
        self.register(IMPLICIT_INSTANCE, handlers)
    }

    /// Install the process-global handler set, displacing any previous one.
    /// Events arriving meanwhile reach one set or the other.
    pub fn replace_implicit(&self, handlers: Arc<HandlerSet>) -> Option<Arc<HandlerSet>> {
        let previous = self.registry.replace(IMPLICIT_INSTANCE, handlers);
        if previous.is_some() {
            log::info!("replaced process-wide handlers");
        } else {
            log::debug!("registered process-wide handlers");
        }
        previous
    }

    pub fn deregister(&self, instance_id: InstanceId) -> Result<Arc<HandlerSet>, RoutingError> {
        let removed = self.registry.deregister(instance_id)?;
        log::debug!("deregistered handlers for instance {instance_id}");
        Ok(removed)
    }

    pub fn lookup(&self, instance_id: InstanceId) -> Result<Arc<HandlerSet>, RoutingError> {
        self.registry.lookup(instance_id)
    }

    /// The instance an envelope is delivered to.
    pub fn target_instance(&self, envelope: &EventEnvelope) -> InstanceId {
        if self.capabilities.is_instance_scoped() {
            envelope.instance_id
        } else {
            IMPLICIT_INSTANCE
        }
    }

    pub fn dispatch(&self, envelope: &EventEnvelope) -> RouterResult {
        let kind = envelope.kind();
        if !self.capabilities.supports(kind) {
            Counters::bump(&self.counters.unsupported);
            log::warn!("{kind} event is not supported by this router, ignoring");
            return RouterResult::Unsupported(kind);
        }

        let instance_id = self.target_instance(envelope);
        let handlers = match self.registry.lookup(instance_id) {
            Ok(handlers) => handlers,
            Err(_) => {
                Counters::bump(&self.counters.dropped_no_instance);
                log::warn!("dropping {kind} event for unknown instance {instance_id}");
                return RouterResult::DroppedNoInstance { instance_id };
            }
        };

        log::debug!(
            "dispatching {kind} event {} to instance {instance_id}",
            envelope.event.log_tag()
        );
        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| {
                handlers.invoke(envelope.instance_id, &envelope.event)
            }));
        match outcome {
            Ok((reply, defaulted)) => {
                Counters::bump(&self.counters.delivered);
                if defaulted {
                    Counters::bump(&self.counters.defaulted);
                }
                RouterResult::Delivered(reply)
            }
            Err(payload) => {
                Counters::bump(&self.counters.handler_panics);
                let message = panic_message(payload.as_ref());
                log::error!("{kind} handler for instance {instance_id} panicked: {message}");
                RouterResult::Failed(RoutingError::HandlerPanicked { instance_id, kind, message })
            }
        }
    }

    pub fn stats(&self) -> RouterStats {
        self.counters.snapshot()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
