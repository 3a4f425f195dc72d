use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::RoutingError;
use crate::handler::HandlerSet;
use crate::InstanceId;

/// Concurrent map from instance to its handler set.
///
/// Lookups hand out a cloned [`Arc`] and drop the lock before returning, so a
/// handler never runs while the registry is locked. No handler runs under the
/// lock either, which makes a poisoned lock safe to keep using.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    instances: RwLock<HashMap<InstanceId, Arc<HandlerSet>>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        instance_id: InstanceId,
        handlers: Arc<HandlerSet>,
    ) -> Result<(), RoutingError> {
        let mut instances = self.write();
        if instances.contains_key(&instance_id) {
            return Err(RoutingError::DuplicateInstance { instance_id });
        }
        instances.insert(instance_id, handlers);
        Ok(())
    }

    /// Bind `handlers` to the instance in one step, returning the set it
    /// displaced. Lookups see either the old set or the new one, never neither.
    pub fn replace(
        &self,
        instance_id: InstanceId,
        handlers: Arc<HandlerSet>,
    ) -> Option<Arc<HandlerSet>> {
        self.write().insert(instance_id, handlers)
    }

    /// Remove and return the instance's handler set.
    pub fn deregister(&self, instance_id: InstanceId) -> Result<Arc<HandlerSet>, RoutingError> {
        self.write().remove(&instance_id).ok_or(RoutingError::UnknownInstance { instance_id })
    }

    pub fn lookup(&self, instance_id: InstanceId) -> Result<Arc<HandlerSet>, RoutingError> {
        self.read()
            .get(&instance_id)
            .cloned()
            .ok_or(RoutingError::UnknownInstance { instance_id })
    }

    pub fn contains(&self, instance_id: InstanceId) -> bool {
        self.read().contains_key(&instance_id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Registered instances in ascending order.
    pub fn instance_ids(&self) -> Vec<InstanceId> {
        let mut ids: Vec<_> = self.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<InstanceId, Arc<HandlerSet>>> {
        self.instances.read().unwrap_or_else(|err| err.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<InstanceId, Arc<HandlerSet>>> {
        self.instances.write().unwrap_or_else(|err| err.into_inner())
    }
}
