use super::{ContainerControlledLifetimeManager, LifetimeKind, LifetimeManager, ResolveCache};
use crate::error::BoxError;
use crate::instance::Instance;
use parking_lot::Mutex;
use std::sync::Arc;

/// A singleton per scope: the registering scope caches its own value, and
/// every child scope that resolves the registration builds and owns another.
#[derive(Debug, Default)]
pub struct HierarchicalLifetimeManager {
  inner: ContainerControlledLifetimeManager,
}

impl HierarchicalLifetimeManager {
  pub fn new() -> Self {
    Self::default()
  }
}

impl LifetimeManager for HierarchicalLifetimeManager {
  fn kind(&self) -> LifetimeKind {
    LifetimeKind::Hierarchical
  }

  fn try_get_value(&self, cache: &ResolveCache) -> Option<Instance> {
    self.inner.try_get_value(cache)
  }

  fn set_value(&self, value: Instance, cache: &mut ResolveCache) -> bool {
    self.inner.set_value(value, cache)
  }

  fn build_lock(&self) -> Option<Arc<Mutex<()>>> {
    self.inner.build_lock()
  }

  fn is_owned(&self) -> bool {
    true
  }

  fn dispose(&self) -> Result<(), BoxError> {
    self.inner.dispose()
  }

  fn create_for_child(&self) -> Option<Box<dyn LifetimeManager>> {
    Some(Box::new(HierarchicalLifetimeManager::new()))
  }
}
