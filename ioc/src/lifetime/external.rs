use super::{LifetimeKind, LifetimeManager, ResolveCache};
use crate::instance::{Instance, WeakInstance};
use parking_lot::RwLock;

/// Caches only a weak reference. Once every strong handle held outside the
/// container is gone, the next resolve builds a new value. Never disposes.
#[derive(Debug, Default)]
pub struct ExternallyControlledLifetimeManager {
  value: RwLock<Option<WeakInstance>>,
}

impl ExternallyControlledLifetimeManager {
  pub fn new() -> Self {
    Self::default()
  }
}

impl LifetimeManager for ExternallyControlledLifetimeManager {
  fn kind(&self) -> LifetimeKind {
    LifetimeKind::ExternallyControlled
  }

  fn try_get_value(&self, _cache: &ResolveCache) -> Option<Instance> {
    self.value.read().as_ref().and_then(WeakInstance::upgrade)
  }

  fn set_value(&self, value: Instance, _cache: &mut ResolveCache) -> bool {
    let mut slot = self.value.write();
    let was_live = slot.as_ref().and_then(WeakInstance::upgrade).is_some();
    *slot = Some(value.downgrade());
    !was_live
  }
}
