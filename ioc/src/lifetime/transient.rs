use super::{LifetimeKind, LifetimeManager, ResolveCache};
use crate::instance::Instance;

/// Never caches: every resolve builds a new value.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransientLifetimeManager;

impl LifetimeManager for TransientLifetimeManager {
  fn kind(&self) -> LifetimeKind {
    LifetimeKind::Transient
  }

  fn try_get_value(&self, _cache: &ResolveCache) -> Option<Instance> {
    None
  }

  fn set_value(&self, _value: Instance, _cache: &mut ResolveCache) -> bool {
    false
  }
}
