use super::{LifetimeKind, LifetimeManager, ResolveCache};
use crate::instance::Instance;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SLOT: AtomicU64 = AtomicU64::new(0);

/// One cached value per top-level resolve call, shared by every dependency
/// built during that call and dropped when it returns.
#[derive(Debug)]
pub struct PerResolveLifetimeManager {
  slot: u64,
}

impl PerResolveLifetimeManager {
  pub fn new() -> Self {
    Self {
      slot: NEXT_SLOT.fetch_add(1, Ordering::Relaxed),
    }
  }
}

impl Default for PerResolveLifetimeManager {
  fn default() -> Self {
    Self::new()
  }
}

impl LifetimeManager for PerResolveLifetimeManager {
  fn kind(&self) -> LifetimeKind {
    LifetimeKind::PerResolve
  }

  fn try_get_value(&self, cache: &ResolveCache) -> Option<Instance> {
    cache.get(self.slot)
  }

  fn set_value(&self, value: Instance, cache: &mut ResolveCache) -> bool {
    cache.insert(self.slot, value)
  }
}
