use super::{LifetimeKind, LifetimeManager, ResolveCache};
use crate::instance::Instance;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SLOT: AtomicU64 = AtomicU64::new(0);

thread_local! {
  static VALUES: RefCell<HashMap<u64, Instance>> = RefCell::new(HashMap::new());
}

/// One cached value per thread of execution.
///
/// Values live in thread-local storage and are dropped when their thread exits.
#[derive(Debug)]
pub struct PerThreadLifetimeManager {
  slot: u64,
}

impl PerThreadLifetimeManager {
  pub fn new() -> Self {
    Self {
      slot: NEXT_SLOT.fetch_add(1, Ordering::Relaxed),
    }
  }
}

impl Default for PerThreadLifetimeManager {
  fn default() -> Self {
    Self::new()
  }
}

impl LifetimeManager for PerThreadLifetimeManager {
  fn kind(&self) -> LifetimeKind {
    LifetimeKind::PerThread
  }

  fn try_get_value(&self, _cache: &ResolveCache) -> Option<Instance> {
    VALUES
      .try_with(|values| values.borrow().get(&self.slot).cloned())
      .ok()
      .flatten()
  }

  fn set_value(&self, value: Instance, _cache: &mut ResolveCache) -> bool {
    // The replaced value is dropped after the borrow ends.
    match VALUES.try_with(|values| values.borrow_mut().insert(self.slot, value)) {
      Ok(previous) => previous.is_none(),
      Err(_) => false,
    }
  }
}

impl Drop for PerThreadLifetimeManager {
  fn drop(&mut self) {
    // Other threads release their values when they exit.
    let removed = VALUES
      .try_with(|values| values.borrow_mut().remove(&self.slot))
      .ok()
      .flatten();
    drop(removed);
  }
}
