use super::{LifetimeKind, LifetimeManager, ResolveCache};
use crate::error::BoxError;
use crate::instance::Instance;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A singleton for the lifetime of the owning scope.
///
/// Construction is single-flight: the pipeline holds [`build_lock`] while
/// building, and concurrent callers either see the finished value or wait on
/// the same lock. Reads never lock. After disposal the cached value is still
/// returned, but nothing new is built.
///
/// The lock is held while dependencies resolve. A cycle between singletons
/// on one thread is reported as a circular dependency instead of waiting on
/// a lock that thread already holds, but two threads that start the same cycle from opposite ends each
/// hold one lock and wait on the other forever. Break such cycles at
/// registration time.
///
/// [`build_lock`]: LifetimeManager::build_lock
#[derive(Debug, Default)]
pub struct ContainerControlledLifetimeManager {
  value: OnceCell<Instance>,
  lock: Arc<Mutex<()>>,
  disposed: AtomicBool,
}

impl ContainerControlledLifetimeManager {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_disposed(&self) -> bool {
    self.disposed.load(Ordering::Acquire)
  }
}

impl LifetimeManager for ContainerControlledLifetimeManager {
  fn kind(&self) -> LifetimeKind {
    LifetimeKind::ContainerControlled
  }

  fn try_get_value(&self, _cache: &ResolveCache) -> Option<Instance> {
    self.value.get().cloned()
  }

  fn set_value(&self, value: Instance, _cache: &mut ResolveCache) -> bool {
    self.value.set(value).is_ok()
  }

  fn build_lock(&self) -> Option<Arc<Mutex<()>>> {
    Some(self.lock.clone())
  }

  fn is_owned(&self) -> bool {
    true
  }

  fn dispose(&self) -> Result<(), BoxError> {
    if self.disposed.swap(true, Ordering::AcqRel) {
      return Ok(());
    }
    match self.value.get() {
      Some(value) => value.dispose(),
      None => Ok(()),
    }
  }
}
