//! Lifetime policies: whether and where a built value is cached, and who disposes it.

pub mod container_controlled;
pub mod external;
pub mod hierarchical;
pub mod per_resolve;
pub mod per_thread;
pub mod transient;

pub use container_controlled::ContainerControlledLifetimeManager;
pub use external::ExternallyControlledLifetimeManager;
pub use hierarchical::HierarchicalLifetimeManager;
pub use per_resolve::PerResolveLifetimeManager;
pub use per_thread::PerThreadLifetimeManager;
pub use transient::TransientLifetimeManager;

use crate::error::BoxError;
use crate::instance::Instance;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Values cached for the duration of one top-level resolve call.
#[derive(Default)]
pub struct ResolveCache {
  values: HashMap<u64, Instance>,
}

impl ResolveCache {
  pub(crate) fn get(&self, slot: u64) -> Option<Instance> {
    self.values.get(&slot).cloned()
  }

  pub(crate) fn insert(&mut self, slot: u64, value: Instance) -> bool {
    self.values.insert(slot, value).is_none()
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }
}

/// A policy controlling caching, reuse and disposal of built values.
///
/// Each registration owns exactly one manager. The build pipeline asks the
/// manager for a cached value before building, and hands it the result after.
pub trait LifetimeManager: Send + Sync + fmt::Debug {
  fn kind(&self) -> LifetimeKind;

  /// Returns the cached value, if this policy holds one for the current call.
  fn try_get_value(&self, cache: &ResolveCache) -> Option<Instance>;

  /// Offers a freshly built value to the policy.
  ///
  /// Returns `true` when the value became cached by this call.
  fn set_value(&self, value: Instance, cache: &mut ResolveCache) -> bool;

  /// A lock that serializes construction, for single-flight policies.
  ///
  /// The pipeline re-checks [`try_get_value`](Self::try_get_value) after
  /// acquiring it, so at most one thread builds the value.
  fn build_lock(&self) -> Option<Arc<Mutex<()>>> {
    None
  }

  /// Whether the scope that caches through this manager is responsible for
  /// disposing it.
  fn is_owned(&self) -> bool {
    false
  }

  /// Disposes the cached value. Must be idempotent.
  fn dispose(&self) -> Result<(), BoxError> {
    Ok(())
  }

  /// A fresh manager for a child scope that resolves this registration, for
  /// policies that keep one value per scope.
  fn create_for_child(&self) -> Option<Box<dyn LifetimeManager>> {
    None
  }
}

/// The built-in lifetime policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LifetimeKind {
  Transient,
  PerThread,
  PerResolve,
  ContainerControlled,
  Hierarchical,
  ExternallyControlled,
}

impl LifetimeKind {
  /// Creates a new manager implementing this policy.
  pub fn create(self) -> Box<dyn LifetimeManager> {
    match self {
      LifetimeKind::Transient => Box::new(TransientLifetimeManager),
      LifetimeKind::PerThread => Box::new(PerThreadLifetimeManager::new()),
      LifetimeKind::PerResolve => Box::new(PerResolveLifetimeManager::new()),
      LifetimeKind::ContainerControlled => Box::new(ContainerControlledLifetimeManager::new()),
      LifetimeKind::Hierarchical => Box::new(HierarchicalLifetimeManager::new()),
      LifetimeKind::ExternallyControlled => Box::new(ExternallyControlledLifetimeManager::new()),
    }
  }

  /// Whether a manager of this kind can hold a pre-built instance.
  pub fn can_hold_instance(self) -> bool {
    matches!(
      self,
      LifetimeKind::ContainerControlled
        | LifetimeKind::Hierarchical
        | LifetimeKind::ExternallyControlled
    )
  }

  pub fn name(self) -> &'static str {
    match self {
      LifetimeKind::Transient => "transient",
      LifetimeKind::PerThread => "per-thread",
      LifetimeKind::PerResolve => "per-resolve",
      LifetimeKind::ContainerControlled => "container-controlled",
      LifetimeKind::Hierarchical => "hierarchical",
      LifetimeKind::ExternallyControlled => "externally-controlled",
    }
  }
}

impl fmt::Display for LifetimeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl From<LifetimeKind> for Box<dyn LifetimeManager> {
  fn from(kind: LifetimeKind) -> Self {
    kind.create()
  }
}
