//! The hierarchical, versioned registration store behind every container.

use crate::config::{ContainerOptions, Policies};
use crate::container::Container;
use crate::context::{BuilderContext, ResolveState};
use crate::contract::Contract;
use crate::error::{guard_user, ResolutionError};
use crate::instance::Instance;
use crate::lifetime::{LifetimeManager, TransientLifetimeManager};
use crate::metadata::{Catalog, TypeKind};
use crate::overrides::ResolverOverride;
use crate::pipeline::ChainKind;
use crate::registration::{Category, InjectionMembers, RegistrationData, RegistrationManager};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

/// A registration visible from a scope, as returned by
/// [`Container::registrations`].
#[derive(Debug, Clone)]
pub struct Registered {
  pub contract: Contract,
  pub manager: Arc<RegistrationManager>,
}

struct Binding {
  seq: u64,
  manager: Arc<RegistrationManager>,
}

struct Snapshot {
  /// Versions of this scope and each ancestor, nearest first.
  stamps: Vec<u64>,
  entries: Arc<[Registered]>,
}

/// Where and how a contract is built, as seen from the requesting scope.
pub(crate) struct Located {
  manager: Arc<RegistrationManager>,
  lifetime: Arc<dyn LifetimeManager>,
  lifetime_owner: Arc<Scope>,
  build_scope: Arc<Scope>,
  chain: ChainKind,
}

/// One node of the registration tree.
///
/// Lookups check the local table first and then walk the parent chain. The
/// parent link is weak: a scope never keeps its parent alive, so the parent
/// must outlive its children for inherited registrations to stay visible.
pub(crate) struct Scope {
  policies: Arc<Policies>,
  parent: Option<Weak<Scope>>,
  entries: DashMap<Contract, Binding>,
  /// Serializes structural changes; holds the next insertion sequence.
  write_lock: Mutex<u64>,
  version: AtomicU64,
  inherited: DashMap<Contract, (Arc<RegistrationManager>, Arc<dyn LifetimeManager>)>,
  disposables: Mutex<Vec<Arc<dyn LifetimeManager>>>,
  disposed: AtomicBool,
  snapshot: RwLock<Option<Snapshot>>,
}

impl Scope {
  fn new(policies: Arc<Policies>, parent: Option<Weak<Scope>>) -> Self {
    Self {
      policies,
      parent,
      entries: DashMap::new(),
      write_lock: Mutex::new(0),
      version: AtomicU64::new(0),
      inherited: DashMap::new(),
      disposables: Mutex::new(Vec::new()),
      disposed: AtomicBool::new(false),
      snapshot: RwLock::new(None),
    }
  }

  /// A root scope, with the container itself pre-registered.
  pub(crate) fn root(policies: Arc<Policies>) -> Arc<Scope> {
    let scope = Arc::new(Self::new(policies, None));
    scope.add(Contract::of::<Container>(), RegistrationManager::internal());
    scope
  }

  pub(crate) fn create_child(self: &Arc<Self>) -> Arc<Scope> {
    debug!(parent_version = self.version(), "created child scope");
    Arc::new(Self::new(self.policies.clone(), Some(Arc::downgrade(self))))
  }

  pub(crate) fn parent(&self) -> Option<Arc<Scope>> {
    self.parent.as_ref().and_then(Weak::upgrade)
  }

  pub(crate) fn policies(&self) -> &Arc<Policies> {
    &self.policies
  }

  pub(crate) fn catalog(&self) -> &Catalog {
    self.policies.catalog()
  }

  pub(crate) fn options(&self) -> &ContainerOptions {
    self.policies.options()
  }

  pub(crate) fn version(&self) -> u64 {
    self.version.load(Ordering::Acquire)
  }

  /// Adds or replaces the registration for `contract`. A replaced entry
  /// keeps its enumeration position.
  pub(crate) fn add(&self, contract: Contract, manager: RegistrationManager) -> Arc<RegistrationManager> {
    let manager = Arc::new(manager);
    {
      let mut next_seq = self.write_lock.lock();
      match self.entries.entry(contract.clone()) {
        Entry::Occupied(mut occupied) => occupied.get_mut().manager = manager.clone(),
        Entry::Vacant(vacant) => {
          vacant.insert(Binding {
            seq: *next_seq,
            manager: manager.clone(),
          });
          *next_seq += 1;
        }
      }
      self.version.fetch_add(1, Ordering::AcqRel);
    }
    debug!(
      contract = %contract,
      category = ?manager.category(),
      lifetime = %manager.lifetime_kind(),
      "registered"
    );
    manager
  }

  pub(crate) fn get_local(&self, contract: &Contract) -> Option<Arc<RegistrationManager>> {
    self.entries.get(contract).map(|binding| binding.manager.clone())
  }

  /// Finds the registration for `contract` here or in the nearest ancestor.
  pub(crate) fn get(&self, contract: &Contract) -> Option<Arc<RegistrationManager>> {
    if let Some(manager) = self.get_local(contract) {
      return Some(manager);
    }
    let mut current = self.parent();
    while let Some(scope) = current {
      if let Some(manager) = scope.get_local(contract) {
        return Some(manager);
      }
      current = scope.parent();
    }
    None
  }

  /// Whether `contract` is registered, or names a concrete type the catalog
  /// knows how to construct.
  pub(crate) fn is_resolvable(&self, contract: &Contract) -> bool {
    self.get(contract).is_some()
      || is_container(contract)
      || self
        .catalog()
        .get(contract.ty())
        .map_or(false, |info| info.is_constructible())
  }

  /// The merged view of every registration visible from this scope: own
  /// entries in registration order, then unshadowed ancestor entries.
  ///
  /// The view is cached and rebuilt only when this scope or an ancestor has
  /// changed since it was taken.
  pub(crate) fn registrations(&self) -> Arc<[Registered]> {
    let stamps = self.stamps();
    if let Some(snapshot) = self.snapshot.read().as_ref() {
      if snapshot.stamps == stamps {
        return snapshot.entries.clone();
      }
    }
    let entries = self.merge();
    *self.snapshot.write() = Some(Snapshot {
      stamps,
      entries: entries.clone(),
    });
    entries
  }

  fn stamps(&self) -> Vec<u64> {
    let mut stamps = vec![self.version()];
    let mut current = self.parent();
    while let Some(scope) = current {
      stamps.push(scope.version());
      current = scope.parent();
    }
    stamps
  }

  fn merge(&self) -> Arc<[Registered]> {
    let mut own: Vec<(u64, Registered)> = self
      .entries
      .iter()
      .map(|binding| {
        (
          binding.seq,
          Registered {
            contract: binding.key().clone(),
            manager: binding.manager.clone(),
          },
        )
      })
      .collect();
    own.sort_by_key(|(seq, _)| *seq);

    let mut merged: Vec<Registered> = own.into_iter().map(|(_, entry)| entry).collect();
    if let Some(parent) = self.parent() {
      for entry in parent.registrations().iter() {
        if !self.entries.contains_key(&entry.contract) {
          merged.push(entry.clone());
        }
      }
    }
    merged.into()
  }

  fn locate(self: &Arc<Self>, contract: &Contract) -> Option<Located> {
    let mut owner = self.clone();
    loop {
      if let Some(manager) = owner.get_local(contract) {
        return Some(self.located(contract, manager, owner));
      }
      owner = owner.parent()?;
    }
  }

  fn located(
    self: &Arc<Self>,
    contract: &Contract,
    manager: Arc<RegistrationManager>,
    owner: Arc<Scope>,
  ) -> Located {
    let chain = match manager.category() {
      Category::Factory => ChainKind::Factory,
      Category::Instance => ChainKind::Instance,
      _ => ChainKind::Type,
    };
    if Arc::ptr_eq(&owner, self) {
      return Located {
        lifetime: manager.lifetime().clone(),
        manager,
        lifetime_owner: self.clone(),
        build_scope: self.clone(),
        chain,
      };
    }
    if manager.category() != Category::Instance {
      if let Some(lifetime) = self.child_lifetime(contract, &manager) {
        return Located {
          lifetime,
          manager,
          lifetime_owner: self.clone(),
          build_scope: self.clone(),
          chain,
        };
      }
    }
    // Values cached by an ancestor are built, and owned, by that ancestor.
    let lifetime = manager.lifetime().clone();
    let build_scope = if lifetime.is_owned() {
      owner.clone()
    } else {
      self.clone()
    };
    Located {
      lifetime,
      manager,
      lifetime_owner: owner,
      build_scope,
      chain,
    }
  }

  /// This scope's own manager for an inherited per-scope registration.
  fn child_lifetime(
    &self,
    contract: &Contract,
    manager: &Arc<RegistrationManager>,
  ) -> Option<Arc<dyn LifetimeManager>> {
    if let Some(existing) = self.inherited.get(contract) {
      if Arc::ptr_eq(&existing.0, manager) {
        return Some(existing.1.clone());
      }
    }
    let fresh: Arc<dyn LifetimeManager> = Arc::from(manager.lifetime().create_for_child()?);
    let mut slot = self
      .inherited
      .entry(contract.clone())
      .or_insert_with(|| (manager.clone(), fresh.clone()));
    if !Arc::ptr_eq(&slot.0, manager) {
      *slot = (manager.clone(), fresh);
    }
    Some(slot.1.clone())
  }

  fn locate_unregistered(self: &Arc<Self>, contract: &Contract) -> Option<Located> {
    let info = self.catalog().get(contract.ty())?;
    if info.kind() != TypeKind::Concrete {
      return None;
    }
    let lifetime: Arc<dyn LifetimeManager> = Arc::new(TransientLifetimeManager);
    let manager = Arc::new(RegistrationManager::new(
      Category::Type,
      lifetime.clone(),
      InjectionMembers::default(),
      RegistrationData::Type(info),
    ));
    Some(Located {
      manager,
      lifetime,
      lifetime_owner: self.clone(),
      build_scope: self.clone(),
      chain: ChainKind::Unregistered,
    })
  }

  /// Resolves `contract` as a new top-level call.
  pub(crate) fn resolve(
    self: &Arc<Self>,
    contract: &Contract,
    overrides: &[ResolverOverride],
  ) -> Result<Instance, ResolutionError> {
    trace!(contract = %contract, overrides = overrides.len(), "resolving");
    let overrides: Arc<[ResolverOverride]> = Arc::from(overrides);
    let mut state = ResolveState::new(self.options().max_resolution_depth);
    self.build(contract, &overrides, &mut state)
  }

  /// Builds `contract` as part of an ongoing call.
  pub(crate) fn build(
    self: &Arc<Self>,
    contract: &Contract,
    overrides: &Arc<[ResolverOverride]>,
    state: &mut ResolveState,
  ) -> Result<Instance, ResolutionError> {
    state.enter(contract)?;
    let outcome = self.build_entered(contract, overrides, state);
    state.leave();
    outcome
  }

  fn build_entered(
    self: &Arc<Self>,
    contract: &Contract,
    overrides: &Arc<[ResolverOverride]>,
    state: &mut ResolveState,
  ) -> Result<Instance, ResolutionError> {
    let located = match self.locate(contract) {
      Some(located) => located,
      // A child outliving its root still hands out itself.
      None if is_container(contract) => return Ok(self.container_instance()),
      None => self
        .locate_unregistered(contract)
        .ok_or_else(|| ResolutionError::NotResolvable {
          contract: contract.clone(),
        })?,
    };
    if located.manager.category() == Category::Internal {
      return Ok(self.container_instance());
    }

    let type_info = match &located.manager.data {
      RegistrationData::Type(info) => Some(info.clone()),
      _ => None,
    };
    let chain = self.policies.chains().get(located.chain);
    let mut ctx = BuilderContext::new(
      located.build_scope,
      contract.clone(),
      located.manager,
      located.lifetime,
      located.lifetime_owner,
      type_info,
      overrides.clone(),
      state,
    );
    chain.execute(&mut ctx, self.options().pipeline_mode);
    ctx.finish()
  }

  fn container_instance(self: &Arc<Self>) -> Instance {
    Instance::new(Arc::new(Container::from_scope(self.clone())))
  }

  /// Takes ownership of a manager that cached its first value in this scope.
  pub(crate) fn track(&self, manager: Arc<dyn LifetimeManager>) {
    let mut owned = self.disposables.lock();
    if self.is_disposed() {
      drop(owned);
      dispose_one(&manager);
      return;
    }
    owned.push(manager);
  }

  pub(crate) fn is_disposed(&self) -> bool {
    self.disposed.load(Ordering::Acquire)
  }

  /// Disposes every owned manager, most recently cached first. Runs once.
  pub(crate) fn dispose(&self) {
    if self.disposed.swap(true, Ordering::AcqRel) {
      return;
    }
    let owned = std::mem::take(&mut *self.disposables.lock());
    debug!(owned = owned.len(), "disposing scope");
    for manager in owned.iter().rev() {
      dispose_one(manager);
    }
  }
}

fn is_container(contract: &Contract) -> bool {
  *contract == Contract::of::<Container>()
}

fn dispose_one(manager: &Arc<dyn LifetimeManager>) {
  if let Err(err) = guard_user(|| manager.dispose()) {
    warn!(lifetime = %manager.kind(), error = %err, "failed to dispose a cached value");
  }
}

impl Drop for Scope {
  fn drop(&mut self) {
    self.dispose();
  }
}
