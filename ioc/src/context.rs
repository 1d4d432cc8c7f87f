//! Per-call state threaded through the build pipeline.

use crate::container::Container;
use crate::contract::{Contract, TypeKey};
use crate::error::{guard_user, ResolutionError};
use crate::instance::Instance;
use crate::lifetime::{LifetimeManager, ResolveCache};
use crate::metadata::{Catalog, MemberInfo, ParameterInfo, TypeInfo};
use crate::overrides::{best_match, DependencySite, OverrideValue, ResolverOverride, SiteKind};
use crate::registration::{InjectionValue, RegistrationManager};
use crate::scope::Scope;
use crate::select::Satisfy;
use parking_lot::{ArcMutexGuard, RawMutex};
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

thread_local! {
  /// Contracts under construction on this thread, across every resolve call
  /// in progress. A factory that resolves through a container handle starts a
  /// new call, but still joins this chain.
  static IN_FLIGHT: RefCell<Vec<Contract>> = const { RefCell::new(Vec::new()) };
}

/// State shared by every nested build of one top-level resolve call.
///
/// The in-flight chain is kept per thread; dropping the state unwinds the
/// entries its call pushed.
pub(crate) struct ResolveState {
  base: usize,
  pub(crate) cache: ResolveCache,
  max_depth: usize,
}

impl ResolveState {
  pub(crate) fn new(max_depth: usize) -> Self {
    Self {
      base: IN_FLIGHT.with(|chain| chain.borrow().len()),
      cache: ResolveCache::default(),
      max_depth,
    }
  }

  /// Pushes `contract` onto the in-flight chain, failing if it is already
  /// being built further up the stack.
  pub(crate) fn enter(&mut self, contract: &Contract) -> Result<(), ResolutionError> {
    IN_FLIGHT.with(|chain| {
      let mut chain = chain.borrow_mut();
      if let Some(start) = chain.iter().position(|c| c == contract) {
        let mut path = chain[start..].to_vec();
        path.push(contract.clone());
        return Err(ResolutionError::CircularDependency {
          contract: contract.clone(),
          path,
        });
      }
      if chain.len() >= self.max_depth {
        return Err(ResolutionError::DepthExceeded {
          contract: contract.clone(),
          limit: self.max_depth,
        });
      }
      chain.push(contract.clone());
      Ok(())
    })
  }

  pub(crate) fn leave(&mut self) {
    IN_FLIGHT.with(|chain| {
      let mut chain = chain.borrow_mut();
      if chain.len() > self.base {
        chain.pop();
      }
    });
  }

  /// Nesting depth of this call.
  pub(crate) fn depth(&self) -> usize {
    IN_FLIGHT.with(|chain| chain.borrow().len().saturating_sub(self.base))
  }
}

impl Drop for ResolveState {
  fn drop(&mut self) {
    // A panic between enter and leave must not leave stale entries behind.
    let _ = IN_FLIGHT.try_with(|chain| chain.borrow_mut().truncate(self.base));
  }
}

/// The mutable state of one build: what is being built, the value so far,
/// and the fault slot.
///
/// Strategies read and update the context in [`pre_build_up`] and
/// [`post_build_up`]. Once the context is faulted or complete, the remaining
/// forward steps are skipped; post steps of strategies already entered still run.
///
/// [`pre_build_up`]: crate::BuilderStrategy::pre_build_up
/// [`post_build_up`]: crate::BuilderStrategy::post_build_up
pub struct BuilderContext<'a> {
  pub(crate) scope: Arc<Scope>,
  pub(crate) contract: Contract,
  pub(crate) registration: Arc<RegistrationManager>,
  pub(crate) lifetime: Arc<dyn LifetimeManager>,
  pub(crate) lifetime_owner: Arc<Scope>,
  pub(crate) type_info: Option<Arc<TypeInfo>>,
  pub(crate) overrides: Arc<[ResolverOverride]>,
  pub(crate) state: &'a mut ResolveState,
  pub(crate) existing: Option<Box<dyn Any + Send + Sync>>,
  pub(crate) build_guard: Option<ArcMutexGuard<RawMutex, ()>>,
  result: Option<Instance>,
  cached: bool,
  complete: bool,
  error: Option<ResolutionError>,
}

impl<'a> BuilderContext<'a> {
  #[allow(clippy::too_many_arguments)]
  pub(crate) fn new(
    scope: Arc<Scope>,
    contract: Contract,
    registration: Arc<RegistrationManager>,
    lifetime: Arc<dyn LifetimeManager>,
    lifetime_owner: Arc<Scope>,
    type_info: Option<Arc<TypeInfo>>,
    overrides: Arc<[ResolverOverride]>,
    state: &'a mut ResolveState,
  ) -> Self {
    Self {
      scope,
      contract,
      registration,
      lifetime,
      lifetime_owner,
      type_info,
      overrides,
      state,
      existing: None,
      build_guard: None,
      result: None,
      cached: false,
      complete: false,
      error: None,
    }
  }

  pub fn contract(&self) -> &Contract {
    &self.contract
  }

  pub fn registration(&self) -> &RegistrationManager {
    &self.registration
  }

  /// The lifetime manager in effect for this build. For hierarchical
  /// registrations resolved from a child scope, this is the child's own manager.
  pub fn lifetime(&self) -> &Arc<dyn LifetimeManager> {
    &self.lifetime
  }

  pub fn type_info(&self) -> Option<&Arc<TypeInfo>> {
    self.type_info.as_ref()
  }

  pub fn overrides(&self) -> &[ResolverOverride] {
    &self.overrides
  }

  pub fn catalog(&self) -> &Catalog {
    self.scope.catalog()
  }

  /// The object under construction, before it is sealed into an [`Instance`].
  pub fn existing_mut(&mut self) -> Option<&mut (dyn Any + Send + Sync)> {
    self.existing.as_deref_mut()
  }

  pub fn result(&self) -> Option<&Instance> {
    self.result.as_ref()
  }

  /// Supplies a freshly built value.
  pub fn set_result(&mut self, value: Instance) {
    self.result = Some(value);
  }

  /// Supplies an already cached value and stops the forward pass.
  pub fn complete_with_cached(&mut self, value: Instance) {
    self.result = Some(value);
    self.cached = true;
    self.complete = true;
  }

  /// Whether the result came from a lifetime cache rather than this build.
  pub fn is_cached(&self) -> bool {
    self.cached
  }

  pub fn is_faulted(&self) -> bool {
    self.error.is_some()
  }

  pub fn error(&self) -> Option<&ResolutionError> {
    self.error.as_ref()
  }

  /// Records a fault. The first fault wins.
  pub fn fail(&mut self, error: ResolutionError) {
    if self.error.is_none() {
      self.error = Some(error);
    }
  }

  /// Whether the remaining forward steps should be skipped.
  pub fn is_halted(&self) -> bool {
    self.complete || self.error.is_some()
  }

  /// A handle to the scope this build resolves its dependencies from.
  pub fn container(&self) -> Container {
    Container::from_scope(self.scope.clone())
  }

  /// Resolves a nested dependency within the same call, sharing the
  /// in-flight chain, the per-resolve cache and the caller's overrides.
  pub fn resolve_dependency(&mut self, contract: &Contract) -> Result<Instance, ResolutionError> {
    let scope = self.scope.clone();
    let overrides = self.overrides.clone();
    scope.build(contract, &overrides, self.state)
  }

  /// The value for a constructor or method parameter, or `None` when an
  /// optional parameter cannot be resolved.
  pub(crate) fn resolve_parameter(
    &mut self,
    declaring: TypeKey,
    param: &ParameterInfo,
    injected: Option<&InjectionValue>,
  ) -> Result<Option<Instance>, ResolutionError> {
    if let Some(seed) = param.seed {
      self.catalog().seed(param.ty, seed);
    }
    let contract = param.contract();
    let site = DependencySite {
      kind: SiteKind::Parameter,
      member: param.name,
      declaring,
      contract: &contract,
    };
    if let Some(value) = self.overridden(&site)? {
      return Ok(Some(value));
    }
    if let Some(value) = injected {
      return self.injected(value, &contract);
    }
    if (param.default.is_some() || param.optional) && !self.scope.is_resolvable(&contract) {
      return Ok(param.default.clone());
    }
    self.resolve_dependency(&contract).map(Some)
  }

  /// The value for a field or property, or `None` when a non-required member
  /// cannot be resolved.
  pub(crate) fn resolve_member(
    &mut self,
    kind: SiteKind,
    declaring: TypeKey,
    member: &MemberInfo,
    explicit: Option<&InjectionValue>,
    required: bool,
  ) -> Result<Option<Instance>, ResolutionError> {
    let contract = member.contract();
    let site = DependencySite {
      kind,
      member: member.name,
      declaring,
      contract: &contract,
    };
    if let Some(value) = self.overridden(&site)? {
      return Ok(Some(value));
    }
    if let Some(value) = explicit {
      return self.injected(value, &contract);
    }
    if !required && !self.scope.is_resolvable(&contract) {
      return Ok(None);
    }
    self.resolve_dependency(&contract).map(Some)
  }

  fn overridden(&mut self, site: &DependencySite<'_>) -> Result<Option<Instance>, ResolutionError> {
    if self.overrides.is_empty() {
      return Ok(None);
    }
    let overrides = self.overrides.clone();
    let Some((matched, _)) = best_match(&overrides, site, self.catalog()) else {
      return Ok(None);
    };
    let value = match matched.value() {
      OverrideValue::Value(value) => value.clone(),
      OverrideValue::Resolve(contract) => self.resolve_dependency(contract)?,
      OverrideValue::Factory { factory, .. } => {
        let factory = factory.clone();
        let mut resolver = Resolver::new(self);
        guard_user(|| factory(&mut resolver))
          .map_err(|err| ResolutionError::from_user(site.contract, err))?
      }
    };
    self.coerce(value, site.contract).map(Some)
  }

  fn injected(
    &mut self,
    value: &InjectionValue,
    site: &Contract,
  ) -> Result<Option<Instance>, ResolutionError> {
    match value {
      InjectionValue::Any => self.resolve_dependency(site).map(Some),
      InjectionValue::Resolve { ty, name } => {
        let value = self.resolve_dependency(&Contract::new(*ty, name.clone()))?;
        self.coerce(value, site).map(Some)
      }
      InjectionValue::Optional { ty, name } => {
        let contract = Contract::new(ty.unwrap_or(site.ty()), name.clone());
        if !self.scope.is_resolvable(&contract) {
          return Ok(None);
        }
        let value = self.resolve_dependency(&contract)?;
        self.coerce(value, site).map(Some)
      }
      InjectionValue::Value(value) => self.coerce(value.clone(), site).map(Some),
    }
  }

  fn coerce(&self, value: Instance, site: &Contract) -> Result<Instance, ResolutionError> {
    self
      .catalog()
      .convert(&value, site.ty())
      .ok_or_else(|| ResolutionError::TypeMismatch {
        contract: site.clone(),
        expected: site.ty().name(),
      })
  }

  /// Consumes the context into the outcome of the build.
  pub(crate) fn finish(mut self) -> Result<Instance, ResolutionError> {
    self.build_guard = None;
    if let Some(error) = self.error.take() {
      return Err(error);
    }
    self.result.take().ok_or(ResolutionError::NoResult {
      contract: self.contract.clone(),
    })
  }
}

impl Satisfy for BuilderContext<'_> {
  fn can_satisfy(&self, declaring: TypeKey, param: &ParameterInfo) -> bool {
    if param.default.is_some() || param.optional {
      return true;
    }
    if let Some(seed) = param.seed {
      self.catalog().seed(param.ty, seed);
    }
    let contract = param.contract();
    if !self.overrides.is_empty() {
      let site = DependencySite {
        kind: SiteKind::Parameter,
        member: param.name,
        declaring,
        contract: &contract,
      };
      if best_match(&self.overrides, &site, self.catalog()).is_some() {
        return true;
      }
    }
    self.scope.is_resolvable(&contract)
  }

  fn is_assignable(&self, from: TypeKey, to: TypeKey) -> bool {
    self.catalog().is_assignable(from, to)
  }
}

impl fmt::Debug for BuilderContext<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BuilderContext")
      .field("contract", &self.contract)
      .field("category", &self.registration.category())
      .field("lifetime", &self.lifetime.kind())
      .field("depth", &self.state.depth())
      .field("has_existing", &self.existing.is_some())
      .field("result", &self.result)
      .field("cached", &self.cached)
      .field("error", &self.error)
      .finish()
  }
}

/// Resolves further dependencies from inside a factory, as part of the
/// resolve call that invoked it.
///
/// # Examples
///
/// ```
/// use fibre_di::{Container, Registration};
/// use std::sync::Arc;
///
/// struct Config { url: String }
///
/// let container = Container::new();
/// container
///   .register_instance(Arc::new(String::from("postgres://db")), Registration::new())
///   .unwrap();
/// container
///   .register_factory(
///     |r| Ok(Arc::new(Config { url: (*r.resolve::<String>()?).clone() })),
///     Registration::new(),
///   )
///   .unwrap();
///
/// assert_eq!(container.resolve::<Config>().unwrap().url, "postgres://db");
/// ```
pub struct Resolver<'c, 'a> {
  ctx: &'c mut BuilderContext<'a>,
}

impl<'c, 'a> Resolver<'c, 'a> {
  pub(crate) fn new(ctx: &'c mut BuilderContext<'a>) -> Self {
    Self { ctx }
  }

  pub fn resolve<T: ?Sized + Any + Send + Sync>(&mut self) -> Result<Arc<T>, ResolutionError> {
    self.resolve_typed(Contract::of::<T>())
  }

  pub fn resolve_named<T: ?Sized + Any + Send + Sync>(
    &mut self,
    name: &str,
  ) -> Result<Arc<T>, ResolutionError> {
    self.resolve_typed(Contract::named::<T>(name))
  }

  pub fn resolve_contract(&mut self, contract: &Contract) -> Result<Instance, ResolutionError> {
    self.ctx.resolve_dependency(contract)
  }

  /// The contract the factory is building.
  pub fn contract(&self) -> &Contract {
    &self.ctx.contract
  }

  pub fn container(&self) -> Container {
    self.ctx.container()
  }

  fn resolve_typed<T: ?Sized + Any + Send + Sync>(
    &mut self,
    contract: Contract,
  ) -> Result<Arc<T>, ResolutionError> {
    let value = self.ctx.resolve_dependency(&contract)?;
    value.downcast::<T>().ok_or(ResolutionError::TypeMismatch {
      contract,
      expected: std::any::type_name::<T>(),
    })
  }
}
