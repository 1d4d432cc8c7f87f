//! The main `Container` handle and its registration and resolution API.

use crate::builder::ContainerBuilder;
use crate::config::{ContainerOptions, Policies};
use crate::context::Resolver;
use crate::contract::{Contract, TypeKey};
use crate::error::{BoxError, RegistrationError, ResolutionError};
use crate::instance::{Dispose, Instance};
use crate::lifetime::{LifetimeKind, LifetimeManager, ResolveCache};
use crate::metadata::{Injectable, TypeInfo, TypeKind};
use crate::overrides::ResolverOverride;
use crate::pipeline::{BuilderStrategy, ChainKind, Stage};
use crate::registration::{
  factory_fn, Category, FactoryFn, HeldInstance, InjectionMembers, Registration, RegistrationData,
  RegistrationManager,
};
use crate::scope::{Registered, Scope};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A handle to one scope of a container tree.
///
/// Handles are cheap to clone and share the same scope. Registrations can be
/// added at any time from any thread; a child container sees its parent's
/// registrations and may shadow them.
///
/// A scope is disposed by [`Container::dispose`] or when its last handle is
/// dropped. Note that a singleton that holds a `Container` keeps its own
/// scope alive; call `dispose` explicitly in that case.
///
/// # Examples
///
/// ```
/// use fibre_di::{Container, LifetimeKind, Registration};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///   fn greet(&self) -> String;
/// }
///
/// struct English;
///
/// impl Greeter for English {
///   fn greet(&self) -> String {
///     "Hello!".to_string()
///   }
/// }
///
/// let container = Container::new();
/// container
///   .register_factory(
///     |_| Ok(Arc::new(English) as Arc<dyn Greeter>),
///     Registration::new().lifetime(LifetimeKind::ContainerControlled),
///   )
///   .unwrap();
///
/// let greeter = container.resolve::<dyn Greeter>().unwrap();
/// assert_eq!(greeter.greet(), "Hello!");
/// ```
#[derive(Clone)]
pub struct Container {
  scope: Arc<Scope>,
}

impl Default for Container {
  fn default() -> Self {
    Self::from_scope(Scope::root(Arc::new(Policies::default())))
  }
}

impl Container {
  /// Creates a new root container with default options.
  pub fn new() -> Self {
    Self::default()
  }

  pub fn builder() -> ContainerBuilder {
    ContainerBuilder::new()
  }

  pub(crate) fn from_scope(scope: Arc<Scope>) -> Self {
    Self { scope }
  }

  // --- Registration ---

  /// Registers `To` as the implementation of `From`, built through its
  /// declared constructors and members.
  ///
  /// Fails without changing the container if `To` is not concrete, declares
  /// no cast to `From`, or lacks a member named in the registration.
  pub fn register_type<From, To>(&self, registration: Registration) -> Result<(), RegistrationError>
  where
    From: ?Sized + Any + Send + Sync,
    To: Injectable,
  {
    let info = self.scope.catalog().describe::<To>();
    if info.kind() != TypeKind::Concrete {
      return Err(RegistrationError::NotConstructible(info.key()));
    }
    let from = TypeKey::of::<From>();
    if !info.is_assignable_to(from) {
      return Err(RegistrationError::NotAssignable {
        from,
        to: info.key(),
      });
    }
    let (name, lifetime, members) = registration.into_parts();
    members.validate(&info)?;
    let lifetime = self.lifetime_or(lifetime, self.options().default_type_lifetime);
    self.scope.add(
      Contract::new(from, name),
      RegistrationManager::new(Category::Type, lifetime, members, RegistrationData::Type(info)),
    );
    Ok(())
  }

  /// Registers a pre-built value.
  ///
  /// The lifetime must be able to hold a value. With an externally controlled
  /// lifetime only a weak reference is kept.
  pub fn register_instance<T>(&self, value: Arc<T>, registration: Registration) -> Result<(), RegistrationError>
  where
    T: ?Sized + Any + Send + Sync,
  {
    let contract = Contract::from_parts::<T>(registration.name());
    self.add_instance(contract, Instance::new(value), registration)
  }

  /// Registers a pre-built value that is disposed with the scope that owns it.
  pub fn register_disposable_instance<T>(
    &self,
    value: Arc<T>,
    registration: Registration,
  ) -> Result<(), RegistrationError>
  where
    T: ?Sized + Dispose + Any,
  {
    let contract = Contract::from_parts::<T>(registration.name());
    self.add_instance(contract, Instance::disposable(value), registration)
  }

  /// Registers a factory. It receives a [`Resolver`] for its own dependencies.
  pub fn register_factory<T, F>(&self, factory: F, registration: Registration) -> Result<(), RegistrationError>
  where
    T: ?Sized + Any + Send + Sync,
    F: Fn(&mut Resolver<'_, '_>) -> Result<Arc<T>, BoxError> + Send + Sync + 'static,
  {
    self.add_factory::<T>(
      factory_fn(move |resolver| factory(resolver).map(Instance::new)),
      registration,
    )
  }

  /// Registers a factory whose values are disposed with the scope that caches them.
  pub fn register_disposable_factory<T, F>(
    &self,
    factory: F,
    registration: Registration,
  ) -> Result<(), RegistrationError>
  where
    T: ?Sized + Dispose + Any,
    F: Fn(&mut Resolver<'_, '_>) -> Result<Arc<T>, BoxError> + Send + Sync + 'static,
  {
    self.add_factory::<T>(
      factory_fn(move |resolver| factory(resolver).map(Instance::disposable)),
      registration,
    )
  }

  fn add_factory<T: ?Sized + Any>(
    &self,
    factory: FactoryFn,
    registration: Registration,
  ) -> Result<(), RegistrationError> {
    let (name, lifetime, members) = registration.into_parts();
    if !members.is_empty() {
      return Err(RegistrationError::MembersNotSupported);
    }
    let lifetime = self.lifetime_or(lifetime, self.options().default_factory_lifetime);
    self.scope.add(
      Contract::new(TypeKey::of::<T>(), name),
      RegistrationManager::new(
        Category::Factory,
        lifetime,
        InjectionMembers::default(),
        RegistrationData::Factory(factory),
      ),
    );
    Ok(())
  }

  fn add_instance(
    &self,
    contract: Contract,
    value: Instance,
    registration: Registration,
  ) -> Result<(), RegistrationError> {
    let (_, lifetime, members) = registration.into_parts();
    if !members.is_empty() {
      return Err(RegistrationError::MembersNotSupported);
    }
    let lifetime = self.lifetime_or(lifetime, self.options().default_instance_lifetime);
    let kind = lifetime.kind();
    if !kind.can_hold_instance() {
      return Err(RegistrationError::UnsupportedLifetime {
        lifetime: kind.name(),
      });
    }
    let held = if kind == LifetimeKind::ExternallyControlled {
      HeldInstance::Weak(value.downgrade())
    } else {
      HeldInstance::Strong(value.clone())
    };
    let first = lifetime.set_value(value, &mut ResolveCache::default());
    self.scope.add(
      contract,
      RegistrationManager::new(
        Category::Instance,
        lifetime.clone(),
        InjectionMembers::default(),
        RegistrationData::Instance(held),
      ),
    );
    if first && lifetime.is_owned() {
      self.scope.track(lifetime);
    }
    Ok(())
  }

  fn lifetime_or(
    &self,
    lifetime: Option<Box<dyn LifetimeManager>>,
    default: LifetimeKind,
  ) -> Arc<dyn LifetimeManager> {
    Arc::from(lifetime.unwrap_or_else(|| default.create()))
  }

  /// Adds `T` to the type catalog without registering it, so it can be
  /// built as an unregistered concrete type.
  pub fn describe<T: Injectable>(&self) -> Arc<TypeInfo> {
    self.scope.catalog().describe::<T>()
  }

  // --- Resolution ---

  /// Resolves the unnamed registration for `T`.
  pub fn resolve<T: ?Sized + Any + Send + Sync>(&self) -> Result<Arc<T>, ResolutionError> {
    self.resolve_with::<T>(None, &[])
  }

  pub fn resolve_named<T: ?Sized + Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, ResolutionError> {
    self.resolve_with::<T>(Some(name), &[])
  }

  /// Resolves `T` with overrides applied to every dependency site of the call.
  pub fn resolve_with<T: ?Sized + Any + Send + Sync>(
    &self,
    name: Option<&str>,
    overrides: &[ResolverOverride],
  ) -> Result<Arc<T>, ResolutionError> {
    let contract = Contract::from_parts::<T>(name);
    let value = self.scope.resolve(&contract, overrides)?;
    value.downcast::<T>().ok_or(ResolutionError::TypeMismatch {
      contract,
      expected: std::any::type_name::<T>(),
    })
  }

  /// Resolves a contract without static typing.
  pub fn resolve_contract(
    &self,
    contract: &Contract,
    overrides: &[ResolverOverride],
  ) -> Result<Instance, ResolutionError> {
    self.scope.resolve(contract, overrides)
  }

  /// Resolves `T`, discarding the error.
  pub fn get<T: ?Sized + Any + Send + Sync>(&self, name: Option<&str>) -> Option<Arc<T>> {
    self.resolve_with::<T>(name, &[]).ok()
  }

  /// Whether `T` is registered in this scope or an ancestor.
  pub fn is_registered<T: ?Sized + Any>(&self, name: Option<&str>) -> bool {
    self.scope.get(&Contract::from_parts::<T>(name)).is_some()
  }

  /// Whether `contract` is registered, or names a constructible catalog type.
  pub fn can_resolve(&self, contract: &Contract) -> bool {
    self.scope.is_resolvable(contract)
  }

  // --- Scopes ---

  /// Creates a child container that falls back to this one.
  pub fn create_child_container(&self) -> Container {
    Container::from_scope(self.scope.create_child())
  }

  /// The parent container, while it is still alive.
  pub fn parent(&self) -> Option<Container> {
    self.scope.parent().map(Container::from_scope)
  }

  /// Disposes every value this scope owns, most recently cached first.
  ///
  /// Idempotent. Children are not disposed. Cached values remain
  /// resolvable; building new ones fails with [`ResolutionError::ScopeDisposed`].
  pub fn dispose(&self) {
    self.scope.dispose();
  }

  pub fn is_disposed(&self) -> bool {
    self.scope.is_disposed()
  }

  /// Every registration visible from this scope: own entries in registration
  /// order, then inherited entries not shadowed here.
  pub fn registrations(&self) -> Arc<[Registered]> {
    self.scope.registrations()
  }

  // --- Policies ---

  /// Adds a strategy to one of the shared build pipelines. Affects every
  /// container that shares this container's policies.
  pub fn add_strategy(&self, chain: ChainKind, stage: Stage, strategy: Arc<dyn BuilderStrategy>) {
    self.scope.policies().chains().get(chain).add(stage, strategy);
  }

  /// Removes a previously added strategy, compared by identity.
  pub fn remove_strategy(&self, chain: ChainKind, strategy: &Arc<dyn BuilderStrategy>) -> bool {
    self.scope.policies().chains().get(chain).remove(strategy)
  }

  pub fn options(&self) -> &ContainerOptions {
    self.scope.options()
  }

  pub fn policies(&self) -> Arc<Policies> {
    self.scope.policies().clone()
  }
}

impl fmt::Debug for Container {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Container")
      .field("version", &self.scope.version())
      .field("has_parent", &self.scope.parent().is_some())
      .field("disposed", &self.scope.is_disposed())
      .finish()
  }
}
