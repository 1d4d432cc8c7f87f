//! Per-contract registration metadata.

use crate::context::Resolver;
use crate::contract::{Name, TypeKey};
use crate::error::{BoxError, MemberKindName, RegistrationError};
use crate::instance::{Instance, WeakInstance};
use crate::lifetime::{LifetimeKind, LifetimeManager};
use crate::metadata::TypeInfo;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

pub(crate) type FactoryFn =
  Arc<dyn Fn(&mut Resolver<'_, '_>) -> Result<Instance, BoxError> + Send + Sync>;

pub(crate) fn factory_fn<F>(f: F) -> FactoryFn
where
  F: Fn(&mut Resolver<'_, '_>) -> Result<Instance, BoxError> + Send + Sync + 'static,
{
  Arc::new(f)
}

/// How a registration produces its value. Selects the build pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
  Uninitialized,
  Instance,
  Type,
  Factory,
  /// The container itself.
  Internal,
}

/// A value or dependency supplied explicitly for a constructor parameter,
/// field, property or method parameter.
#[derive(Clone)]
pub enum InjectionValue {
  /// Resolve the site's own contract.
  Any,
  /// Resolve `ty` under `name` and convert it to the site's type.
  Resolve { ty: TypeKey, name: Name },
  /// Like `Resolve`, but an unresolvable dependency leaves the site empty.
  Optional { ty: Option<TypeKey>, name: Name },
  /// Use this value as-is.
  Value(Instance),
}

impl InjectionValue {
  pub fn of<T: ?Sized + Any>() -> Self {
    InjectionValue::Resolve {
      ty: TypeKey::of::<T>(),
      name: None,
    }
  }

  pub fn named<T: ?Sized + Any>(name: &str) -> Self {
    InjectionValue::Resolve {
      ty: TypeKey::of::<T>(),
      name: Some(Arc::from(name)),
    }
  }

  pub fn optional<T: ?Sized + Any>() -> Self {
    InjectionValue::Optional {
      ty: Some(TypeKey::of::<T>()),
      name: None,
    }
  }

  pub fn value<T: ?Sized + Any + Send + Sync>(value: Arc<T>) -> Self {
    InjectionValue::Value(Instance::new(value))
  }

  /// The type this value provides, or `None` when it adapts to the site.
  pub fn declared_type(&self) -> Option<TypeKey> {
    match self {
      InjectionValue::Any => None,
      InjectionValue::Resolve { ty, .. } => Some(*ty),
      InjectionValue::Optional { ty, .. } => *ty,
      InjectionValue::Value(value) => Some(value.type_key()),
    }
  }
}

impl fmt::Debug for InjectionValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      InjectionValue::Any => f.write_str("Any"),
      InjectionValue::Resolve { ty, name } => f
        .debug_struct("Resolve")
        .field("ty", ty)
        .field("name", name)
        .finish(),
      InjectionValue::Optional { ty, name } => f
        .debug_struct("Optional")
        .field("ty", ty)
        .field("name", name)
        .finish(),
      InjectionValue::Value(value) => f.debug_tuple("Value").field(value).finish(),
    }
  }
}

/// A member explicitly configured for injection at registration time.
#[derive(Debug, Clone)]
pub enum InjectionMember {
  Constructor(Vec<InjectionValue>),
  Field {
    name: String,
    value: Option<InjectionValue>,
  },
  Property {
    name: String,
    value: Option<InjectionValue>,
  },
  Method {
    name: String,
    args: Vec<InjectionValue>,
  },
}

impl InjectionMember {
  pub fn constructor(args: impl IntoIterator<Item = InjectionValue>) -> Self {
    InjectionMember::Constructor(args.into_iter().collect())
  }

  pub fn field(name: impl Into<String>) -> Self {
    InjectionMember::Field {
      name: name.into(),
      value: None,
    }
  }

  pub fn field_value(name: impl Into<String>, value: InjectionValue) -> Self {
    InjectionMember::Field {
      name: name.into(),
      value: Some(value),
    }
  }

  pub fn property(name: impl Into<String>) -> Self {
    InjectionMember::Property {
      name: name.into(),
      value: None,
    }
  }

  pub fn property_value(name: impl Into<String>, value: InjectionValue) -> Self {
    InjectionMember::Property {
      name: name.into(),
      value: Some(value),
    }
  }

  pub fn method(name: impl Into<String>, args: impl IntoIterator<Item = InjectionValue>) -> Self {
    InjectionMember::Method {
      name: name.into(),
      args: args.into_iter().collect(),
    }
  }
}

/// An explicitly injected field or property.
#[derive(Debug, Clone)]
pub struct MemberInjection {
  pub name: String,
  pub value: Option<InjectionValue>,
}

/// An explicitly injected method call.
#[derive(Debug, Clone)]
pub struct MethodInjection {
  pub name: String,
  pub args: Vec<InjectionValue>,
}

/// Injection members grouped by kind, in the order they were added.
#[derive(Debug, Clone, Default)]
pub struct InjectionMembers {
  constructors: Vec<Vec<InjectionValue>>,
  fields: Vec<MemberInjection>,
  properties: Vec<MemberInjection>,
  methods: Vec<MethodInjection>,
}

impl InjectionMembers {
  pub fn add(&mut self, member: InjectionMember) {
    match member {
      InjectionMember::Constructor(args) => self.constructors.push(args),
      InjectionMember::Field { name, value } => self.fields.push(MemberInjection { name, value }),
      InjectionMember::Property { name, value } => {
        self.properties.push(MemberInjection { name, value })
      }
      InjectionMember::Method { name, args } => self.methods.push(MethodInjection { name, args }),
    }
  }

  /// The injected constructor. When several were added, the last one applies.
  pub fn constructor(&self) -> Option<&[InjectionValue]> {
    self.constructors.last().map(Vec::as_slice)
  }

  pub fn fields(&self) -> &[MemberInjection] {
    &self.fields
  }

  pub fn properties(&self) -> &[MemberInjection] {
    &self.properties
  }

  pub fn methods(&self) -> &[MethodInjection] {
    &self.methods
  }

  pub fn is_empty(&self) -> bool {
    self.constructors.is_empty()
      && self.fields.is_empty()
      && self.properties.is_empty()
      && self.methods.is_empty()
  }

  /// Checks that every named member exists on `info` and can be injected.
  pub(crate) fn validate(&self, info: &TypeInfo) -> Result<(), RegistrationError> {
    for field in &self.fields {
      match info.field(&field.name) {
        None => return Err(not_found(info, MemberKindName::Field, &field.name)),
        Some(member) if !member.is_injectable() => {
          return Err(not_injectable(info, MemberKindName::Field, &field.name))
        }
        Some(_) => {}
      }
    }
    for property in &self.properties {
      match info.property(&property.name) {
        None => return Err(not_found(info, MemberKindName::Property, &property.name)),
        Some(member) if !member.is_injectable() => {
          return Err(not_injectable(info, MemberKindName::Property, &property.name))
        }
        Some(_) => {}
      }
    }
    for method in &self.methods {
      if !info.methods().iter().any(|m| m.name() == method.name) {
        return Err(not_found(info, MemberKindName::Method, &method.name));
      }
    }
    Ok(())
  }
}

fn not_found(info: &TypeInfo, kind: MemberKindName, member: &str) -> RegistrationError {
  RegistrationError::MemberNotFound {
    ty: info.key(),
    kind,
    member: member.to_string(),
  }
}

fn not_injectable(info: &TypeInfo, kind: MemberKindName, member: &str) -> RegistrationError {
  RegistrationError::MemberNotInjectable {
    ty: info.key(),
    kind,
    member: member.to_string(),
  }
}

/// Options shared by every registration call: name, lifetime and members.
///
/// # Examples
///
/// ```
/// use fibre_di::{InjectionMember, LifetimeKind, Registration};
///
/// let registration = Registration::new()
///   .named("primary")
///   .lifetime(LifetimeKind::ContainerControlled)
///   .member(InjectionMember::property("logger"));
/// assert_eq!(registration.name(), Some("primary"));
/// ```
#[derive(Default)]
pub struct Registration {
  name: Name,
  lifetime: Option<Box<dyn LifetimeManager>>,
  members: InjectionMembers,
}

impl Registration {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn named(mut self, name: &str) -> Self {
    self.name = Some(Arc::from(name));
    self
  }

  pub fn lifetime(mut self, lifetime: impl Into<Box<dyn LifetimeManager>>) -> Self {
    self.lifetime = Some(lifetime.into());
    self
  }

  /// Uses a specific lifetime manager instance, e.g. a custom policy.
  pub fn lifetime_manager<L: LifetimeManager + 'static>(mut self, manager: L) -> Self {
    self.lifetime = Some(Box::new(manager));
    self
  }

  /// Appends an injection member. Members of the same kind keep their order.
  pub fn member(mut self, member: InjectionMember) -> Self {
    self.members.add(member);
    self
  }

  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  pub(crate) fn into_parts(self) -> (Name, Option<Box<dyn LifetimeManager>>, InjectionMembers) {
    (self.name, self.lifetime, self.members)
  }
}

impl fmt::Debug for Registration {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Registration")
      .field("name", &self.name)
      .field("lifetime", &self.lifetime.as_ref().map(|l| l.kind()))
      .field("members", &self.members)
      .finish()
  }
}

pub(crate) enum HeldInstance {
  Strong(Instance),
  Weak(WeakInstance),
}

pub(crate) enum RegistrationData {
  None,
  Instance(HeldInstance),
  Type(Arc<TypeInfo>),
  Factory(FactoryFn),
}

/// The metadata stored for one registered contract.
pub struct RegistrationManager {
  category: Category,
  lifetime: Arc<dyn LifetimeManager>,
  members: InjectionMembers,
  pub(crate) data: RegistrationData,
}

impl RegistrationManager {
  pub(crate) fn new(
    category: Category,
    lifetime: Arc<dyn LifetimeManager>,
    members: InjectionMembers,
    data: RegistrationData,
  ) -> Self {
    Self {
      category,
      lifetime,
      members,
      data,
    }
  }

  pub(crate) fn internal() -> Self {
    Self::new(
      Category::Internal,
      Arc::from(LifetimeKind::Transient.create()),
      InjectionMembers::default(),
      RegistrationData::None,
    )
  }

  pub fn category(&self) -> Category {
    self.category
  }

  pub fn lifetime(&self) -> &Arc<dyn LifetimeManager> {
    &self.lifetime
  }

  pub fn lifetime_kind(&self) -> LifetimeKind {
    self.lifetime.kind()
  }

  pub fn members(&self) -> &InjectionMembers {
    &self.members
  }

  /// The implementation type of a type registration.
  pub fn implementation(&self) -> Option<TypeKey> {
    match &self.data {
      RegistrationData::Type(info) => Some(info.key()),
      _ => None,
    }
  }
}

impl fmt::Debug for RegistrationManager {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RegistrationManager")
      .field("category", &self.category)
      .field("lifetime", &self.lifetime.kind())
      .field("implementation", &self.implementation())
      .field("members", &self.members)
      .finish()
  }
}
