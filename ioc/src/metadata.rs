//! Declared type metadata: constructors, fields, properties, methods and casts.
//!
//! Rust has no runtime reflection, so each constructible type describes itself
//! through [`Injectable`]. The descriptions are collected into [`TypeInfo`]
//! values and cached by the [`Catalog`] shared by every scope in a container tree.

use crate::contract::{Contract, Name, TypeKey};
use crate::error::BoxError;
use crate::instance::{Dispose, Instance};
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;

pub(crate) type Invoker =
  Arc<dyn Fn(Args) -> Result<Box<dyn Any + Send + Sync>, BoxError> + Send + Sync>;
pub(crate) type MethodInvoker =
  Arc<dyn Fn(&mut (dyn Any + Send + Sync), Args) -> Result<(), BoxError> + Send + Sync>;
pub(crate) type Setter =
  Arc<dyn Fn(&mut (dyn Any + Send + Sync), Instance) -> Result<(), BoxError> + Send + Sync>;
type Caster = Arc<dyn Fn(&Instance) -> Option<Instance> + Send + Sync>;
type Finisher = Arc<dyn Fn(Box<dyn Any + Send + Sync>) -> Option<Instance> + Send + Sync>;
type Seed = fn() -> TypeInfo;

/// A type that can describe its constructors and injectable members.
///
/// # Examples
///
/// ```
/// use fibre_di::{Describe, Injectable};
/// use std::sync::Arc;
///
/// struct Database { url: Arc<String> }
///
/// impl Injectable for Database {
///   fn describe(d: &mut Describe<Self>) {
///     d.constructor()
///       .param::<String>("url")
///       .named("db_url")
///       .build(|args| Ok(Database { url: args.next()? }));
///   }
/// }
/// ```
pub trait Injectable: Any + Send + Sync + Sized {
  fn describe(d: &mut Describe<Self>);
}

/// Import marker carried by a declared member or parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMarker {
  #[default]
  None,
  /// The member must be injected; failure to resolve it fails the build.
  Required,
  /// The member is injected when resolvable and skipped otherwise.
  Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
  #[default]
  Public,
  Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeKind {
  #[default]
  Concrete,
  Abstract,
  Primitive,
}

/// A declared constructor or method parameter.
#[derive(Clone)]
pub struct ParameterInfo {
  pub(crate) name: &'static str,
  pub(crate) ty: TypeKey,
  pub(crate) contract_name: Name,
  pub(crate) default: Option<Instance>,
  pub(crate) optional: bool,
  pub(crate) by_ref: bool,
  pub(crate) generic: bool,
  pub(crate) seed: Option<Seed>,
}

impl ParameterInfo {
  fn new(name: &'static str, ty: TypeKey) -> Self {
    Self {
      name,
      ty,
      contract_name: None,
      default: None,
      optional: false,
      by_ref: false,
      generic: false,
      seed: None,
    }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn ty(&self) -> TypeKey {
    self.ty
  }

  pub fn has_default(&self) -> bool {
    self.default.is_some()
  }

  pub fn is_optional(&self) -> bool {
    self.optional
  }

  pub fn is_by_ref(&self) -> bool {
    self.by_ref
  }

  pub fn is_generic(&self) -> bool {
    self.generic
  }

  /// The contract this parameter resolves by default.
  pub fn contract(&self) -> Contract {
    Contract::new(self.ty, self.contract_name.clone())
  }
}

impl fmt::Debug for ParameterInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ParameterInfo")
      .field("name", &self.name)
      .field("ty", &self.ty)
      .field("contract_name", &self.contract_name)
      .field("has_default", &self.default.is_some())
      .field("optional", &self.optional)
      .field("by_ref", &self.by_ref)
      .field("generic", &self.generic)
      .finish()
  }
}

pub struct ConstructorInfo {
  pub(crate) params: Vec<ParameterInfo>,
  pub(crate) visibility: Visibility,
  pub(crate) injection: bool,
  pub(crate) invoke: Invoker,
}

impl ConstructorInfo {
  pub fn params(&self) -> &[ParameterInfo] {
    &self.params
  }

  pub fn visibility(&self) -> Visibility {
    self.visibility
  }

  /// Whether this constructor is flagged as the designated injection constructor.
  pub fn is_injection_constructor(&self) -> bool {
    self.injection
  }
}

impl fmt::Debug for ConstructorInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ConstructorInfo")
      .field("params", &self.params)
      .field("visibility", &self.visibility)
      .field("injection", &self.injection)
      .finish_non_exhaustive()
  }
}

/// A declared field or property.
pub struct MemberInfo {
  pub(crate) name: &'static str,
  pub(crate) ty: TypeKey,
  pub(crate) contract_name: Name,
  pub(crate) import: ImportMarker,
  pub(crate) visibility: Visibility,
  pub(crate) is_static: bool,
  pub(crate) settable: bool,
  pub(crate) setter: Setter,
}

impl MemberInfo {
  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn ty(&self) -> TypeKey {
    self.ty
  }

  pub fn import(&self) -> ImportMarker {
    self.import
  }

  pub fn contract(&self) -> Contract {
    Contract::new(self.ty, self.contract_name.clone())
  }

  /// Whether the member can receive an injected value at all.
  pub fn is_injectable(&self) -> bool {
    self.settable && !self.is_static
  }
}

impl fmt::Debug for MemberInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MemberInfo")
      .field("name", &self.name)
      .field("ty", &self.ty)
      .field("import", &self.import)
      .field("visibility", &self.visibility)
      .field("is_static", &self.is_static)
      .field("settable", &self.settable)
      .finish_non_exhaustive()
  }
}

pub struct MethodInfo {
  pub(crate) name: &'static str,
  pub(crate) params: Vec<ParameterInfo>,
  pub(crate) import: ImportMarker,
  pub(crate) visibility: Visibility,
  pub(crate) is_static: bool,
  pub(crate) invoke: MethodInvoker,
}

impl MethodInfo {
  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn params(&self) -> &[ParameterInfo] {
    &self.params
  }

  pub fn import(&self) -> ImportMarker {
    self.import
  }
}

impl fmt::Debug for MethodInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MethodInfo")
      .field("name", &self.name)
      .field("params", &self.params)
      .field("import", &self.import)
      .finish_non_exhaustive()
  }
}

/// Everything the container knows about a constructible type.
pub struct TypeInfo {
  key: TypeKey,
  kind: TypeKind,
  pub(crate) constructors: Vec<ConstructorInfo>,
  pub(crate) fields: Vec<MemberInfo>,
  pub(crate) properties: Vec<MemberInfo>,
  pub(crate) methods: Vec<MethodInfo>,
  casts: HashMap<TypeId, Caster>,
  finish: Finisher,
}

impl TypeInfo {
  pub fn of<T: Injectable>() -> TypeInfo {
    let mut describe = Describe::<T>::new();
    T::describe(&mut describe);
    describe.finish()
  }

  pub fn key(&self) -> TypeKey {
    self.key
  }

  pub fn kind(&self) -> TypeKind {
    self.kind
  }

  pub fn constructors(&self) -> &[ConstructorInfo] {
    &self.constructors
  }

  pub fn fields(&self) -> &[MemberInfo] {
    &self.fields
  }

  pub fn properties(&self) -> &[MemberInfo] {
    &self.properties
  }

  pub fn methods(&self) -> &[MethodInfo] {
    &self.methods
  }

  pub fn field(&self, name: &str) -> Option<&MemberInfo> {
    self.fields.iter().find(|m| m.name == name)
  }

  pub fn property(&self, name: &str) -> Option<&MemberInfo> {
    self.properties.iter().find(|m| m.name == name)
  }

  /// A concrete type with at least one public constructor.
  pub fn is_constructible(&self) -> bool {
    self.kind == TypeKind::Concrete
      && self
        .constructors
        .iter()
        .any(|c| c.visibility == Visibility::Public)
  }

  /// Whether a value of this type can stand in for `target`.
  pub fn is_assignable_to(&self, target: TypeKey) -> bool {
    self.key == target || self.casts.contains_key(&target.id())
  }

  /// Re-types a value of this type as `target`.
  pub(crate) fn cast(&self, value: &Instance, target: TypeKey) -> Option<Instance> {
    if target == self.key {
      return Some(value.clone());
    }
    self.casts.get(&target.id()).and_then(|cast| cast(value))
  }

  /// Wraps a freshly built value in a shared handle.
  pub(crate) fn seal(&self, value: Box<dyn Any + Send + Sync>) -> Option<Instance> {
    (self.finish)(value)
  }
}

impl fmt::Debug for TypeInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TypeInfo")
      .field("key", &self.key)
      .field("kind", &self.kind)
      .field("constructors", &self.constructors.len())
      .field("fields", &self.fields.len())
      .field("properties", &self.properties.len())
      .field("methods", &self.methods.len())
      .field("casts", &self.casts.len())
      .finish()
  }
}

/// Collects the declarations of an [`Injectable`] type.
pub struct Describe<T> {
  kind: TypeKind,
  constructors: Vec<ConstructorInfo>,
  fields: Vec<MemberInfo>,
  properties: Vec<MemberInfo>,
  methods: Vec<MethodInfo>,
  casts: HashMap<TypeId, Caster>,
  dispose: Option<fn(&T) -> Result<(), BoxError>>,
}

impl<T: Injectable> Describe<T> {
  fn new() -> Self {
    Self {
      kind: TypeKind::Concrete,
      constructors: Vec::new(),
      fields: Vec::new(),
      properties: Vec::new(),
      methods: Vec::new(),
      casts: HashMap::new(),
      dispose: None,
    }
  }

  pub fn kind(&mut self, kind: TypeKind) -> &mut Self {
    self.kind = kind;
    self
  }

  pub fn constructor(&mut self) -> SignatureBuilder<'_, T, ForConstructor> {
    SignatureBuilder::new(self, ForConstructor { injection: false })
  }

  pub fn method(&mut self, name: &'static str) -> SignatureBuilder<'_, T, ForMethod> {
    SignatureBuilder::new(
      self,
      ForMethod {
        name,
        import: ImportMarker::None,
      },
    )
  }

  pub fn field<V, F>(&mut self, name: &'static str, set: F) -> MemberBuilder<'_>
  where
    V: ?Sized + Any + Send + Sync,
    F: Fn(&mut T, Arc<V>) + Send + Sync + 'static,
  {
    self.fields.push(member_info::<T, V, F>(name, set));
    let last = self.fields.len() - 1;
    MemberBuilder {
      member: &mut self.fields[last],
    }
  }

  pub fn property<V, F>(&mut self, name: &'static str, set: F) -> MemberBuilder<'_>
  where
    V: ?Sized + Any + Send + Sync,
    F: Fn(&mut T, Arc<V>) + Send + Sync + 'static,
  {
    self.properties.push(member_info::<T, V, F>(name, set));
    let last = self.properties.len() - 1;
    MemberBuilder {
      member: &mut self.properties[last],
    }
  }

  /// Declares that `T` can be used wherever an `I` is expected.
  pub fn implements<I, F>(&mut self, cast: F) -> &mut Self
  where
    I: ?Sized + Any + Send + Sync,
    F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
  {
    let caster: Caster = Arc::new(move |value: &Instance| value.map(|v: Arc<T>| cast(v)));
    self.casts.insert(TypeId::of::<I>(), caster);
    self
  }

  /// Runs `T`'s [`Dispose`] hook when a scope owning a cached `T` is disposed.
  pub fn disposable(&mut self) -> &mut Self
  where
    T: Dispose,
  {
    self.dispose = Some(<T as Dispose>::dispose);
    self
  }

  fn finish(self) -> TypeInfo {
    let dispose = self.dispose;
    let finish: Finisher = Arc::new(move |value: Box<dyn Any + Send + Sync>| -> Option<Instance> {
      let value = value.downcast::<T>().ok()?;
      let shared = Arc::new(*value);
      Some(match dispose {
        Some(hook) => Instance::with_dispose_fn(shared, hook),
        None => Instance::new(shared),
      })
    });
    TypeInfo {
      key: TypeKey::of::<T>(),
      kind: self.kind,
      constructors: self.constructors,
      fields: self.fields,
      properties: self.properties,
      methods: self.methods,
      casts: self.casts,
      finish,
    }
  }
}

fn member_info<T, V, F>(name: &'static str, set: F) -> MemberInfo
where
  T: Any + Send + Sync,
  V: ?Sized + Any + Send + Sync,
  F: Fn(&mut T, Arc<V>) + Send + Sync + 'static,
{
  let setter: Setter = Arc::new(
    move |target: &mut (dyn Any + Send + Sync), value: Instance| -> Result<(), BoxError> {
      let target = target.downcast_mut::<T>().ok_or(ArgumentError::Target {
        expected: std::any::type_name::<T>(),
      })?;
      let typed = value.downcast::<V>().ok_or(ArgumentError::Mismatch {
        name,
        expected: std::any::type_name::<V>(),
        actual: value.type_key().name(),
      })?;
      set(target, typed);
      Ok(())
    },
  );
  MemberInfo {
    name,
    ty: TypeKey::of::<V>(),
    contract_name: None,
    import: ImportMarker::None,
    visibility: Visibility::Public,
    is_static: false,
    settable: true,
    setter,
  }
}

/// Refines the field or property most recently declared.
pub struct MemberBuilder<'d> {
  member: &'d mut MemberInfo,
}

impl MemberBuilder<'_> {
  pub fn required(self) -> Self {
    self.member.import = ImportMarker::Required;
    self
  }

  pub fn optional(self) -> Self {
    self.member.import = ImportMarker::Optional;
    self
  }

  /// Resolves the member from a named registration.
  pub fn named(self, contract_name: &str) -> Self {
    self.member.contract_name = Some(Arc::from(contract_name));
    self
  }

  pub fn private(self) -> Self {
    self.member.visibility = Visibility::Private;
    self
  }

  pub fn static_member(self) -> Self {
    self.member.is_static = true;
    self
  }

  pub fn read_only(self) -> Self {
    self.member.settable = false;
    self
  }
}

pub struct ForConstructor {
  injection: bool,
}

pub struct ForMethod {
  name: &'static str,
  import: ImportMarker,
}

/// Declares a constructor or an injection method, parameter by parameter.
///
/// Parameter refinements (`named`, `optional`, `default_value`, ...) apply to
/// the parameter declared last.
pub struct SignatureBuilder<'d, T, K> {
  describe: &'d mut Describe<T>,
  params: Vec<ParameterInfo>,
  visibility: Visibility,
  is_static: bool,
  target: K,
  _marker: PhantomData<fn() -> T>,
}

impl<'d, T: Injectable, K> SignatureBuilder<'d, T, K> {
  fn new(describe: &'d mut Describe<T>, target: K) -> Self {
    Self {
      describe,
      params: Vec::new(),
      visibility: Visibility::Public,
      is_static: false,
      target,
      _marker: PhantomData,
    }
  }

  pub fn param<V: ?Sized + Any + Send + Sync>(mut self, name: &'static str) -> Self {
    self.params.push(ParameterInfo::new(name, TypeKey::of::<V>()));
    self
  }

  /// Declares a parameter whose type can be built without being registered.
  pub fn inject<V: Injectable>(mut self, name: &'static str) -> Self {
    let mut param = ParameterInfo::new(name, TypeKey::of::<V>());
    param.seed = Some(TypeInfo::of::<V>);
    self.params.push(param);
    self
  }

  pub fn named(mut self, contract_name: &str) -> Self {
    if let Some(param) = self.params.last_mut() {
      param.contract_name = Some(Arc::from(contract_name));
    }
    self
  }

  pub fn optional(mut self) -> Self {
    if let Some(param) = self.params.last_mut() {
      param.optional = true;
    }
    self
  }

  pub fn default_value<V: Any + Send + Sync>(mut self, value: V) -> Self {
    if let Some(param) = self.params.last_mut() {
      param.default = Some(Instance::new(Arc::new(value)));
    }
    self
  }

  pub fn by_ref(mut self) -> Self {
    if let Some(param) = self.params.last_mut() {
      param.by_ref = true;
    }
    self
  }

  /// Flags the parameter as an array or generic-typed parameter.
  pub fn generic(mut self) -> Self {
    if let Some(param) = self.params.last_mut() {
      param.generic = true;
    }
    self
  }

  pub fn private(mut self) -> Self {
    self.visibility = Visibility::Private;
    self
  }
}

impl<T: Injectable> SignatureBuilder<'_, T, ForConstructor> {
  /// Flags this constructor as the designated injection constructor.
  pub fn injection_constructor(mut self) -> Self {
    self.target.injection = true;
    self
  }

  pub fn build<F>(self, construct: F)
  where
    F: Fn(&mut Args) -> Result<T, BoxError> + Send + Sync + 'static,
  {
    let invoke: Invoker = Arc::new(
      move |mut args: Args| -> Result<Box<dyn Any + Send + Sync>, BoxError> {
        let value = construct(&mut args)?;
        Ok(Box::new(value))
      },
    );
    self.describe.constructors.push(ConstructorInfo {
      params: self.params,
      visibility: self.visibility,
      injection: self.target.injection,
      invoke,
    });
  }
}

impl<T: Injectable> SignatureBuilder<'_, T, ForMethod> {
  pub fn import(mut self, marker: ImportMarker) -> Self {
    self.target.import = marker;
    self
  }

  pub fn static_member(mut self) -> Self {
    self.is_static = true;
    self
  }

  pub fn build<F>(self, call: F)
  where
    F: Fn(&mut T, &mut Args) -> Result<(), BoxError> + Send + Sync + 'static,
  {
    let invoke: MethodInvoker = Arc::new(
      move |target: &mut (dyn Any + Send + Sync), mut args: Args| -> Result<(), BoxError> {
        let target = target
          .downcast_mut::<T>()
          .ok_or(ArgumentError::Target {
            expected: std::any::type_name::<T>(),
          })?;
        call(target, &mut args)
      },
    );
    self.describe.methods.push(MethodInfo {
      name: self.target.name,
      params: self.params,
      import: self.target.import,
      visibility: self.visibility,
      is_static: self.is_static,
      invoke,
    });
  }
}

/// Errors raised while unpacking arguments inside user-supplied constructors.
#[derive(Debug, Error)]
pub enum ArgumentError {
  #[error("no value was supplied for parameter `{0}`")]
  Missing(&'static str),
  #[error("more arguments were requested than the signature declares")]
  Exhausted,
  #[error("argument `{name}` is a `{actual}`, expected `{expected}`")]
  Mismatch {
    name: &'static str,
    expected: &'static str,
    actual: &'static str,
  },
  #[error("injection target is not a `{expected}`")]
  Target { expected: &'static str },
}

/// Resolved arguments handed to a constructor or injection method, in
/// declaration order.
pub struct Args {
  values: std::vec::IntoIter<(&'static str, Option<Instance>)>,
}

impl Args {
  pub(crate) fn new(values: Vec<(&'static str, Option<Instance>)>) -> Self {
    Self {
      values: values.into_iter(),
    }
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.len() == 0
  }

  /// Takes the next argument. Fails if it was optional and left unresolved.
  pub fn next<V: ?Sized + Any + Send + Sync>(&mut self) -> Result<Arc<V>, BoxError> {
    let (name, value) = self.values.next().ok_or(ArgumentError::Exhausted)?;
    let value = value.ok_or(ArgumentError::Missing(name))?;
    Self::typed(name, value)
  }

  /// Takes the next argument, yielding `None` for an unresolved optional parameter.
  pub fn next_optional<V: ?Sized + Any + Send + Sync>(
    &mut self,
  ) -> Result<Option<Arc<V>>, BoxError> {
    let (name, value) = self.values.next().ok_or(ArgumentError::Exhausted)?;
    value.map(|v| Self::typed(name, v)).transpose()
  }

  fn typed<V: ?Sized + Any + Send + Sync>(
    name: &'static str,
    value: Instance,
  ) -> Result<Arc<V>, BoxError> {
    value.downcast::<V>().ok_or_else(|| {
      Box::new(ArgumentError::Mismatch {
        name,
        expected: std::any::type_name::<V>(),
        actual: value.type_key().name(),
      }) as BoxError
    })
  }
}

/// The shared registry of type descriptions.
#[derive(Default)]
pub struct Catalog {
  types: DashMap<TypeId, Arc<TypeInfo>>,
}

impl Catalog {
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns the description of `T`, describing it on first use.
  pub fn describe<T: Injectable>(&self) -> Arc<TypeInfo> {
    self.seed(TypeKey::of::<T>(), TypeInfo::of::<T>)
  }

  pub(crate) fn seed(&self, key: TypeKey, seed: Seed) -> Arc<TypeInfo> {
    if let Some(info) = self.types.get(&key.id()) {
      return info.value().clone();
    }
    let info = Arc::new(seed());
    self.types.entry(key.id()).or_insert(info).value().clone()
  }

  pub fn get(&self, key: TypeKey) -> Option<Arc<TypeInfo>> {
    self.types.get(&key.id()).map(|info| info.value().clone())
  }

  pub fn contains(&self, key: TypeKey) -> bool {
    self.types.contains_key(&key.id())
  }

  /// Whether a value of type `from` can be used where `to` is expected.
  pub fn is_assignable(&self, from: TypeKey, to: TypeKey) -> bool {
    from == to
      || self
        .get(from)
        .map(|info| info.is_assignable_to(to))
        .unwrap_or(false)
  }

  /// Re-types `value` as `to`, when its type declares the cast.
  pub fn convert(&self, value: &Instance, to: TypeKey) -> Option<Instance> {
    let from = value.type_key();
    if from == to {
      return Some(value.clone());
    }
    self.get(from).and_then(|info| info.cast(value, to))
  }
}

impl fmt::Debug for Catalog {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Catalog")
      .field("types", &self.types.len())
      .finish()
  }
}
