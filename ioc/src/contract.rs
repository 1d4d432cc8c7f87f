//! Service identity: the `(type, name)` keys used for every registration and request.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Shared, cheaply cloneable registration name.
pub type Name = Option<Arc<str>>;

/// Identifies a Rust type at runtime.
///
/// Equality and hashing only consider the `TypeId`; the type name is carried
/// along for diagnostics.
#[derive(Clone, Copy)]
pub struct TypeKey {
  id: TypeId,
  name: &'static str,
}

impl TypeKey {
  pub fn of<T: ?Sized + Any>() -> Self {
    Self {
      id: TypeId::of::<T>(),
      name: std::any::type_name::<T>(),
    }
  }

  pub fn id(&self) -> TypeId {
    self.id
  }

  pub fn name(&self) -> &'static str {
    self.name
  }
}

impl PartialEq for TypeKey {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.id.hash(state);
  }
}

impl fmt::Debug for TypeKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "TypeKey({})", self.name)
  }
}

impl fmt::Display for TypeKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name)
  }
}

/// An immutable `(type, name)` key identifying a requested or registered service.
///
/// A `None` name denotes the default registration for the type.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Contract {
  ty: TypeKey,
  name: Name,
}

impl Contract {
  pub fn new(ty: TypeKey, name: Name) -> Self {
    Self { ty, name }
  }

  pub fn of<T: ?Sized + Any>() -> Self {
    Self::new(TypeKey::of::<T>(), None)
  }

  pub fn named<T: ?Sized + Any>(name: &str) -> Self {
    Self::new(TypeKey::of::<T>(), Some(Arc::from(name)))
  }

  pub(crate) fn from_parts<T: ?Sized + Any>(name: Option<&str>) -> Self {
    Self::new(TypeKey::of::<T>(), name.map(Arc::from))
  }

  pub fn ty(&self) -> TypeKey {
    self.ty
  }

  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  pub(crate) fn name_arc(&self) -> &Name {
    &self.name
  }
}

impl fmt::Debug for Contract {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.name {
      Some(name) => write!(f, "Contract({}, Name({}))", self.ty.name, name),
      None => write!(f, "Contract({})", self.ty.name),
    }
  }
}

impl fmt::Display for Contract {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.name {
      Some(name) => write!(f, "{} (\"{}\")", self.ty.name, name),
      None => f.write_str(self.ty.name),
    }
  }
}
