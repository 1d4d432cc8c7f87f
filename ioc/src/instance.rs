//! Type-erased, shared handles to built objects.

use crate::contract::TypeKey;
use crate::error::BoxError;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

/// Structured teardown for services owned by a scope.
///
/// Disposal hooks run when the owning scope is disposed, most recently cached
/// first. Errors are logged and never reach the caller of `dispose`.
pub trait Dispose: Send + Sync {
  fn dispose(&self) -> Result<(), BoxError>;
}

type Disposer = Arc<dyn Fn() -> Result<(), BoxError> + Send + Sync>;

trait Slot: Send + Sync {
  fn as_any(&self) -> &dyn Any;
  fn type_key(&self) -> TypeKey;
  fn address(&self) -> *const ();
  fn downgrade(&self) -> Box<dyn WeakSlot>;
}

trait WeakSlot: Send + Sync {
  fn upgrade(&self) -> Option<Arc<dyn Slot>>;
}

struct Strong<T: ?Sized>(Arc<T>);

struct Held<T: ?Sized>(Weak<T>);

impl<T: ?Sized + Any + Send + Sync> Slot for Strong<T> {
  fn as_any(&self) -> &dyn Any {
    self
  }

  fn type_key(&self) -> TypeKey {
    TypeKey::of::<T>()
  }

  fn address(&self) -> *const () {
    Arc::as_ptr(&self.0) as *const ()
  }

  fn downgrade(&self) -> Box<dyn WeakSlot> {
    Box::new(Held(Arc::downgrade(&self.0)))
  }
}

impl<T: ?Sized + Any + Send + Sync> WeakSlot for Held<T> {
  fn upgrade(&self) -> Option<Arc<dyn Slot>> {
    self
      .0
      .upgrade()
      .map(|arc| Arc::new(Strong(arc)) as Arc<dyn Slot>)
  }
}

/// A cloneable, type-erased handle to a shared object.
///
/// Wraps an `Arc<T>` for any `T: ?Sized`, so trait objects can be stored and
/// resolved the same way as concrete types. Clones share the same object.
#[derive(Clone)]
pub struct Instance {
  slot: Arc<dyn Slot>,
  disposer: Option<Disposer>,
}

impl Instance {
  pub fn new<T: ?Sized + Any + Send + Sync>(value: Arc<T>) -> Self {
    Self {
      slot: Arc::new(Strong(value)),
      disposer: None,
    }
  }

  /// Wraps a value whose [`Dispose`] hook runs when its owning scope is disposed.
  pub fn disposable<T: ?Sized + Dispose + Any>(value: Arc<T>) -> Self {
    let hook = value.clone();
    Self {
      slot: Arc::new(Strong(value)),
      disposer: Some(Arc::new(move || hook.dispose())),
    }
  }

  pub(crate) fn with_dispose_fn<T: Any + Send + Sync>(
    value: Arc<T>,
    dispose: fn(&T) -> Result<(), BoxError>,
  ) -> Self {
    let hook = value.clone();
    Self {
      slot: Arc::new(Strong(value)),
      disposer: Some(Arc::new(move || dispose(&hook))),
    }
  }

  /// The type of the wrapped value.
  pub fn type_key(&self) -> TypeKey {
    self.slot.type_key()
  }

  pub fn downcast<T: ?Sized + Any + Send + Sync>(&self) -> Option<Arc<T>> {
    self
      .slot
      .as_any()
      .downcast_ref::<Strong<T>>()
      .map(|strong| strong.0.clone())
  }

  pub fn is<T: ?Sized + Any + Send + Sync>(&self) -> bool {
    self.slot.as_any().is::<Strong<T>>()
  }

  /// Whether both handles point at the same object.
  pub fn ptr_eq(&self, other: &Instance) -> bool {
    std::ptr::eq(self.slot.address(), other.slot.address())
  }

  pub fn is_disposable(&self) -> bool {
    self.disposer.is_some()
  }

  pub fn downgrade(&self) -> WeakInstance {
    WeakInstance {
      slot: self.slot.downgrade(),
      type_key: self.type_key(),
    }
  }

  /// Re-types the value through `cast`, keeping the disposal hook.
  pub(crate) fn map<T, U>(&self, cast: impl FnOnce(Arc<T>) -> Arc<U>) -> Option<Instance>
  where
    T: ?Sized + Any + Send + Sync,
    U: ?Sized + Any + Send + Sync,
  {
    let value = self.downcast::<T>()?;
    Some(Instance {
      slot: Arc::new(Strong(cast(value))),
      disposer: self.disposer.clone(),
    })
  }

  /// Runs the disposal hook, if any.
  pub(crate) fn dispose(&self) -> Result<(), BoxError> {
    match &self.disposer {
      Some(hook) => hook(),
      None => Ok(()),
    }
  }
}

impl fmt::Debug for Instance {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Instance")
      .field("type", &self.type_key().name())
      .field("address", &self.slot.address())
      .field("disposable", &self.is_disposable())
      .finish()
  }
}

/// A non-owning handle to an [`Instance`]. Never keeps the object alive and
/// never carries its disposal hook.
pub struct WeakInstance {
  slot: Box<dyn WeakSlot>,
  type_key: TypeKey,
}

impl WeakInstance {
  pub fn upgrade(&self) -> Option<Instance> {
    self.slot.upgrade().map(|slot| Instance {
      slot,
      disposer: None,
    })
  }

  pub fn type_key(&self) -> TypeKey {
    self.type_key
  }
}

impl fmt::Debug for WeakInstance {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WeakInstance")
      .field("type", &self.type_key.name())
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  trait Shape: Send + Sync {
    fn sides(&self) -> u32;
  }

  struct Square;
  impl Shape for Square {
    fn sides(&self) -> u32 {
      4
    }
  }

  #[test]
  fn downcasts_sized_and_unsized_values() {
    let concrete = Instance::new(Arc::new(42_u32));
    assert_eq!(*concrete.downcast::<u32>().unwrap(), 42);
    assert!(concrete.downcast::<i64>().is_none());

    let shape: Arc<dyn Shape> = Arc::new(Square);
    let erased = Instance::new(shape);
    assert_eq!(erased.downcast::<dyn Shape>().unwrap().sides(), 4);
    assert!(erased.is::<dyn Shape>());
  }

  #[test]
  fn clones_and_casts_keep_identity() {
    let square = Arc::new(Square);
    let a = Instance::new(square.clone());
    let b = a.clone();
    assert!(a.ptr_eq(&b));

    let as_shape = a.map(|s: Arc<Square>| s as Arc<dyn Shape>).unwrap();
    assert!(as_shape.ptr_eq(&a));
  }

  #[test]
  fn weak_handles_do_not_keep_values_alive() {
    let value = Instance::new(Arc::new(String::from("temp")));
    let weak = value.downgrade();
    assert!(weak.upgrade().is_some());
    drop(value);
    assert!(weak.upgrade().is_none());
  }

  #[test]
  fn disposer_survives_casts() {
    static DISPOSED: AtomicUsize = AtomicUsize::new(0);
    struct Pool;
    impl Dispose for Pool {
      fn dispose(&self) -> Result<(), BoxError> {
        DISPOSED.fetch_add(1, Ordering::SeqCst);
        Ok(())
      }
    }
    impl Shape for Pool {
      fn sides(&self) -> u32 {
        0
      }
    }

    let pool = Instance::disposable(Arc::new(Pool));
    let shape = pool.map(|p: Arc<Pool>| p as Arc<dyn Shape>).unwrap();
    assert!(shape.is_disposable());
    shape.dispose().unwrap();
    assert_eq!(DISPOSED.load(Ordering::SeqCst), 1);
  }
}
