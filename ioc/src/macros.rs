//! Public macros for ergonomic service resolution.

/// Resolves a service from a container, panicking if it cannot be built.
///
/// Use it where a missing dependency is a programming error. For a
/// non-panicking version, call [`Container::resolve`](crate::Container::resolve)
/// or [`Container::get`](crate::Container::get) directly.
///
/// # Panics
///
/// Panics with the resolution error if the service cannot be resolved.
///
/// # Examples
///
/// ```
/// use fibre_di::{resolve, Container, Registration};
/// use std::sync::Arc;
///
/// let container = Container::new();
/// container
///   .register_instance(Arc::new(String::from("hello")), Registration::new())
///   .unwrap();
///
/// let message = resolve!(container, String);
/// assert_eq!(*message, "hello");
/// ```
///
/// ```
/// use fibre_di::{resolve, Container, Registration};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync { fn greet(&self) -> String; }
/// struct EnglishGreeter;
/// impl Greeter for EnglishGreeter { fn greet(&self) -> String { "Hello!".to_string() } }
///
/// let container = Container::new();
/// container
///   .register_factory(
///     |_| Ok(Arc::new(EnglishGreeter) as Arc<dyn Greeter>),
///     Registration::new().named("en"),
///   )
///   .unwrap();
///
/// let greeter = resolve!(container, trait Greeter, "en");
/// assert_eq!(greeter.greet(), "Hello!");
/// ```
#[macro_export]
macro_rules! resolve {
  // resolve!(container, trait MyTrait)
  ($container:expr, trait $trait_ident:ident) => {
    $container
      .resolve::<dyn $trait_ident>()
      .unwrap_or_else(|err| {
        panic!(
          "Failed to resolve required trait service {}: {}",
          std::any::type_name::<dyn $trait_ident>(),
          err
        )
      })
  };

  // resolve!(container, trait MyTrait, "name")
  ($container:expr, trait $trait_ident:ident, $name:expr) => {
    $container
      .resolve_named::<dyn $trait_ident>($name)
      .unwrap_or_else(|err| {
        panic!(
          "Failed to resolve required trait service {} named '{}': {}",
          std::any::type_name::<dyn $trait_ident>(),
          $name,
          err
        )
      })
  };

  // resolve!(container, MyService)
  ($container:expr, $type:ty) => {
    $container.resolve::<$type>().unwrap_or_else(|err| {
      panic!(
        "Failed to resolve required service {}: {}",
        std::any::type_name::<$type>(),
        err
      )
    })
  };

  // resolve!(container, MyService, "name")
  ($container:expr, $type:ty, $name:expr) => {
    $container.resolve_named::<$type>($name).unwrap_or_else(|err| {
      panic!(
        "Failed to resolve required service {} named '{}': {}",
        std::any::type_name::<$type>(),
        $name,
        err
      )
    })
  };
}
