use fibre_di::{
  BuildError, Container, Contract, Describe, Injectable, LifetimeKind, Registration,
  ResolutionError,
};
use std::error::Error;
use std::sync::Arc;

// --- Test Fixtures ---

#[derive(Debug)]
struct Alpha {
  _beta: Arc<Beta>,
}

#[derive(Debug)]
struct Beta {
  _alpha: Arc<Alpha>,
}

impl Injectable for Alpha {
  fn describe(d: &mut Describe<Self>) {
    d.constructor()
      .param::<Beta>("beta")
      .build(|args| Ok(Alpha { _beta: args.next()? }));
  }
}

impl Injectable for Beta {
  fn describe(d: &mut Describe<Self>) {
    d.constructor()
      .param::<Alpha>("alpha")
      .build(|args| Ok(Beta { _alpha: args.next()? }));
  }
}

#[derive(Debug)]
struct Outer {
  _inner: Arc<u8>,
}

impl Injectable for Outer {
  fn describe(d: &mut Describe<Self>) {
    d.constructor()
      .param::<u8>("inner")
      .build(|args| Ok(Outer { _inner: args.next()? }));
  }
}

#[derive(Debug)]
struct Exploding;

impl Injectable for Exploding {
  fn describe(d: &mut Describe<Self>) {
    d.constructor().build(|_| -> Result<Exploding, _> { panic!("constructor exploded") });
  }
}

#[derive(Debug)]
struct Level1(Arc<Level2>);
#[derive(Debug)]
struct Level2(Arc<Level3>);
#[derive(Debug)]
struct Level3(Arc<Level4>);
#[derive(Debug)]
struct Level4;

impl Injectable for Level1 {
  fn describe(d: &mut Describe<Self>) {
    d.constructor()
      .inject::<Level2>("next")
      .build(|args| Ok(Level1(args.next()?)));
  }
}

impl Injectable for Level2 {
  fn describe(d: &mut Describe<Self>) {
    d.constructor()
      .inject::<Level3>("next")
      .build(|args| Ok(Level2(args.next()?)));
  }
}

impl Injectable for Level3 {
  fn describe(d: &mut Describe<Self>) {
    d.constructor()
      .inject::<Level4>("next")
      .build(|args| Ok(Level3(args.next()?)));
  }
}

impl Injectable for Level4 {
  fn describe(d: &mut Describe<Self>) {
    d.constructor().build(|_| Ok(Level4));
  }
}

// --- Circular Dependencies ---

#[test]
fn test_circular_constructor_dependency_reports_path() {
  // Arrange
  let container = Container::new();
  container
    .register_type::<Alpha, Alpha>(Registration::new())
    .unwrap();
  container
    .register_type::<Beta, Beta>(Registration::new())
    .unwrap();

  // Act
  let err = container.resolve::<Alpha>().unwrap_err();

  // Assert
  assert!(err.is_circular());
  match err {
    ResolutionError::CircularDependency { path, .. } => assert_eq!(
      path,
      vec![
        Contract::of::<Alpha>(),
        Contract::of::<Beta>(),
        Contract::of::<Alpha>(),
      ]
    ),
    other => panic!("expected a circular dependency, got {other}"),
  }
}

#[test]
fn test_circular_factories_surface_unwrapped() {
  // Arrange
  let container = Container::new();
  container
    .register_factory(
      |r| {
        let value = r.resolve::<u16>()?;
        Ok(Arc::new(*value as u8))
      },
      Registration::new(),
    )
    .unwrap();
  container
    .register_factory(
      |r| {
        let value = r.resolve::<u8>()?;
        Ok(Arc::new(u16::from(*value)))
      },
      Registration::new(),
    )
    .unwrap();

  // Act
  let err = container.resolve::<u8>().unwrap_err();

  // Assert
  assert!(err.is_circular());
  assert_eq!(err.contract(), &Contract::of::<u8>());
}

#[test]
fn test_self_dependent_singleton_fails_instead_of_deadlocking() {
  // Arrange
  let container = Container::new();
  container
    .register_factory(
      |r| {
        let value = r.resolve::<u32>()?;
        Ok(Arc::new(*value + 1))
      },
      Registration::new().lifetime(LifetimeKind::ContainerControlled),
    )
    .unwrap();

  // Act
  let err = container.resolve::<u32>().unwrap_err();

  // Assert
  assert!(err.is_circular());
  // The failed build cached nothing and released its lock.
  assert!(container.resolve::<u32>().unwrap_err().is_circular());
}

#[test]
fn test_resolving_through_the_container_handle_detects_cycles() {
  // Arrange
  let singleton = Container::new();
  singleton
    .register_factory(
      |r| {
        let value = r.container().resolve::<u32>()?;
        Ok(Arc::new(*value + 1))
      },
      Registration::new().lifetime(LifetimeKind::ContainerControlled),
    )
    .unwrap();
  let transient = Container::new();
  transient
    .register_factory(
      |r| {
        let value = r.container().resolve::<u32>()?;
        Ok(Arc::new(*value + 1))
      },
      Registration::new(),
    )
    .unwrap();

  // Act
  let from_singleton = singleton.resolve::<u32>().unwrap_err();
  let from_transient = transient.resolve::<u32>().unwrap_err();

  // Assert
  assert!(from_singleton.is_circular());
  assert!(from_transient.is_circular());
  assert!(singleton.resolve::<u32>().unwrap_err().is_circular());
}

#[test]
fn test_nested_container_resolve_of_another_type_succeeds() {
  // Arrange
  let container = Container::new();
  container
    .register_instance(Arc::new(4_u16), Registration::new())
    .unwrap();
  container
    .register_factory(
      |r| {
        let value = r.container().resolve::<u16>()?;
        Ok(Arc::new(u32::from(*value) * 2))
      },
      Registration::new().lifetime(LifetimeKind::ContainerControlled),
    )
    .unwrap();

  // Act
  let first = container.resolve::<u32>().unwrap();
  let second = container.resolve::<u32>().unwrap();

  // Assert
  assert_eq!(*first, 8);
  assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_mutually_dependent_singletons_fail_instead_of_deadlocking() {
  // Arrange
  let container = Container::new();
  container
    .register_factory(
      |r| {
        let value = r.resolve::<u16>()?;
        Ok(Arc::new(*value as u8))
      },
      Registration::new().lifetime(LifetimeKind::ContainerControlled),
    )
    .unwrap();
  container
    .register_factory(
      |r| {
        let value = r.container().resolve::<u8>()?;
        Ok(Arc::new(u16::from(*value)))
      },
      Registration::new().lifetime(LifetimeKind::ContainerControlled),
    )
    .unwrap();

  // Act
  let err = container.resolve::<u8>().unwrap_err();

  // Assert
  assert!(err.is_circular());
  assert_eq!(err.contract(), &Contract::of::<u8>());
}

// --- User Code Failures ---

#[test]
fn test_user_error_is_not_reported_as_circular() {
  // Arrange
  let container = Container::new();
  container
    .register_factory::<u8, _>(|_| Err("boom".into()), Registration::new())
    .unwrap();
  container
    .register_type::<Outer, Outer>(Registration::new())
    .unwrap();

  // Act
  let direct = container.resolve::<u8>().unwrap_err();
  let nested = container.resolve::<Outer>().unwrap_err();

  // Assert
  assert!(!direct.is_circular());
  assert!(matches!(direct, ResolutionError::UserCode { .. }));
  assert!(direct.to_string().contains("boom"));

  assert!(!nested.is_circular());
  assert!(matches!(
    &nested,
    ResolutionError::Dependency { site, .. } if site == "parameter `inner`"
  ));
  assert!(matches!(
    nested.root_cause(),
    ResolutionError::UserCode { .. }
  ));
  assert!(nested.source().is_some());
}

#[test]
fn test_panics_in_user_code_become_errors() {
  // Arrange
  let container = Container::new();
  container
    .register_factory::<u8, _>(|_| panic!("factory exploded"), Registration::new())
    .unwrap();
  container
    .register_type::<Exploding, Exploding>(Registration::new())
    .unwrap();

  // Act
  let from_factory = container.resolve::<u8>().unwrap_err();
  let from_constructor = container.resolve::<Exploding>().unwrap_err();

  // Assert
  assert!(matches!(from_factory, ResolutionError::UserCode { .. }));
  assert!(from_factory.to_string().contains("panicked: factory exploded"));
  assert!(matches!(from_constructor, ResolutionError::UserCode { .. }));
  assert!(from_constructor
    .to_string()
    .contains("panicked: constructor exploded"));
}

// --- Limits and Configuration ---

#[test]
fn test_resolution_depth_is_limited() {
  // Arrange
  let shallow = Container::builder().max_resolution_depth(3).build().unwrap();
  let deep = Container::new();
  shallow.describe::<Level1>();
  deep.describe::<Level1>();

  // Act
  let err = shallow.resolve::<Level1>().unwrap_err();
  let built = deep.resolve::<Level1>();

  // Assert
  assert!(matches!(
    err.root_cause(),
    ResolutionError::DepthExceeded { limit: 3, .. }
  ));
  assert!(built.is_ok());
}

#[test]
fn test_invalid_options_are_rejected() {
  assert_eq!(
    Container::builder().max_resolution_depth(0).build().err().map(|e| e.to_string()),
    Some(BuildError::ZeroDepth.to_string())
  );
  assert!(matches!(
    Container::builder()
      .default_instance_lifetime(LifetimeKind::PerThread)
      .build(),
    Err(BuildError::InvalidInstanceLifetime("per-thread"))
  ));
}

#[test]
fn test_missing_dependency_names_the_contract() {
  let container = Container::new();
  let err = container.resolve_named::<String>("missing").unwrap_err();

  assert!(matches!(err, ResolutionError::NotResolvable { .. }));
  assert_eq!(err.contract(), &Contract::named::<String>("missing"));
}
