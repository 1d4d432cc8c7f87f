use fibre_di::{
  BoxError, Container, Describe, Dispose, Injectable, LifetimeKind, Registration, ResolutionError,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// --- Test Fixtures ---

struct Service {
  id: usize,
}

struct Pair {
  left: Arc<Service>,
  right: Arc<Service>,
}

impl Injectable for Pair {
  fn describe(d: &mut Describe<Self>) {
    d.constructor()
      .param::<Service>("left")
      .param::<Service>("right")
      .build(|args| {
        Ok(Pair {
          left: args.next()?,
          right: args.next()?,
        })
      });
  }
}

type Log = Arc<Mutex<Vec<&'static str>>>;

struct Tracked {
  name: &'static str,
  log: Log,
}

impl Dispose for Tracked {
  fn dispose(&self) -> Result<(), BoxError> {
    self.log.lock().push(self.name);
    Ok(())
  }
}

struct Faulty;

impl Dispose for Faulty {
  fn dispose(&self) -> Result<(), BoxError> {
    Err("disposal failed".into())
  }
}

struct Panicky;

impl Dispose for Panicky {
  fn dispose(&self) -> Result<(), BoxError> {
    panic!("disposal panicked")
  }
}

/// Registers a `Service` factory and returns its build counter.
fn counting_factory(container: &Container, lifetime: LifetimeKind) -> Arc<AtomicUsize> {
  let builds = Arc::new(AtomicUsize::new(0));
  let counter = builds.clone();
  container
    .register_factory(
      move |_| {
        let id = counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(Service { id }))
      },
      Registration::new().lifetime(lifetime),
    )
    .unwrap();
  builds
}

fn tracked_factory(container: &Container, name: &'static str, log: &Log, lifetime: LifetimeKind) {
  let log = log.clone();
  container
    .register_disposable_factory(
      move |_| {
        Ok(Arc::new(Tracked {
          name,
          log: log.clone(),
        }))
      },
      Registration::new().named(name).lifetime(lifetime),
    )
    .unwrap();
}

// --- Caching ---

#[test]
fn test_container_controlled_builds_once() {
  // Arrange
  let container = Container::new();
  let builds = counting_factory(&container, LifetimeKind::ContainerControlled);

  // Act
  let r1 = container.resolve::<Service>().unwrap();
  let r2 = container.resolve::<Service>().unwrap();

  // Assert
  assert!(Arc::ptr_eq(&r1, &r2));
  assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn test_singleton_factory_is_called_only_once_under_concurrency() {
  // Arrange
  let container = Container::new();
  let builds = Arc::new(AtomicUsize::new(0));
  let counter = builds.clone();
  container
    .register_factory(
      move |_| {
        let id = counter.fetch_add(1, Ordering::SeqCst);
        // Widen the window for a racing second build.
        thread::sleep(Duration::from_millis(50));
        Ok(Arc::new(Service { id }))
      },
      Registration::new().lifetime(LifetimeKind::ContainerControlled),
    )
    .unwrap();

  // Act
  let resolved: Vec<Arc<Service>> = thread::scope(|s| {
    let handles: Vec<_> = (0..20)
      .map(|_| s.spawn(|| container.resolve::<Service>().unwrap()))
      .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
  });

  // Assert
  assert_eq!(builds.load(Ordering::SeqCst), 1);
  assert!(resolved.iter().all(|s| Arc::ptr_eq(s, &resolved[0])));
}

#[test]
fn test_per_thread_caches_one_value_per_thread() {
  // Arrange
  let container = Container::new();
  let builds = counting_factory(&container, LifetimeKind::PerThread);

  // Act
  let (a, b) = thread::scope(|s| {
    let resolve_twice = || {
      let first = container.resolve::<Service>().unwrap();
      let second = container.resolve::<Service>().unwrap();
      assert!(Arc::ptr_eq(&first, &second));
      first
    };
    let h1 = s.spawn(resolve_twice);
    let h2 = s.spawn(resolve_twice);
    (h1.join().unwrap(), h2.join().unwrap())
  });

  // Assert
  assert!(!Arc::ptr_eq(&a, &b));
  assert_eq!(builds.load(Ordering::SeqCst), 2);
}

struct Released(Arc<AtomicUsize>);

impl Drop for Released {
  fn drop(&mut self) {
    self.0.fetch_add(1, Ordering::SeqCst);
  }
}

#[test]
fn test_per_thread_values_are_released_when_their_thread_exits() {
  // Arrange
  const THREADS: usize = 8;
  let container = Container::new();
  let released = Arc::new(AtomicUsize::new(0));
  let counter = released.clone();
  container
    .register_factory(
      move |_| Ok(Arc::new(Released(counter.clone()))),
      Registration::new().lifetime(LifetimeKind::PerThread),
    )
    .unwrap();

  // Act
  let handles: Vec<_> = (0..THREADS)
    .map(|_| {
      let container = container.clone();
      thread::spawn(move || {
        let first = container.resolve::<Released>().unwrap();
        let second = container.resolve::<Released>().unwrap();
        Arc::ptr_eq(&first, &second)
      })
    })
    .collect();
  let shared: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();

  // Assert
  assert!(shared.iter().all(|same| *same));
  assert_eq!(released.load(Ordering::SeqCst), THREADS);
}

#[test]
fn test_per_resolve_shares_within_one_call_only() {
  // Arrange
  let container = Container::new();
  let builds = counting_factory(&container, LifetimeKind::PerResolve);
  container
    .register_type::<Pair, Pair>(Registration::new())
    .unwrap();

  // Act
  let first = container.resolve::<Pair>().unwrap();
  let second = container.resolve::<Pair>().unwrap();

  // Assert
  assert!(Arc::ptr_eq(&first.left, &first.right));
  assert!(Arc::ptr_eq(&second.left, &second.right));
  assert!(!Arc::ptr_eq(&first.left, &second.left));
  assert_eq!(builds.load(Ordering::SeqCst), 2);
}

#[test]
fn test_transient_dependencies_are_distinct() {
  // Arrange
  let container = Container::new();
  let builds = counting_factory(&container, LifetimeKind::Transient);
  container
    .register_type::<Pair, Pair>(Registration::new())
    .unwrap();

  // Act
  let pair = container.resolve::<Pair>().unwrap();

  // Assert
  assert_ne!(pair.left.id, pair.right.id);
  assert_eq!(builds.load(Ordering::SeqCst), 2);
}

#[test]
fn test_externally_controlled_rebuilds_after_release() {
  // Arrange
  let container = Container::new();
  let builds = counting_factory(&container, LifetimeKind::ExternallyControlled);

  // Act
  let r1 = container.resolve::<Service>().unwrap();
  let r2 = container.resolve::<Service>().unwrap();
  assert!(Arc::ptr_eq(&r1, &r2));
  drop(r1);
  drop(r2);
  let r3 = container.resolve::<Service>().unwrap();

  // Assert
  assert_eq!(r3.id, 1);
  assert_eq!(builds.load(Ordering::SeqCst), 2);
}

#[test]
fn test_externally_controlled_instance_is_released_with_its_owner() {
  // Arrange
  let container = Container::new();
  let service = Arc::new(Service { id: 9 });
  container
    .register_instance(
      service.clone(),
      Registration::new().lifetime(LifetimeKind::ExternallyControlled),
    )
    .unwrap();
  assert_eq!(container.resolve::<Service>().unwrap().id, 9);

  // Act
  drop(service);
  let result = container.resolve::<Service>();

  // Assert
  assert!(matches!(
    result,
    Err(ResolutionError::InstanceReleased { .. })
  ));
}

// --- Hierarchy ---

#[test]
fn test_hierarchical_keeps_one_value_per_scope() {
  // Arrange
  let root = Container::new();
  let builds = counting_factory(&root, LifetimeKind::Hierarchical);
  let child = root.create_child_container();

  // Act
  let in_root = root.resolve::<Service>().unwrap();
  let in_child = child.resolve::<Service>().unwrap();
  let in_child_again = child.resolve::<Service>().unwrap();

  // Assert
  assert!(!Arc::ptr_eq(&in_root, &in_child));
  assert!(Arc::ptr_eq(&in_child, &in_child_again));
  assert!(Arc::ptr_eq(&in_root, &root.resolve::<Service>().unwrap()));
  assert_eq!(builds.load(Ordering::SeqCst), 2);
}

#[test]
fn test_container_controlled_is_shared_with_children() {
  // Arrange
  let root = Container::new();
  let builds = counting_factory(&root, LifetimeKind::ContainerControlled);
  let child = root.create_child_container();

  // Act
  let from_child = child.resolve::<Service>().unwrap();
  let from_root = root.resolve::<Service>().unwrap();

  // Assert
  assert!(Arc::ptr_eq(&from_child, &from_root));
  assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn test_hierarchical_instance_is_shared_with_children() {
  // Arrange
  let root = Container::new();
  let service = Arc::new(Service { id: 4 });
  root
    .register_instance(
      service.clone(),
      Registration::new().lifetime(LifetimeKind::Hierarchical),
    )
    .unwrap();
  let child = root.create_child_container();

  // Act
  let resolved = child.resolve::<Service>().unwrap();

  // Assert
  assert!(Arc::ptr_eq(&resolved, &service));
}

// --- Disposal ---

#[test]
fn test_dispose_runs_in_reverse_cache_order_once() {
  // Arrange
  let container = Container::new();
  let log: Log = Arc::default();
  tracked_factory(&container, "first", &log, LifetimeKind::ContainerControlled);
  tracked_factory(&container, "second", &log, LifetimeKind::ContainerControlled);
  tracked_factory(&container, "transient", &log, LifetimeKind::Transient);
  container.resolve_named::<Tracked>("first").unwrap();
  container.resolve_named::<Tracked>("second").unwrap();
  container.resolve_named::<Tracked>("transient").unwrap();

  // Act
  container.dispose();
  container.dispose();

  // Assert
  assert_eq!(*log.lock(), vec!["second", "first"]);
  assert!(container.is_disposed());
}

#[test]
fn test_disposed_scope_serves_cached_values_but_builds_nothing() {
  // Arrange
  let container = Container::new();
  let log: Log = Arc::default();
  tracked_factory(&container, "cached", &log, LifetimeKind::ContainerControlled);
  tracked_factory(&container, "unbuilt", &log, LifetimeKind::ContainerControlled);
  let cached = container.resolve_named::<Tracked>("cached").unwrap();

  // Act
  container.dispose();

  // Assert
  let again = container.resolve_named::<Tracked>("cached").unwrap();
  assert!(Arc::ptr_eq(&cached, &again));
  assert!(matches!(
    container.resolve_named::<Tracked>("unbuilt"),
    Err(ResolutionError::ScopeDisposed { .. })
  ));
}

#[test]
fn test_disposal_failures_do_not_stop_other_disposals() {
  // Arrange
  let container = Container::new();
  let log: Log = Arc::default();
  tracked_factory(&container, "survivor", &log, LifetimeKind::ContainerControlled);
  container
    .register_disposable_instance(Arc::new(Faulty), Registration::new())
    .unwrap();
  container
    .register_disposable_instance(Arc::new(Panicky), Registration::new())
    .unwrap();
  container.resolve_named::<Tracked>("survivor").unwrap();

  // Act
  container.dispose();

  // Assert
  assert_eq!(*log.lock(), vec!["survivor"]);
}

#[test]
fn test_dropping_last_handle_disposes_scope() {
  // Arrange
  let root = Container::new();
  let log: Log = Arc::default();
  let child = root.create_child_container();
  tracked_factory(&child, "scoped", &log, LifetimeKind::ContainerControlled);
  let scoped = child.resolve_named::<Tracked>("scoped").unwrap();

  // Act
  drop(child);

  // Assert
  assert_eq!(*log.lock(), vec!["scoped"]);
  assert_eq!(scoped.name, "scoped");
  assert!(!root.is_disposed());
}

#[test]
fn test_disposing_child_leaves_parent_values_alone() {
  // Arrange
  let root = Container::new();
  let log: Log = Arc::default();
  tracked_factory(&root, "hierarchical", &log, LifetimeKind::Hierarchical);
  let child = root.create_child_container();
  root.resolve_named::<Tracked>("hierarchical").unwrap();
  child.resolve_named::<Tracked>("hierarchical").unwrap();

  // Act
  child.dispose();

  // Assert
  assert_eq!(*log.lock(), vec!["hierarchical"]);
  root.dispose();
  assert_eq!(*log.lock(), vec!["hierarchical", "hierarchical"]);
}
