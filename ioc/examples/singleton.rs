use fibre_di::{resolve, Container, LifetimeKind, Registration};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};

// A simple service that gets a unique ID upon creation.
struct RequestTracker {
  id: usize,
}

// A thread-safe counter to generate unique IDs.
static ID_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn tracker_factory() -> Result<Arc<RequestTracker>, fibre_di::BoxError> {
  Ok(Arc::new(RequestTracker {
    id: ID_COUNTER.fetch_add(1, Ordering::SeqCst),
  }))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  let container = Container::new();

  // --- Container-Controlled Registration ---
  // This factory will only be called ONCE.
  container.register_factory(
    |_| {
      println!("Creating SINGLETON RequestTracker...");
      tracker_factory()
    },
    Registration::new()
      .named("singleton_tracker")
      .lifetime(LifetimeKind::ContainerControlled),
  )?;

  // --- Transient Registration ---
  // This factory will be called EVERY time the service is resolved.
  container.register_factory(
    |_| {
      println!("Creating TRANSIENT RequestTracker...");
      tracker_factory()
    },
    Registration::new().named("transient_tracker"),
  )?;

  println!("--- Resolving Singletons ---");
  let s1 = resolve!(container, RequestTracker, "singleton_tracker");
  let s2 = resolve!(container, RequestTracker, "singleton_tracker");
  println!("Singleton 1 ID: {}, Singleton 2 ID: {}", s1.id, s2.id);
  assert_eq!(s1.id, 0);
  assert!(Arc::ptr_eq(&s1, &s2), "Singleton instances should be identical");

  println!("\n--- Resolving Transients ---");
  let t1 = resolve!(container, RequestTracker, "transient_tracker");
  let t2 = resolve!(container, RequestTracker, "transient_tracker");
  println!("Transient 1 ID: {}, Transient 2 ID: {}", t1.id, t2.id);
  assert_eq!((t1.id, t2.id), (1, 2));
  assert!(!Arc::ptr_eq(&t1, &t2), "Transient instances should be different");

  // Disposing the container releases everything it cached.
  container.dispose();
  Ok(())
}
