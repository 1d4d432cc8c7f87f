use fibre_di::{Container, LifetimeKind, Registration};
use std::sync::Arc;

// A function that configures dependencies and runs some logic.
// By accepting a `&Container`, it can run against any scope.
fn process_data(container: &Container) -> String {
  let data = container
    .get::<String>(None)
    .expect("Data not found in container");
  format!("Processed: {}", data.to_uppercase())
}

struct RequestId(usize);

fn main() -> Result<(), Box<dyn std::error::Error>> {
  let root = Container::new();
  root.register_instance(Arc::new(String::from("shared data")), Registration::new())?;
  root.register_factory(
    |_| {
      static NEXT: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);
      Ok(Arc::new(RequestId(NEXT.fetch_add(1, std::sync::atomic::Ordering::SeqCst))))
    },
    Registration::new().lifetime(LifetimeKind::Hierarchical),
  )?;

  // --- A child scope falls back to its parent ---
  let request = root.create_child_container();
  println!("{}", process_data(&request));

  // --- ...and may shadow it without touching the parent ---
  let test_scope = root.create_child_container();
  test_scope.register_instance(Arc::new(String::from("test data")), Registration::new())?;
  let result = process_data(&test_scope);
  println!("Result: {}", result);
  assert_eq!(result, "Processed: TEST DATA");
  assert_eq!(process_data(&root), "Processed: SHARED DATA");

  // --- Hierarchical lifetimes keep one value per scope ---
  let first = request.resolve::<RequestId>()?;
  let again = request.resolve::<RequestId>()?;
  let other = test_scope.resolve::<RequestId>()?;
  assert!(Arc::ptr_eq(&first, &again));
  assert_ne!(first.0, other.0);
  println!("Request scopes got ids {} and {}", first.0, other.0);

  // Disposing a child leaves the parent untouched.
  request.dispose();
  assert!(!root.is_disposed());
  Ok(())
}
