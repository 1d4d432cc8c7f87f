use fibre_di::{resolve, Container, ResolutionError};
use std::panic;

struct UnregisteredService;

fn main() {
  let container = Container::new();

  // --- Using the panicking `resolve!` macro ---
  println!("Attempting to resolve a service that was never registered...");

  let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
    // This line will panic!
    let _service = resolve!(container, UnregisteredService);
  }));

  assert!(result.is_err(), "resolve! should have panicked.");
  println!("Successfully caught the expected panic from resolve!.");

  // --- Using the fallible `resolve()` and `get()` methods ---
  println!("\nNow, attempting to resolve without panicking...");

  match container.resolve::<UnregisteredService>() {
    Err(err @ ResolutionError::NotResolvable { .. }) => println!("Correctly received: {err}"),
    Err(other) => panic!("Unexpected error: {other}"),
    Ok(_) => panic!("Should not have found the service!"),
  }

  assert!(container.get::<UnregisteredService>(None).is_none());
  println!("`get()` returned `None` for the missing service.");
}
