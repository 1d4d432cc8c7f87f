//! Tests for the `resolve!` macro against local containers.

use fibre_di::{resolve, Container, Registration};
use std::sync::Arc;

// --- Test Fixtures ---

struct MacroTestService {
  value: i32,
}

trait MacroTestTrait: Send + Sync {
  fn value(&self) -> i32;
}

impl MacroTestTrait for MacroTestService {
  fn value(&self) -> i32 {
    self.value
  }
}

struct UnregisteredService;

fn container() -> Container {
  let container = Container::new();
  container
    .register_instance(Arc::new(MacroTestService { value: 42 }), Registration::new())
    .unwrap();
  container
    .register_instance(
      Arc::new(MacroTestService { value: 43 }),
      Registration::new().named("named"),
    )
    .unwrap();
  container
    .register_factory(
      |_| Ok(Arc::new(MacroTestService { value: 44 }) as Arc<dyn MacroTestTrait>),
      Registration::new(),
    )
    .unwrap();
  container
    .register_factory(
      |_| Ok(Arc::new(MacroTestService { value: 45 }) as Arc<dyn MacroTestTrait>),
      Registration::new().named("named_trait"),
    )
    .unwrap();
  container
}

// --- Macro Tests ---

#[test]
fn test_resolve_success_cases() {
  // Arrange
  let container = container();

  // Act & Assert
  assert_eq!(resolve!(container, MacroTestService).value, 42);
  assert_eq!(resolve!(container, MacroTestService, "named").value, 43);
  assert_eq!(resolve!(container, trait MacroTestTrait).value(), 44);
  assert_eq!(resolve!(container, trait MacroTestTrait, "named_trait").value(), 45);
}

#[test]
fn test_resolve_from_child_container() {
  let root = container();
  let child = root.create_child_container();

  assert_eq!(resolve!(child, MacroTestService, "named").value, 43);
}

#[test]
#[should_panic(expected = "Failed to resolve required service")]
fn test_resolve_panics_on_unregistered_service() {
  let container = Container::new();
  let _service = resolve!(container, UnregisteredService);
}

#[test]
#[should_panic(expected = "named 'missing'")]
fn test_resolve_panics_on_missing_named_trait() {
  let container = container();
  let _service = resolve!(container, trait MacroTestTrait, "missing");
}
