use fibre_di::{resolve, Container, Describe, Injectable, LifetimeKind, Registration};
use std::sync::Arc;

// 1. Define the abstraction (the trait)
trait Logger: Send + Sync {
  fn log(&self, message: &str);
}

// 2. Define a concrete implementation and declare that it can stand in for `dyn Logger`
struct ConsoleLogger;
impl Logger for ConsoleLogger {
  fn log(&self, message: &str) {
    println!("[CONSOLE LOG]: {}", message);
  }
}

impl Injectable for ConsoleLogger {
  fn describe(d: &mut Describe<Self>) {
    d.constructor().build(|_| Ok(ConsoleLogger));
    d.implements::<dyn Logger, _>(|l| l as Arc<dyn Logger>);
  }
}

// 3. Define a service that depends on the abstraction
struct ReportService {
  logger: Arc<dyn Logger>,
}

impl Injectable for ReportService {
  fn describe(d: &mut Describe<Self>) {
    d.constructor()
      .param::<dyn Logger>("logger")
      .build(|args| Ok(ReportService { logger: args.next()? }));
  }
}

impl ReportService {
  fn generate_report(&self) {
    self.logger.log("Starting report generation.");
    // ... logic to generate report ...
    self.logger.log("Finished report generation.");
  }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  let container = Container::new();

  // --- Registration ---

  // Register ConsoleLogger as the implementation for the `dyn Logger` trait.
  // The container builds an Arc<ConsoleLogger> but serves it as Arc<dyn Logger>.
  container.register_type::<dyn Logger, ConsoleLogger>(
    Registration::new().lifetime(LifetimeKind::ContainerControlled),
  )?;

  // ReportService never creates its logger. The container picks its constructor
  // and resolves the `logger` parameter.
  container.register_type::<ReportService, ReportService>(Registration::new())?;

  // --- Resolution and Usage ---
  println!("Resolving the high-level service...");
  let report_service = resolve!(container, ReportService);

  println!("Using the service...");
  report_service.generate_report();
  Ok(())
}
