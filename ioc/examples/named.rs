use fibre_di::{resolve, Container, LifetimeKind, Registration};
use std::sync::Arc;

// --- Abstraction and Implementations ---
trait MessageSender: Send + Sync {
  fn send(&self, to: &str, message: &str) -> String;
}

struct EmailSender;
impl MessageSender for EmailSender {
  fn send(&self, to: &str, message: &str) -> String {
    format!("Sending email to {}: '{}'", to, message)
  }
}

struct SmsSender;
impl MessageSender for SmsSender {
  fn send(&self, to: &str, message: &str) -> String {
    format!("Sending SMS to {}: '{}'", to, message)
  }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  let container = Container::new();

  // --- Registration ---
  // Register both implementations with unique names.
  let singleton = || Registration::new().lifetime(LifetimeKind::ContainerControlled);
  container.register_factory(
    |_| Ok(Arc::new(EmailSender) as Arc<dyn MessageSender>),
    singleton().named("email"),
  )?;
  container.register_factory(
    |_| Ok(Arc::new(SmsSender) as Arc<dyn MessageSender>),
    singleton().named("sms"),
  )?;

  // --- Resolution ---
  // The name picks the implementation at the point of resolution.
  let email_notifier = resolve!(container, trait MessageSender, "email");
  let sms_notifier = resolve!(container, trait MessageSender, "sms");

  let result1 = email_notifier.send("test@example.com", "Hello from Fibre!");
  let result2 = sms_notifier.send("+123456789", "Hello from Fibre!");

  println!("{}", result1);
  println!("{}", result2);

  assert!(result1.contains("email"));
  assert!(result2.contains("SMS"));
  Ok(())
}
