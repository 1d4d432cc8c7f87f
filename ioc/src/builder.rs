use crate::config::{ContainerOptions, Policies};
use crate::container::Container;
use crate::error::BuildError;
use crate::lifetime::LifetimeKind;
use crate::pipeline::PipelineMode;
use crate::scope::Scope;
use std::fmt;
use std::sync::Arc;

/// A builder for creating root [`Container`]s.
///
/// # Examples
///
/// ```
/// use fibre_di::{Container, LifetimeKind, PipelineMode};
///
/// let container = Container::builder()
///   .default_type_lifetime(LifetimeKind::ContainerControlled)
///   .pipeline_mode(PipelineMode::Interpreted)
///   .max_resolution_depth(64)
///   .build()
///   .unwrap();
///
/// assert_eq!(container.options().max_resolution_depth, 64);
/// ```
#[derive(Default)]
pub struct ContainerBuilder {
  options: ContainerOptions,
  policies: Option<Arc<Policies>>,
}

impl fmt::Debug for ContainerBuilder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ContainerBuilder")
      .field("options", &self.options)
      .field("shared_policies", &self.policies.is_some())
      .finish()
  }
}

impl ContainerBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Replaces all options at once, e.g. with a deserialized set.
  pub fn options(mut self, options: ContainerOptions) -> Self {
    self.options = options;
    self
  }

  pub fn default_type_lifetime(mut self, kind: LifetimeKind) -> Self {
    self.options.default_type_lifetime = kind;
    self
  }

  pub fn default_factory_lifetime(mut self, kind: LifetimeKind) -> Self {
    self.options.default_factory_lifetime = kind;
    self
  }

  /// Must be a lifetime that can hold a value.
  pub fn default_instance_lifetime(mut self, kind: LifetimeKind) -> Self {
    self.options.default_instance_lifetime = kind;
    self
  }

  pub fn auto_inject_members(mut self, enabled: bool) -> Self {
    self.options.auto_inject_members = enabled;
    self
  }

  pub fn pipeline_mode(mut self, mode: PipelineMode) -> Self {
    self.options.pipeline_mode = mode;
    self
  }

  pub fn max_resolution_depth(mut self, depth: usize) -> Self {
    self.options.max_resolution_depth = depth;
    self
  }

  /// Shares an existing policy object (catalog, pipelines and options) with
  /// the new container. The options set on this builder are then ignored.
  pub fn policies(mut self, policies: Arc<Policies>) -> Self {
    self.policies = Some(policies);
    self
  }

  /// Builds a new root container.
  pub fn build(self) -> Result<Container, BuildError> {
    let policies = match self.policies {
      Some(policies) => policies,
      None => Arc::new(Policies::new(self.options)?),
    };
    Ok(Container::from_scope(Scope::root(policies)))
  }
}
