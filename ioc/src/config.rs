use crate::error::BuildError;
use crate::lifetime::LifetimeKind;
use crate::metadata::Catalog;
use crate::pipeline::{PipelineMode, StrategyChains};

/// Defaults and limits shared by every scope of a container tree.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ContainerOptions {
  /// Lifetime used by type registrations that do not name one.
  pub default_type_lifetime: LifetimeKind,
  /// Lifetime used by factory registrations that do not name one.
  pub default_factory_lifetime: LifetimeKind,
  /// Lifetime used by instance registrations that do not name one.
  pub default_instance_lifetime: LifetimeKind,
  /// Whether public, settable members are injected without being marked or
  /// named in the registration.
  pub auto_inject_members: bool,
  pub pipeline_mode: PipelineMode,
  /// Nesting limit for a single resolve call.
  pub max_resolution_depth: usize,
}

impl Default for ContainerOptions {
  fn default() -> Self {
    Self {
      default_type_lifetime: LifetimeKind::Transient,
      default_factory_lifetime: LifetimeKind::Transient,
      default_instance_lifetime: LifetimeKind::ContainerControlled,
      auto_inject_members: false,
      pipeline_mode: PipelineMode::Compiled,
      max_resolution_depth: 256,
    }
  }
}

impl ContainerOptions {
  pub(crate) fn validate(&self) -> Result<(), BuildError> {
    if self.max_resolution_depth == 0 {
      return Err(BuildError::ZeroDepth);
    }
    if !self.default_instance_lifetime.can_hold_instance() {
      return Err(BuildError::InvalidInstanceLifetime(
        self.default_instance_lifetime.name(),
      ));
    }
    Ok(())
  }
}

/// The policy object shared by every scope of one or more container trees:
/// options, type catalog and build pipelines.
#[derive(Debug)]
pub struct Policies {
  options: ContainerOptions,
  catalog: Catalog,
  chains: StrategyChains,
}

impl Policies {
  pub fn new(options: ContainerOptions) -> Result<Self, BuildError> {
    options.validate()?;
    Ok(Self {
      options,
      catalog: Catalog::new(),
      chains: StrategyChains::new(),
    })
  }

  pub fn options(&self) -> &ContainerOptions {
    &self.options
  }

  pub fn catalog(&self) -> &Catalog {
    &self.catalog
  }

  pub fn chains(&self) -> &StrategyChains {
    &self.chains
  }
}

impl Default for Policies {
  fn default() -> Self {
    Self {
      options: ContainerOptions::default(),
      catalog: Catalog::new(),
      chains: StrategyChains::new(),
    }
  }
}
