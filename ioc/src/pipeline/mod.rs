//! The staged build pipeline.
//!
//! Each registration category has its own [`StagedStrategyChain`]: an ordered
//! list of stages, each holding zero or more [`BuilderStrategy`] values. A
//! build runs every strategy's `pre_build_up` in stage order, then every
//! entered strategy's `post_build_up` in reverse.

mod chain;
mod construction;
mod lifetime;
mod members;
mod values;

pub use chain::StagedStrategyChain;
pub use construction::ConstructorStrategy;
pub use lifetime::LifetimeStrategy;
pub use members::{FieldStrategy, MethodStrategy, PropertyStrategy};
pub use values::{CompleteStrategy, FactoryStrategy, InstanceStrategy};

use crate::context::BuilderContext;
use std::fmt;
use std::sync::Arc;

/// The ordered phases of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
  Setup,
  PreCreation,
  Creation,
  PostCreation,
  PreFields,
  Fields,
  PostFields,
  PreProperties,
  Properties,
  PostProperties,
  PreMethods,
  Methods,
  PostMethods,
  PreInitialization,
  Initialization,
  PostInitialization,
  Complete,
}

impl Stage {
  pub const ALL: [Stage; 17] = [
    Stage::Setup,
    Stage::PreCreation,
    Stage::Creation,
    Stage::PostCreation,
    Stage::PreFields,
    Stage::Fields,
    Stage::PostFields,
    Stage::PreProperties,
    Stage::Properties,
    Stage::PostProperties,
    Stage::PreMethods,
    Stage::Methods,
    Stage::PostMethods,
    Stage::PreInitialization,
    Stage::Initialization,
    Stage::PostInitialization,
    Stage::Complete,
  ];

  pub(crate) fn index(self) -> usize {
    self as usize
  }
}

/// One step of the build pipeline.
///
/// `pre_build_up` runs on the way in, `post_build_up` on the way out. Once the
/// context is faulted or complete, no further `pre_build_up` runs, but every
/// strategy whose `pre_build_up` ran still gets its `post_build_up`.
///
/// # Examples
///
/// ```
/// use fibre_di::{BuilderContext, BuilderStrategy, ChainKind, Container, Stage};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct CountBuilds(AtomicUsize);
///
/// impl BuilderStrategy for CountBuilds {
///   fn post_build_up(&self, ctx: &mut BuilderContext<'_>) {
///     if !ctx.is_faulted() && !ctx.is_cached() {
///       self.0.fetch_add(1, Ordering::SeqCst);
///     }
///   }
/// }
///
/// let container = Container::new();
/// let counter = Arc::new(CountBuilds::default());
/// container.add_strategy(ChainKind::Factory, Stage::PostCreation, counter.clone());
/// container
///   .register_factory(|_| Ok(Arc::new(5_u8)), Default::default())
///   .unwrap();
///
/// container.resolve::<u8>().unwrap();
/// assert_eq!(counter.0.load(Ordering::SeqCst), 1);
/// ```
pub trait BuilderStrategy: Send + Sync {
  fn pre_build_up(&self, _ctx: &mut BuilderContext<'_>) {}

  fn post_build_up(&self, _ctx: &mut BuilderContext<'_>) {}

  fn name(&self) -> &'static str {
    std::any::type_name::<Self>()
  }
}

/// How a chain is executed. Both modes produce the same results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PipelineMode {
  /// Walks the strategy list on every build.
  Interpreted,
  /// Composes the strategy list into a single nested closure, cached until
  /// the chain changes.
  #[default]
  Compiled,
}

/// Which pipeline builds a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainKind {
  Type,
  Factory,
  Instance,
  /// Concrete types built without a registration.
  Unregistered,
}

/// The four default build pipelines.
pub struct StrategyChains {
  type_chain: StagedStrategyChain,
  factory: StagedStrategyChain,
  instance: StagedStrategyChain,
  unregistered: StagedStrategyChain,
}

impl StrategyChains {
  pub fn new() -> Self {
    Self {
      type_chain: Self::type_pipeline(ChainKind::Type),
      factory: Self::value_pipeline(ChainKind::Factory, Arc::new(FactoryStrategy)),
      instance: Self::value_pipeline(ChainKind::Instance, Arc::new(InstanceStrategy)),
      unregistered: Self::type_pipeline(ChainKind::Unregistered),
    }
  }

  fn type_pipeline(kind: ChainKind) -> StagedStrategyChain {
    let chain = StagedStrategyChain::new(kind);
    chain.add(Stage::Setup, Arc::new(LifetimeStrategy));
    chain.add(Stage::Creation, Arc::new(ConstructorStrategy));
    chain.add(Stage::Fields, Arc::new(FieldStrategy));
    chain.add(Stage::Properties, Arc::new(PropertyStrategy));
    chain.add(Stage::Methods, Arc::new(MethodStrategy));
    chain.add(Stage::Complete, Arc::new(CompleteStrategy));
    chain
  }

  fn value_pipeline(kind: ChainKind, creation: Arc<dyn BuilderStrategy>) -> StagedStrategyChain {
    let chain = StagedStrategyChain::new(kind);
    chain.add(Stage::Setup, Arc::new(LifetimeStrategy));
    chain.add(Stage::Creation, creation);
    chain.add(Stage::Complete, Arc::new(CompleteStrategy));
    chain
  }

  pub fn get(&self, kind: ChainKind) -> &StagedStrategyChain {
    match kind {
      ChainKind::Type => &self.type_chain,
      ChainKind::Factory => &self.factory,
      ChainKind::Instance => &self.instance,
      ChainKind::Unregistered => &self.unregistered,
    }
  }
}

impl Default for StrategyChains {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for StrategyChains {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StrategyChains")
      .field("type", &self.type_chain)
      .field("factory", &self.factory)
      .field("instance", &self.instance)
      .field("unregistered", &self.unregistered)
      .finish()
  }
}
