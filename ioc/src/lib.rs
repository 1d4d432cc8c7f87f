//! # Fibre DI
//!
//! A hierarchical, thread-safe dependency resolution engine for Rust.
//!
//! Fibre DI builds object graphs from registrations. Types describe their
//! constructors and injectable members through [`Injectable`]; the container
//! picks a constructor, resolves every dependency recursively and caches the
//! result according to a [`LifetimeManager`] policy.
//!
//! ## Core Concepts
//!
//! - **Container**: A handle to one scope. Child containers fall back to their
//!   parent and may shadow its registrations.
//! - **Contract**: The key of a registration, a type plus an optional name.
//! - **Lifetimes**: Transient, per-thread, per-resolve, container-controlled,
//!   hierarchical and externally controlled caching policies.
//! - **Pipeline**: Every build runs a staged chain of [`BuilderStrategy`] values,
//!   which can be extended with custom strategies.
//! - **Overrides**: Per-call substitutions for parameters, fields, properties or
//!   whole dependency types, ranked by how precisely they match.
//!
//! ## Quick Start
//!
//! ```
//! use fibre_di::{Container, Describe, Injectable, LifetimeKind, Registration};
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!   fn greet(&self) -> String;
//! }
//!
//! struct EnglishGreeter {
//!   message: Arc<String>,
//! }
//!
//! impl Greeter for EnglishGreeter {
//!   fn greet(&self) -> String {
//!     (*self.message).clone()
//!   }
//! }
//!
//! impl Injectable for EnglishGreeter {
//!   fn describe(d: &mut Describe<Self>) {
//!     d.constructor()
//!       .param::<String>("message")
//!       .named("greeting_message")
//!       .build(|args| Ok(EnglishGreeter { message: args.next()? }));
//!     d.implements::<dyn Greeter, _>(|g| g as Arc<dyn Greeter>);
//!   }
//! }
//!
//! fn main() {
//!   let container = Container::new();
//!
//!   // Register a simple value.
//!   container
//!     .register_instance(
//!       Arc::new(String::from("Hello, World!")),
//!       Registration::new().named("greeting_message"),
//!     )
//!     .unwrap();
//!
//!   // Register an implementation against its trait.
//!   container
//!     .register_type::<dyn Greeter, EnglishGreeter>(
//!       Registration::new().lifetime(LifetimeKind::ContainerControlled),
//!     )
//!     .unwrap();
//!
//!   // Resolve the service by its trait.
//!   let greeter = container.resolve::<dyn Greeter>().unwrap();
//!   assert_eq!(greeter.greet(), "Hello, World!");
//! }
//! ```

mod builder;
mod config;
mod container;
mod context;
mod contract;
mod error;
mod instance;
pub mod lifetime;
mod macros;
mod metadata;
mod overrides;
mod pipeline;
mod registration;
mod scope;
mod select;

pub use builder::ContainerBuilder;
pub use config::{ContainerOptions, Policies};
pub use container::Container;
pub use context::{BuilderContext, Resolver};
pub use contract::{Contract, Name, TypeKey};
pub use error::{
  BoxError, BuildError, MemberKindName, Panicked, RegistrationError, RegistrationFault,
  ResolutionError,
};
pub use instance::{Dispose, Instance, WeakInstance};
pub use lifetime::{LifetimeKind, LifetimeManager, ResolveCache};
pub use metadata::{
  ArgumentError, Args, Catalog, ConstructorInfo, Describe, ForConstructor, ForMethod,
  ImportMarker, Injectable, MemberBuilder, MemberInfo, MethodInfo, ParameterInfo,
  SignatureBuilder, TypeInfo, TypeKind, Visibility,
};
pub use overrides::{DependencySite, MatchRank, OverrideValue, ResolverOverride, SiteKind};
pub use pipeline::{
  BuilderStrategy, ChainKind, CompleteStrategy, ConstructorStrategy, FactoryStrategy,
  FieldStrategy, InstanceStrategy, LifetimeStrategy, MethodStrategy, PipelineMode,
  PropertyStrategy, Stage, StagedStrategyChain, StrategyChains,
};
pub use registration::{
  Category, InjectionMember, InjectionMembers, InjectionValue, MemberInjection, MethodInjection,
  Registration, RegistrationManager,
};
pub use scope::Registered;
