use crate::contract::{Contract, TypeKey};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Boxed error type returned by user code (constructors, factories, setters, disposers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while resolving a contract.
///
/// A resolve call either returns a fully built object or exactly one of these,
/// with nested causes reachable through `source()`.
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
  #[error("no registration or constructible type found for {contract}")]
  NotResolvable { contract: Contract },

  #[error("circular dependency detected while resolving {contract}: {}", format_path(.path))]
  CircularDependency {
    contract: Contract,
    path: Vec<Contract>,
  },

  #[error("resolution of {contract} exceeded the maximum depth of {limit}")]
  DepthExceeded { contract: Contract, limit: usize },

  #[error("invalid registration for {contract}: {reason}")]
  Registration {
    contract: Contract,
    reason: RegistrationFault,
  },

  #[error("failed to resolve {site} while building {contract}")]
  Dependency {
    contract: Contract,
    site: String,
    #[source]
    source: Box<ResolutionError>,
  },

  #[error("user code failed while building {contract}: {source}")]
  UserCode {
    contract: Contract,
    #[source]
    source: Arc<dyn std::error::Error + Send + Sync + 'static>,
  },

  #[error("value built for {contract} is not a `{expected}`")]
  TypeMismatch {
    contract: Contract,
    expected: &'static str,
  },

  #[error("cannot build {contract}: the owning scope has been disposed")]
  ScopeDisposed { contract: Contract },

  #[error("externally controlled instance for {contract} has been released")]
  InstanceReleased { contract: Contract },

  #[error("build pipeline for {contract} completed without producing a value")]
  NoResult { contract: Contract },
}

impl ResolutionError {
  /// Whether this error is a circular dependency. Circular errors are never wrapped.
  pub fn is_circular(&self) -> bool {
    matches!(self, ResolutionError::CircularDependency { .. })
  }

  /// The contract this error was raised for.
  pub fn contract(&self) -> &Contract {
    match self {
      ResolutionError::NotResolvable { contract }
      | ResolutionError::CircularDependency { contract, .. }
      | ResolutionError::DepthExceeded { contract, .. }
      | ResolutionError::Registration { contract, .. }
      | ResolutionError::Dependency { contract, .. }
      | ResolutionError::UserCode { contract, .. }
      | ResolutionError::TypeMismatch { contract, .. }
      | ResolutionError::ScopeDisposed { contract }
      | ResolutionError::InstanceReleased { contract }
      | ResolutionError::NoResult { contract } => contract,
    }
  }

  /// Follows `Dependency` wrappers down to the innermost error.
  pub fn root_cause(&self) -> &ResolutionError {
    let mut current = self;
    while let ResolutionError::Dependency { source, .. } = current {
      current = source;
    }
    current
  }

  pub(crate) fn user_code(contract: Contract, source: BoxError) -> Self {
    ResolutionError::UserCode {
      contract,
      source: Arc::from(source),
    }
  }

  /// Wraps a nested failure with the site that requested it. Circular
  /// dependency errors pass through unchanged.
  pub(crate) fn at_site(self, contract: &Contract, site: impl Into<String>) -> Self {
    if self.is_circular() {
      return self;
    }
    ResolutionError::Dependency {
      contract: contract.clone(),
      site: site.into(),
      source: Box::new(self),
    }
  }

  /// Recovers a resolution error that user code boxed with `?`, otherwise
  /// wraps the error as a user-code fault.
  pub(crate) fn from_user(contract: &Contract, err: BoxError) -> Self {
    match err.downcast::<ResolutionError>() {
      Ok(inner) if inner.is_circular() => *inner,
      Ok(inner) => inner.at_site(contract, "a factory dependency"),
      Err(other) => ResolutionError::user_code(contract.clone(), other),
    }
  }
}

fn format_path(path: &[Contract]) -> String {
  path
    .iter()
    .map(|c| c.to_string())
    .collect::<Vec<_>>()
    .join(" -> ")
}

/// Structural problems with a registration discovered while building it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationFault {
  #[error("the registration has no build data")]
  Uninitialized,
  #[error("`{0}` has no accessible constructor")]
  NoAccessibleConstructor(&'static str),
  #[error("`{0}` has more than one constructor marked for injection")]
  MultipleMarkedConstructors(&'static str),
  #[error("the injected constructor matches no constructor declared on `{0}`")]
  NoMatchingConstructor(&'static str),
  #[error("none of the constructors of `{0}` can be satisfied")]
  NoResolvableConstructor(&'static str),
  #[error("the injected method `{method}` matches no method declared on `{ty}`")]
  NoMatchingMethod { ty: &'static str, method: String },
  #[error("`{0}` is not a constructible type")]
  NotConstructible(&'static str),
}

/// Errors returned synchronously by the registration API. A failed registration
/// leaves the scope unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
  #[error("`{to}` cannot be registered as `{from}`: no cast to `{from}` is declared")]
  NotAssignable { from: TypeKey, to: TypeKey },

  #[error("`{0}` is not a concrete, constructible type")]
  NotConstructible(TypeKey),

  #[error("`{ty}` declares no {kind} named `{member}`")]
  MemberNotFound {
    ty: TypeKey,
    kind: MemberKindName,
    member: String,
  },

  #[error("{kind} `{member}` on `{ty}` is static or not settable")]
  MemberNotInjectable {
    ty: TypeKey,
    kind: MemberKindName,
    member: String,
  },

  #[error("a {lifetime} lifetime cannot hold a registered instance")]
  UnsupportedLifetime { lifetime: &'static str },

  #[error("injection members are only supported on type registrations")]
  MembersNotSupported,
}

/// The kind of member named in a [`RegistrationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKindName {
  Field,
  Property,
  Method,
}

impl fmt::Display for MemberKindName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      MemberKindName::Field => f.write_str("field"),
      MemberKindName::Property => f.write_str("property"),
      MemberKindName::Method => f.write_str("method"),
    }
  }
}

/// Errors that can occur when building a container.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  /// `max_resolution_depth` must allow at least one level of resolution.
  #[error("maximum resolution depth cannot be zero")]
  ZeroDepth,
  /// The default instance lifetime must be able to hold a value.
  #[error("a {0} lifetime cannot be the default for registered instances")]
  InvalidInstanceLifetime(&'static str),
}

/// Error raised when user code panics; carries the panic message.
#[derive(Debug, Error)]
#[error("panicked: {0}")]
pub struct Panicked(pub String);

impl Panicked {
  pub(crate) fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
      (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
      s.clone()
    } else {
      "unknown panic payload".to_string()
    };
    Panicked(message)
  }
}

/// Runs user code, turning panics into boxed errors.
pub(crate) fn guard_user<R>(f: impl FnOnce() -> Result<R, BoxError>) -> Result<R, BoxError> {
  match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
    Ok(result) => result,
    Err(payload) => Err(Box::new(Panicked::from_payload(payload))),
  }
}
