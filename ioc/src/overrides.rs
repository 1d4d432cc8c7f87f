//! Caller-supplied value substitutions for a single resolve call.

use crate::context::Resolver;
use crate::contract::{Contract, Name, TypeKey};
use crate::error::BoxError;
use crate::instance::Instance;
use crate::metadata::Catalog;
use crate::registration::{factory_fn, FactoryFn};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// How well an override or injected value fits a dependency site.
/// Higher ranks win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchRank {
  NoMatch,
  Compatible,
  HigherProspect,
  ExactMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteKind {
  Parameter,
  Field,
  Property,
}

/// A place where a dependency is injected: a parameter, field or property of
/// the type being built.
#[derive(Debug, Clone, Copy)]
pub struct DependencySite<'a> {
  pub kind: SiteKind,
  pub member: &'a str,
  pub declaring: TypeKey,
  pub contract: &'a Contract,
}

/// The value an override supplies.
#[derive(Clone)]
pub enum OverrideValue {
  Value(Instance),
  /// Resolve this contract instead of the site's own.
  Resolve(Contract),
  Factory { ty: TypeKey, factory: FactoryFn },
}

impl OverrideValue {
  pub fn value<T: ?Sized + Any + Send + Sync>(value: Arc<T>) -> Self {
    OverrideValue::Value(Instance::new(value))
  }

  pub fn resolve<T: ?Sized + Any>(name: Option<&str>) -> Self {
    OverrideValue::Resolve(Contract::from_parts::<T>(name))
  }

  pub fn factory<T, F>(factory: F) -> Self
  where
    T: ?Sized + Any + Send + Sync,
    F: Fn(&mut Resolver<'_, '_>) -> Result<Arc<T>, BoxError> + Send + Sync + 'static,
  {
    OverrideValue::Factory {
      ty: TypeKey::of::<T>(),
      factory: factory_fn(move |resolver| factory(resolver).map(Instance::new)),
    }
  }

  pub fn declared_type(&self) -> TypeKey {
    match self {
      OverrideValue::Value(value) => value.type_key(),
      OverrideValue::Resolve(contract) => contract.ty(),
      OverrideValue::Factory { ty, .. } => *ty,
    }
  }
}

impl From<Instance> for OverrideValue {
  fn from(value: Instance) -> Self {
    OverrideValue::Value(value)
  }
}

impl<T: ?Sized + Any + Send + Sync> From<Arc<T>> for OverrideValue {
  fn from(value: Arc<T>) -> Self {
    OverrideValue::value(value)
  }
}

impl fmt::Debug for OverrideValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      OverrideValue::Value(value) => f.debug_tuple("Value").field(value).finish(),
      OverrideValue::Resolve(contract) => f.debug_tuple("Resolve").field(contract).finish(),
      OverrideValue::Factory { ty, .. } => f.debug_struct("Factory").field("ty", ty).finish(),
    }
  }
}

#[derive(Debug, Clone)]
enum SiteFilter {
  Any,
  Parameter(Arc<str>),
  Field(Arc<str>),
  Property(Arc<str>),
}

impl SiteFilter {
  fn accepts(&self, site: &DependencySite<'_>) -> bool {
    match self {
      SiteFilter::Any => true,
      SiteFilter::Parameter(name) => site.kind == SiteKind::Parameter && **name == *site.member,
      SiteFilter::Field(name) => site.kind == SiteKind::Field && **name == *site.member,
      SiteFilter::Property(name) => site.kind == SiteKind::Property && **name == *site.member,
    }
  }
}

/// A value substitution supplied by the caller for one resolve call.
///
/// Overrides apply to every dependency site reached during the call, not just
/// the requested type. When several overrides match a site, the highest
/// [`MatchRank`] wins. Within a rank the more specific override wins, counting
/// one point each for a declaring type, a contract name and a member name.
/// Remaining ties go to the override listed last.
///
/// # Examples
///
/// ```
/// use fibre_di::{MatchRank, ResolverOverride};
/// use std::sync::Arc;
///
/// struct Repository;
///
/// // Replace the `timeout` parameter, but only when building a `Repository`.
/// let timeout = ResolverOverride::parameter("timeout", Arc::new(30_u64)).on::<Repository>();
/// // Replace every `u64` dependency, only where the types match exactly.
/// let any_u64 = ResolverOverride::dependency::<u64>(Arc::new(5_u64)).exact();
/// # let _ = (timeout, any_u64, MatchRank::ExactMatch);
/// ```
#[derive(Debug, Clone)]
pub struct ResolverOverride {
  site: SiteFilter,
  target: Option<TypeKey>,
  contract_name: Option<Name>,
  dependency: Option<TypeKey>,
  value_type: Option<TypeKey>,
  value: OverrideValue,
  require_exact: bool,
}

impl ResolverOverride {
  fn new(site: SiteFilter, value: OverrideValue) -> Self {
    Self {
      site,
      target: None,
      contract_name: None,
      dependency: None,
      value_type: Some(value.declared_type()),
      value,
      require_exact: false,
    }
  }

  /// Overrides constructor and method parameters called `name`.
  pub fn parameter(name: &str, value: impl Into<OverrideValue>) -> Self {
    Self::new(SiteFilter::Parameter(Arc::from(name)), value.into())
  }

  pub fn field(name: &str, value: impl Into<OverrideValue>) -> Self {
    Self::new(SiteFilter::Field(Arc::from(name)), value.into())
  }

  pub fn property(name: &str, value: impl Into<OverrideValue>) -> Self {
    Self::new(SiteFilter::Property(Arc::from(name)), value.into())
  }

  /// Overrides any site whose contract type is `T`.
  ///
  /// The value is still ranked by its own type, so a value that is neither a
  /// `T` nor assignable to one never applies.
  pub fn dependency<T: ?Sized + Any>(value: impl Into<OverrideValue>) -> Self {
    let mut this = Self::new(SiteFilter::Any, value.into());
    this.dependency = Some(TypeKey::of::<T>());
    this
  }

  /// Restricts the override to sites declared on `D`.
  pub fn on<D: ?Sized + Any>(mut self) -> Self {
    self.target = Some(TypeKey::of::<D>());
    self
  }

  /// Restricts the override to sites whose dependency contract is named `name`.
  pub fn named(mut self, name: &str) -> Self {
    self.contract_name = Some(Some(Arc::from(name)));
    self
  }

  /// Restricts the override to sites whose dependency contract is unnamed.
  pub fn unnamed(mut self) -> Self {
    self.contract_name = Some(None);
    self
  }

  /// Applies the override only where its type matches the site exactly.
  pub fn exact(mut self) -> Self {
    self.require_exact = true;
    self
  }

  /// Matches sites of any type.
  pub fn untyped(mut self) -> Self {
    self.value_type = None;
    self
  }

  pub fn value(&self) -> &OverrideValue {
    &self.value
  }

  pub fn requires_exact_match(&self) -> bool {
    self.require_exact
  }

  /// Ranks this override against a dependency site.
  pub fn rank(&self, site: &DependencySite<'_>, catalog: &Catalog) -> MatchRank {
    if let Some(target) = self.target {
      if target != site.declaring {
        return MatchRank::NoMatch;
      }
    }
    if !self.site.accepts(site) {
      return MatchRank::NoMatch;
    }
    if let Some(name) = &self.contract_name {
      if name != site.contract.name_arc() {
        return MatchRank::NoMatch;
      }
    }
    if let Some(dependency) = self.dependency {
      if dependency != site.contract.ty() {
        return MatchRank::NoMatch;
      }
    }
    match self.value_type {
      None => MatchRank::Compatible,
      Some(ty) if ty == site.contract.ty() => MatchRank::ExactMatch,
      Some(ty) if catalog.is_assignable(ty, site.contract.ty()) => MatchRank::HigherProspect,
      Some(_) => MatchRank::NoMatch,
    }
  }

  fn specificity(&self) -> u8 {
    u8::from(self.target.is_some())
      + u8::from(self.contract_name.is_some())
      + u8::from(!matches!(self.site, SiteFilter::Any))
  }

  fn applies_at(&self, rank: MatchRank) -> bool {
    match rank {
      MatchRank::NoMatch => false,
      MatchRank::ExactMatch => true,
      _ => !self.require_exact,
    }
  }
}

/// Picks the override for `site`: highest rank, then most specific, then the
/// later one.
pub(crate) fn best_match<'o>(
  overrides: &'o [ResolverOverride],
  site: &DependencySite<'_>,
  catalog: &Catalog,
) -> Option<(&'o ResolverOverride, MatchRank)> {
  let mut best: Option<(&'o ResolverOverride, MatchRank)> = None;
  for candidate in overrides {
    let rank = candidate.rank(site, catalog);
    if !candidate.applies_at(rank) {
      continue;
    }
    let wins = best.map_or(true, |(current, best_rank)| {
      rank > best_rank || (rank == best_rank && candidate.specificity() >= current.specificity())
    });
    if wins {
      best = Some((candidate, rank));
    }
  }
  best
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::metadata::{Describe, Injectable};

  trait Sink: Send + Sync {}

  struct FileSink;
  impl Sink for FileSink {}
  impl Injectable for FileSink {
    fn describe(d: &mut Describe<Self>) {
      d.constructor().build(|_| Ok(FileSink));
      d.implements::<dyn Sink, _>(|s| s as Arc<dyn Sink>);
    }
  }

  struct Service;
  struct Other;

  fn site<'a>(kind: SiteKind, member: &'a str, contract: &'a Contract) -> DependencySite<'a> {
    DependencySite {
      kind,
      member,
      declaring: TypeKey::of::<Service>(),
      contract,
    }
  }

  #[test]
  fn ranks_follow_match_rules() {
    let catalog = Catalog::new();
    catalog.describe::<FileSink>();
    let sink = Contract::of::<dyn Sink>();
    let s = site(SiteKind::Parameter, "sink", &sink);

    let exact = ResolverOverride::dependency::<dyn Sink>(Arc::new(FileSink) as Arc<dyn Sink>);
    assert_eq!(exact.rank(&s, &catalog), MatchRank::ExactMatch);

    let assignable = ResolverOverride::parameter("sink", Arc::new(FileSink));
    assert_eq!(assignable.rank(&s, &catalog), MatchRank::HigherProspect);

    let untyped = ResolverOverride::parameter("sink", Arc::new(1_u8)).untyped();
    assert_eq!(untyped.rank(&s, &catalog), MatchRank::Compatible);

    let wrong_type = ResolverOverride::parameter("sink", Arc::new(1_u8));
    assert_eq!(wrong_type.rank(&s, &catalog), MatchRank::NoMatch);

    let wrong_target = exact.clone().on::<Other>();
    assert_eq!(wrong_target.rank(&s, &catalog), MatchRank::NoMatch);

    let wrong_name = exact.clone().named("audit");
    assert_eq!(wrong_name.rank(&s, &catalog), MatchRank::NoMatch);

    let wrong_member = ResolverOverride::parameter("other", Arc::new(FileSink));
    assert_eq!(wrong_member.rank(&s, &catalog), MatchRank::NoMatch);

    let wrong_kind = ResolverOverride::field("sink", Arc::new(FileSink));
    assert_eq!(wrong_kind.rank(&s, &catalog), MatchRank::NoMatch);
  }

  #[test]
  fn highest_rank_wins_then_most_specific_then_latest() {
    let catalog = Catalog::new();
    let contract = Contract::of::<u32>();
    let s = site(SiteKind::Parameter, "count", &contract);

    let overrides = vec![
      ResolverOverride::dependency::<u32>(Arc::new(1_u32)).on::<Service>(),
      ResolverOverride::parameter("count", Arc::new(2_u32)).untyped(),
    ];
    let (winner, rank) = best_match(&overrides, &s, &catalog).unwrap();
    assert_eq!(rank, MatchRank::ExactMatch);
    assert!(matches!(winner.value(), OverrideValue::Value(v) if *v.downcast::<u32>().unwrap() == 1));

    let overrides = vec![
      ResolverOverride::parameter("count", Arc::new(3_u32)),
      ResolverOverride::dependency::<u32>(Arc::new(4_u32)),
    ];
    let (winner, _) = best_match(&overrides, &s, &catalog).unwrap();
    assert!(matches!(winner.value(), OverrideValue::Value(v) if *v.downcast::<u32>().unwrap() == 3));

    let overrides = vec![
      ResolverOverride::parameter("count", Arc::new(5_u32)),
      ResolverOverride::parameter("count", Arc::new(6_u32)),
    ];
    let (winner, _) = best_match(&overrides, &s, &catalog).unwrap();
    assert!(matches!(winner.value(), OverrideValue::Value(v) if *v.downcast::<u32>().unwrap() == 6));
  }

  #[test]
  fn dependency_overrides_rank_by_their_value() {
    let catalog = Catalog::new();
    let contract = Contract::of::<u32>();
    let s = site(SiteKind::Parameter, "count", &contract);

    let mismatched = ResolverOverride::dependency::<u32>(Arc::new(1_u8));
    assert_eq!(mismatched.rank(&s, &catalog), MatchRank::NoMatch);

    let other_site = ResolverOverride::dependency::<u8>(Arc::new(1_u8));
    assert_eq!(other_site.rank(&s, &catalog), MatchRank::NoMatch);

    let untyped = ResolverOverride::dependency::<u32>(Arc::new(1_u8)).untyped();
    assert_eq!(untyped.rank(&s, &catalog), MatchRank::Compatible);
  }

  #[test]
  fn exact_only_overrides_are_skipped_otherwise() {
    let catalog = Catalog::new();
    let contract = Contract::of::<u32>();
    let s = site(SiteKind::Parameter, "count", &contract);

    let overrides = vec![ResolverOverride::parameter("count", Arc::new(1_u8))
      .untyped()
      .exact()];
    assert!(best_match(&overrides, &s, &catalog).is_none());
  }
}
