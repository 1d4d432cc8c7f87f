//! Constructor, member and method selection.

use crate::contract::TypeKey;
use crate::error::RegistrationFault;
use crate::metadata::{
  ConstructorInfo, ImportMarker, MemberInfo, MethodInfo, ParameterInfo, TypeInfo, Visibility,
};
use crate::overrides::MatchRank;
use crate::registration::{InjectionValue, MemberInjection, MethodInjection};
use std::cmp::Reverse;

/// Answers the questions selection needs about the resolving scope.
pub(crate) trait Satisfy {
  /// Whether `param` can be given a value: it is overridden, defaulted,
  /// optional, registered or constructible.
  fn can_satisfy(&self, declaring: TypeKey, param: &ParameterInfo) -> bool;

  fn is_assignable(&self, from: TypeKey, to: TypeKey) -> bool;
}

/// Ranks an injected value against a declared parameter.
pub(crate) fn rank_argument(
  value: &InjectionValue,
  param: &ParameterInfo,
  scope: &impl Satisfy,
) -> MatchRank {
  match value.declared_type() {
    None => MatchRank::Compatible,
    Some(ty) if ty == param.ty => MatchRank::ExactMatch,
    Some(ty) if scope.is_assignable(ty, param.ty) => MatchRank::HigherProspect,
    Some(_) => MatchRank::NoMatch,
  }
}

/// Scores a signature against injected arguments. `None` means no match.
fn match_signature(
  params: &[ParameterInfo],
  args: &[InjectionValue],
  scope: &impl Satisfy,
) -> Option<u32> {
  if params.len() != args.len() {
    return None;
  }
  let mut score = 0;
  for (param, arg) in params.iter().zip(args) {
    match rank_argument(arg, param, scope) {
      MatchRank::NoMatch => return None,
      rank => score += rank as u32,
    }
  }
  Some(score)
}

/// Picks the best-scoring candidate; the first declared wins ties.
fn best_signature<'i, I>(
  candidates: I,
  args: &[InjectionValue],
  scope: &impl Satisfy,
) -> Option<usize>
where
  I: Iterator<Item = (usize, &'i [ParameterInfo])>,
{
  let mut best: Option<(usize, u32)> = None;
  for (index, params) in candidates {
    if let Some(score) = match_signature(params, args, scope) {
      if best.map_or(true, |(_, best_score)| score > best_score) {
        best = Some((index, score));
      }
    }
  }
  best.map(|(index, _)| index)
}

/// Parameter complexity used to order candidates of equal arity. `None`
/// disqualifies the constructor.
fn complexity(ctor: &ConstructorInfo) -> Option<i32> {
  let mut score = 0;
  for param in &ctor.params {
    if param.by_ref {
      return None;
    }
    if param.default.is_some() {
      score += 1;
    }
    if param.generic {
      score += 1;
    }
  }
  Some(score)
}

/// Chooses the constructor used to build `info`, returning its index.
pub(crate) fn select_constructor(
  info: &TypeInfo,
  injected: Option<&[InjectionValue]>,
  scope: &impl Satisfy,
) -> Result<usize, RegistrationFault> {
  let name = info.key().name();
  let public: Vec<usize> = info
    .constructors
    .iter()
    .enumerate()
    .filter(|(_, c)| c.visibility == Visibility::Public)
    .map(|(i, _)| i)
    .collect();

  if let Some(args) = injected {
    let candidates = public
      .iter()
      .map(|&i| (i, info.constructors[i].params.as_slice()));
    return best_signature(candidates, args, scope)
      .ok_or(RegistrationFault::NoMatchingConstructor(name));
  }

  match public.as_slice() {
    [] => return Err(RegistrationFault::NoAccessibleConstructor(name)),
    [only] => return Ok(*only),
    _ => {}
  }

  let marked: Vec<usize> = public
    .iter()
    .copied()
    .filter(|&i| info.constructors[i].injection)
    .collect();
  match marked.as_slice() {
    [] => {}
    [only] => return Ok(*only),
    _ => return Err(RegistrationFault::MultipleMarkedConstructors(name)),
  }

  let mut ranked: Vec<(usize, usize, i32)> = public
    .iter()
    .filter_map(|&i| {
      let ctor = &info.constructors[i];
      complexity(ctor).map(|score| (i, ctor.params.len(), score))
    })
    .collect();
  ranked.sort_by_key(|&(i, arity, score)| (Reverse(arity), Reverse(score), i));

  ranked
    .into_iter()
    .map(|(i, _, _)| i)
    .find(|&i| {
      info.constructors[i]
        .params
        .iter()
        .all(|p| scope.can_satisfy(info.key(), p))
    })
    .ok_or(RegistrationFault::NoResolvableConstructor(name))
}

/// A field or property chosen for injection.
#[derive(Debug)]
pub(crate) struct SelectedMember<'i, 'r> {
  pub member: &'i MemberInfo,
  pub value: Option<&'r InjectionValue>,
  pub required: bool,
}

/// Explicit members first, then marked ones, then (when enabled) every public
/// settable member. Each member is selected at most once.
pub(crate) fn select_members<'i, 'r>(
  declared: &'i [MemberInfo],
  explicit: &'r [MemberInjection],
  auto_discover: bool,
) -> Vec<SelectedMember<'i, 'r>> {
  let mut selected: Vec<SelectedMember<'i, 'r>> = Vec::new();

  for injection in explicit {
    if is_taken(&selected, &injection.name) {
      continue;
    }
    if let Some(member) = declared.iter().find(|m| m.name == injection.name) {
      if member.is_injectable() {
        selected.push(SelectedMember {
          member,
          value: injection.value.as_ref(),
          required: true,
        });
      }
    }
  }

  for member in declared {
    if member.import == ImportMarker::None
      || !member.is_injectable()
      || is_taken(&selected, member.name)
    {
      continue;
    }
    selected.push(SelectedMember {
      member,
      value: None,
      required: member.import == ImportMarker::Required,
    });
  }

  if auto_discover {
    for member in declared {
      if member.visibility != Visibility::Public
        || !member.is_injectable()
        || is_taken(&selected, member.name)
      {
        continue;
      }
      selected.push(SelectedMember {
        member,
        value: None,
        required: false,
      });
    }
  }

  selected
}

fn is_taken(selected: &[SelectedMember<'_, '_>], name: &str) -> bool {
  selected.iter().any(|s| s.member.name == name)
}

/// An injection method chosen for invocation.
#[derive(Debug)]
pub(crate) struct SelectedMethod<'i, 'r> {
  pub method: &'i MethodInfo,
  pub args: Option<&'r [InjectionValue]>,
}

/// Explicit methods, matched by name and signature, then marked methods.
pub(crate) fn select_methods<'i, 'r>(
  info: &'i TypeInfo,
  explicit: &'r [MethodInjection],
  scope: &impl Satisfy,
) -> Result<Vec<SelectedMethod<'i, 'r>>, RegistrationFault> {
  let mut chosen: Vec<usize> = Vec::new();
  let mut selected = Vec::new();

  for injection in explicit {
    let candidates = info
      .methods
      .iter()
      .enumerate()
      .filter(|(_, m)| m.name == injection.name && !m.is_static)
      .map(|(i, m)| (i, m.params.as_slice()));
    let index = best_signature(candidates, &injection.args, scope).ok_or_else(|| {
      RegistrationFault::NoMatchingMethod {
        ty: info.key().name(),
        method: injection.name.clone(),
      }
    })?;
    chosen.push(index);
    selected.push(SelectedMethod {
      method: &info.methods[index],
      args: Some(injection.args.as_slice()),
    });
  }

  for (index, method) in info.methods.iter().enumerate() {
    if method.import == ImportMarker::None || method.is_static || chosen.contains(&index) {
      continue;
    }
    selected.push(SelectedMethod { method, args: None });
  }

  Ok(selected)
}
