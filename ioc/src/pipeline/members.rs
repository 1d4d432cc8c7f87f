use super::BuilderStrategy;
use crate::context::BuilderContext;
use crate::error::{guard_user, ResolutionError};
use crate::metadata::Args;
use crate::overrides::SiteKind;
use crate::select::{select_members, select_methods};

/// Injects fields of the object under construction.
#[derive(Debug, Default)]
pub struct FieldStrategy;

/// Injects properties of the object under construction.
#[derive(Debug, Default)]
pub struct PropertyStrategy;

/// Calls injection methods on the object under construction.
#[derive(Debug, Default)]
pub struct MethodStrategy;

impl BuilderStrategy for FieldStrategy {
  fn pre_build_up(&self, ctx: &mut BuilderContext<'_>) {
    inject_members(ctx, SiteKind::Field);
  }
}

impl BuilderStrategy for PropertyStrategy {
  fn pre_build_up(&self, ctx: &mut BuilderContext<'_>) {
    inject_members(ctx, SiteKind::Property);
  }
}

fn inject_members(ctx: &mut BuilderContext<'_>, kind: SiteKind) {
  if ctx.existing.is_none() {
    return;
  }
  let Some(info) = ctx.type_info.clone() else {
    return;
  };
  let registration = ctx.registration.clone();
  let (declared, explicit, label) = match kind {
    SiteKind::Field => (info.fields(), registration.members().fields(), "field"),
    SiteKind::Property => (
      info.properties(),
      registration.members().properties(),
      "property",
    ),
    SiteKind::Parameter => return,
  };
  let auto_discover = ctx.scope.options().auto_inject_members;
  let contract = ctx.contract.clone();

  let mut values = Vec::new();
  for selected in select_members(declared, explicit, auto_discover) {
    match ctx.resolve_member(kind, info.key(), selected.member, selected.value, selected.required) {
      Ok(Some(value)) => values.push((selected.member, value)),
      Ok(None) => {}
      Err(err) => {
        ctx.fail(err.at_site(&contract, format!("{label} `{}`", selected.member.name())));
        return;
      }
    }
  }

  let Some(target) = ctx.existing.as_deref_mut() else {
    return;
  };
  for (member, value) in values {
    let setter = member.setter.clone();
    if let Err(err) = guard_user(|| setter(&mut *target, value)) {
      ctx.fail(ResolutionError::from_user(&contract, err));
      return;
    }
  }
}

impl BuilderStrategy for MethodStrategy {
  fn pre_build_up(&self, ctx: &mut BuilderContext<'_>) {
    if ctx.existing.is_none() {
      return;
    }
    let Some(info) = ctx.type_info.clone() else {
      return;
    };
    let registration = ctx.registration.clone();
    let contract = ctx.contract.clone();
    let methods = match select_methods(&info, registration.members().methods(), &*ctx) {
      Ok(methods) => methods,
      Err(reason) => {
        ctx.fail(ResolutionError::Registration { contract, reason });
        return;
      }
    };

    for selected in methods {
      let method = selected.method;
      let mut values = Vec::with_capacity(method.params().len());
      for (position, param) in method.params().iter().enumerate() {
        let explicit = selected.args.and_then(|args| args.get(position));
        match ctx.resolve_parameter(info.key(), param, explicit) {
          Ok(value) => values.push((param.name(), value)),
          Err(err) => {
            let site = format!("parameter `{}` of method `{}`", param.name(), method.name());
            ctx.fail(err.at_site(&contract, site));
            return;
          }
        }
      }

      let Some(target) = ctx.existing.as_deref_mut() else {
        return;
      };
      let invoke = method.invoke.clone();
      if let Err(err) = guard_user(|| invoke(target, Args::new(values))) {
        ctx.fail(ResolutionError::from_user(&contract, err));
        return;
      }
    }
  }
}
